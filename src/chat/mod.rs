//! The Kisan Sathi chat domain: prompts, per-client conversations, and SSE
//! framing of replies.

pub mod prompts;
pub mod relay;
pub mod store;

pub use prompts::{ACKNOWLEDGEMENT, Language, prompt_for};
pub use relay::{STREAM_ERROR_MESSAGE, relay};
pub use store::{SessionKey, SessionStore, StoreError};
