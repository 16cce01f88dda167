//! # kisan-sathi
//!
//! Backend for the Kisan Sathi farming assistant: an async HTTP/1.1 server that
//! relays chat messages to Gemini and streams the reply back as server-sent
//! events, keeping one conversation per client and language.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kisan_sathi::app::{self, AppState};
//! use kisan_sathi::llm::{GeminiClient, GeminiSettings};
//! use kisan_sathi::{Request, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = GeminiClient::new(GeminiSettings::new("api-key"))?;
//!     let handler = app::handler(Arc::new(AppState::new(Arc::new(backend))));
//!
//!     let server = Server::bind("127.0.0.1:5000").await?;
//!     server
//!         .run(move |req: Request| {
//!             let handler = handler.clone();
//!             async move { handler.handle(req).await }
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod chat;
pub mod config;
pub mod context;
pub mod http;
pub mod llm;
pub mod middleware;
pub mod router;
pub mod server;

pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
