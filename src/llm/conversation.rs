//! A multi-turn exchange with a [`ChatBackend`].

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt, stream};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{ChatBackend, LlmError, TokenStream, Turn};

/// One step of a streamed reply.
#[derive(Debug)]
pub enum StreamEvent {
    /// Reply text, in arrival order.
    Chunk(String),
    /// The turn failed. Always the last event of its stream.
    Error(LlmError),
}

pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// The turn history of one conversation plus the backend it talks to.
///
/// Turns are serialized: a second [`send_message_stream`](Self::send_message_stream)
/// waits until the first stream has finished or been dropped. A turn is committed
/// to the history only when its reply stream ends cleanly, so a failed or
/// abandoned turn leaves no trace.
pub struct Conversation {
    backend: Arc<dyn ChatBackend>,
    history: Arc<Mutex<Vec<Turn>>>,
}

impl Conversation {
    pub fn new(backend: Arc<dyn ChatBackend>, history: Vec<Turn>) -> Self {
        Self {
            backend,
            history: Arc::new(Mutex::new(history)),
        }
    }

    /// A snapshot of the committed history.
    pub async fn history(&self) -> Vec<Turn> {
        self.history.lock().await.clone()
    }

    /// Sends `message` and streams the reply.
    ///
    /// Nothing happens until the stream is first polled.
    pub fn send_message_stream(&self, message: String) -> EventStream {
        let state = TurnState::Pending {
            backend: Arc::clone(&self.backend),
            history: Arc::clone(&self.history),
            message,
        };

        Box::pin(stream::unfold(state, |state| async move {
            match state {
                TurnState::Pending {
                    backend,
                    history,
                    message,
                } => {
                    let history = history.lock_owned().await;
                    let mut request = history.clone();
                    request.push(Turn::user(message.as_str()));

                    match backend.stream_generate(&request).await {
                        Ok(tokens) => next_chunk(history, tokens, message, String::new()).await,
                        Err(e) => Some((StreamEvent::Error(e), TurnState::Finished)),
                    }
                }
                TurnState::Streaming {
                    history,
                    tokens,
                    message,
                    reply,
                } => next_chunk(history, tokens, message, reply).await,
                TurnState::Finished => None,
            }
        }))
    }
}

enum TurnState {
    Pending {
        backend: Arc<dyn ChatBackend>,
        history: Arc<Mutex<Vec<Turn>>>,
        message: String,
    },
    Streaming {
        history: OwnedMutexGuard<Vec<Turn>>,
        tokens: TokenStream,
        message: String,
        reply: String,
    },
    Finished,
}

async fn next_chunk(
    mut history: OwnedMutexGuard<Vec<Turn>>,
    mut tokens: TokenStream,
    message: String,
    mut reply: String,
) -> Option<(StreamEvent, TurnState)> {
    loop {
        match tokens.next().await {
            Some(Ok(text)) if text.is_empty() => continue,
            Some(Ok(text)) => {
                reply.push_str(&text);
                let state = TurnState::Streaming {
                    history,
                    tokens,
                    message,
                    reply,
                };
                return Some((StreamEvent::Chunk(text), state));
            }
            Some(Err(e)) => return Some((StreamEvent::Error(e), TurnState::Finished)),
            None => {
                history.push(Turn::user(message));
                history.push(Turn::model(reply));
                return None;
            }
        }
    }
}
