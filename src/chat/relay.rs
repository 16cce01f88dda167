//! Frames a streamed reply as server-sent events.

use bytes::Bytes;
use futures::{StreamExt, future};
use serde_json::json;
use tracing::error;

use crate::http::BodyStream;
use crate::llm::{EventStream, StreamEvent};

/// Sent in place of any remote failure; details stay in the server log.
pub const STREAM_ERROR_MESSAGE: &str = "An error occurred while generating the response.";

/// Turns reply events into SSE frames: one `{"token": ..}` event per chunk, and
/// a single `{"error": ..}` event that ends the stream if the reply fails.
pub fn relay(events: EventStream) -> BodyStream {
    let frames = events
        .scan(false, |failed, event| {
            if *failed {
                return future::ready(None);
            }
            let frame = match event {
                StreamEvent::Chunk(text) => frame(&json!({ "token": text })),
                StreamEvent::Error(e) => {
                    error!(error = %e, "reply stream failed");
                    *failed = true;
                    frame(&json!({ "error": STREAM_ERROR_MESSAGE }))
                }
            };
            future::ready(Some(frame))
        });
    Box::pin(frames)
}

fn frame(payload: &serde_json::Value) -> Bytes {
    Bytes::from(format!("data: {payload}\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use futures::stream;

    async fn frames(events: Vec<StreamEvent>) -> Vec<String> {
        relay(Box::pin(stream::iter(events)))
            .map(|b| String::from_utf8(b.to_vec()).unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn chunks_become_token_events() {
        let out = frames(vec![
            StreamEvent::Chunk("Use neem".into()),
            StreamEvent::Chunk(" oil.".into()),
        ])
        .await;
        assert_eq!(
            out,
            vec!["data: {\"token\":\"Use neem\"}\n\n", "data: {\"token\":\" oil.\"}\n\n"]
        );
    }

    #[tokio::test]
    async fn token_text_is_json_escaped() {
        let out = frames(vec![StreamEvent::Chunk("line\n\"q\" गेहूं".into())]).await;
        let payload = out[0].strip_prefix("data: ").unwrap().trim_end();
        let value: serde_json::Value = serde_json::from_str(payload).unwrap();
        assert_eq!(value["token"], "line\n\"q\" गेहूं");
        assert!(!payload.contains('\n'));
    }

    #[tokio::test]
    async fn error_is_generic_and_final() {
        let out = frames(vec![
            StreamEvent::Chunk("partial".into()),
            StreamEvent::Error(LlmError::Api {
                status: 500,
                message: "secret upstream detail".into(),
            }),
            StreamEvent::Chunk("never".into()),
        ])
        .await;
        assert_eq!(out.len(), 2);
        assert_eq!(
            out[1],
            "data: {\"error\":\"An error occurred while generating the response.\"}\n\n"
        );
        assert!(!out.concat().contains("secret"));
    }

    #[tokio::test]
    async fn empty_reply_sends_nothing() {
        assert!(frames(Vec::new()).await.is_empty());
    }
}
