//! HTTP surface of the chat service.

use std::sync::Arc;

use serde_json::json;
use tracing::{error, info};

use crate::chat::{Language, SessionKey, SessionStore, relay};
use crate::context::Context;
use crate::llm::ChatBackend;
use crate::middleware::{
    INTERNAL_ERROR_MESSAGE, LoggerMiddleware, Pipeline, PipelineHandler, RecoverMiddleware,
};
use crate::{Response, Router, StatusCode};

pub const NO_MESSAGE: &str = "Error: No message provided.";

const INDEX_HTML: &str = include_str!("../static/index.html");

/// State shared by every request.
pub struct AppState {
    pub store: SessionStore,
}

impl AppState {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            store: SessionStore::new(backend),
        }
    }
}

/// Registers the chat routes, including the legacy `/get_response` and
/// `/clear_history` paths.
pub fn router(state: Arc<AppState>) -> Router {
    let mut router = Router::new();

    router.get("/", |_ctx: Context| async { index() });

    for path in ["/chat", "/get_response"] {
        let state = Arc::clone(&state);
        router.post(path, move |ctx: Context| chat(Arc::clone(&state), ctx));
    }

    for path in ["/clear", "/clear_history"] {
        let state = Arc::clone(&state);
        router.post(path, move |ctx: Context| clear(Arc::clone(&state), ctx));
    }

    router
}

/// The full request handler: routes wrapped in request logging and panic recovery.
pub fn handler(state: Arc<AppState>) -> PipelineHandler {
    Pipeline::new(router(state))
        .with(Arc::new(LoggerMiddleware))
        .with(Arc::new(RecoverMiddleware))
        .into_handler()
}

fn index() -> Response {
    Response::new(StatusCode::Ok)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(INDEX_HTML)
}

fn session_key(ctx: &Context) -> SessionKey {
    ctx.peer_ip()
        .map(SessionKey::from)
        .unwrap_or_else(SessionKey::anonymous)
}

async fn chat(state: Arc<AppState>, mut ctx: Context) -> Response {
    let message = ctx
        .form_field("message")
        .map(str::trim)
        .unwrap_or_default()
        .to_owned();
    if message.is_empty() {
        return Response::text(StatusCode::BadRequest, NO_MESSAGE);
    }

    let language = Language::from_code(ctx.form_field("language").unwrap_or("en"));
    let session = session_key(&ctx);

    let conversation = match state.store.get_or_create(&session, language) {
        Ok(conversation) => conversation,
        Err(e) => {
            error!(session = %session, error = %e, "session lookup failed");
            return Response::text(StatusCode::InternalServerError, INTERNAL_ERROR_MESSAGE);
        }
    };

    info!(session = %session, %language, chars = message.chars().count(), "relaying message");
    Response::event_stream(relay(conversation.send_message_stream(message)))
}

async fn clear(state: Arc<AppState>, ctx: Context) -> Response {
    let session = session_key(&ctx);

    match state.store.clear(&session) {
        Ok(removed) => {
            info!(session = %session, removed, "chat history cleared");
            Response::json(
                StatusCode::Ok,
                &json!({ "status": "success", "message": "Chat history cleared" }),
            )
        }
        Err(e) => {
            error!(session = %session, error = %e, "clearing chat history failed");
            Response::json(
                StatusCode::InternalServerError,
                &json!({ "status": "error", "message": e.to_string() }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Request;
    use crate::http::Body;
    use crate::llm::{LlmResult, TokenStream, Turn};
    use async_trait::async_trait;
    use futures::{StreamExt, stream};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatBackend for Counting {
        async fn stream_generate(&self, _history: &[Turn]) -> LlmResult<TokenStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Box::pin(stream::iter(vec![Ok("Namaste".to_owned())])))
        }

        fn model(&self) -> &str {
            "counting"
        }
    }

    fn post(path: &str, body: &str) -> Request {
        let raw = format!(
            "POST {path} HTTP/1.1\r\nHost: localhost\r\n\
             Content-Type: application/x-www-form-urlencoded\r\n\
             Content-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let (request, _) = Request::parse(raw.as_bytes()).unwrap();
        request.with_peer_addr("10.1.2.3:40000".parse().unwrap())
    }

    fn get(path: &str) -> Request {
        let raw = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        Request::parse(raw.as_bytes()).unwrap().0
    }

    fn setup() -> (Arc<Counting>, Arc<AppState>, PipelineHandler) {
        let backend = Arc::new(Counting::default());
        let state = Arc::new(AppState::new(backend.clone()));
        (backend, Arc::clone(&state), handler(state))
    }

    async fn body_text(response: Response) -> String {
        match response.into_body() {
            Body::Full(bytes) => String::from_utf8(bytes).unwrap(),
            Body::Stream(stream) => {
                let chunks: Vec<_> = stream.collect().await;
                String::from_utf8(chunks.concat()).unwrap()
            }
        }
    }

    #[tokio::test]
    async fn index_is_html() {
        let (_, _, handler) = setup();
        let response = handler.handle(get("/")).await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(
            response.headers().get("Content-Type"),
            Some("text/html; charset=utf-8")
        );
        assert!(body_text(response).await.contains("Kisan Sathi"));
    }

    #[tokio::test]
    async fn blank_message_is_rejected_without_remote_call() {
        let (backend, state, handler) = setup();
        for body in ["", "message=", "message=+++", "language=hi"] {
            let response = handler.handle(post("/chat", body)).await;
            assert_eq!(response.status(), StatusCode::BadRequest, "{body:?}");
            assert_eq!(body_text(response).await, NO_MESSAGE);
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert_eq!(state.store.session_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn chat_streams_tokens() {
        let (backend, state, handler) = setup();
        let response = handler
            .handle(post("/get_response", "message=Hello+there&language=mr"))
            .await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.headers().get("Content-Type"), Some("text/event-stream"));
        assert_eq!(body_text(response).await, "data: {\"token\":\"Namaste\"}\n\n");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        let key = SessionKey::new("10.1.2.3");
        let convo = state.store.get_or_create(&key, Language::Marathi).unwrap();
        let history = convo.history().await;
        assert_eq!(history[2], Turn::user("Hello there"));
    }

    #[tokio::test]
    async fn clear_answers_success_json() {
        let (_, state, handler) = setup();
        body_text(handler.handle(post("/chat", "message=hi")).await).await;
        assert_eq!(state.store.session_count().unwrap(), 1);

        for path in ["/clear", "/clear_history"] {
            let response = handler.handle(post(path, "")).await;
            assert_eq!(response.status(), StatusCode::Ok);
            let value: serde_json::Value =
                serde_json::from_str(&body_text(response).await).unwrap();
            assert_eq!(value, json!({ "status": "success", "message": "Chat history cleared" }));
        }
        assert_eq!(state.store.session_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_path_and_wrong_method() {
        let (_, _, handler) = setup();
        assert_eq!(handler.handle(get("/missing")).await.status(), StatusCode::NotFound);
        assert_eq!(handler.handle(get("/chat")).await.status(), StatusCode::MethodNotAllowed);
    }
}
