//! Middleware pipeline: composable before/after request handler logic.
//!
//! Each middleware wraps the next layer, enabling request inspection, short-circuit
//! responses, and response decoration without coupling handlers to infrastructure
//! concerns.
//!
//! ## Core types
//!
//! - [`Middleware`]: trait implemented by all middleware.
//! - [`Next`]: cursor into the remaining middleware chain; call [`Next::run`] to
//!   advance to the next layer.
//! - [`Pipeline`]: an ordered middleware stack terminated by a [`Router`].
//! - [`LoggerMiddleware`]: one log line per request.
//! - [`RecoverMiddleware`]: turns a panicking handler into a generic `500`.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::{future::Future, pin::Pin, sync::Arc};

use futures::FutureExt;
use tokio::time::Instant;

use crate::{Request, Response, StatusCode, context::Context, router::Router};

/// Body of the `500` returned when a handler panics.
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal server error occurred.";

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed on each call to [`run`](Self::run), so it cannot be called
/// more than once per middleware invocation.
pub struct Next {
    middlewares: Arc<[MiddlewareHandler]>,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
}

/// A type-erased, reference-counted middleware function.
pub type MiddlewareHandler = Arc<
    dyn Fn(Context, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static,
>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

impl Next {
    /// Creates a new `Next` positioned at the start of the given stack.
    pub fn new(middlewares: Arc<[MiddlewareHandler]>) -> Self {
        Self {
            middlewares,
            index: 0,
        }
    }

    /// Invokes the next middleware in the chain and returns its response.
    ///
    /// If the chain is exhausted without producing a response, a `500` is
    /// returned as a safe fallback.
    pub async fn run(mut self, ctx: Context) -> Response {
        if self.index < self.middlewares.len() {
            let handler = Arc::clone(&self.middlewares[self.index]);
            self.index += 1;
            handler(ctx, self).await
        } else {
            Response::text(
                StatusCode::InternalServerError,
                "No response generated by middleware pipeline",
            )
        }
    }
}

/// The core trait for all middleware.
///
/// Implementors receive a [`Context`] and a [`Next`] cursor. They may pass
/// through (`next.run(ctx).await`), short-circuit with their own [`Response`],
/// or decorate the downstream response.
///
/// Implementations **should not** hold `&mut` references to shared state across
/// an `.await` point.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

/// Logs each request's peer, method, path, status, and time to first byte.
///
/// For event streams the duration covers producing the response head, not the
/// lifetime of the stream.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().as_str().to_owned();
            let path = ctx.request().path().to_owned();
            let peer = ctx
                .peer_ip()
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "-".to_owned());

            let response = next.run(ctx).await;

            tracing::info!(
                peer = %peer,
                status = response.status().as_u16(),
                elapsed = ?start.elapsed(),
                "{method} {path}"
            );

            response
        })
    }
}

/// Catches a panic raised while producing a response and answers with a
/// generic `500` plain-text body. Nothing from the panic reaches the client.
pub struct RecoverMiddleware;

impl Middleware for RecoverMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin(async move {
            let path = ctx.request().path().to_owned();
            match AssertUnwindSafe(next.run(ctx)).catch_unwind().await {
                Ok(response) => response,
                Err(panic) => {
                    tracing::error!(path = %path, panic = %panic_message(&*panic), "handler panicked");
                    Response::text(StatusCode::InternalServerError, INTERNAL_ERROR_MESSAGE)
                }
            }
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// An ordered middleware stack whose innermost layer dispatches to a [`Router`].
///
/// Middleware run in the order they were added; the first one added sees the
/// request first and the response last.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use kisan_sathi::middleware::{LoggerMiddleware, Pipeline, RecoverMiddleware};
/// use kisan_sathi::context::Context;
/// use kisan_sathi::{Response, Router, StatusCode};
///
/// let mut router = Router::new();
/// router.get("/", |_ctx: Context| async { Response::new(StatusCode::Ok) });
///
/// let pipeline = Pipeline::new(router)
///     .with(Arc::new(LoggerMiddleware))
///     .with(Arc::new(RecoverMiddleware));
/// ```
pub struct Pipeline {
    layers: Vec<MiddlewareHandler>,
    router: Arc<Router>,
}

impl Pipeline {
    pub fn new(router: Router) -> Self {
        Self {
            layers: Vec::new(),
            router: Arc::new(router),
        }
    }

    #[must_use]
    pub fn with<M>(mut self, middleware: Arc<M>) -> Self
    where
        M: Middleware + 'static,
    {
        self.layers.push(from_middleware(middleware));
        self
    }

    /// Freezes the stack into a cheaply cloneable request handler.
    pub fn into_handler(self) -> PipelineHandler {
        let router = self.router;
        let endpoint: MiddlewareHandler = Arc::new(
            move |ctx: Context, _next: Next| -> Pin<Box<dyn Future<Output = Response> + Send>> {
                let router = Arc::clone(&router);
                Box::pin(async move { router.dispatch(ctx).await })
            },
        );

        let mut chain = self.layers;
        chain.push(endpoint);
        PipelineHandler {
            chain: chain.into(),
        }
    }
}

/// A frozen [`Pipeline`], suitable for [`Server::run`](crate::server::Server::run).
#[derive(Clone)]
pub struct PipelineHandler {
    chain: Arc<[MiddlewareHandler]>,
}

impl PipelineHandler {
    pub async fn handle(&self, request: Request) -> Response {
        Next::new(Arc::clone(&self.chain))
            .run(Context::new(request))
            .await
    }
}
