//! Request routing: map exact paths and HTTP methods to handler functions.
//!
//! Trailing slashes are normalized on both patterns and incoming paths, so `/clear/`
//! and `/clear` are treated as equivalent. Routes are matched in registration order;
//! the first route whose method and path both match wins.
//!
//! A path that is registered under other methods answers `405 Method Not Allowed`
//! with an `Allow` header; an unknown path answers `404 Not Found`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::{Method, Request, Response, StatusCode};

/// Type-erased, heap-allocated async handler that processes a [`Context`] and returns a
/// [`Response`].
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait through the blanket impl below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

fn normalize(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

// A single registered route binding a method + path to a handler.
struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

/// HTTP request router.
///
/// # Examples
///
/// ```rust,no_run
/// use kisan_sathi::context::Context;
/// use kisan_sathi::{Router, Response, StatusCode};
///
/// let mut router = Router::new();
/// router.get("/", |_ctx: Context| async { Response::text(StatusCode::Ok, "ok") });
/// router.post("/clear", |_ctx: Context| async { Response::new(StatusCode::Ok) });
/// assert_eq!(router.len(), 2);
/// ```
pub struct Router {
    routes: Vec<Route>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a handler for `GET` requests on `path`.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Get, path, handler);
    }

    /// Register a handler for `POST` requests on `path`.
    pub fn post(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Post, path, handler);
    }

    // Erase the concrete handler type and store it as a `Handler` trait object.
    fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler) {
        let handler: Handler = Arc::new(move |ctx: Context| handler.call(ctx));
        self.routes.push(Route {
            method,
            path: normalize(path).to_owned(),
            handler,
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch `request` to the first matching route and return its response.
    pub async fn route(&self, request: Request) -> Response {
        self.dispatch(Context::new(request)).await
    }

    /// Dispatch an already-wrapped request; used as the innermost layer of a
    /// middleware pipeline.
    pub async fn dispatch(&self, ctx: Context) -> Response {
        let path = normalize(ctx.request().path()).to_owned();
        let method = ctx.request().method().clone();

        let mut allowed: Vec<&str> = Vec::new();
        for route in self.routes.iter().filter(|r| r.path == path) {
            if route.method == method {
                return (route.handler)(ctx).await;
            }
            allowed.push(route.method.as_str());
        }

        if allowed.is_empty() {
            Response::text(StatusCode::NotFound, "Not Found")
        } else {
            allowed.dedup();
            Response::text(StatusCode::MethodNotAllowed, "Method Not Allowed")
                .header("Allow", allowed.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request(method: &str, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    #[test]
    fn normalize_strips_one_trailing_slash() {
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("/clear/"), "/clear");
        assert_eq!(normalize("/clear"), "/clear");
    }

    #[test]
    fn router_len_increments_on_add() {
        let mut router = Router::new();
        assert!(router.is_empty());
        router.get("/a", |_ctx: Context| async { Response::new(StatusCode::Ok) });
        router.post("/b", |_ctx: Context| async { Response::new(StatusCode::Ok) });
        assert_eq!(router.len(), 2);
        assert!(Router::default().is_empty());
    }

    #[tokio::test]
    async fn router_empty_returns_404() {
        let router = Router::new();
        let res = router.route(make_request("GET", "/")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn router_get_matches() {
        let mut router = Router::new();
        router.get("/", |_ctx: Context| async { Response::new(StatusCode::Ok) });
        let res = router.route(make_request("GET", "/")).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn trailing_slash_is_equivalent() {
        let mut router = Router::new();
        router.post("/clear", |_ctx: Context| async { Response::new(StatusCode::NoContent) });
        let res = router.route(make_request("POST", "/clear/")).await;
        assert_eq!(res.status(), StatusCode::NoContent);
    }

    #[tokio::test]
    async fn wrong_method_returns_405_with_allow() {
        let mut router = Router::new();
        router.post("/chat", |_ctx: Context| async { Response::new(StatusCode::Ok) });
        let res = router.route(make_request("GET", "/chat")).await;
        assert_eq!(res.status(), StatusCode::MethodNotAllowed);
        assert_eq!(res.headers().get("allow"), Some("POST"));
    }

    #[tokio::test]
    async fn query_string_does_not_affect_matching() {
        let mut router = Router::new();
        router.get("/", |_ctx: Context| async { Response::new(StatusCode::Ok) });
        let res = router.route(make_request("GET", "/?lang=hi")).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn first_matching_route_wins() {
        let mut router = Router::new();
        router.get("/path", |_ctx: Context| async { Response::new(StatusCode::Ok) });
        router.get("/path", |_ctx: Context| async { Response::new(StatusCode::NoContent) });
        let res = router.route(make_request("GET", "/path")).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn handler_sees_the_request() {
        let mut router = Router::new();
        router.get("/echo", |ctx: Context| async move {
            let path = ctx.request().path().to_owned();
            Response::text(StatusCode::Ok, path)
        });
        let res = router.route(make_request("GET", "/echo")).await;
        assert_eq!(res.full_body(), Some(&b"/echo"[..]));
    }
}
