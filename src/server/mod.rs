//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and dispatches HTTP/1.1 requests to a handler function.
//! Connections are persistent (keep-alive) and each one runs on its own task, so a
//! long-lived event stream on one connection never holds up another.

use std::future::Future;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Largest request (head plus body) buffered before answering `413`.
const MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// The HTTP server.
///
/// # Examples
///
/// ```rust,no_run
/// use kisan_sathi::server::Server;
/// use kisan_sathi::http::{Request, Response, StatusCode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = Server::bind("127.0.0.1:5000").await?;
///     server
///         .run_until(
///             |_req: Request| async { Response::text(StatusCode::Ok, "namaste") },
///             async { let _ = tokio::signal::ctrl_c().await; },
///         )
///         .await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves until the process is terminated.
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.run_until(handler, std::future::pending()).await
    }

    /// Accepts connections and dispatches requests to `handler` until `shutdown`
    /// resolves.
    ///
    /// The handler receives each [`Request`] with its peer address attached. It is
    /// shared across all connection tasks, so it must be `Send + Sync + 'static`.
    /// Connections already being served when `shutdown` fires run to completion
    /// on their own tasks.
    pub async fn run_until<H, F, S>(self, handler: H, shutdown: S) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
        S: Future<Output = ()>,
    {
        let handler = Arc::new(handler);
        info!(address = %self.local_addr, "listening");

        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                        continue;
                    }
                },
            };

            debug!(peer = %peer_addr, "connection accepted");
            let handler = Arc::clone(&handler);

            tokio::spawn(async move {
                match handle_connection(stream, peer_addr, handler).await {
                    Ok(()) => {}
                    Err(e) if matches!(e.kind(), ErrorKind::BrokenPipe | ErrorKind::ConnectionReset) => {
                        debug!(peer = %peer_addr, "peer went away mid-response");
                    }
                    Err(e) => warn!(peer = %peer_addr, error = %e, "connection closed with error"),
                }
            });
        }
    }
}

/// Serves one TCP connection over its lifetime.
///
/// Buffered requests are dispatched before reading again, so pipelined
/// requests are answered in order.
async fn handle_connection<H, F>(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<H>,
) -> Result<(), std::io::Error>
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        match Request::parse(&buf) {
            Ok((request, body_offset)) => {
                let total_needed = body_offset.saturating_add(request.content_length());

                if total_needed > MAX_REQUEST_SIZE {
                    warn!(peer = %peer_addr, size = total_needed, "request too large, sending 413");
                    return Response::text(StatusCode::PayloadTooLarge, "Request entity too large")
                        .keep_alive(false)
                        .write_to(&mut stream)
                        .await;
                }

                if buf.len() >= total_needed {
                    let keep_alive = request.is_keep_alive();

                    debug!(
                        peer = %peer_addr,
                        method = %request.method(),
                        path = %request.path(),
                        "dispatching request"
                    );

                    let response = handler(request.with_peer_addr(peer_addr)).await;
                    let keep_alive = keep_alive && response.is_keep_alive();
                    response.keep_alive(keep_alive).write_to(&mut stream).await?;

                    buf.advance(total_needed);

                    if !keep_alive {
                        debug!(peer = %peer_addr, "Connection: close, shutting down");
                        return Ok(());
                    }
                    continue;
                }
            }
            Err(RequestError::Incomplete) => {}
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request, sending 400");
                return Response::text(StatusCode::BadRequest, format!("Bad Request: {e}"))
                    .keep_alive(false)
                    .write_to(&mut stream)
                    .await;
            }
        }

        if buf.len() > MAX_REQUEST_SIZE {
            warn!(peer = %peer_addr, "request head too large, sending 413");
            return Response::text(StatusCode::PayloadTooLarge, "Request entity too large")
                .keep_alive(false)
                .write_to(&mut stream)
                .await;
        }

        let bytes_read = stream.read_buf(&mut buf).await?;
        if bytes_read == 0 {
            debug!(peer = %peer_addr, "connection closed by peer");
            return Ok(());
        }
    }
}
