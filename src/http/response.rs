//! HTTP/1.1 response builder.
//!
//! A [`Response`] carries either a complete body, written with
//! `Content-Length`, or a [`BodyStream`] written with chunked transfer
//! encoding as items arrive. Server-Sent Events use the latter.

use std::fmt;
use std::pin::Pin;

use bytes::{BufMut, Bytes, BytesMut};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::{Headers, StatusCode};

/// A boxed stream of body chunks, polled by the server while it writes.
pub type BodyStream = Pin<Box<dyn Stream<Item = Bytes> + Send>>;

/// Response payload.
pub enum Body {
    Full(Vec<u8>),
    Stream(BodyStream),
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Body::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// An HTTP/1.1 response, ready to be written to a connection.
///
/// # Examples
///
/// ```
/// use kisan_sathi::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body(r#"{"status":"success"}"#);
///
/// assert_eq!(response.status(), StatusCode::Ok);
/// assert_eq!(response.headers().get("content-type"), Some("application/json"));
/// assert_eq!(response.full_body(), Some(&br#"{"status":"success"}"#[..]));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Body,
    keep_alive: bool,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Body::Full(Vec::new()),
            keep_alive: true,
        }
    }

    /// Plain-text response with the given status.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
    }

    /// JSON response with the given status. Serialization failure degrades to
    /// an empty `500`.
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => Self::new(status)
                .header("Content-Type", "application/json")
                .body_bytes(bytes),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize JSON response");
                Self::new(StatusCode::InternalServerError)
            }
        }
    }

    /// `text/event-stream` response whose body is written as `events` yields.
    ///
    /// Each item must already be a complete SSE frame.
    pub fn event_stream(events: BodyStream) -> Self {
        Self {
            status: StatusCode::Ok,
            headers: Headers::new(),
            body: Body::Stream(events),
            keep_alive: true,
        }
        .header("Content-Type", "text/event-stream")
        .header("Cache-Control", "no-cache")
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the response body from a string.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Body::Full(body.into().into_bytes());
        self
    }

    /// Sets the response body from raw bytes.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Body::Full(body.into());
        self
    }

    /// Controls whether `Connection: keep-alive` or `Connection: close` is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Returns the complete body, or `None` for a streamed response.
    pub fn full_body(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Full(bytes) => Some(bytes.as_slice()),
            Body::Stream(_) => None,
        }
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    /// Writes the response in HTTP/1.1 wire format.
    ///
    /// Full bodies get `Content-Length` (and a default
    /// `Content-Type: text/plain; charset=utf-8` when non-empty and unset).
    /// Streamed bodies get `Transfer-Encoding: chunked`; each stream item is
    /// flushed as one chunk, empty items are skipped, and the terminating
    /// zero-length chunk is written once the stream ends.
    ///
    /// An error means the peer is gone. The body stream is dropped with it,
    /// so nothing further is pulled from its source.
    pub async fn write_to<W>(self, writer: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let Response {
            status,
            mut headers,
            body,
            keep_alive,
        } = self;

        headers.set("Connection", if keep_alive { "keep-alive" } else { "close" });

        match body {
            Body::Full(bytes) => {
                if !bytes.is_empty() && !headers.contains("content-type") {
                    headers.insert("Content-Type", "text/plain; charset=utf-8");
                }
                headers.set("Content-Length", bytes.len().to_string());

                let mut buf = head(status, &headers, bytes.len());
                buf.put(bytes.as_slice());
                writer.write_all(&buf).await?;
                writer.flush().await
            }
            Body::Stream(mut chunks) => {
                headers.set("Transfer-Encoding", "chunked");
                writer.write_all(&head(status, &headers, 0)).await?;
                writer.flush().await?;

                while let Some(chunk) = chunks.next().await {
                    if chunk.is_empty() {
                        continue;
                    }
                    let mut frame = BytesMut::with_capacity(chunk.len() + 12);
                    frame.put(format!("{:X}\r\n", chunk.len()).as_bytes());
                    frame.put(chunk);
                    frame.put(&b"\r\n"[..]);
                    writer.write_all(&frame).await?;
                    writer.flush().await?;
                }

                writer.write_all(b"0\r\n\r\n").await?;
                writer.flush().await
            }
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

// Status line, headers and the blank separator line.
fn head(status: StatusCode, headers: &Headers, body_hint: usize) -> BytesMut {
    let mut buf = BytesMut::with_capacity(128 + headers.len() * 64 + body_hint);
    buf.put(
        format!(
            "HTTP/1.1 {} {}\r\n",
            status.as_u16(),
            status.canonical_reason()
        )
        .as_bytes(),
    );
    buf.put(headers.to_string().as_bytes());
    buf.put(&b"\r\n"[..]);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    async fn wire(response: Response) -> String {
        let mut out = Vec::new();
        response.write_to(&mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn simple_ok_response() {
        let s = wire(Response::new(StatusCode::Ok).body("Hello")).await;
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("Content-Length: 5\r\n"));
        assert!(s.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(s.ends_with("\r\n\r\nHello"));
    }

    #[tokio::test]
    async fn empty_body_has_no_content_type() {
        let s = wire(Response::new(StatusCode::NoContent)).await;
        assert!(!s.contains("Content-Type"));
        assert!(s.contains("Content-Length: 0\r\n"));
    }

    #[tokio::test]
    async fn connection_close() {
        let s = wire(Response::new(StatusCode::Ok).keep_alive(false)).await;
        assert!(s.contains("Connection: close\r\n"));
    }

    #[tokio::test]
    async fn json_response_sets_content_type() {
        let r = Response::json(
            StatusCode::InternalServerError,
            &serde_json::json!({"status": "error"}),
        );
        assert_eq!(r.headers().get("content-type"), Some("application/json"));
        assert_eq!(r.full_body(), Some(&br#"{"status":"error"}"#[..]));
        let s = wire(r).await;
        assert!(s.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }

    #[tokio::test]
    async fn streamed_body_is_chunked() {
        let events = stream::iter(vec![
            Bytes::from_static(b"data: one\n\n"),
            Bytes::new(),
            Bytes::from_static(b"data: two\n\n"),
        ]);
        let r = Response::event_stream(Box::pin(events));
        assert!(r.full_body().is_none());

        let s = wire(r).await;
        assert!(s.contains("Content-Type: text/event-stream\r\n"));
        assert!(s.contains("Cache-Control: no-cache\r\n"));
        assert!(s.contains("Transfer-Encoding: chunked\r\n"));
        assert!(!s.contains("Content-Length"));
        assert!(s.ends_with("\r\n\r\nB\r\ndata: one\n\n\r\nB\r\ndata: two\n\n\r\n0\r\n\r\n"));
    }

    #[tokio::test]
    async fn empty_stream_writes_only_terminator() {
        let r = Response::event_stream(Box::pin(stream::empty()));
        let s = wire(r).await;
        assert!(s.ends_with("\r\n\r\n0\r\n\r\n"));
    }
}
