//! Per-request context handed to route handlers and middleware.

use std::collections::HashMap;
use std::net::IpAddr;

use crate::Request;

/// A request on its way through the middleware chain to a handler.
///
/// The form body is decoded lazily, once, on first access.
pub struct Context {
    request: Request,
    form: Option<HashMap<String, String>>,
}

impl Context {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            form: None,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// IP address of the connected client, if the request came off a socket.
    pub fn peer_ip(&self) -> Option<IpAddr> {
        self.request.peer_addr().map(|addr| addr.ip())
    }

    /// Returns a decoded form field, or `None` when the body has no such field.
    pub fn form_field(&mut self, name: &str) -> Option<&str> {
        let request = &self.request;
        self.form
            .get_or_insert_with(|| request.form())
            .get(name)
            .map(String::as_str)
    }

    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(raw: &str) -> Context {
        let (request, _) = Request::parse(raw.as_bytes()).unwrap();
        Context::new(request.with_peer_addr("192.168.1.20:40000".parse().unwrap()))
    }

    #[test]
    fn form_fields_are_decoded() {
        let body = "message=kharif+sowing&language=mr";
        let mut ctx = context(&format!(
            "POST /chat HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\n\
             Content-Length: {}\r\n\r\n{body}",
            body.len()
        ));
        assert_eq!(ctx.form_field("message"), Some("kharif sowing"));
        assert_eq!(ctx.form_field("language"), Some("mr"));
        assert_eq!(ctx.form_field("missing"), None);
    }

    #[test]
    fn peer_ip_drops_port() {
        let ctx = context("GET / HTTP/1.1\r\n\r\n");
        assert_eq!(ctx.peer_ip(), Some("192.168.1.20".parse().unwrap()));
    }

    #[test]
    fn json_body() {
        let body = r#"{"crop":"wheat"}"#;
        let ctx = context(&format!(
            "POST / HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        ));
        let value: serde_json::Value = ctx.json().unwrap();
        assert_eq!(value["crop"], "wheat");
    }
}
