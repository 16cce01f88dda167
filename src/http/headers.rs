//! HTTP header map with case-insensitive name lookup.
//!
//! Header names are compared ASCII case-insensitively per [RFC 9110 §5.1].

use std::fmt;

/// An ordered, case-insensitive HTTP header map.
///
/// Multiple values per name are kept in insertion order; [`set`](Self::set)
/// replaces them all.
///
/// # Examples
///
/// ```
/// use kisan_sathi::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "application/x-www-form-urlencoded; charset=UTF-8");
///
/// assert_eq!(headers.get("content-type"), Some("application/x-www-form-urlencoded; charset=UTF-8"));
/// assert_eq!(headers.media_type(), Some("application/x-www-form-urlencoded".to_owned()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Appends a header entry, keeping any existing values for the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replaces every value of `name` with a single `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.entries.push((name, value.into()));
    }

    /// Returns the first value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Returns the lowercased media type of `Content-Type`, without parameters.
    pub fn media_type(&self) -> Option<String> {
        let value = self.get("content-type")?;
        let essence = value.split(';').next().unwrap_or("").trim();
        (!essence.is_empty()).then(|| essence.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut h = Headers::new();
        h.insert("Content-Length", "12");
        assert_eq!(h.get("content-length"), Some("12"));
        assert_eq!(h.get("CONTENT-LENGTH"), Some("12"));
        assert!(h.contains("Content-length"));
        assert!(!h.contains("x-missing"));
    }

    #[test]
    fn set_replaces_all_values() {
        let mut h = Headers::new();
        h.insert("Cache-Control", "max-age=60");
        h.insert("cache-control", "public");
        h.set("Cache-Control", "no-cache");
        assert_eq!(h.len(), 1);
        assert_eq!(h.get("cache-control"), Some("no-cache"));
    }

    #[test]
    fn media_type_strips_parameters() {
        let mut h = Headers::new();
        h.insert("Content-Type", "Text/Event-Stream ; charset=utf-8");
        assert_eq!(h.media_type().as_deref(), Some("text/event-stream"));
    }

    #[test]
    fn media_type_absent() {
        assert_eq!(Headers::new().media_type(), None);
    }

    #[test]
    fn display_is_wire_format() {
        let mut h = Headers::new();
        h.insert("Content-Type", "text/html");
        h.insert("Connection", "close");
        assert_eq!(h.to_string(), "Content-Type: text/html\r\nConnection: close\r\n");
    }
}
