//! Response builder handed to handlers.
//!
//! # Responsibilities
//! - Accumulate status, headers and body for one invocation
//! - Track whether a handler already sent the response
//!
//! # Design Decisions
//! - Bodies are text; the Lambda proxy contract carries strings
//! - `send` defaults the content type when a handler did not set one
//! - Sending twice keeps the first body and logs a warning

use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use serde::Serialize;

use crate::error::RouteError;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";

/// The response side of one dispatch.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<String>,
    sent: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
            sent: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// Set header `name`, replacing existing values.
    pub fn set(&mut self, name: &str, value: &str) -> Result<&mut Self, RouteError> {
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Append a value to header `name`.
    pub fn append(&mut self, name: &str, value: &str) -> Result<&mut Self, RouteError> {
        let (name, value) = parse_header(name, value)?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// First value of header `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Whether a handler already sent the response.
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Send `body` and mark the response finished.
    pub fn send(&mut self, body: impl Into<String>) -> &mut Self {
        if self.sent {
            tracing::warn!(status = %self.status, "Response already sent, ignoring second send");
            return self;
        }
        if !self.headers.contains_key(header::CONTENT_TYPE) {
            self.headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
        }
        self.body = Some(body.into());
        self.sent = true;
        self
    }

    /// Set `status` and send its canonical reason phrase as the body.
    pub fn send_status(&mut self, status: StatusCode) -> &mut Self {
        if !self.sent {
            self.status = status;
        }
        let reason = status.canonical_reason().unwrap_or("");
        self.send(reason)
    }

    /// Serialize `value` as the JSON body.
    pub fn json<T: Serialize>(&mut self, value: &T) -> Result<&mut Self, RouteError> {
        let body = serde_json::to_string(value).map_err(RouteError::new)?;
        if !self.sent {
            self.headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        }
        Ok(self.send(body))
    }

    /// Drop the body, keeping status and headers (HEAD responses).
    pub(crate) fn strip_body(&mut self) {
        self.body = None;
    }

    pub fn into_parts(self) -> (StatusCode, HeaderMap, Option<String>) {
        (self.status, self.headers, self.body)
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), RouteError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| RouteError::new(format!("invalid header name '{}'", name)))?;
    let value = HeaderValue::from_str(value)
        .map_err(|_| RouteError::new(format!("invalid value for header '{}'", name)))?;
    Ok((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_defaults_content_type() {
        let mut res = Response::new();
        res.send("hello");
        assert!(res.is_sent());
        assert_eq!(res.body(), Some("hello"));
        assert_eq!(res.get("content-type"), Some(TEXT_PLAIN));
    }

    #[test]
    fn test_send_keeps_explicit_content_type() {
        let mut res = Response::new();
        res.set("Content-Type", "text/html").unwrap();
        res.send("<p>hi</p>");
        assert_eq!(res.get("content-type"), Some("text/html"));
    }

    #[test]
    fn test_second_send_is_ignored() {
        let mut res = Response::new();
        res.send("first");
        res.send("second");
        assert_eq!(res.body(), Some("first"));
    }

    #[test]
    fn test_json_after_send_leaves_response_alone() {
        let mut res = Response::new();
        res.send("plain");
        res.json(&serde_json::json!({ "late": true })).unwrap();
        res.send_status(StatusCode::NOT_FOUND);
        assert_eq!(res.body(), Some("plain"));
        assert_eq!(res.get("content-type"), Some(TEXT_PLAIN));
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[test]
    fn test_send_status() {
        let mut res = Response::new();
        res.send_status(StatusCode::FORBIDDEN);
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(res.body(), Some("Forbidden"));
    }

    #[test]
    fn test_json() {
        let mut res = Response::new();
        res.set_status(StatusCode::CREATED)
            .json(&serde_json::json!({ "id": 7 }))
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.body(), Some(r#"{"id":7}"#));
        assert_eq!(res.get("content-type"), Some(APPLICATION_JSON));
    }

    #[test]
    fn test_set_and_append_headers() {
        let mut res = Response::new();
        res.set("Vary", "Accept").unwrap();
        res.append("Vary", "Origin").unwrap();
        assert_eq!(res.headers().get_all("vary").iter().count(), 2);
        res.set("Vary", "Cookie").unwrap();
        assert_eq!(res.get("vary"), Some("Cookie"));
        assert!(res.set("bad name", "x").is_err());
        assert!(res.set("x-ok", "line\nbreak").is_err());
    }
}
