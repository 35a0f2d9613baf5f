//! HTTP transport abstraction
//!
//! The client core only needs "send this request, give me status and body".
//! Keeping that behind a trait lets tests substitute a scripted transport
//! for the real pooled reqwest client, and keeps timeout policy out of the
//! call wrapper.

use std::time::Duration;

use crate::error::ApiError;

/// HTTP method of an outgoing request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Payload of an outgoing request
///
/// `Form` produces a URL-encoded POST (the token endpoint), `Json` a
/// JSON-encoded POST, `Empty` a GET. The variants are mutually exclusive
/// by construction.
#[derive(Debug, Clone)]
pub enum Body {
    Empty,
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
}

impl Body {
    /// Method implied by this payload
    pub fn method(&self) -> Method {
        match self {
            Body::Empty => Method::Get,
            Body::Json(_) | Body::Form(_) => Method::Post,
        }
    }
}

/// An outgoing HTTP request
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl Request {
    /// First header value whose name matches, ignoring ASCII case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A raw HTTP response: status code plus body text
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    /// Whether the status lies in [200, 300)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A blocking HTTP exchange
pub trait HttpTransport {
    fn send(&self, request: &Request) -> Result<Response, ApiError>;
}

/// Transport backed by a pooled blocking reqwest client
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Build a pooled client with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: &Request) -> Result<Response, ApiError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        builder = match &request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.body(serde_json::to_vec(value)?),
            Body::Form(fields) => builder.form(fields),
        };

        let response = builder.send().map_err(|e| ApiError::Transport {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let body = response.text().map_err(|e| ApiError::Transport {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;

        Ok(Response { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_body_method() {
        assert_eq!(Body::Empty.method(), Method::Get);
        assert_eq!(Body::Json(json!({})).method(), Method::Post);
        assert_eq!(Body::Form(vec![]).method(), Method::Post);
    }

    #[test]
    fn test_response_is_success() {
        assert!(Response { status: 200, body: String::new() }.is_success());
        assert!(Response { status: 299, body: String::new() }.is_success());
        assert!(!Response { status: 300, body: String::new() }.is_success());
        assert!(!Response { status: 401, body: String::new() }.is_success());
        assert!(!Response { status: 199, body: String::new() }.is_success());
    }

    #[test]
    fn test_request_header_lookup_ignores_case() {
        let request = Request {
            method: Method::Get,
            url: "https://example.org".to_string(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Body::Empty,
        };

        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("accept"), None);
    }
}
