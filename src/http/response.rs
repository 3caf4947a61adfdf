//! Response generation.
//!
//! Every request gets `200 OK` and the same HTML page, which names the
//! server mode and echoes the method and target unescaped.

use thiserror::Error;

use crate::http::request::{RequestLine, TokenBounds};

const HEAD_PREFIX: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: ";
const HEAD_END: &str = "\r\n\r\n";

fn framed_len(body_len: usize) -> usize {
    (HEAD_PREFIX.len() + body_len.to_string().len() + HEAD_END.len()).saturating_add(body_len)
}

/// Whether the response went out over TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    Secure,
    Plain,
}

impl ServerMode {
    pub fn from_tls(enabled: bool) -> Self {
        if enabled {
            ServerMode::Secure
        } else {
            ServerMode::Plain
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ServerMode::Secure => "HTTPS",
            ServerMode::Plain => "HTTP",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    #[error("response of {size} bytes exceeds the {limit}-byte limit")]
    TooLarge { size: usize, limit: usize },
}

/// Rendered HTML body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseDocument {
    body: Vec<u8>,
}

impl ResponseDocument {
    pub fn render(request: &RequestLine, mode: ServerMode) -> Self {
        let mut body = Vec::with_capacity(256 + request.method().len() + request.target().len());
        body.extend_from_slice(b"<!DOCTYPE html>\n<html>\n<head><title>tinyserver</title></head>\n<body>\n");
        body.extend_from_slice(b"<h1>Hello from the ");
        body.extend_from_slice(mode.label().as_bytes());
        body.extend_from_slice(b" server</h1>\n<p>Method: ");
        body.extend_from_slice(request.method());
        body.extend_from_slice(b"</p>\n<p>URL: ");
        body.extend_from_slice(request.target());
        body.extend_from_slice(b"</p>\n</body>\n</html>\n");
        Self { body }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// Frame the body as an HTTP/1.1 response, refusing anything over `limit` bytes.
    pub fn into_wire(self, limit: usize) -> Result<Vec<u8>, ResponseError> {
        let head = format!("{HEAD_PREFIX}{}{HEAD_END}", self.content_length());
        let size = head.len() + self.body.len();
        if size > limit {
            return Err(ResponseError::TooLarge { size, limit });
        }

        let mut wire = Vec::with_capacity(size);
        wire.extend_from_slice(head.as_bytes());
        wire.extend_from_slice(&self.body);
        Ok(wire)
    }
}

/// Size of the largest framed response any request can produce under `bounds`.
pub fn max_response_len(bounds: TokenBounds) -> usize {
    let template = ResponseDocument::render(&RequestLine::default(), ServerMode::Secure).content_length();
    let body = template
        .saturating_add(bounds.method.saturating_sub(1))
        .saturating_add(bounds.target.saturating_sub(1));
    framed_len(body)
}

/// Render and frame the response for `request`.
pub fn build_response(
    request: &RequestLine,
    mode: ServerMode,
    limit: usize,
) -> Result<Vec<u8>, ResponseError> {
    ResponseDocument::render(request, mode).into_wire(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(wire: &[u8]) -> (String, Vec<u8>) {
        let pos = wire
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("header terminator");
        (
            String::from_utf8(wire[..pos].to_vec()).unwrap(),
            wire[pos + 4..].to_vec(),
        )
    }

    #[test]
    fn frames_body_with_exact_length() {
        let wire = build_response(&RequestLine::new("GET", "/x"), ServerMode::Plain, 4096).unwrap();
        let (head, body) = split(&wire);

        let mut lines = head.split("\r\n");
        assert_eq!(lines.next(), Some("HTTP/1.1 200 OK"));
        assert_eq!(lines.next(), Some("Content-Type: text/html"));
        assert_eq!(
            lines.next(),
            Some(format!("Content-Length: {}", body.len()).as_str())
        );
        assert_eq!(lines.next(), None);

        let body = String::from_utf8(body).unwrap();
        assert!(body.contains("Method: GET"));
        assert!(body.contains("URL: /x"));
        assert!(body.contains("HTTP server"));
    }

    #[test]
    fn names_secure_mode() {
        let doc = ResponseDocument::render(&RequestLine::new("GET", "/"), ServerMode::Secure);
        let body = String::from_utf8(doc.body().to_vec()).unwrap();
        assert!(body.contains("Hello from the HTTPS server"));
    }

    #[test]
    fn echoes_unescaped() {
        let doc = ResponseDocument::render(
            &RequestLine::new("GET", "/<script>&"),
            ServerMode::Plain,
        );
        let body = String::from_utf8(doc.body().to_vec()).unwrap();
        assert!(body.contains("URL: /<script>&"));
    }

    #[test]
    fn empty_request_still_gets_200() {
        let wire = build_response(&RequestLine::default(), ServerMode::Plain, 4096).unwrap();
        assert!(wire.starts_with(b"HTTP/1.1 200 OK\r\n"));
        let (_, body) = split(&wire);
        let body = String::from_utf8(body).unwrap();
        assert!(body.contains("<p>Method: </p>"));
        assert!(body.contains("<p>URL: </p>"));
    }

    #[test]
    fn worst_case_default_bounds_fit() {
        let request = RequestLine::new(vec![b'M'; 15], vec![b'/'; 255]);
        let wire = build_response(&request, ServerMode::Secure, 4096).unwrap();
        assert!(wire.len() < 1024);
    }

    #[test]
    fn max_response_len_is_exact_for_longest_tokens() {
        let bounds = TokenBounds::default();
        let request = RequestLine::new(vec![b'M'; 15], vec![b'/'; 255]);
        let wire = build_response(&request, ServerMode::Secure, usize::MAX).unwrap();
        assert_eq!(max_response_len(bounds), wire.len());

        // Plain mode has the shorter label, so it never exceeds the bound.
        let plain = build_response(&request, ServerMode::Plain, usize::MAX).unwrap();
        assert!(plain.len() < max_response_len(bounds));

        // A longer target grows the body past a Content-Length digit boundary.
        let wide = TokenBounds { method: 16, target: 8192 };
        let request = RequestLine::new(vec![b'M'; 15], vec![b'a'; 8191]);
        let wire = build_response(&request, ServerMode::Secure, usize::MAX).unwrap();
        assert_eq!(max_response_len(wide), wire.len());
    }

    #[test]
    fn max_response_len_saturates() {
        let huge = TokenBounds { method: usize::MAX, target: usize::MAX };
        assert_eq!(max_response_len(huge), usize::MAX);
    }

    #[test]
    fn over_limit_is_rejected() {
        let request = RequestLine::new("GET", vec![b'a'; 300]);
        let err = build_response(&request, ServerMode::Plain, 256).unwrap_err();
        match err {
            ResponseError::TooLarge { size, limit } => {
                assert_eq!(limit, 256);
                assert!(size > 256);
            }
        }
    }

    #[test]
    fn identical_requests_identical_bytes() {
        let a = build_response(&RequestLine::new("GET", "/same"), ServerMode::Plain, 4096).unwrap();
        let b = build_response(&RequestLine::new("GET", "/same"), ServerMode::Plain, 4096).unwrap();
        assert_eq!(a, b);
    }
}
