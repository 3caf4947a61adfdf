//! Request line parsing.
//!
//! # Responsibilities
//! - Extract the first two whitespace-delimited tokens (method, target)
//! - Truncate each token to its bound
//! - Never fail: missing tokens come back empty
//!
//! # Design Decisions
//! - Tokens stay raw bytes; the response echoes them unchanged
//! - Scanning stops at the first NUL, as the request buffer is a C-style string
//! - Bounds count a terminator, so a 16-byte bound keeps 15 bytes

use std::borrow::Cow;

use crate::config::LimitsConfig;

/// Token bounds, terminator byte included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBounds {
    pub method: usize,
    pub target: usize,
}

impl Default for TokenBounds {
    fn default() -> Self {
        Self {
            method: 16,
            target: 256,
        }
    }
}

impl From<&LimitsConfig> for TokenBounds {
    fn from(limits: &LimitsConfig) -> Self {
        Self {
            method: limits.method_bound,
            target: limits.target_bound,
        }
    }
}

/// Parsed view of a request's first two tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLine {
    method: Vec<u8>,
    target: Vec<u8>,
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

fn bounded(token: &[u8], bound: usize) -> Vec<u8> {
    let keep = bound.saturating_sub(1).min(token.len());
    token[..keep].to_vec()
}

impl RequestLine {
    pub fn new(method: impl Into<Vec<u8>>, target: impl Into<Vec<u8>>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
        }
    }

    /// Parse the first two tokens of `buf`.
    pub fn parse(buf: &[u8], bounds: TokenBounds) -> Self {
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        let mut tokens = buf[..end].split(|&b| is_space(b)).filter(|t| !t.is_empty());

        let method = tokens
            .next()
            .map(|t| bounded(t, bounds.method))
            .unwrap_or_default();
        let target = tokens
            .next()
            .map(|t| bounded(t, bounds.target))
            .unwrap_or_default();

        Self { method, target }
    }

    pub fn method(&self) -> &[u8] {
        &self.method
    }

    pub fn target(&self) -> &[u8] {
        &self.target
    }

    /// Method for logging.
    pub fn method_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.method)
    }

    /// Target for logging.
    pub fn target_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.target)
    }
}
