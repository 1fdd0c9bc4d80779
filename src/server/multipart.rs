//! server::multipart
//!
//! `multipart/related` bodies built from an ordered list of typed parts.
//!
//! # Format
//!
//! ```text
//! --{boundary}\r\n
//! Content-Type: {type}\r\n
//! \r\n
//! {bytes}\r\n
//! --{boundary}\r\n
//! ...
//! --{boundary}--\r\n
//! ```
//!
//! Parts are written in the order they were pushed; callers that need a
//! canonical order (JSON before patch text) push in that order.

/// Content type of JSON parts.
pub const JSON: &str = "application/json";
/// Content type of raw patch parts.
pub const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// One part of a multi-part body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Part {
    pub fn new(content_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// A client-supplied boundary that RFC 2046 does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid multipart boundary '{0}': expected 1 to 70 characters from [A-Za-z0-9'()+_,-./:=? ] not ending in a space")]
pub struct InvalidBoundary(pub String);

fn is_bchar(c: char) -> bool {
    c.is_ascii_alphanumeric() || "'()+_,-./:=? ".contains(c)
}

/// Check a boundary against the `bchars` grammar of RFC 2046.
pub fn validate_boundary(boundary: &str) -> Result<(), InvalidBoundary> {
    let valid = (1..=70).contains(&boundary.len())
        && boundary.chars().all(is_bchar)
        && !boundary.ends_with(' ');
    if valid {
        Ok(())
    } else {
        Err(InvalidBoundary(boundary.escape_debug().to_string()))
    }
}

/// An ordered multi-part body.
#[derive(Debug, Clone)]
pub struct Multipart {
    boundary: String,
    parts: Vec<Part>,
}

impl Multipart {
    /// Start a body with `boundary`, or a generated one when `None` or empty.
    pub fn new(boundary: Option<String>) -> Result<Self, InvalidBoundary> {
        let boundary = match boundary.filter(|b| !b.is_empty()) {
            Some(b) => {
                validate_boundary(&b)?;
                b
            }
            None => uuid::Uuid::new_v4().simple().to_string(),
        };
        Ok(Self {
            boundary,
            parts: Vec::new(),
        })
    }

    pub fn push(&mut self, part: Part) -> &mut Self {
        self.parts.push(part);
        self
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value of the response's `Content-Type` header.
    ///
    /// Boundaries with characters outside the header token set are quoted.
    pub fn content_type(&self) -> String {
        let token = self
            .boundary
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "'+_-.".contains(c));
        if token {
            format!("multipart/related; boundary={}", self.boundary)
        } else {
            format!("multipart/related; boundary=\"{}\"", self.boundary)
        }
    }

    /// Serialize every part, then the closing delimiter.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for part in &self.parts {
            out.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            out.extend_from_slice(format!("Content-Type: {}\r\n\r\n", part.content_type).as_bytes());
            out.extend_from_slice(&part.bytes);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        out
    }
}
