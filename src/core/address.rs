//! core::address
//!
//! Resource addresses: the unit of identity for everything the gateway
//! serves.
//!
//! # Grammar
//!
//! ```text
//! /gitapi/{kind}[/{scope}...]/file/{repository}[/{path...}][/]
//! ```
//!
//! `kind` selects the operation family, `scope` carries the ref, commit,
//! range, remote or key the operation is scoped to (percent-encoded, so
//! `origin%2Fmain` is the single scope value `origin/main`), `repository`
//! names a repository directly below the served root and `path` is
//! repository-relative. A trailing `/` marks a folder.
//!
//! # Normal form
//!
//! [`ResourceAddress::build`] always emits the normal form, and parsing
//! that again yields the same address:
//!
//! ```
//! use gitgate::core::address::ResourceAddress;
//!
//! let addr = ResourceAddress::parse("/gitapi/status/file/demo").unwrap();
//! assert_eq!(addr.build(), "/gitapi/status/file/demo/");
//!
//! let diff = ResourceAddress::parse("/gitapi/diff/origin%2Fmain/file/demo/src/lib.rs").unwrap();
//! assert_eq!(diff.ref_or_commit(), Some("origin/main"));
//! assert_eq!(diff.relative_path(), Some("src/lib.rs"));
//! ```
//!
//! # Rejections
//!
//! Empty segments, `.`/`..` segments, unknown kinds, a scope with the wrong
//! number of segments, and anything that looks like a transport URI
//! (`scheme://`, `user@host:path`) are refused with [`AddressError`].

use std::fmt;
use std::ops::RangeInclusive;

use thiserror::Error;

/// Prefix shared by every repository resource.
pub const API_PREFIX: &str = "/gitapi/";

/// Marker segment separating the scope from the repository.
const FILE_MARKER: &str = "file";

/// Errors from parsing a resource address.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("resource address must start with {API_PREFIX}: {0}")]
    MissingPrefix(String),

    #[error("unsupported resource kind '{0}'")]
    UnknownKind(String),

    #[error("resource address contains an empty segment")]
    EmptySegment,

    #[error("resource address has no '{FILE_MARKER}' marker matching the scope of '{kind}'")]
    MissingFileMarker { kind: String },

    #[error("resource address names no repository")]
    MissingRepository,

    #[error("'{0}' looks like a transport URI, not a resource path")]
    TransportUri(String),

    #[error("forbidden segment '{0}'")]
    ForbiddenSegment(String),

    #[error("invalid percent-encoding in '{0}'")]
    BadEncoding(String),

    #[error("{kind} is not supported on {target}")]
    IneligibleScope { kind: String, target: String },
}

/// The operation family an address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Status,
    Diff,
    Commit,
    Index,
    Clone,
    Remote,
    Branch,
    Tag,
    Config,
    Blame,
    Stash,
}

impl OperationKind {
    pub const ALL: [OperationKind; 11] = [
        OperationKind::Status,
        OperationKind::Diff,
        OperationKind::Commit,
        OperationKind::Index,
        OperationKind::Clone,
        OperationKind::Remote,
        OperationKind::Branch,
        OperationKind::Tag,
        OperationKind::Config,
        OperationKind::Blame,
        OperationKind::Stash,
    ];

    /// The path segment naming this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Status => "status",
            OperationKind::Diff => "diff",
            OperationKind::Commit => "commit",
            OperationKind::Index => "index",
            OperationKind::Clone => "clone",
            OperationKind::Remote => "remote",
            OperationKind::Branch => "branch",
            OperationKind::Tag => "tag",
            OperationKind::Config => "config",
            OperationKind::Blame => "blame",
            OperationKind::Stash => "stash",
        }
    }

    /// Look a kind up by its path segment.
    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == segment)
    }

    /// How many scope segments an address of this kind carries.
    pub fn scope_arity(&self) -> RangeInclusive<usize> {
        match self {
            OperationKind::Status | OperationKind::Index | OperationKind::Clone => 0..=0,
            OperationKind::Diff | OperationKind::Commit => 1..=1,
            OperationKind::Blame
            | OperationKind::Branch
            | OperationKind::Tag
            | OperationKind::Config
            | OperationKind::Stash => 0..=1,
            OperationKind::Remote => 0..=2,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed resource address.
///
/// Pure data: it never carries an open repository or any engine handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceAddress {
    kind: OperationKind,
    scope: Vec<String>,
    repository: String,
    path: Option<String>,
    folder: bool,
}

impl ResourceAddress {
    /// Address of a whole repository for the given kind and scope.
    pub fn new(
        kind: OperationKind,
        scope: Vec<String>,
        repository: impl Into<String>,
    ) -> Result<Self, AddressError> {
        let repository = repository.into();
        check_segment(&repository, false)?;
        if repository.is_empty() {
            return Err(AddressError::MissingRepository);
        }
        for s in &scope {
            check_segment(s, true)?;
        }
        if !kind.scope_arity().contains(&scope.len()) {
            return Err(AddressError::MissingFileMarker {
                kind: kind.to_string(),
            });
        }
        Ok(Self {
            kind,
            scope,
            repository,
            path: None,
            folder: true,
        })
    }

    /// Same address restricted to a repository-relative path.
    ///
    /// A trailing `/` marks the path as a folder; `""` or `"/"` address the
    /// repository root.
    pub fn with_path(mut self, path: &str) -> Result<Self, AddressError> {
        let trimmed = path.trim_start_matches('/');
        let folder = trimmed.is_empty() || trimmed.ends_with('/');
        let trimmed = trimmed.trim_end_matches('/');
        if trimmed.is_empty() {
            self.path = None;
            self.folder = true;
            return Ok(self);
        }
        for seg in trimmed.split('/') {
            if seg.is_empty() {
                return Err(AddressError::EmptySegment);
            }
            check_segment(seg, false)?;
        }
        self.path = Some(trimmed.to_string());
        self.folder = folder;
        Ok(self)
    }

    /// Same repository and path under a different kind and scope.
    pub fn rescoped(&self, kind: OperationKind, scope: Vec<String>) -> Result<Self, AddressError> {
        let base = Self::new(kind, scope, self.repository.clone())?;
        Ok(Self {
            path: self.path.clone(),
            folder: self.folder,
            ..base
        })
    }

    /// Parse a raw (still percent-encoded) request path.
    ///
    /// A query string, if present, is ignored.
    pub fn parse(uri: &str) -> Result<Self, AddressError> {
        let path = uri.split(['?', '#']).next().unwrap_or_default();
        reject_transport_uri(path)?;

        let rest = path
            .strip_prefix(API_PREFIX)
            .ok_or_else(|| AddressError::MissingPrefix(path.to_string()))?;

        let mut segments: Vec<&str> = rest.split('/').collect();
        let trailing_slash = segments.len() > 1 && segments.last() == Some(&"");
        if trailing_slash {
            segments.pop();
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(AddressError::EmptySegment);
        }

        let kind_segment = segments[0];
        let kind = OperationKind::from_segment(kind_segment)
            .ok_or_else(|| AddressError::UnknownKind(kind_segment.to_string()))?;

        // First `file` marker that leaves an acceptable scope length wins,
        // so a fixed-arity scope value may itself be the word "file".
        let arity = kind.scope_arity();
        let marker = (1..segments.len())
            .find(|&i| segments[i] == FILE_MARKER && arity.contains(&(i - 1)))
            .ok_or_else(|| AddressError::MissingFileMarker {
                kind: kind.to_string(),
            })?;

        let scope = segments[1..marker]
            .iter()
            .map(|s| percent_decode(s))
            .collect::<Result<Vec<_>, _>>()?;

        let repository = segments
            .get(marker + 1)
            .ok_or(AddressError::MissingRepository)
            .and_then(|s| percent_decode(s))?;

        let mut path_segments = Vec::new();
        for raw in &segments[marker + 2..] {
            let seg = percent_decode(raw)?;
            if seg.contains('/') {
                return Err(AddressError::ForbiddenSegment(raw.to_string()));
            }
            path_segments.push(seg);
        }

        let mut addr = Self::new(kind, scope, repository)?;
        if !path_segments.is_empty() {
            let mut joined = path_segments.join("/");
            if trailing_slash {
                joined.push('/');
            }
            addr = addr.with_path(&joined)?;
        }
        tracing::debug!(address = %addr, "parsed resource address");
        Ok(addr)
    }

    /// Render the normal form of this address.
    pub fn build(&self) -> String {
        let mut out = String::from(API_PREFIX);
        out.push_str(self.kind.as_str());
        for s in &self.scope {
            out.push('/');
            out.push_str(&percent_encode(s));
        }
        out.push('/');
        out.push_str(FILE_MARKER);
        out.push('/');
        out.push_str(&percent_encode(&self.repository));
        out.push('/');
        if let Some(path) = &self.path {
            let encoded: Vec<String> = path.split('/').map(percent_encode).collect();
            out.push_str(&encoded.join("/"));
            if self.folder {
                out.push('/');
            }
        }
        out
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Decoded scope segments.
    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    /// The ref, commit or `A..B` range this address is scoped to, if any.
    pub fn ref_or_commit(&self) -> Option<&str> {
        self.scope.first().map(String::as_str)
    }

    /// The repository name (a directory below the served root).
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Repository-relative path without a trailing slash.
    pub fn relative_path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Whether the address ends in `/`.
    pub fn is_folder(&self) -> bool {
        self.folder
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

// =============================================================================
// Segment validation
// =============================================================================

fn reject_transport_uri(raw: &str) -> Result<(), AddressError> {
    if raw.contains("://") {
        return Err(AddressError::TransportUri(raw.to_string()));
    }
    for scheme in ["http:", "https:", "ssh:", "git:", "file:"] {
        let head = raw.get(..scheme.len()).unwrap_or_default();
        if head.eq_ignore_ascii_case(scheme) {
            return Err(AddressError::TransportUri(raw.to_string()));
        }
    }
    Ok(())
}

/// scp-like remote spec: `user@host:path`.
fn looks_like_scp(seg: &str) -> bool {
    match (seg.find('@'), seg.find(':')) {
        (Some(at), Some(colon)) => at > 0 && colon > at + 1,
        _ => false,
    }
}

fn check_segment(seg: &str, allow_slash: bool) -> Result<(), AddressError> {
    if seg == "." || seg == ".." {
        return Err(AddressError::ForbiddenSegment(seg.to_string()));
    }
    if seg.contains('\\') || seg.contains('\0') || (!allow_slash && seg.contains('/')) {
        return Err(AddressError::ForbiddenSegment(seg.to_string()));
    }
    if seg.contains("://") || looks_like_scp(seg) {
        return Err(AddressError::TransportUri(seg.to_string()));
    }
    if allow_slash && seg.split('/').any(|part| part == "..") {
        return Err(AddressError::ForbiddenSegment(seg.to_string()));
    }
    Ok(())
}

// =============================================================================
// Percent-encoding
// =============================================================================

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~' | b'@' | b'+' | b',')
}

/// Percent-encode everything outside the unreserved set.
pub fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Decode `%XX` escapes. `+` is left alone (path semantics).
pub fn percent_decode(s: &str) -> Result<String, AddressError> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = s
                .get(i + 1..i + 3)
                .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()))
                .ok_or_else(|| AddressError::BadEncoding(s.to_string()))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| AddressError::BadEncoding(s.to_string()))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| AddressError::BadEncoding(s.to_string()))
}
