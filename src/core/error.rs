//! Purpose: Model every failure the client core can surface as one error type.
//! Exports: `Error`, `ErrorKind`, `status` (server result codes).
//! Role: Shared by polling, streaming, pagination, and the cluster boundary.
//! Invariants: Result codes reported by a node are carried verbatim in `code`.
//! Invariants: Configuration mistakes are `Usage` and never wrap a transport error.
use std::error::Error as StdError;
use std::fmt;

/// Result codes understood by the core. Anything else is forwarded untouched.
pub mod status {
    pub const OK: i32 = 0;
    pub const PARAM: i32 = 4;
    pub const CLIENT_ABORT: i32 = -14;
    /// Producer-side marker for "scan/query finished"; treated as normal end.
    pub const NO_MORE_RECORDS: i32 = 50;
    pub const INDEX_NOT_FOUND: i32 = 201;
    pub const UDF_NOT_FOUND: i32 = 1301;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    NotFound,
    Server,
    Io,
    Cancelled,
    Timeout,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    code: Option<i32>,
    node: Option<String>,
    hint: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            code: None,
            node: None,
            hint: None,
            source: None,
        }
    }

    /// Error reported by the server with a protocol result code.
    pub fn server(code: i32) -> Self {
        Self::new(ErrorKind::Server).with_code(code)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }

    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn is_benign_end(&self) -> bool {
        self.code == Some(status::NO_MORE_RECORDS)
    }

    pub fn is_index_not_found(&self) -> bool {
        self.code == Some(status::INDEX_NOT_FOUND)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(code) = self.code {
            write!(f, " (code: {code})")?;
        }
        if let Some(node) = &self.node {
            write!(f, " (node: {node})")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, status};

    #[test]
    fn display_includes_code_and_node() {
        let err = Error::server(status::INDEX_NOT_FOUND)
            .with_message("no such index")
            .with_node("BB9020011AC4202");
        let text = err.to_string();
        assert!(text.starts_with("Server: no such index"));
        assert!(text.contains("(code: 201)"));
        assert!(text.contains("(node: BB9020011AC4202)"));
    }

    #[test]
    fn benign_end_is_only_no_more_records() {
        assert!(Error::server(status::NO_MORE_RECORDS).is_benign_end());
        assert!(!Error::server(status::CLIENT_ABORT).is_benign_end());
        assert!(!Error::new(ErrorKind::Io).is_benign_end());
    }

    #[test]
    fn source_is_exposed() {
        let io = std::io::Error::other("socket closed");
        let err = Error::new(ErrorKind::Io).with_source(io);
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "socket closed");
    }
}
