//! Typed errors for item resolution.

use thiserror::Error;

/// Boxed error from a backend's underlying transport.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while building schemas, fetching documents, or resolving items.
#[derive(Debug, Error)]
pub enum Error {
    /// The fetch could not complete; the backend's error is kept as the source
    #[error("failed to fetch {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: BoxError,
    },

    /// No item exists at the requested index
    #[error("{type_name} not found at index {index}")]
    NotFound { type_name: String, index: usize },

    /// An item was constructed from something that is not a document node
    #[error("invalid item source: {0}")]
    InvalidSource(String),

    /// A field or strategy is missing configuration it cannot do without
    #[error("misconfigured field: {0}")]
    Misconfigured(String),

    /// CSS selector failed to parse
    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// Related-item and sub-page fields are derived and cannot be assigned
    #[error("field {field:?} is derived and cannot be set")]
    ImmutableField { field: String },

    /// Structured sub-document could not be parsed
    #[error("markup parse error: {0}")]
    Markup(String),

    /// URL parsing or joining failed
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// A blocking task on the worker pool failed to complete
    #[error("worker pool error: {0}")]
    WorkerPool(String),

    /// The caller's cancellation token fired
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn transport(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Transport {
            url: url.into(),
            source: source.into(),
        }
    }
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
