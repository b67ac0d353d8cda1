//! Error types for xmlcatalog
//!
//! One flat enum covering URI resolution, catalog loading, and fetch failures.

use thiserror::Error;

/// Result type alias using the xmlcatalog `Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xmlcatalog operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Resource loading error (fetch, classpath, or jar access)
    #[error("resource error: {0}")]
    Resource(String),

    /// Limit exceeded error (redirect count, catalog chain length, ...)
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Generic error
    #[error("{0}")]
    Other(String),

    /// A URI (or URI reference) could not be parsed or resolved against its base
    #[error("malformed URI '{uri}': {reason}")]
    MalformedUri {
        /// The offending URI text
        uri: String,
        /// Why it was rejected
        reason: String,
    },

    /// A catalog document failed to parse under a strict/validating loader
    #[error("catalog parse error in '{source}': {reason}")]
    CatalogParse {
        /// The catalog URI that failed to load
        source: String,
        /// Why it was rejected
        reason: String,
    },

    /// The resolved URI's scheme is not present in the configured access list
    #[error("access denied to scheme '{scheme}' for '{uri}'")]
    AccessDenied {
        /// The URI scheme that was rejected
        scheme: String,
        /// The URI that triggered the check
        uri: String,
    },

    /// A `Location:` redirect chain revisited a URI already seen in this fetch
    #[error("redirect loop detected at '{0}'")]
    RedirectLoop(String),

    /// A `Location:` redirect chain exceeded the configured hop limit
    #[error("too many redirects (> {0}) while fetching '{1}'")]
    TooManyRedirects(usize, String),

    /// RDDL post-lookup parsing failed; always tolerated by callers, never surfaced
    /// past `resolver.rs`'s fallback path, but retained so that path can log it
    #[error("RDDL parse error for '{uri}': {reason}")]
    Rddl {
        /// The namespace document URI being scanned
        uri: String,
        /// Why the scan failed or found nothing
        reason: String,
    },

    /// The fetch was aborted via a caller-supplied deadline or cancellation token
    #[error("fetch aborted for '{0}'")]
    Aborted(String),
}
