use thiserror::Error;

/// revtrack error types
///
/// Dirty record data never surfaces here: unparseable dates and numbers are
/// normalized away. Only unreadable sources and caller mistakes do.
#[derive(Error, Debug)]
pub enum RevtrackError {
    /// File I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Record store could not serve a read
    #[error("store error: {0}")]
    Store(String),

    /// Caller broke an API contract (e.g. period end before start)
    #[error("contract violation: {0}")]
    Contract(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

/// Result type alias for revtrack
pub type Result<T> = std::result::Result<T, RevtrackError>;
