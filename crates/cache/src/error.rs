use thiserror::Error;

/// Errors that can occur when talking to the cache.
///
/// Cache failures are advisory by contract: callers log them and move on,
/// they never affect the outcome of a reservation.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache backend could not be reached or rejected the operation.
    #[error("cache backend error: {0}")]
    Backend(String),

    /// A stored value was not a decimal count.
    #[error("malformed cache value for {key}: {value:?}")]
    Malformed { key: String, value: String },
}
