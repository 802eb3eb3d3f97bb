//! Error types for squall-core

use thiserror::Error;

/// Result type alias for squall operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the request-serving core
#[derive(Debug, Error)]
pub enum Error {
    /// An allocator refused a request. The core never produces this itself
    /// (the global allocator aborts on OOM); handlers and collaborators
    /// propagate it through the middleware chain.
    #[error("Allocation failed: {0}")]
    AllocationFailure(String),

    /// Middleware registration exceeded the chain limit
    #[error("Too many middlewares: {count} exceeds limit of {max}")]
    TooManyMiddlewares { count: usize, max: usize },

    /// A response write was attempted after the response went out
    #[error("Response already sent")]
    AlreadySent,

    /// A middleware aborted the request
    #[error("Middleware error: {0}")]
    Middleware(String),

    /// The global event pool was used before initialization
    #[error("Global event pool not initialized")]
    GlobalPoolNotInitialized,

    /// Malformed request data from the parser
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid route pattern at registration time
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}
