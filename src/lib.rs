//! squall-core: the request-serving engine of an HTTP/1.1 framework
//!
//! The hot loop of a worker, built around resource reuse: a pool of
//! recyclable request events, an LRU cache over route matches, and scoped
//! bump arenas, composed with a middleware chain that inlines the common
//! case. The TCP acceptor, the wire parser/serializer and user handlers are
//! external collaborators; this crate is the part between them that must not
//! allocate or slow down as requests pile into the millions.
//!
//! Per-request flow:
//!
//! ```text
//! parser -> MemoryManager::acquire_event
//!        -> MiddlewareChain::execute (may short-circuit)
//!        -> Router::find (RouteCache behind it)
//!        -> handler -> serializer
//!        -> MemoryManager::release_event + request-arena reset
//! ```
//!
//! Single-threaded per worker by design: no locks on any hot path. The only
//! synchronized object is the optional process-wide event pool.

#![warn(clippy::all)]

pub mod arena;
pub mod bytestr;
pub mod cache;
pub mod error;
pub mod event;
pub mod memory;
pub mod middleware;
pub mod pool;
pub mod response;
pub mod router;

// Re-exports
pub use arena::Arena;
pub use bytestr::ByteStr;
pub use cache::{CacheEntry, CacheStats, Params, RouteCache};
pub use error::{Error, Result};
pub use event::{Event, Method};
pub use memory::{AllocScope, AllocationStrategy, HealthThresholds, MemoryConfig, MemoryManager, MemoryStats};
pub use pool::{init_global_pool, with_global_pool, EventPool, PoolStats};
pub use response::{Response, StatusCode};
pub use router::{RouteMatch, Router};

// Middleware re-exports
pub use middleware::{
    CorsConfig, Flow, LogLevel, LogOptions, Middleware, MiddlewareChain, RateLimitConfig,
    SecurityConfig, MAX_MIDDLEWARES,
};
