//! Middleware chain
//!
//! An ordered list of interceptors that run before the final handler, with a
//! pre-compiled inline path for the common logger+cors(+security) chain.
//! Kinds are explicit tags, so the chain knows at registration time what it
//! is composed of; no function-identity tricks.

pub mod cors;
pub mod logging;
pub mod rate_limit;
pub mod security;

// Re-exports for convenience
pub use cors::CorsConfig;
pub use logging::{generate_request_id, LogLevel, LogOptions, REQUEST_ID_KEY, TIMING_START_KEY};
pub use rate_limit::RateLimitConfig;
pub use security::SecurityConfig;

use crate::error::{Error, Result};
use crate::event::{Event, Method};
use crate::response::StatusCode;

/// Upper bound on registered middlewares
pub const MAX_MIDDLEWARES: usize = 16;

/// What a middleware decided about the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Proceed to the next middleware / the handler
    Continue,
    /// The response is complete; skip everything downstream
    TerminateEarly,
}

/// A custom middleware function
pub type MiddlewareFn = fn(&mut Event) -> Result<Flow>;

/// A chain member, tagged by kind.
pub enum Middleware {
    /// One request log line
    Logger(LogOptions),
    /// CORS headers + preflight answering
    Cors(CorsConfig),
    /// Security response headers
    Security(SecurityConfig),
    /// Record handling start into the context
    Timing,
    /// Write `X-Response-Time` after the handler runs
    TimingEnd,
    /// Stamp a request id into context and response
    RequestId,
    /// Rate limiting (placeholder, never blocks)
    RateLimit(RateLimitConfig),
    /// User-provided function
    Custom(MiddlewareFn),
}

impl Middleware {
    /// Pre-handler phase
    fn before(&self, event: &mut Event) -> Result<Flow> {
        match self {
            Middleware::Logger(options) => {
                logging::log_request(options, event);
                Ok(Flow::Continue)
            }
            Middleware::Cors(config) => Ok(match cors::apply(config, event) {
                cors::CorsOutcome::Proceed => Flow::Continue,
                cors::CorsOutcome::Done => Flow::TerminateEarly,
            }),
            Middleware::Security(config) => {
                security::apply_headers(config, event);
                Ok(Flow::Continue)
            }
            Middleware::Timing => {
                logging::stamp_timing_start(event);
                Ok(Flow::Continue)
            }
            Middleware::TimingEnd => Ok(Flow::Continue),
            Middleware::RequestId => {
                logging::stamp_request_id(event);
                Ok(Flow::Continue)
            }
            Middleware::RateLimit(config) => {
                rate_limit::apply(config, event);
                Ok(Flow::Continue)
            }
            Middleware::Custom(f) => f(event),
        }
    }

    /// Post-handler phase, run in reverse registration order
    fn after(&self, event: &mut Event) {
        if let Middleware::TimingEnd = self {
            logging::stamp_timing_end(event);
        }
    }

    fn is_fast_path_kind(&self) -> bool {
        matches!(
            self,
            Middleware::Logger(_) | Middleware::Cors(_) | Middleware::Security(_)
        )
    }
}

impl std::fmt::Debug for Middleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Middleware::Logger(_) => "Logger",
            Middleware::Cors(_) => "Cors",
            Middleware::Security(_) => "Security",
            Middleware::Timing => "Timing",
            Middleware::TimingEnd => "TimingEnd",
            Middleware::RequestId => "RequestId",
            Middleware::RateLimit(_) => "RateLimit",
            Middleware::Custom(_) => "Custom",
        };
        f.write_str(name)
    }
}

/// Ordered middleware chain with a pre-compiled fast path.
#[derive(Debug, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Middleware>,
    has_logger: bool,
    has_cors: bool,
    has_security: bool,
    has_timing: bool,
    // The inline path may only replace the generic loop when every member
    // is one of the kinds it hand-unrolls.
    fast_path: bool,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a middleware. Order of registration is order of execution.
    pub fn add(&mut self, middleware: Middleware) -> Result<()> {
        if self.middlewares.len() >= MAX_MIDDLEWARES {
            return Err(Error::TooManyMiddlewares {
                count: self.middlewares.len() + 1,
                max: MAX_MIDDLEWARES,
            });
        }
        self.middlewares.push(middleware);
        self.recompile();
        Ok(())
    }

    /// Number of registered middlewares
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// True when no middlewares are registered
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Whether the inline fast path is active
    pub fn uses_fast_path(&self) -> bool {
        self.fast_path
    }

    /// Whether a logger is registered
    pub fn has_logger(&self) -> bool {
        self.has_logger
    }

    /// Whether CORS handling is registered
    pub fn has_cors(&self) -> bool {
        self.has_cors
    }

    /// Whether security headers are registered
    pub fn has_security(&self) -> bool {
        self.has_security
    }

    /// Whether either timing built-in is registered
    pub fn has_timing(&self) -> bool {
        self.has_timing
    }

    /// Run the chain, then the handler.
    ///
    /// Middlewares run in registration order. `TerminateEarly` skips every
    /// remaining middleware and the handler and completes successfully;
    /// errors abort the request. After the handler (or an early
    /// termination), the post-phase runs in reverse over the middlewares
    /// that were reached.
    pub fn execute<F>(&self, event: &mut Event, handler: F) -> Result<()>
    where
        F: FnOnce(&mut Event) -> Result<()>,
    {
        if self.fast_path {
            return self.execute_fast(event, handler);
        }

        let mut reached = 0;
        let mut terminated = false;
        for middleware in &self.middlewares {
            reached += 1;
            match middleware.before(event)? {
                Flow::Continue => {}
                Flow::TerminateEarly => {
                    terminated = true;
                    break;
                }
            }
        }

        if !terminated {
            handler(event)?;
        }

        for middleware in self.middlewares[..reached].iter().rev() {
            middleware.after(event);
        }
        Ok(())
    }

    /// Hand-unrolled logger+cors(+security) path: no dispatch, no
    /// post-phase bookkeeping.
    fn execute_fast<F>(&self, event: &mut Event, handler: F) -> Result<()>
    where
        F: FnOnce(&mut Event) -> Result<()>,
    {
        for middleware in &self.middlewares {
            match middleware {
                Middleware::Logger(options) => logging::log_request(options, event),
                Middleware::Cors(config) => {
                    let rejected = matches!(
                        event.get_header("origin"),
                        Some(origin) if !config.is_origin_allowed(origin)
                    );
                    if rejected {
                        event.response.status = StatusCode::FORBIDDEN;
                        event.response.finished = true;
                        return Ok(());
                    }
                    cors::apply_headers(config, event);
                    if event.method == Method::Options {
                        event.response.status = StatusCode::NO_CONTENT;
                        event.response.finished = true;
                        return Ok(());
                    }
                }
                Middleware::Security(config) => security::apply_headers(config, event),
                // recompile() keeps other kinds off this path
                _ => {}
            }
        }
        handler(event)
    }

    fn recompile(&mut self) {
        self.has_logger = self
            .middlewares
            .iter()
            .any(|m| matches!(m, Middleware::Logger(_)));
        self.has_cors = self
            .middlewares
            .iter()
            .any(|m| matches!(m, Middleware::Cors(_)));
        self.has_security = self
            .middlewares
            .iter()
            .any(|m| matches!(m, Middleware::Security(_)));
        self.has_timing = self
            .middlewares
            .iter()
            .any(|m| matches!(m, Middleware::Timing | Middleware::TimingEnd));
        self.fast_path = self.middlewares.len() <= 3
            && self.has_logger
            && self.has_cors
            && self.middlewares.iter().all(Middleware::is_fast_path_kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytestr::ByteStr;
    use crate::response::StatusCode;

    fn ok_handler(event: &mut Event) -> Result<()> {
        event.send_text("handled")
    }

    #[test]
    fn test_empty_chain_runs_handler() {
        let chain = MiddlewareChain::new();
        let mut ev = Event::new();
        chain.execute(&mut ev, ok_handler).unwrap();
        assert!(ev.response.finished);
    }

    #[test]
    fn test_fast_path_compiles_for_logger_cors() {
        let mut chain = MiddlewareChain::new();
        chain.add(Middleware::Logger(LogOptions::default())).unwrap();
        chain.add(Middleware::Cors(CorsConfig::default())).unwrap();
        assert!(chain.uses_fast_path());

        chain.add(Middleware::Security(SecurityConfig::default())).unwrap();
        assert!(chain.uses_fast_path());
        assert!(chain.has_logger() && chain.has_cors() && chain.has_security());
        assert!(!chain.has_timing());
    }

    #[test]
    fn test_fast_path_requires_unrollable_kinds() {
        let mut chain = MiddlewareChain::new();
        chain.add(Middleware::Logger(LogOptions::default())).unwrap();
        chain.add(Middleware::Cors(CorsConfig::default())).unwrap();
        chain.add(Middleware::Timing).unwrap();
        // Three members with logger and cors, but timing forces the
        // generic loop so its behavior is not skipped
        assert!(!chain.uses_fast_path());
    }

    #[test]
    fn test_fast_path_preflight() {
        let mut chain = MiddlewareChain::new();
        chain.add(Middleware::Logger(LogOptions::default())).unwrap();
        chain.add(Middleware::Cors(CorsConfig::default())).unwrap();

        let mut ev = Event::new();
        ev.method = Method::Options;
        ev.path.push_str("/anything");

        chain
            .execute(&mut ev, |_| panic!("handler must not run on preflight"))
            .unwrap();
        assert_eq!(ev.response.status, StatusCode::NO_CONTENT);
        assert_eq!(ev.response.header("access-control-allow-origin"), Some("*"));
    }

    #[test]
    fn test_terminate_early_skips_rest() {
        fn halt(event: &mut Event) -> Result<Flow> {
            event.response.status = StatusCode::NO_CONTENT;
            event.response.finished = true;
            Ok(Flow::TerminateEarly)
        }
        fn unreachable_mw(_event: &mut Event) -> Result<Flow> {
            panic!("must not run after termination");
        }

        let mut chain = MiddlewareChain::new();
        chain.add(Middleware::Custom(halt)).unwrap();
        chain.add(Middleware::Custom(unreachable_mw)).unwrap();

        let mut ev = Event::new();
        chain
            .execute(&mut ev, |_| panic!("handler must not run"))
            .unwrap();
        assert_eq!(ev.response.status, StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_middleware_error_aborts() {
        fn failing(_event: &mut Event) -> Result<Flow> {
            Err(Error::Middleware("auth backend down".into()))
        }

        let mut chain = MiddlewareChain::new();
        chain.add(Middleware::Custom(failing)).unwrap();

        let mut ev = Event::new();
        let err = chain.execute(&mut ev, ok_handler).unwrap_err();
        assert!(matches!(err, Error::Middleware(_)));
        assert!(!ev.response.finished);
    }

    #[test]
    fn test_registration_limit() {
        let mut chain = MiddlewareChain::new();
        for _ in 0..MAX_MIDDLEWARES {
            chain.add(Middleware::Timing).unwrap();
        }
        let err = chain.add(Middleware::Timing).unwrap_err();
        assert!(matches!(err, Error::TooManyMiddlewares { .. }));
        assert_eq!(chain.len(), MAX_MIDDLEWARES);
    }

    #[test]
    fn test_execution_order() {
        fn first(event: &mut Event) -> Result<Flow> {
            event.set_context("order", ByteStr::Owned("a".into()));
            Ok(Flow::Continue)
        }
        fn second(event: &mut Event) -> Result<Flow> {
            let prev = event.get_context("order").unwrap_or("").to_string();
            event.set_context("order", ByteStr::Owned(prev + "b"));
            Ok(Flow::Continue)
        }

        let mut chain = MiddlewareChain::new();
        chain.add(Middleware::Custom(first)).unwrap();
        chain.add(Middleware::Custom(second)).unwrap();

        let mut ev = Event::new();
        chain.execute(&mut ev, ok_handler).unwrap();
        assert_eq!(ev.get_context("order"), Some("ab"));
    }

    #[test]
    fn test_timing_pair_wraps_handler() {
        let mut chain = MiddlewareChain::new();
        chain.add(Middleware::Timing).unwrap();
        chain.add(Middleware::TimingEnd).unwrap();

        let mut ev = Event::new();
        chain.execute(&mut ev, ok_handler).unwrap();
        assert!(ev.response.header("x-response-time").is_some());
    }

    #[test]
    fn test_request_id_middleware() {
        let mut chain = MiddlewareChain::new();
        chain.add(Middleware::RequestId).unwrap();

        let mut ev = Event::new();
        chain.execute(&mut ev, ok_handler).unwrap();
        assert!(ev.get_context(REQUEST_ID_KEY).is_some());
        assert!(ev.response.header("x-request-id").is_some());
    }
}
