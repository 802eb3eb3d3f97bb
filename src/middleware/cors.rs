//! CORS built-in
//!
//! Applies the response header triple and answers preflight requests
//! without touching the router or the handler.

use crate::bytestr::ByteStr;
use crate::event::{Event, Method};
use crate::response::StatusCode;
use smallvec::SmallVec;

/// CORS configuration
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins (empty = all)
    pub origins: SmallVec<[String; 4]>,
    /// Allowed methods, preformatted header value
    pub methods: &'static str,
    /// Allowed request headers, preformatted header value
    pub headers: &'static str,
    /// Preflight cache lifetime (seconds)
    pub max_age: u32,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: SmallVec::new(),
            methods: "GET, POST, PUT, DELETE, PATCH, HEAD, OPTIONS",
            headers: "Content-Type, Authorization, X-Requested-With",
            max_age: 86400,
        }
    }
}

impl CorsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.origins.push(origin.into());
        self
    }

    pub fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = seconds;
        self
    }

    /// True when the given origin may talk to us
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.origins.is_empty() {
            return true;
        }
        self.origins.iter().any(|o| o == origin || o == "*")
    }
}

/// Outcome of running the CORS built-in on an event
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum CorsOutcome {
    /// Headers applied, continue down the chain
    Proceed,
    /// Response is complete (preflight answered or origin rejected)
    Done,
}

/// Apply CORS to the event: stamp the header triple, answer OPTIONS
/// preflights with 204, reject disallowed origins with 403.
pub(crate) fn apply(config: &CorsConfig, event: &mut Event) -> CorsOutcome {
    let origin_allowed = match event.get_header("origin") {
        Some(origin) => config.is_origin_allowed(origin),
        // Same-origin request: headers are still harmless and the
        // preflight short-circuit below still applies.
        None => true,
    };

    if !origin_allowed {
        event.response.status = StatusCode::FORBIDDEN;
        event.response.finished = true;
        return CorsOutcome::Done;
    }

    apply_headers(config, event);

    if event.method == Method::Options {
        event.response.status = StatusCode::NO_CONTENT;
        event.response.finished = true;
        return CorsOutcome::Done;
    }
    CorsOutcome::Proceed
}

/// Stamp the CORS header triple (plus max-age) onto the response.
pub(crate) fn apply_headers(config: &CorsConfig, event: &mut Event) {
    let origin_value = if config.origins.is_empty() {
        ByteStr::Static("*")
    } else {
        match event.get_header("origin") {
            Some(origin) => ByteStr::Owned(origin.to_string()),
            None => ByteStr::Static("*"),
        }
    };
    let res = &mut event.response;
    res.set_header(ByteStr::Static("access-control-allow-origin"), origin_value);
    res.set_header(
        ByteStr::Static("access-control-allow-methods"),
        ByteStr::Static(config.methods),
    );
    res.set_header(
        ByteStr::Static("access-control-allow-headers"),
        ByteStr::Static(config.headers),
    );
    res.set_header(
        ByteStr::Static("access-control-max-age"),
        ByteStr::Owned(config.max_age.to_string()),
    );
}
