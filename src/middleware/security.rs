//! Security headers built-in

use crate::bytestr::ByteStr;
use crate::event::Event;

/// Security header configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Content-Security-Policy
    pub csp: Option<&'static str>,
    /// X-Frame-Options
    pub frame_options: Option<&'static str>,
    /// X-Content-Type-Options: nosniff
    pub content_type_options: bool,
    /// Referrer-Policy
    pub referrer_policy: Option<&'static str>,
    /// Strict-Transport-Security max-age (seconds)
    pub hsts_max_age: Option<u64>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            csp: None,
            frame_options: Some("DENY"),
            content_type_options: true,
            referrer_policy: Some("strict-origin-when-cross-origin"),
            hsts_max_age: None,
        }
    }
}

impl SecurityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn csp(mut self, policy: &'static str) -> Self {
        self.csp = Some(policy);
        self
    }

    pub fn frame_options(mut self, value: Option<&'static str>) -> Self {
        self.frame_options = value;
        self
    }

    pub fn hsts(mut self, max_age: u64) -> Self {
        self.hsts_max_age = Some(max_age);
        self
    }
}

/// Stamp the configured security headers onto the response.
pub(crate) fn apply_headers(config: &SecurityConfig, event: &mut Event) {
    let res = &mut event.response;
    if let Some(csp) = config.csp {
        res.set_header(ByteStr::Static("content-security-policy"), ByteStr::Static(csp));
    }
    if let Some(frame) = config.frame_options {
        res.set_header(ByteStr::Static("x-frame-options"), ByteStr::Static(frame));
    }
    if config.content_type_options {
        res.set_header(
            ByteStr::Static("x-content-type-options"),
            ByteStr::Static("nosniff"),
        );
    }
    if let Some(policy) = config.referrer_policy {
        res.set_header(ByteStr::Static("referrer-policy"), ByteStr::Static(policy));
    }
    if let Some(max_age) = config.hsts_max_age {
        res.set_header(
            ByteStr::Static("strict-transport-security"),
            ByteStr::Owned(format!("max-age={max_age}; includeSubDomains")),
        );
    }
}
