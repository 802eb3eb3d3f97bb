//! Request logging, timing and id-stamping built-ins

use crate::bytestr::ByteStr;
use crate::event::Event;
use std::sync::OnceLock;
use std::time::Instant;

/// Context key for the timing start written by the timing built-in
pub const TIMING_START_KEY: &str = "timing_start_ns";

/// Context key for the generated request id
pub const REQUEST_ID_KEY: &str = "request_id";

/// Minimum severity the embedder wants emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// What the built-in logger emits. Level filtering beyond this is the
/// tracing subscriber's job.
#[derive(Debug, Clone, Copy)]
pub struct LogOptions {
    pub level: LogLevel,
    pub connection_logs: bool,
    pub request_logs: bool,
    pub performance_logs: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            connection_logs: false,
            request_logs: true,
            performance_logs: false,
        }
    }
}

impl LogOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn connection_logs(mut self, enabled: bool) -> Self {
        self.connection_logs = enabled;
        self
    }

    pub fn request_logs(mut self, enabled: bool) -> Self {
        self.request_logs = enabled;
        self
    }

    pub fn performance_logs(mut self, enabled: bool) -> Self {
        self.performance_logs = enabled;
        self
    }
}

/// One line per request, method and path.
pub(crate) fn log_request(options: &LogOptions, event: &Event) {
    if options.request_logs {
        tracing::info!(method = event.method.as_str(), path = %event.path, "request");
    }
}

/// Record the start of request handling into the event context.
pub(crate) fn stamp_timing_start(event: &mut Event) {
    event.set_context(
        ByteStr::Static(TIMING_START_KEY),
        ByteStr::Owned(now_nanos().to_string()),
    );
}

/// Read the timing start back and write the elapsed time as a response
/// header. Does nothing if the timing built-in never ran.
pub(crate) fn stamp_timing_end(event: &mut Event) {
    let Some(start) = event
        .get_context(TIMING_START_KEY)
        .and_then(|v| v.parse::<u64>().ok())
    else {
        return;
    };
    let elapsed_ms = now_nanos().saturating_sub(start) as f64 / 1_000_000.0;
    event.response.set_header(
        ByteStr::Static("x-response-time"),
        ByteStr::Owned(format!("{elapsed_ms:.2}ms")),
    );
    tracing::debug!(ms = elapsed_ms, path = %event.path, "request timing");
}

/// Stamp a request id into the context and the response headers.
pub(crate) fn stamp_request_id(event: &mut Event) {
    let id = generate_request_id();
    event.set_context(ByteStr::Static(REQUEST_ID_KEY), ByteStr::Owned(id.clone()));
    event
        .response
        .set_header(ByteStr::Static("x-request-id"), ByteStr::Owned(id));
}

/// Monotonic nanoseconds since the first call in this process.
pub(crate) fn now_nanos() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

/// Generate a short request id (8 characters)
pub fn generate_request_id() -> String {
    const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let mut bytes = [0u8; 8];
    fill_random(&mut bytes);
    bytes
        .iter()
        .map(|&b| ALPHABET[(b as usize) % ALPHABET.len()] as char)
        .collect()
}

/// Fill buffer with pseudo-random bytes
fn fill_random(buf: &mut [u8]) {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    let mut seed = now.as_nanos() as u64 | 1;

    for byte in buf.iter_mut() {
        // Simple xorshift64
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        *byte = (seed & 0xff) as u8;
    }
}
