//! The per-request event object
//!
//! One [`Event`] carries a request through the middleware chain, the router
//! and the handler, then carries the response back out to the serializer.
//! Events are recycled through the [`EventPool`](crate::EventPool); the
//! [`reset`](Event::reset) contract is what makes recycling safe.

use crate::bytestr::ByteStr;
use crate::error::{Error, Result};
use crate::response::{Response, StatusCode};
use bytes::Bytes;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Default protocol version, borrowed-static per the parser contract
pub const HTTP_VERSION: &str = "HTTP/1.1";

/// HTTP Methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Connect,
    Trace,
}

impl Method {
    /// Number of methods, for per-method tables
    pub const COUNT: usize = 9;

    /// Parse from the wire token
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            "CONNECT" => Ok(Method::Connect),
            "TRACE" => Ok(Method::Trace),
            _ => Err(Error::InvalidRequest(format!("unknown method: {s}"))),
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Connect => "CONNECT",
            Method::Trace => "TRACE",
        }
    }

    /// Dense index for per-method tables
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mutable per-request container.
///
/// The parser fills the request side, middlewares and the handler mutate it,
/// the serializer reads the response side. All strings carry an explicit
/// owner tag ([`ByteStr`]); dropping or clearing frees exactly the owned
/// ones.
#[derive(Debug)]
pub struct Event {
    /// HTTP method
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    /// Query string (without leading ?), empty when absent
    pub query: String,
    /// Protocol version
    pub version: ByteStr,
    /// Request body
    pub body: Option<Bytes>,
    /// Request headers (stack-allocated for small header counts)
    pub headers: SmallVec<[(ByteStr, ByteStr); 16]>,
    /// Route-capture variables (populated by the router)
    pub params: FxHashMap<ByteStr, ByteStr>,
    /// Middleware/handler scratch values
    pub context: FxHashMap<ByteStr, ByteStr>,
    /// Response under construction
    pub response: Response,
}

impl Event {
    /// Create a fresh event
    pub fn new() -> Self {
        Self {
            method: Method::Get,
            path: String::new(),
            query: String::new(),
            version: ByteStr::Static(HTTP_VERSION),
            body: None,
            headers: SmallVec::new(),
            params: FxHashMap::default(),
            context: FxHashMap::default(),
            response: Response::new(),
        }
    }

    /// Get a request header value (case-insensitive)
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.as_str().eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a request header. An existing entry with the same name is
    /// replaced and its old key/value pair dropped.
    pub fn set_header(&mut self, name: impl Into<ByteStr>, value: impl Into<ByteStr>) {
        let name = name.into();
        if let Some(slot) = self
            .headers
            .iter_mut()
            .find(|(k, _)| k.as_str().eq_ignore_ascii_case(name.as_str()))
        {
            *slot = (name, value.into());
        } else {
            self.headers.push((name, value.into()));
        }
    }

    /// Get a route parameter
    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(ByteStr::as_str)
    }

    /// Set a route parameter. Inserting over an existing key drops the old
    /// key/value pair.
    pub fn set_param(&mut self, name: impl Into<ByteStr>, value: impl Into<ByteStr>) {
        self.params.insert(name.into(), value.into());
    }

    /// Get a context value
    pub fn get_context(&self, name: &str) -> Option<&str> {
        self.context.get(name).map(ByteStr::as_str)
    }

    /// Set a context value. Inserting over an existing key drops the old
    /// key/value pair.
    pub fn set_context(&mut self, name: impl Into<ByteStr>, value: impl Into<ByteStr>) {
        self.context.insert(name.into(), value.into());
    }

    /// Set the response status
    pub fn set_status(&mut self, status: StatusCode) -> Result<()> {
        if self.response.sent {
            return Err(Error::AlreadySent);
        }
        self.response.status = status;
        Ok(())
    }

    /// Finish the response with a plain-text body
    pub fn send_text(&mut self, body: impl Into<String>) -> Result<()> {
        self.send_with_content_type(Bytes::from(body.into()), "text/plain; charset=utf-8")
    }

    /// Finish the response with a JSON body (pre-serialized)
    pub fn send_json(&mut self, body: impl Into<String>) -> Result<()> {
        self.send_with_content_type(Bytes::from(body.into()), "application/json")
    }

    /// Finish the response with an HTML body
    pub fn send_html(&mut self, body: impl Into<String>) -> Result<()> {
        self.send_with_content_type(Bytes::from(body.into()), "text/html; charset=utf-8")
    }

    /// Finish the response with a raw body allocated by the caller
    pub fn send_bytes(&mut self, body: impl Into<Vec<u8>>) -> Result<()> {
        self.send_with_content_type(Bytes::from(body.into()), "application/octet-stream")
    }

    /// Finish the response with a static body. No allocation happens and
    /// `body_owned` stays false.
    pub fn send_static(&mut self, body: &'static [u8], content_type: &'static str) -> Result<()> {
        if self.response.sent {
            return Err(Error::AlreadySent);
        }
        self.response.set_header(ByteStr::Static("content-type"), ByteStr::Static(content_type));
        self.response.body = Bytes::from_static(body);
        self.response.body_owned = false;
        self.response.finished = true;
        Ok(())
    }

    fn send_with_content_type(&mut self, body: Bytes, content_type: &'static str) -> Result<()> {
        if self.response.sent {
            return Err(Error::AlreadySent);
        }
        self.response.set_header(ByteStr::Static("content-type"), ByteStr::Static(content_type));
        self.response.body = body;
        self.response.body_owned = true;
        self.response.finished = true;
        Ok(())
    }

    /// Serializer hook: the response bytes have gone out.
    pub fn mark_sent(&mut self) {
        self.response.sent = true;
    }

    /// Parse the query string into key-value pairs
    pub fn query_params(&self) -> FxHashMap<String, String> {
        let mut params = FxHashMap::default();
        for pair in self.query.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                params.insert(percent_decode(key), percent_decode(value));
            }
        }
        params
    }

    /// Return the event to its pristine state.
    ///
    /// Every mapping is cleared (dropping owned keys and values, leaving
    /// static ones alone), the path/query buffers are emptied retaining
    /// their capacity, bodies are dropped, and scalars go back to defaults.
    /// Afterwards the event is observationally identical to a fresh one,
    /// up to map capacity.
    pub fn reset(&mut self) {
        self.method = Method::Get;
        self.path.clear();
        self.query.clear();
        self.version = ByteStr::Static(HTTP_VERSION);
        self.body = None;
        self.headers.clear();
        self.params.clear();
        self.context.clear();
        self.response.reset();
    }

    /// True when the event is indistinguishable from a freshly created one.
    pub fn is_pristine(&self) -> bool {
        self.method == Method::Get
            && self.path.is_empty()
            && self.query.is_empty()
            && self.version.as_str() == HTTP_VERSION
            && self.body.is_none()
            && self.headers.is_empty()
            && self.params.is_empty()
            && self.context.is_empty()
            && self.response.status == StatusCode::OK
            && self.response.headers.is_empty()
            && self.response.body.is_empty()
            && !self.response.body_owned
            && !self.response.sent
            && !self.response.finished
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

/// Percent-decode a query component.
///
/// Escapes decode into a byte buffer first so multi-byte UTF-8 sequences
/// come out whole; malformed escapes pass through untouched and invalid
/// UTF-8 is replaced.
fn percent_decode(s: &str) -> String {
    let raw = s.as_bytes();
    let mut decoded = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        match raw[i] {
            b'%' if i + 2 < raw.len() => {
                if let Some(byte) = hex_digit(raw[i + 1])
                    .zip(hex_digit(raw[i + 2]))
                    .map(|(hi, lo)| (hi << 4) | lo)
                {
                    decoded.push(byte);
                    i += 3;
                } else {
                    decoded.push(b'%');
                    i += 1;
                }
            }
            b'+' => {
                decoded.push(b' ');
                i += 1;
            }
            byte => {
                decoded.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
