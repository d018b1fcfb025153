//! Captured HTTP exchanges and the request/response analysis facility.
//!
//! An [`Exchange`] is what the intercepting host hands over: connection
//! details plus the raw request and response bytes, either of which may be
//! missing. The [`ExchangeAnalyzer`] trait is the host's analysis facility;
//! [`HttpAnalyzer`] implements it directly over raw HTTP/1.x bytes.
//!
//! Parameter types and request content types are reported as the host's
//! integer codes (see [`param_code`] and [`content_type_code`]); mapping them
//! to document enums is the normalizer's job.

mod analyzer;
pub mod capture;
mod mime;
mod tool;

use chrono::{DateTime, Utc};

pub use analyzer::HttpAnalyzer;
pub use tool::{Tool, ToolFlags};

/// Parameter type codes reported by the analysis facility.
pub mod param_code {
    pub const URL: i32 = 0;
    pub const BODY: i32 = 1;
    pub const COOKIE: i32 = 2;
    pub const XML: i32 = 3;
    pub const XML_ATTR: i32 = 4;
    pub const MULTIPART_ATTR: i32 = 5;
    pub const JSON: i32 = 6;
}

/// Request content-type codes reported by the analysis facility.
pub mod content_type_code {
    pub const NONE: i32 = 0;
    pub const URL_ENCODED: i32 = 1;
    pub const MULTIPART: i32 = 2;
    pub const XML: i32 = 3;
    pub const JSON: i32 = 4;
    pub const AMF: i32 = 5;
    pub const UNKNOWN: i32 = -1;
}

/// Target of an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpService {
    pub protocol: String,
    pub host: String,
    pub port: u16,
}

impl HttpService {
    pub fn new(protocol: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port,
        }
    }

    /// True if `port` is the scheme's default and can be left out of URLs.
    pub fn is_default_port(&self) -> bool {
        matches!(
            (self.protocol.to_ascii_lowercase().as_str(), self.port),
            ("http", 80) | ("https", 443)
        )
    }
}

/// One captured HTTP request/response pair; either part may be absent.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub service: HttpService,
    pub request: Option<Vec<u8>>,
    pub response: Option<Vec<u8>>,
    /// When the host captured the exchange, if it said so.
    pub captured_at: Option<DateTime<Utc>>,
}

impl Exchange {
    pub fn new(service: HttpService) -> Self {
        Self {
            service,
            request: None,
            response: None,
            captured_at: None,
        }
    }

    pub fn with_request(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.request = Some(raw.into());
        self
    }

    pub fn with_response(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.response = Some(raw.into());
        self
    }

    pub fn with_captured_at(mut self, at: DateTime<Utc>) -> Self {
        self.captured_at = Some(at);
        self
    }

    /// Empty byte sequences count as absent, as they do for the host.
    pub fn has_response(&self) -> bool {
        self.response.as_ref().is_some_and(|r| !r.is_empty())
    }

    pub fn has_request(&self) -> bool {
        self.request.as_ref().is_some_and(|r| !r.is_empty())
    }
}

/// A parameter as reported by the analysis facility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    pub type_code: i32,
    pub name: String,
    pub value: String,
}

/// A response cookie as reported by the analysis facility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieInfo {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    /// Expiration as milliseconds since the Unix epoch.
    pub expiration_millis: Option<i64>,
}

/// Result of analyzing a raw request.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    pub method: String,
    pub url: String,
    /// All head lines, start line included, in order.
    pub headers: Vec<String>,
    pub body_offset: usize,
    pub content_type_code: i32,
    pub parameters: Vec<ParameterInfo>,
}

/// Result of analyzing a raw response.
#[derive(Debug, Clone, Default)]
pub struct ResponseInfo {
    pub status_code: u16,
    /// All head lines, status line included, in order.
    pub headers: Vec<String>,
    pub body_offset: usize,
    pub stated_mime_type: String,
    pub inferred_mime_type: String,
    pub cookies: Vec<CookieInfo>,
}

/// The host's request/response analysis facility.
///
/// Analysis never fails: unparsable input yields empty or partial info.
pub trait ExchangeAnalyzer: Send + Sync {
    fn analyze_request(&self, service: &HttpService, request: &[u8]) -> RequestInfo;

    fn analyze_response(&self, response: &[u8]) -> ResponseInfo;
}
