//! Raw exchange to [`Document`] normalization.
//!
//! The normalizer never fails: undecodable bytes are replaced, header lines
//! that do not parse are kept verbatim, cookie expirations that cannot be
//! converted are omitted and an underivable timestamp falls back to the
//! carried value. Each degradation is counted in [`ProcessingStats`].

mod timestamp;

use std::borrow::Cow;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, FixedOffset};
use log::{debug, trace};
use regex::Regex;

use crate::document::{Document, ParameterKind, RequestContentType};
use crate::error_handling::{ProcessingStats, WarningType};
use crate::exchange::{Exchange, ExchangeAnalyzer, HttpAnalyzer};
use crate::storage::IndexName;
use crate::utils::compile_regex_unsafe;

pub use timestamp::{init_timezone, parse_date_header, TimestampMode, ZoneSetting};

/// Case-insensitive `Date:` header, capturing the value.
static DATE_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex_unsafe(r"(?i)^date[ \t]*:[ \t]*(.*?)[ \t]*$", "DATE_HEADER_RE")
});

/// Last derived timestamp, threaded through a batch.
pub type TimestampCarry = Option<DateTime<FixedOffset>>;

/// Turns exchanges into documents.
pub struct Normalizer {
    analyzer: Arc<dyn ExchangeAnalyzer>,
    zone: ZoneSetting,
    stats: Arc<ProcessingStats>,
}

impl Normalizer {
    pub fn new(
        analyzer: Arc<dyn ExchangeAnalyzer>,
        zone: ZoneSetting,
        stats: Arc<ProcessingStats>,
    ) -> Self {
        Self {
            analyzer,
            zone,
            stats,
        }
    }

    /// Normalizer over raw HTTP bytes with the given zone.
    pub fn with_http_analyzer(zone: ZoneSetting, stats: Arc<ProcessingStats>) -> Self {
        Self::new(Arc::new(HttpAnalyzer), zone, stats)
    }

    pub fn zone(&self) -> ZoneSetting {
        self.zone
    }

    /// Builds the document for `exchange`, targeting `index`.
    ///
    /// In [`TimestampMode::ResponseDate`] the `carry` is read when the
    /// response has no usable `Date` header and updated when it has one.
    /// [`TimestampMode::CaptureTime`] leaves it untouched.
    pub fn normalize(
        &self,
        index: &IndexName,
        exchange: &Exchange,
        mode: TimestampMode,
        carry: &mut TimestampCarry,
    ) -> Document {
        let service = &exchange.service;
        let mut doc = Document::new(index, &service.protocol, &service.host, service.port);

        if let Some(raw) = exchange.request.as_deref().filter(|r| !r.is_empty()) {
            self.fill_request(&mut doc, exchange, raw);
        }

        let mut date_header = None;
        if let Some(raw) = exchange.response.as_deref().filter(|r| !r.is_empty()) {
            date_header = self.fill_response(&mut doc, raw);
        }

        doc.timestamp = Some(match mode {
            TimestampMode::CaptureTime => exchange
                .captured_at
                .map(|at| self.zone.convert(at))
                .unwrap_or_else(|| self.zone.now()),
            TimestampMode::ResponseDate => self.derive_timestamp(date_header.as_deref(), carry),
        });

        doc
    }

    fn fill_request(&self, doc: &mut Document, exchange: &Exchange, raw: &[u8]) {
        let info = self.analyzer.analyze_request(&exchange.service, raw);

        let request = doc.request_mut();
        request.full = String::from_utf8_lossy(raw).into_owned();
        request.method = info.method;
        request.url = info.url;
        request.content_type = RequestContentType::from_code(info.content_type_code);
        request.body = body_text(raw, info.body_offset).into_owned();

        for (position, line) in info.headers.iter().enumerate() {
            if let Err(e) = doc.add_request_header(line) {
                if position > 0 {
                    debug!("Keeping {} verbatim: {}", e.kind.as_str(), e);
                    self.stats.increment_warning(WarningType::MalformedHeader);
                }
                doc.add_raw_request_line(line);
            }
        }

        for param in info.parameters {
            doc.add_request_parameter(
                ParameterKind::from_code(param.type_code),
                param.name,
                param.value,
            );
        }
    }

    /// Fills the response section; returns the `Date` header value if any.
    fn fill_response(&self, doc: &mut Document, raw: &[u8]) -> Option<String> {
        let info = self.analyzer.analyze_response(raw);

        let response = doc.response_mut();
        response.full = String::from_utf8_lossy(raw).into_owned();
        response.status = info.status_code;
        response.content_type = info.stated_mime_type;
        response.inferred_content_type = info.inferred_mime_type;
        response.body = body_text(raw, info.body_offset).into_owned();

        let mut date_header = None;
        for (position, line) in info.headers.iter().enumerate() {
            if let Err(e) = doc.add_response_header(line) {
                if position > 0 {
                    debug!("Keeping {} verbatim: {}", e.kind.as_str(), e);
                    self.stats.increment_warning(WarningType::MalformedHeader);
                }
                doc.add_raw_response_line(line);
            }
            // Independent of whether the line parsed above.
            if let Some(caps) = DATE_HEADER_RE.captures(line) {
                date_header = Some(caps[1].to_string());
            }
        }

        for cookie in info.cookies {
            let expiration = match cookie.expiration_millis {
                None => None,
                Some(millis) => match DateTime::from_timestamp_millis(millis) {
                    Some(at) => Some(self.zone.convert(at)),
                    None => {
                        debug!(
                            "Dropping out-of-range expiration {} of cookie {}",
                            millis, cookie.name
                        );
                        self.stats
                            .increment_warning(WarningType::CookieExpirationDropped);
                        None
                    }
                },
            };
            doc.add_response_cookie(
                cookie.name,
                cookie.value,
                cookie.domain,
                cookie.path,
                expiration,
            );
        }

        date_header
    }

    fn derive_timestamp(
        &self,
        date_header: Option<&str>,
        carry: &mut TimestampCarry,
    ) -> DateTime<FixedOffset> {
        if let Some(parsed) = date_header.and_then(parse_date_header) {
            let derived = self.zone.convert(parsed);
            *carry = Some(derived);
            return derived;
        }

        trace!("No usable Date header ({:?}); falling back", date_header);
        self.stats.increment_warning(WarningType::TimestampFallback);
        carry.unwrap_or_else(|| self.zone.now())
    }
}

/// Body text starting at `offset`, clamped to the message length.
fn body_text(raw: &[u8], offset: usize) -> Cow<'_, str> {
    String::from_utf8_lossy(&raw[offset.min(raw.len())..])
}
