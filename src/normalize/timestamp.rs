//! Timestamp derivation for documents.
//!
//! Bulk imports date each document from its response's `Date` header,
//! converted into the zone chosen at start-up. A missing or unparsable
//! header reuses the last value derived earlier (the carry), then now.

use chrono::{DateTime, FixedOffset, Local, Utc};
use chrono_tz::Tz;
use log::{debug, warn};

/// Where a document's timestamp comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampMode {
    /// Live path: the exchange's capture time.
    CaptureTime,
    /// Bulk path: the response `Date` header with fallback to the carry.
    ResponseDate,
}

/// Zone that derived timestamps are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneSetting {
    /// A named IANA zone.
    Named(Tz),
    /// The system's local zone.
    Local,
    /// Zone lookup failed; timestamps stay in UTC.
    Unzoned,
}

impl ZoneSetting {
    pub fn convert(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            ZoneSetting::Named(tz) => at.with_timezone(tz).fixed_offset(),
            ZoneSetting::Local => at.with_timezone(&Local).fixed_offset(),
            ZoneSetting::Unzoned => at.fixed_offset(),
        }
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.convert(Utc::now())
    }
}

/// Resolves the configured zone name once, at start-up.
///
/// `None` selects the system zone. A name that is not a known IANA zone is
/// logged and degrades to [`ZoneSetting::Unzoned`] rather than failing.
pub fn init_timezone(name: Option<&str>) -> ZoneSetting {
    match name.map(str::trim) {
        None | Some("") => ZoneSetting::Local,
        Some(name) => match name.parse::<Tz>() {
            Ok(tz) => {
                debug!("Using timezone {} for derived timestamps", tz);
                ZoneSetting::Named(tz)
            }
            Err(e) => {
                warn!(
                    "Unknown timezone '{}' ({}); derived timestamps will be unzoned",
                    name, e
                );
                ZoneSetting::Unzoned
            }
        },
    }
}

/// Parses an RFC 2822 `Date` header value.
pub fn parse_date_header(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}
