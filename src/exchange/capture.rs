//! Capture files: exchanges exported from the host as JSON Lines.
//!
//! One exchange per line:
//!
//! ```text
//! {"protocol":"https","host":"example.com","port":443,"tool":"proxy",
//!  "request":"<base64>","response":"<base64>","captured_at":"2024-05-01T10:00:00Z"}
//! ```
//!
//! `tool`, `request`, `response` and `captured_at` are optional. Blank lines
//! and lines starting with `#` are ignored.

use std::path::Path;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{Exchange, HttpService, ToolFlags};

/// Serialized form of one captured exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

impl CaptureRecord {
    pub fn from_exchange(tool: ToolFlags, exchange: &Exchange) -> Self {
        Self {
            protocol: exchange.service.protocol.clone(),
            host: exchange.service.host.clone(),
            port: exchange.service.port,
            tool: Some(tool.to_string()),
            request: exchange.request.as_ref().map(|r| STANDARD.encode(r)),
            response: exchange.response.as_ref().map(|r| STANDARD.encode(r)),
            captured_at: exchange.captured_at,
        }
    }

    /// Decodes the record; tools default to the proxy.
    pub fn into_exchange(self) -> Result<CapturedExchange> {
        let tool = match self.tool.as_deref() {
            Some(t) => t.parse::<ToolFlags>()?,
            None => ToolFlags::PROXY,
        };
        let request = self
            .request
            .map(|r| STANDARD.decode(r.trim()))
            .transpose()
            .context("request is not valid base64")?;
        let response = self
            .response
            .map(|r| STANDARD.decode(r.trim()))
            .transpose()
            .context("response is not valid base64")?;

        Ok(CapturedExchange {
            tool,
            exchange: Exchange {
                service: HttpService::new(self.protocol, self.host, self.port),
                request,
                response,
                captured_at: self.captured_at,
            },
        })
    }
}

/// An exchange together with the tool that produced it.
#[derive(Debug, Clone)]
pub struct CapturedExchange {
    pub tool: ToolFlags,
    pub exchange: Exchange,
}

/// Result of reading a capture file.
#[derive(Debug, Default)]
pub struct CaptureLoad {
    pub exchanges: Vec<CapturedExchange>,
    /// (1-based line number, reason) for every line that was skipped.
    pub malformed: Vec<(usize, String)>,
}

/// Parses one non-empty capture line.
pub fn parse_capture_line(line: &str) -> Result<CapturedExchange> {
    let record: CaptureRecord =
        serde_json::from_str(line).context("line is not a capture record")?;
    record.into_exchange()
}

/// Reads every exchange from a capture file, skipping malformed lines.
///
/// # Errors
///
/// Returns an error only if the file cannot be opened or read.
pub async fn load_capture_file(path: &Path) -> Result<CaptureLoad> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open capture file {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let mut load = CaptureLoad::default();
    let mut line_no = 0usize;

    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read capture file")?
    {
        line_no += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match parse_capture_line(trimmed) {
            Ok(captured) => load.exchanges.push(captured),
            Err(e) => {
                warn!("Skipping capture line {}: {:#}", line_no, e);
                load.malformed.push((line_no, format!("{:#}", e)));
            }
        }
    }

    debug!(
        "Loaded {} exchanges from {} ({} malformed lines)",
        load.exchanges.len(),
        path.display(),
        load.malformed.len()
    );
    Ok(load)
}
