//! Indexing policy values.

use crate::config::DEFAULT_INDEX_PREFIX;
use crate::exchange::{Exchange, ToolFlags};
use crate::storage::IndexName;

/// Resolved settings applied to a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSettings {
    pub prefix: String,
    pub project: String,
    pub tools: ToolFlags,
    pub responses_only: bool,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_INDEX_PREFIX.to_string(),
            project: String::new(),
            tools: ToolFlags::PROXY,
            responses_only: true,
        }
    }
}

impl IndexSettings {
    /// Sanitized target index.
    pub fn index_name(&self) -> IndexName {
        IndexName::from_parts(&self.prefix, &self.project)
    }

    pub fn policy(&self) -> FilterPolicy {
        FilterPolicy {
            tools: self.tools,
            responses_only: self.responses_only,
        }
    }
}

/// Decides which exchanges are indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterPolicy {
    pub tools: ToolFlags,
    pub responses_only: bool,
}

impl FilterPolicy {
    /// Live path: the tool must be selected, and with responses-only set,
    /// request notifications are dropped.
    pub fn accepts(&self, tool: ToolFlags, is_request: bool) -> bool {
        self.tools.intersects(tool) && !(is_request && self.responses_only)
    }

    /// Bulk path: with responses-only set, exchanges without a response are
    /// skipped. Exchanges with neither part are always skipped.
    pub fn skips_in_bulk(&self, exchange: &Exchange) -> bool {
        if !exchange.has_request() && !exchange.has_response() {
            return true;
        }
        self.responses_only && !exchange.has_response()
    }
}
