//! Shared helpers.
//!
//! This module provides:
//! - Error-message sanitization for messages kept in reports
//! - Regex compilation for static patterns

pub mod sanitize;

use regex::Regex;

/// Compiles a constant regex pattern.
///
/// # Panics
///
/// Panics if the pattern is invalid. Only use with literal patterns, where a
/// failure is a programming error caught by the first test that touches it.
pub(crate) fn compile_regex_unsafe(pattern: &str, context: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| {
        panic!(
            "Failed to compile regex pattern '{}' in {}: {}. This is a programming error.",
            pattern, context, e
        )
    })
}
