//! Structured parsing of single header lines.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error_handling::{FieldKind, MalformedField};
use crate::utils::compile_regex_unsafe;

/// `name: value`, where the name is an RFC 9110 token.
static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex_unsafe(
        r"^([!#$%&'*+.^_`|~0-9A-Za-z-]+)[ \t]*:[ \t]*(.*?)[ \t]*$",
        "HEADER_RE",
    )
});

/// A parsed header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Splits a raw header line into name and value.
///
/// Start lines (`GET / HTTP/1.1`, `HTTP/1.1 200 OK`) and anything else
/// without a token name fail with [`MalformedField`] carrying the line.
pub fn parse_header_line(line: &str, kind: FieldKind) -> Result<Header, MalformedField> {
    let caps = HEADER_RE.captures(line).ok_or_else(|| MalformedField {
        kind,
        raw: line.to_string(),
    })?;
    Ok(Header {
        name: caps[1].to_string(),
        value: caps[2].to_string(),
    })
}
