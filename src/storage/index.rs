//! Index naming.

use std::fmt;

use crate::config::RESERVED_INDEX_CHARS;

/// Makes `raw` usable as an index name.
///
/// Spaces become `-`, reserved characters are removed, leading `-` and `_`
/// are trimmed and the result is lowercased. Deterministic and idempotent.
pub fn sanitize_index_name(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .filter(|c| !RESERVED_INDEX_CHARS.contains(c))
        .map(|c| if c == ' ' { '-' } else { c })
        .collect();
    replaced
        .trim_start_matches(['-', '_'])
        .to_lowercase()
}

/// A sanitized index name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexName(String);

impl IndexName {
    pub fn new(raw: &str) -> Self {
        Self(sanitize_index_name(raw))
    }

    /// `"{prefix}-{project}"`, or just the prefix when the project is empty.
    pub fn from_parts(prefix: &str, project: &str) -> Self {
        if project.trim().is_empty() {
            Self::new(prefix)
        } else {
            Self::new(&format!("{}-{}", prefix, project))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IndexName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts() {
        assert_eq!(
            IndexName::from_parts("wase-burp", "ACME Pentest").as_str(),
            "wase-burp-acme-pentest"
        );
        assert_eq!(IndexName::from_parts("wase-burp", "").as_str(), "wase-burp");
        assert_eq!(IndexName::from_parts("wase-burp", "  ").as_str(), "wase-burp");
    }

    #[test]
    fn test_reserved_characters_removed() {
        assert_eq!(
            sanitize_index_name(r#"a:b"c*d+e/f\g|h?i#j>k<l(m)n"#),
            "abcdefghijklmn"
        );
    }

    #[test]
    fn test_leading_dashes_and_underscores_trimmed() {
        assert_eq!(sanitize_index_name("__-Foo"), "foo");
        assert_eq!(sanitize_index_name("(-x)"), "x");
        assert_eq!(sanitize_index_name(" lead"), "lead");
        assert_eq!(sanitize_index_name("mid_dle-ok"), "mid_dle-ok");
    }

    #[test]
    fn test_idempotent() {
        for raw in [
            "Wase Burp - My Project",
            "__(weird)__ name?",
            "-_-_",
            "ÄÖÜ Straße",
            "",
            "already-clean",
        ] {
            let once = sanitize_index_name(raw);
            assert_eq!(sanitize_index_name(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn test_all_reserved_yields_empty() {
        assert!(IndexName::new(":::").is_empty());
    }
}
