//! Package identifier parsing and classification
//!
//! Identifiers are slash-delimited, globally-scoped string tokens such as
//! `acme/tools/fmt` or `acme/store/v2`. The identifier is the node key for
//! every graph and cache operation; the derived short name is presentation
//! only and is allowed to collide across identifiers.

use std::fmt;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Declared package name that always marks a command (program entry) package.
pub const ENTRY_NAME: &str = "main";

/// Path segment that marks every package at or below it as access-restricted.
pub const RESTRICTED_SEGMENT: &str = "internal";

/// Declared-name suffix for the auxiliary test-only package sharing a directory.
pub const TEST_SUFFIX: &str = "_test";

/// Trailing identifier segment that expands to all packages under the prefix.
pub const WILDCARD_SEGMENT: &str = "...";

/// Errors for identifier parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentError {
    #[error("empty identifier")]
    Empty,

    #[error("identifier has empty segment: {0:?}")]
    EmptySegment(String),

    #[error("wildcard segment must be last: {0:?}")]
    WildcardNotLast(String),
}

/// A parsed, validated package identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageIdent(String);

impl PackageIdent {
    /// Parse an identifier, validating segment structure.
    pub fn parse(raw: &str) -> Result<Self, IdentError> {
        if raw.is_empty() {
            return Err(IdentError::Empty);
        }

        let segments: Vec<&str> = raw.split('/').collect();
        for seg in &segments {
            if seg.is_empty() {
                return Err(IdentError::EmptySegment(raw.to_string()));
            }
        }

        // `...` may only appear as the final segment
        if let Some(pos) = segments.iter().position(|s| *s == WILDCARD_SEGMENT) {
            if pos != segments.len() - 1 {
                return Err(IdentError::WildcardNotLast(raw.to_string()));
            }
        }

        Ok(Self(raw.to_string()))
    }

    /// The raw identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Slash-delimited segments, in order.
    pub fn segments(&self) -> Vec<&str> {
        self.0.split('/').collect()
    }

    /// Whether this identifier is a wildcard pattern (`prefix/...`).
    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD_SEGMENT || self.0.ends_with(&format!("/{}", WILDCARD_SEGMENT))
    }

    /// The prefix of a wildcard pattern, or None for `...` alone (match all).
    pub fn wildcard_prefix(&self) -> Option<&str> {
        if !self.is_wildcard() {
            return None;
        }
        if self.0 == WILDCARD_SEGMENT {
            Some("")
        } else {
            Some(&self.0[..self.0.len() - WILDCARD_SEGMENT.len() - 1])
        }
    }

    /// Default short name: last segment, with a trailing version-suffix
    /// segment (`v2`, `v3`, ...) stripped.
    ///
    /// `acme/fmt` -> `fmt`; `acme/store/v2` -> `store`; `v2` -> `v2`
    /// (a bare version segment has no preceding segment to fall back to).
    pub fn short_name(&self) -> &str {
        let segments = self.segments();
        let last = segments[segments.len() - 1];
        if segments.len() > 1 && is_version_segment(last) {
            segments[segments.len() - 2]
        } else {
            last
        }
    }

    /// Whether any segment equals the restricted-access token.
    pub fn is_restricted(&self) -> bool {
        self.segments().iter().any(|s| *s == RESTRICTED_SEGMENT)
    }

    /// Identifier prefix of the permitted-importer subtree for a restricted
    /// identifier: everything before the first restricted segment.
    ///
    /// `x/internal/y` -> `x`; `internal/y` -> `` (whole workspace).
    pub fn permitted_root(&self) -> Option<String> {
        let segments = self.segments();
        let pos = segments.iter().position(|s| *s == RESTRICTED_SEGMENT)?;
        Some(segments[..pos].join("/"))
    }

    /// Join a child segment onto this identifier.
    pub fn join(&self, segment: &str) -> PackageIdent {
        PackageIdent(format!("{}/{}", self.0, segment))
    }
}

impl fmt::Display for PackageIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a segment matches the version-suffix convention (`v1`, `v2`, ...).
pub fn is_version_segment(segment: &str) -> bool {
    let re = Regex::new(r"^v[0-9]+$").unwrap();
    re.is_match(segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(PackageIdent::parse(""), Err(IdentError::Empty));
    }

    #[test]
    fn test_parse_rejects_empty_segments() {
        assert!(matches!(
            PackageIdent::parse("a//b"),
            Err(IdentError::EmptySegment(_))
        ));
        assert!(matches!(
            PackageIdent::parse("/a"),
            Err(IdentError::EmptySegment(_))
        ));
        assert!(matches!(
            PackageIdent::parse("a/"),
            Err(IdentError::EmptySegment(_))
        ));
    }

    #[test]
    fn test_parse_rejects_interior_wildcard() {
        assert!(matches!(
            PackageIdent::parse("a/.../b"),
            Err(IdentError::WildcardNotLast(_))
        ));
    }

    #[test]
    fn test_short_name_last_segment() {
        let ident = PackageIdent::parse("acme/tools/fmt").unwrap();
        assert_eq!(ident.short_name(), "fmt");
    }

    #[test]
    fn test_short_name_strips_version_suffix() {
        let ident = PackageIdent::parse("acme/store/v2").unwrap();
        assert_eq!(ident.short_name(), "store");

        let ident = PackageIdent::parse("acme/store/v12").unwrap();
        assert_eq!(ident.short_name(), "store");
    }

    #[test]
    fn test_short_name_bare_version_segment() {
        let ident = PackageIdent::parse("v2").unwrap();
        assert_eq!(ident.short_name(), "v2");
    }

    #[test]
    fn test_version_segment_pattern() {
        assert!(is_version_segment("v1"));
        assert!(is_version_segment("v42"));
        assert!(!is_version_segment("v"));
        assert!(!is_version_segment("v1a"));
        assert!(!is_version_segment("version2"));
    }

    #[test]
    fn test_wildcard_detection() {
        let pattern = PackageIdent::parse("acme/...").unwrap();
        assert!(pattern.is_wildcard());
        assert_eq!(pattern.wildcard_prefix(), Some("acme"));

        let all = PackageIdent::parse("...").unwrap();
        assert!(all.is_wildcard());
        assert_eq!(all.wildcard_prefix(), Some(""));

        let plain = PackageIdent::parse("acme/fmt").unwrap();
        assert!(!plain.is_wildcard());
        assert_eq!(plain.wildcard_prefix(), None);
    }

    #[test]
    fn test_restricted_marking() {
        let ident = PackageIdent::parse("x/internal/y").unwrap();
        assert!(ident.is_restricted());
        assert_eq!(ident.permitted_root(), Some("x".to_string()));

        let top = PackageIdent::parse("internal/y").unwrap();
        assert!(top.is_restricted());
        assert_eq!(top.permitted_root(), Some(String::new()));

        let open = PackageIdent::parse("x/y").unwrap();
        assert!(!open.is_restricted());
        assert_eq!(open.permitted_root(), None);
    }

    #[test]
    fn test_restricted_uses_first_marker() {
        let ident = PackageIdent::parse("a/internal/b/internal/c").unwrap();
        assert_eq!(ident.permitted_root(), Some("a".to_string()));
    }
}
