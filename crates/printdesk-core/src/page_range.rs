// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page range syntax: `1-3,5,7-9`.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{PrintdeskError, Result};

/// Strict grammar accepted from users in the custom range dialog.
static STRICT_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(-\d+)?)(,\d+(-\d+)?)*$").expect("static regex")
});

/// Loose character-class check applied right before handing a range to the
/// spooler. Anything passing this is safe as a single `lp` argument.
static SPOOLER_SAFE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d,\-]+$").expect("static regex"));

/// A validated page range expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRanges(String);

impl PageRanges {
    /// Parse user text. Surrounding whitespace is ignored, inner whitespace is not.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if STRICT_RANGE.is_match(text) {
            Ok(Self(text.to_string()))
        } else {
            Err(PrintdeskError::Validation(format!(
                "`{text}` is not a page range; use e.g. 1-3,5,7-9"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PageRanges {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether `range` may be passed to the spooler as `page-ranges=<range>`.
pub fn is_spooler_safe(range: &str) -> bool {
    SPOOLER_SAFE.is_match(range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_mixed_ranges() {
        let ranges = PageRanges::parse("1-3,5,7-9").expect("valid");
        assert_eq!(ranges.as_str(), "1-3,5,7-9");
        assert!(PageRanges::parse(" 4 ").is_ok());
    }

    #[test]
    fn rejects_bad_separators_and_words() {
        assert!(PageRanges::parse("1-3;5").is_err());
        assert!(PageRanges::parse("abc").is_err());
        assert!(PageRanges::parse("1,,2").is_err());
        assert!(PageRanges::parse("1-").is_err());
        assert!(PageRanges::parse("").is_err());
        assert!(PageRanges::parse("1, 2").is_err());
    }

    #[test]
    fn spooler_check_is_character_class_only() {
        assert!(is_spooler_safe("1-3,5"));
        assert!(is_spooler_safe("--,"));
        assert!(!is_spooler_safe("1;rm"));
        assert!(!is_spooler_safe(""));
    }
}
