// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Printdesk job orchestrator.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of the user driving a session (chat user id on the transport side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Correlation id for one external job or dispatch, used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of input a document was before conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Pdf,
    /// Anything the office converter understands (word processing,
    /// spreadsheets, presentations, plain and rich text).
    Office,
    Image,
}

impl SourceKind {
    /// Infer the source kind from a file extension (with or without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "odt" | "ods" | "odp" | "txt"
            | "rtf" => Some(Self::Office),
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "tif" | "tiff" | "pnm" => Some(Self::Image),
            _ => None,
        }
    }

    /// Whether the print dialog may offer duplex and booklet modes.
    ///
    /// Photos and scans only ever print one-sided.
    pub fn supports_layout_modes(&self) -> bool {
        matches!(self, Self::Pdf | Self::Office)
    }
}

/// Print mode chosen in the session dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrintMode {
    Normal,
    Duplex,
    Booklet,
}

impl PrintMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Normal => "one-sided",
            Self::Duplex => "double-sided",
            Self::Booklet => "booklet",
        }
    }
}

/// Duplex printing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplexMode {
    Simplex,
    LongEdge,
    ShortEdge,
}

impl DuplexMode {
    /// CUPS/IPP `sides` keyword.
    pub fn sides_keyword(&self) -> &'static str {
        match self {
            Self::Simplex => "one-sided",
            Self::LongEdge => "two-sided-long-edge",
            Self::ShortEdge => "two-sided-short-edge",
        }
    }

    /// PPD `Duplex` option value. Short-edge binding flips the back side
    /// (tumble), which saddle-stitch booklets need.
    pub fn ppd_duplex_keyword(&self) -> &'static str {
        match self {
            Self::Simplex => "None",
            Self::LongEdge => "DuplexNoTumble",
            Self::ShortEdge => "DuplexTumble",
        }
    }
}

/// Standard paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    A5,
    Letter,
}

impl PaperSize {
    /// PPD `PageSize` keyword.
    pub fn ppd_keyword(&self) -> &'static str {
        match self {
            Self::A4 => "A4",
            Self::A5 => "A5",
            Self::Letter => "Letter",
        }
    }

    /// Dimensions in PDF user units (1/72 inch), width then height.
    pub fn dimensions_pt(&self) -> (f32, f32) {
        match self {
            Self::A4 => (595.0, 842.0),
            Self::A5 => (420.0, 595.0),
            Self::Letter => (612.0, 792.0),
        }
    }
}

/// A file handed over by the transport layer, already downloaded locally.
#[derive(Debug, Clone)]
pub struct IncomingArtifact {
    /// Local path of the downloaded file. The transport keeps ownership.
    pub path: PathBuf,
    /// Name the user sent the file under.
    pub original_name: String,
    /// Extension including the leading dot, e.g. `.docx`.
    pub extension: String,
    /// Size declared by the transport, in bytes.
    pub declared_size: u64,
}

impl IncomingArtifact {
    /// Build an incoming artifact from a local file, taking name and
    /// extension from the path itself.
    pub fn from_path(path: impl Into<PathBuf>, declared_size: u64) -> Self {
        let path = path.into();
        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".into());
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
            .unwrap_or_default();
        Self {
            path,
            original_name,
            extension,
            declared_size,
        }
    }
}

/// Result of a stage that may fall back to a lesser-but-usable result.
///
/// `Degraded` is still a success: the value is usable, but something was
/// skipped (grayscale conversion, full print options, trailing scan pages).
#[derive(Debug)]
pub enum StageOutcome<T> {
    Complete(T),
    Degraded { value: T, reason: String },
}

impl<T> StageOutcome<T> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Complete(value) | Self::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Complete(value) | Self::Degraded { value, .. } => value,
        }
    }

    /// The fallback reason, if the stage degraded.
    pub fn degraded_reason(&self) -> Option<&str> {
        match self {
            Self::Complete(_) => None,
            Self::Degraded { reason, .. } => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_routing() {
        assert_eq!(SourceKind::from_extension(".PDF"), Some(SourceKind::Pdf));
        assert_eq!(SourceKind::from_extension("docx"), Some(SourceKind::Office));
        assert_eq!(SourceKind::from_extension(".txt"), Some(SourceKind::Office));
        assert_eq!(SourceKind::from_extension(".jpeg"), Some(SourceKind::Image));
        assert_eq!(SourceKind::from_extension(".exe"), None);
        assert_eq!(SourceKind::from_extension(""), None);
    }

    #[test]
    fn images_only_print_one_sided() {
        assert!(!SourceKind::Image.supports_layout_modes());
        assert!(SourceKind::Office.supports_layout_modes());
    }

    #[test]
    fn booklet_duplex_uses_tumble() {
        assert_eq!(DuplexMode::ShortEdge.sides_keyword(), "two-sided-short-edge");
        assert_eq!(DuplexMode::ShortEdge.ppd_duplex_keyword(), "DuplexTumble");
        assert_eq!(DuplexMode::LongEdge.ppd_duplex_keyword(), "DuplexNoTumble");
    }

    #[test]
    fn incoming_artifact_from_path() {
        let artifact = IncomingArtifact::from_path("/tmp/Report.DOCX", 42);
        assert_eq!(artifact.original_name, "Report.DOCX");
        assert_eq!(artifact.extension, ".docx");
        assert_eq!(artifact.declared_size, 42);
    }

    #[test]
    fn degraded_outcome_keeps_value() {
        let outcome = StageOutcome::Degraded {
            value: 7,
            reason: "gs failed".into(),
        };
        assert!(outcome.is_degraded());
        assert_eq!(outcome.degraded_reason(), Some("gs failed"));
        assert_eq!(outcome.into_value(), 7);
    }
}
