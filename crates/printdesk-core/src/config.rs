// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PrintdeskError, Result};

/// Subdirectory of the work directory that holds session PDFs.
pub const SESSION_DIR_NAME: &str = "printdesk_sessions";

/// Persistent application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// CUPS queue name passed to `lp -d`.
    pub printer_name: String,
    /// Paper size for every print job.
    pub paper_size: crate::PaperSize,
    /// Convert canonical PDFs to grayscale before printing.
    pub grayscale: bool,
    pub booklet: BookletConfig,
    pub scanner: ScannerConfig,
    pub tools: ToolPaths,
    /// Largest accepted upload, in bytes.
    pub max_file_size: u64,
    /// Seconds to wait after SIGTERM before killing a timed-out child.
    pub process_grace_secs: u64,
    /// Where stage directories and owned artifacts live. `None` means the
    /// system temp directory.
    pub work_dir: Option<PathBuf>,
    /// Where finished scans are delivered. `None` means `<data_dir>/scans`.
    pub scan_output_dir: Option<PathBuf>,
    /// Temp files older than this are removed by the sweeper.
    pub sweep_max_age_secs: u64,
    pub sweep_interval_secs: u64,
    /// User id the console transport acts as.
    pub console_user_id: i64,
}

/// Saddle-stitch booklet policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookletConfig {
    /// Sheets folded together into one signature.
    pub sheets_per_signature: u32,
    /// Documents with fewer pages than this always form a single signature.
    pub single_signature_below_pages: u32,
}

/// SANE acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Used when `scanimage -L` finds nothing.
    pub default_device: String,
    pub format: String,
    pub resolution: u32,
    pub mode: String,
    /// Upper bound on pages pulled from the feeder in one batch.
    pub batch_limit: u32,
}

/// External tool binaries. Plain names are resolved through `PATH`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub libreoffice: String,
    pub img2pdf: String,
    pub ghostscript: String,
    pub lp: String,
    pub scanimage: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            printer_name: "Xerox_WorkCentre_3220".into(),
            paper_size: crate::PaperSize::A4,
            grayscale: true,
            booklet: BookletConfig::default(),
            scanner: ScannerConfig::default(),
            tools: ToolPaths::default(),
            max_file_size: 20 * 1024 * 1024,
            process_grace_secs: 5,
            work_dir: None,
            scan_output_dir: None,
            sweep_max_age_secs: 3600,
            sweep_interval_secs: 600,
            console_user_id: 1,
        }
    }
}

impl Default for BookletConfig {
    fn default() -> Self {
        Self {
            sheets_per_signature: 5,
            single_signature_below_pages: 29,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            default_device: "xerox_mfp:libusb:001:004".into(),
            format: "pnm".into(),
            resolution: 600,
            mode: "Lineart".into(),
            batch_limit: 50,
        }
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            libreoffice: "libreoffice".into(),
            img2pdf: "img2pdf".into(),
            ghostscript: "gs".into(),
            lp: "lp".into(),
            scanimage: "scanimage".into(),
        }
    }
}

impl AppConfig {
    /// Reject settings the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.printer_name.trim().is_empty() {
            return Err(PrintdeskError::Config("printer_name must not be empty".into()));
        }
        if self.booklet.sheets_per_signature == 0 {
            return Err(PrintdeskError::Config(
                "booklet.sheets_per_signature must be at least 1".into(),
            ));
        }
        if self.scanner.batch_limit == 0 {
            return Err(PrintdeskError::Config("scanner.batch_limit must be at least 1".into()));
        }
        if self.max_file_size == 0 {
            return Err(PrintdeskError::Config("max_file_size must be positive".into()));
        }
        Ok(())
    }

    pub fn process_grace(&self) -> Duration {
        Duration::from_secs(self.process_grace_secs)
    }

    pub fn sweep_max_age(&self) -> Duration {
        Duration::from_secs(self.sweep_max_age_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Resolved work directory.
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Home of the PDFs held by open sessions. The periodic sweep only
    /// covers the work directory itself, so files here are cleaned up at
    /// startup alone.
    pub fn session_dir(&self) -> PathBuf {
        self.work_dir().join(SESSION_DIR_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.booklet.sheets_per_signature, 5);
        assert_eq!(config.scanner.batch_limit, 50);
        assert_eq!(config.max_file_size, 20 * 1024 * 1024);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"printer_name": "Office", "booklet": {"sheets_per_signature": 4}}"#)
                .expect("parse");
        assert_eq!(config.printer_name, "Office");
        assert_eq!(config.booklet.sheets_per_signature, 4);
        assert_eq!(config.booklet.single_signature_below_pages, 29);
        assert_eq!(config.tools.lp, "lp");
    }

    #[test]
    fn session_dir_sits_inside_work_dir() {
        let config = AppConfig {
            work_dir: Some(PathBuf::from("/var/spool/printdesk")),
            ..AppConfig::default()
        };
        assert_eq!(config.session_dir(), PathBuf::from("/var/spool/printdesk/printdesk_sessions"));
    }

    #[test]
    fn zero_sheets_rejected() {
        let mut config = AppConfig::default();
        config.booklet.sheets_per_signature = 0;
        assert!(matches!(config.validate(), Err(PrintdeskError::Config(_))));
    }
}
