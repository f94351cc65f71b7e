// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SANE acquisition through `scanimage`.
//
// Single scans use the flatbed; batch scans pull from the document feeder
// into a numbered file pattern. A feeder run that fails part-way keeps the
// pages it already produced.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use printdesk_core::artifact::TEMP_PREFIX;
use printdesk_core::config::ScannerConfig;
use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::{AppConfig, OwnedArtifact, StageOutcome};
use printdesk_exec::{CommandRunner, CommandSpec};
use regex::Regex;
use tracing::{debug, info, instrument, warn};

const LIST_TIMEOUT: Duration = Duration::from_secs(30);
const SINGLE_TIMEOUT: Duration = Duration::from_secs(120);
const BATCH_TIMEOUT: Duration = Duration::from_secs(600);

/// Name of the file some backends write instead of following the pattern.
const UNNUMBERED_BATCH_FILE: &str = "scan.pnm";

static DEVICE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"device\s+`([^']+)'").expect("device regex is valid"));

/// First device name in `scanimage -L` output.
pub fn parse_device_listing(listing: &str) -> Option<String> {
    DEVICE_LINE
        .captures(listing)
        .map(|caps| caps[1].to_string())
}

pub struct ScanAcquirer {
    runner: Arc<dyn CommandRunner>,
    scanimage: String,
    settings: ScannerConfig,
    work_dir: PathBuf,
}

impl ScanAcquirer {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &AppConfig) -> Self {
        Self {
            runner,
            scanimage: config.tools.scanimage.clone(),
            settings: config.scanner.clone(),
            work_dir: config.work_dir(),
        }
    }

    /// Ask SANE for attached devices. Any failure falls back to the
    /// configured default device.
    pub async fn detect_device(&self) -> String {
        let spec = CommandSpec::new(&self.scanimage, "scanner detection", LIST_TIMEOUT).arg("-L");
        match self.runner.run(&spec).await {
            Ok(output) => match parse_device_listing(&output.stdout) {
                Some(device) => {
                    debug!(device = %device, "scanner detected");
                    device
                }
                None => {
                    warn!(fallback = %self.settings.default_device, "no scanner listed, using default");
                    self.settings.default_device.clone()
                }
            },
            Err(e) => {
                warn!(error = %e, fallback = %self.settings.default_device, "scanner detection failed, using default");
                self.settings.default_device.clone()
            }
        }
    }

    fn base_command(&self, device: &str, description: &str, timeout: Duration) -> CommandSpec {
        CommandSpec::new(&self.scanimage, description, timeout)
            .option("-d", device)
            .option("--format", &self.settings.format)
            .option("--resolution", self.settings.resolution.to_string())
            .option("--mode", &self.settings.mode)
    }

    /// One page from the flatbed.
    #[instrument(skip_all)]
    pub async fn acquire_single(&self) -> Result<OwnedArtifact> {
        let device = self.detect_device().await;
        let suffix = format!(".{}", self.settings.format);
        // Reserve the output name up front so every exit path removes it.
        let page = OwnedArtifact::write_new(&self.work_dir, &suffix, &[])?;

        let spec = self
            .base_command(&device, "flatbed scan", SINGLE_TIMEOUT)
            .option("--source", "Flatbed")
            .arg("--progress")
            .option("-o", page.path());
        info!(device = %device, "starting flatbed scan");
        self.runner.run(&spec).await.map_err(scan_failure)?;

        let produced = std::fs::metadata(page.path()).map(|m| m.len()).unwrap_or(0);
        if produced == 0 {
            return Err(PrintdeskError::Scan("the scanner produced no image".into()));
        }
        info!(bytes = produced, "flatbed scan finished");
        Ok(page)
    }

    /// Feed pages from the document feeder, up to the configured limit.
    ///
    /// Returns `Degraded` when the scanner failed after producing at least
    /// one page; fails only when no page was produced.
    #[instrument(skip_all)]
    pub async fn acquire_batch(&self) -> Result<StageOutcome<Vec<OwnedArtifact>>> {
        let device = self.detect_device().await;
        let stage = tempfile::Builder::new()
            .prefix(&format!("{TEMP_PREFIX}scan_"))
            .tempdir_in(&self.work_dir)?;
        let pattern = stage.path().join(format!("scan_%d.{}", self.settings.format));
        let limit = self.settings.batch_limit as usize;

        let spec = self
            .base_command(&device, "batch scan", BATCH_TIMEOUT)
            .option("--source", "ADF")
            .option("--batch", &pattern)
            .option("--batch-start", "1")
            .option("--batch-increment", "1")
            .option("--batch-count", limit.to_string());
        info!(device = %device, limit, "starting feeder scan");
        let result = self.runner.run(&spec).await;

        let produced = collect_batch_pages(stage.path(), &self.settings.format, limit);
        let suffix = format!(".{}", self.settings.format);
        let pages = produced
            .iter()
            .map(|p| OwnedArtifact::take_from(p, &self.work_dir, &suffix))
            .collect::<Result<Vec<_>>>()?;

        match result {
            Ok(_) if pages.is_empty() => Err(PrintdeskError::Scan(
                "the scanner returned no documents".into(),
            )),
            Ok(_) => {
                info!(pages = pages.len(), "feeder scan finished");
                Ok(StageOutcome::Complete(pages))
            }
            Err(e) if pages.is_empty() => Err(scan_failure(e)),
            Err(e) => {
                warn!(pages = pages.len(), error = %e, "feeder scan stopped early, keeping scanned pages");
                Ok(StageOutcome::Degraded {
                    value: pages,
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// Numbered pages from 1 up to the first missing or empty file, never more
/// than `limit`. Falls back to the unnumbered file when none are numbered.
fn collect_batch_pages(dir: &Path, format: &str, limit: usize) -> Vec<PathBuf> {
    let mut pages = Vec::new();
    for n in 1..=limit {
        let candidate = dir.join(format!("scan_{n}.{format}"));
        if !is_non_empty(&candidate) {
            break;
        }
        pages.push(candidate);
    }
    if pages.is_empty() {
        let unnumbered = dir.join(UNNUMBERED_BATCH_FILE);
        if is_non_empty(&unnumbered) {
            pages.push(unnumbered);
        }
    }
    pages
}

fn is_non_empty(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}

fn scan_failure(err: PrintdeskError) -> PrintdeskError {
    match err {
        scan @ PrintdeskError::Scan(_) => scan,
        other => PrintdeskError::Scan(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printdesk_exec::stub::{ScriptedRunner, Step};

    const LISTING: &str =
        "device `xerox_mfp:libusb:001:005' is a Samsung SCX-4x21 Series multi-function peripheral\n";

    fn acquirer(runner: Arc<ScriptedRunner>, work_dir: &Path) -> ScanAcquirer {
        let config = AppConfig {
            work_dir: Some(work_dir.to_path_buf()),
            ..AppConfig::default()
        };
        ScanAcquirer::new(runner, &config)
    }

    fn leftover_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).expect("read_dir").count()
    }

    #[test]
    fn listing_parse() {
        assert_eq!(
            parse_device_listing(LISTING).as_deref(),
            Some("xerox_mfp:libusb:001:005")
        );
        assert_eq!(parse_device_listing("No scanners were identified."), None);
        assert_eq!(
            parse_device_listing("device \t `epson2:net:192.168.1.20'  is an Epson flatbed").as_deref(),
            Some("epson2:net:192.168.1.20")
        );
    }

    #[tokio::test]
    async fn detection_failure_falls_back_to_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = Arc::new(ScriptedRunner::with_steps([Step::spawn_failure()]));
        let device = acquirer(runner, dir.path()).detect_device().await;
        assert_eq!(device, "xerox_mfp:libusb:001:004");
    }

    #[tokio::test]
    async fn flatbed_scan_returns_owned_page() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = Arc::new(ScriptedRunner::with_steps([
            Step::ok_with_stdout(LISTING),
            Step::ok().writes_arg("-o", b"P4\n1 1\n\x00".to_vec()),
        ]));
        let page = acquirer(runner.clone(), dir.path())
            .acquire_single()
            .await
            .expect("scan");

        assert!(page.len().expect("len") > 0);
        let scan = &runner.calls()[1];
        assert_eq!(scan.value_after("-d"), Some("xerox_mfp:libusb:001:005"));
        assert_eq!(scan.value_after("--source"), Some("Flatbed"));
        assert_eq!(scan.value_after("--resolution"), Some("600"));
        assert_eq!(scan.value_after("--mode"), Some("Lineart"));
        assert_eq!(scan.timeout, Duration::from_secs(120));

        drop(page);
        assert_eq!(leftover_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn flatbed_scan_without_image_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = Arc::new(ScriptedRunner::with_steps([Step::ok_with_stdout(LISTING), Step::ok()]));
        let result = acquirer(runner, dir.path()).acquire_single().await;
        assert!(matches!(result, Err(PrintdeskError::Scan(_))));
        assert_eq!(leftover_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn feeder_failure_keeps_pages_already_scanned() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = Arc::new(ScriptedRunner::with_steps([
            Step::ok_with_stdout(LISTING),
            Step::exit(7, "scanimage: sane_read: Error during device I/O")
                .writes_batch_pages(3, b"P4".to_vec()),
        ]));
        let outcome = acquirer(runner.clone(), dir.path())
            .acquire_batch()
            .await
            .expect("partial batch");

        assert!(outcome.is_degraded());
        assert!(outcome.degraded_reason().unwrap_or_default().contains("device I/O"));
        assert_eq!(outcome.value().len(), 3);

        let batch = &runner.calls()[1];
        assert_eq!(batch.value_after("--source"), Some("ADF"));
        assert_eq!(batch.value_after("--batch-count"), Some("50"));
        assert_eq!(batch.timeout, Duration::from_secs(600));

        drop(outcome);
        // Pages and the stage directory are both gone.
        assert_eq!(leftover_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn numbering_gap_ends_the_batch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let gap = Step::ok().with_effect(Box::new(|spec: &CommandSpec| {
            let pattern = spec.value_after("--batch").unwrap_or_default();
            std::fs::write(pattern.replace("%d", "1"), b"P4")?;
            std::fs::write(pattern.replace("%d", "2"), b"")?;
            std::fs::write(pattern.replace("%d", "3"), b"P4")
        }));
        let runner = Arc::new(ScriptedRunner::with_steps([Step::ok_with_stdout(LISTING), gap]));
        let outcome = acquirer(runner, dir.path())
            .acquire_batch()
            .await
            .expect("batch");
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.value().len(), 1);
    }

    #[tokio::test]
    async fn unnumbered_output_is_accepted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let single = Step::ok().with_effect(Box::new(|spec: &CommandSpec| {
            let pattern = PathBuf::from(spec.value_after("--batch").unwrap_or_default());
            let parent = pattern.parent().unwrap_or(Path::new("."));
            std::fs::write(parent.join("scan.pnm"), b"P4")
        }));
        let runner = Arc::new(ScriptedRunner::with_steps([Step::ok_with_stdout(LISTING), single]));
        let outcome = acquirer(runner, dir.path())
            .acquire_batch()
            .await
            .expect("batch");
        assert_eq!(outcome.value().len(), 1);
    }

    #[tokio::test]
    async fn empty_feeder_timeout_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = Arc::new(ScriptedRunner::with_steps([Step::ok_with_stdout(LISTING), Step::timeout()]));
        match acquirer(runner, dir.path()).acquire_batch().await {
            Err(PrintdeskError::Scan(detail)) => assert!(detail.contains("timed out"), "{detail}"),
            other => panic!("expected scan failure, got {other:?}"),
        }
        assert_eq!(leftover_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn batch_never_exceeds_limit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig {
            work_dir: Some(dir.path().to_path_buf()),
            scanner: ScannerConfig {
                batch_limit: 2,
                ..ScannerConfig::default()
            },
            ..AppConfig::default()
        };
        let runner = Arc::new(ScriptedRunner::with_steps([
            Step::ok_with_stdout(LISTING),
            Step::ok().writes_batch_pages(4, b"P4".to_vec()),
        ]));
        let outcome = ScanAcquirer::new(runner, &config)
            .acquire_batch()
            .await
            .expect("batch");
        assert_eq!(outcome.value().len(), 2);
    }
}
