// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversion pipeline: turn an uploaded file into a canonical (grayscale) PDF.
//
// Routing by source kind:
//   pdf    -> [grayscale]
//   office -> libreoffice -> [grayscale]
//   image  -> img2pdf     -> [grayscale]
//
// Every stage runs in its own temp directory against a private copy of its
// input and hands its result out as a fresh `OwnedArtifact`. Grayscale is the
// only stage allowed to fail softly.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use printdesk_core::artifact::TEMP_PREFIX;
use printdesk_core::config::ToolPaths;
use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::status::{StatusSink, notify};
use printdesk_core::{OwnedArtifact, SourceKind, StageOutcome};
use printdesk_exec::{CommandRunner, CommandSpec};
use tempfile::TempDir;
use tracing::{info, instrument, warn};

const OFFICE_BASE_TIMEOUT: Duration = Duration::from_secs(90);
const OFFICE_TIMEOUT_PER_MIB: Duration = Duration::from_secs(8);
const IMAGE_TIMEOUT: Duration = Duration::from_secs(45);
const IMAGE_BATCH_TIMEOUT: Duration = Duration::from_secs(60);
const GRAYSCALE_TIMEOUT: Duration = Duration::from_secs(60);

/// Ghostscript output below this size means it silently failed.
pub const MIN_GRAYSCALE_BYTES: u64 = 1024;

/// Office conversion deadline: 90s plus 8s per whole MiB of input.
pub fn office_timeout(input_bytes: u64) -> Duration {
    let mib = u32::try_from(input_bytes / (1024 * 1024)).unwrap_or(u32::MAX);
    OFFICE_BASE_TIMEOUT + OFFICE_TIMEOUT_PER_MIB.saturating_mul(mib)
}

/// Drives the external converters.
pub struct ConversionPipeline {
    runner: Arc<dyn CommandRunner>,
    tools: ToolPaths,
    work_dir: PathBuf,
}

impl ConversionPipeline {
    pub fn new(runner: Arc<dyn CommandRunner>, tools: ToolPaths, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            tools,
            work_dir: work_dir.into(),
        }
    }

    /// Produce the canonical PDF for `input`.
    ///
    /// `extension` is the original extension (with or without dot) and picks
    /// the route. The caller's file is never modified.
    #[instrument(skip_all, fields(input = %input.display(), extension, grayscale))]
    pub async fn to_canonical_pdf(
        &self,
        input: &Path,
        extension: &str,
        grayscale: bool,
        status: &dyn StatusSink,
    ) -> Result<StageOutcome<OwnedArtifact>> {
        let kind = SourceKind::from_extension(extension)
            .ok_or_else(|| PrintdeskError::UnsupportedDocument(extension.to_string()))?;
        info!(?kind, grayscale, "converting to canonical PDF");

        let pdf = match kind {
            SourceKind::Pdf => OwnedArtifact::copy_of(input, &self.work_dir, ".pdf")?,
            SourceKind::Office => self.office_to_pdf(input, extension, status).await?,
            SourceKind::Image => self.images_to_pdf(&[input], status).await?,
        };

        if grayscale {
            Ok(self.to_grayscale(pdf, status).await)
        } else {
            Ok(StageOutcome::Complete(pdf))
        }
    }

    /// Convert an office or text document through the office suite.
    ///
    /// The converter picks its import filter from the file name, so the
    /// working copy is named after `extension` rather than after `input`.
    pub async fn office_to_pdf(
        &self,
        input: &Path,
        extension: &str,
        status: &dyn StatusSink,
    ) -> Result<OwnedArtifact> {
        notify(status, "Converting the document to PDF...").await;
        let stage = self.stage_dir("office")?;

        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        let copy = stage.path().join(format!("document.{extension}"));
        std::fs::copy(input, &copy)?;
        let size = std::fs::metadata(&copy)?.len();

        let spec = CommandSpec::new(&self.tools.libreoffice, "office conversion", office_timeout(size))
            .args(["--headless", "--convert-to", "pdf", "--outdir"])
            .arg(stage.path())
            .arg(&copy);
        self.runner.run(&spec).await.map_err(conversion_failure)?;

        let produced = stage.path().join("document.pdf");
        if !produced.is_file() {
            return Err(PrintdeskError::Conversion(
                "office converter finished but produced no PDF".into(),
            ));
        }
        OwnedArtifact::take_from(&produced, &self.work_dir, ".pdf")
    }

    /// Pack one or more images into a PDF, one page each, in order.
    pub async fn images_to_pdf(&self, inputs: &[&Path], status: &dyn StatusSink) -> Result<OwnedArtifact> {
        if inputs.is_empty() {
            return Err(PrintdeskError::Conversion("no images to convert".into()));
        }
        notify(status, "Converting the image to PDF...").await;
        let stage = self.stage_dir("image")?;

        let mut copies = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.iter().enumerate() {
            let extension = input
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_else(|| "img".into());
            let copy = stage.path().join(format!("page_{:03}.{extension}", index + 1));
            std::fs::copy(input, &copy)?;
            copies.push(copy);
        }

        let output = stage.path().join("images.pdf");
        let timeout = if inputs.len() > 1 { IMAGE_BATCH_TIMEOUT } else { IMAGE_TIMEOUT };
        let spec = CommandSpec::new(&self.tools.img2pdf, "image conversion", timeout)
            .args(&copies)
            .arg("--output")
            .arg(&output);
        self.runner.run(&spec).await.map_err(conversion_failure)?;

        match std::fs::metadata(&output) {
            Ok(meta) if meta.len() > 0 => OwnedArtifact::take_from(&output, &self.work_dir, ".pdf"),
            _ => Err(PrintdeskError::Conversion(
                "image converter produced no output".into(),
            )),
        }
    }

    /// Rewrite `pdf` in grayscale. Never fails: on any problem the original
    /// comes back as a degraded result.
    pub async fn to_grayscale(&self, pdf: OwnedArtifact, status: &dyn StatusSink) -> StageOutcome<OwnedArtifact> {
        notify(status, "Converting to grayscale...").await;
        match self.try_grayscale(&pdf).await {
            Ok(gray) => StageOutcome::Complete(gray),
            Err(e) => {
                warn!(error = %e, pdf = %pdf.path().display(), "grayscale conversion failed, keeping original");
                notify(status, "Grayscale conversion failed, the original PDF will be used.").await;
                StageOutcome::Degraded {
                    value: pdf,
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn try_grayscale(&self, pdf: &OwnedArtifact) -> Result<OwnedArtifact> {
        let stage = self.stage_dir("gray")?;
        let output = stage.path().join("gray.pdf");

        let spec = CommandSpec::new(&self.tools.ghostscript, "grayscale conversion", GRAYSCALE_TIMEOUT)
            .args([
                "-q",
                "-sDEVICE=pdfwrite",
                "-dCompatibilityLevel=1.4",
                "-dPDFSETTINGS=/printer",
                "-sProcessColorModel=DeviceGray",
                "-sColorConversionStrategy=Gray",
                "-dNOPAUSE",
                "-dBATCH",
            ])
            .arg(format!("-sOutputFile={}", output.display()))
            .arg(pdf.path());
        self.runner.run(&spec).await?;

        let size = std::fs::metadata(&output).map(|m| m.len()).unwrap_or(0);
        if size < MIN_GRAYSCALE_BYTES {
            return Err(PrintdeskError::Conversion(format!(
                "grayscale output is only {size} bytes"
            )));
        }
        OwnedArtifact::take_from(&output, &self.work_dir, ".pdf")
    }

    fn stage_dir(&self, stage: &str) -> Result<TempDir> {
        Ok(tempfile::Builder::new()
            .prefix(&format!("{TEMP_PREFIX}{stage}_"))
            .tempdir_in(&self.work_dir)?)
    }
}

fn conversion_failure(err: PrintdeskError) -> PrintdeskError {
    match err {
        PrintdeskError::ProcessNonZeroExit { description, code, stderr } => {
            let detail = stderr.lines().last().unwrap_or("").trim().to_string();
            let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
            PrintdeskError::Conversion(format!("{description} failed (exit {code}): {detail}"))
        }
        other => PrintdeskError::Conversion(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printdesk_core::status::NullStatus;
    use printdesk_exec::stub::{ScriptedRunner, Step};

    fn gray_pdf() -> Vec<u8> {
        let mut bytes = b"%PDF-1.4 gray\n".to_vec();
        bytes.resize(2048, b' ');
        bytes
    }

    fn pipeline(runner: Arc<ScriptedRunner>, dir: &Path) -> ConversionPipeline {
        ConversionPipeline::new(runner, ToolPaths::default(), dir)
    }

    fn prefixed_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .expect("read_dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_PREFIX))
            .count()
    }

    #[test]
    fn office_timeout_scales_with_size() {
        assert_eq!(office_timeout(0), Duration::from_secs(90));
        assert_eq!(office_timeout(1024 * 1024 - 1), Duration::from_secs(90));
        assert_eq!(office_timeout(3 * 1024 * 1024 + 5), Duration::from_secs(114));
    }

    #[tokio::test]
    async fn unsupported_extension_runs_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = Arc::new(ScriptedRunner::new());
        let input = dir.path().join("tool.exe");
        std::fs::write(&input, b"MZ").expect("write");

        let result = pipeline(runner.clone(), dir.path())
            .to_canonical_pdf(&input, ".exe", true, &NullStatus)
            .await;
        assert!(matches!(result, Err(PrintdeskError::UnsupportedDocument(_))));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn office_document_goes_through_both_stages() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("Report.docx");
        std::fs::write(&input, b"PK fake docx").expect("write");

        let runner = Arc::new(ScriptedRunner::with_steps([
            Step::ok().writes_office_pdf(b"%PDF-1.4 colour".to_vec()),
            Step::ok().writes_arg("-sOutputFile=", gray_pdf()),
        ]));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();

        let outcome = pipeline(runner.clone(), dir.path())
            .to_canonical_pdf(&input, ".docx", true, &tx)
            .await
            .expect("convert");

        assert!(!outcome.is_degraded());
        assert_eq!(std::fs::read(outcome.value().path()).expect("read"), gray_pdf());
        assert_eq!(runner.programs(), ["libreoffice", "gs"]);

        let office = &runner.calls()[0];
        assert_eq!(office.timeout, Duration::from_secs(90));
        assert_ne!(office.args.last().map(PathBuf::from), Some(input.clone()));

        assert_eq!(rx.recv().await.as_deref(), Some("Converting the document to PDF..."));
        assert_eq!(rx.recv().await.as_deref(), Some("Converting to grayscale..."));
        assert!(input.exists());
    }

    #[tokio::test]
    async fn stored_upload_without_extension_keeps_its_format() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("upload_4711");
        std::fs::write(&input, b"PK fake docx").expect("write");
        let runner = Arc::new(ScriptedRunner::with_steps([
            Step::ok().writes_office_pdf(b"%PDF-1.4".to_vec()),
        ]));

        pipeline(runner.clone(), dir.path())
            .to_canonical_pdf(&input, ".DOCX", false, &NullStatus)
            .await
            .expect("convert");

        let office = &runner.calls()[0];
        let copy = PathBuf::from(office.args.last().expect("input arg"));
        assert_eq!(copy.file_name().and_then(|n| n.to_str()), Some("document.docx"));
    }

    #[tokio::test]
    async fn missing_office_output_is_conversion_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("sheet.xlsx");
        std::fs::write(&input, b"PK").expect("write");
        let runner = Arc::new(ScriptedRunner::with_steps([Step::ok()]));

        let result = pipeline(runner, dir.path())
            .to_canonical_pdf(&input, "xlsx", true, &NullStatus)
            .await;
        assert!(matches!(result, Err(PrintdeskError::Conversion(_))));
        assert_eq!(prefixed_entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn office_exit_code_becomes_conversion_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("slides.pptx");
        std::fs::write(&input, b"PK").expect("write");
        let runner = Arc::new(ScriptedRunner::with_steps([Step::exit(81, "Error: source file could not be loaded")]));

        match pipeline(runner, dir.path())
            .to_canonical_pdf(&input, ".pptx", false, &NullStatus)
            .await
        {
            Err(PrintdeskError::Conversion(msg)) => {
                assert!(msg.contains("exit 81"), "{msg}");
                assert!(msg.contains("could not be loaded"), "{msg}");
            }
            other => panic!("expected conversion failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn grayscale_failure_returns_original_pdf() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("scan.pdf");
        std::fs::write(&input, b"%PDF-1.4 original").expect("write");
        let runner = Arc::new(ScriptedRunner::with_steps([Step::exit(1, "gs: unrecoverable error")]));

        let outcome = pipeline(runner, dir.path())
            .to_canonical_pdf(&input, ".pdf", true, &NullStatus)
            .await
            .expect("degraded is still success");

        assert!(outcome.is_degraded());
        assert!(outcome.degraded_reason().unwrap_or_default().contains("unrecoverable"));
        let pdf = outcome.into_value();
        assert_eq!(std::fs::read(pdf.path()).expect("read"), b"%PDF-1.4 original");
        assert_ne!(pdf.path(), input.as_path());
    }

    #[tokio::test]
    async fn tiny_grayscale_output_counts_as_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("doc.pdf");
        std::fs::write(&input, b"%PDF-1.4 original").expect("write");
        let runner = Arc::new(ScriptedRunner::with_steps([
            Step::ok().writes_arg("-sOutputFile=", vec![b'x'; 500]),
        ]));

        let outcome = pipeline(runner, dir.path())
            .to_canonical_pdf(&input, "pdf", true, &NullStatus)
            .await
            .expect("convert");
        assert!(outcome.is_degraded());
    }

    #[tokio::test]
    async fn image_skips_grayscale_when_disabled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("photo.JPG");
        std::fs::write(&input, b"\xFF\xD8\xFF").expect("write");
        let runner = Arc::new(ScriptedRunner::with_steps([
            Step::ok().writes_arg("--output", b"%PDF-1.4 image".to_vec()),
        ]));

        let outcome = pipeline(runner.clone(), dir.path())
            .to_canonical_pdf(&input, ".jpg", false, &NullStatus)
            .await
            .expect("convert");
        assert!(matches!(outcome, StageOutcome::Complete(_)));
        let call = &runner.calls()[0];
        assert_eq!(call.timeout, Duration::from_secs(45));
        assert!(call.args[0].ends_with("page_001.jpg"));
    }

    #[tokio::test]
    async fn stage_directories_do_not_outlive_the_result() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("a.png");
        std::fs::write(&input, b"png").expect("write");
        let runner = Arc::new(ScriptedRunner::with_steps([
            Step::ok().writes_arg("--output", b"%PDF".to_vec()),
            Step::ok().writes_arg("-sOutputFile=", gray_pdf()),
        ]));

        let outcome = pipeline(runner, dir.path())
            .to_canonical_pdf(&input, ".png", true, &NullStatus)
            .await
            .expect("convert");
        assert_eq!(prefixed_entries(dir.path()), 1);
        drop(outcome);
        assert_eq!(prefixed_entries(dir.path()), 0);
    }
}
