// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print dispatch through the CUPS `lp` command.
//
// The primary submission carries the full option set for the device. If the
// spooler rejects it, one retry with only paper size and fit-to-page is made;
// that fallback still counts as success but is reported as degraded.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::page_range::is_spooler_safe;
use printdesk_core::{AppConfig, DuplexMode, OwnedArtifact, PaperSize, StageOutcome};
use printdesk_exec::{CommandRunner, CommandSpec};
use tracing::{error, info, instrument, warn};

const PRIMARY_TIMEOUT: Duration = Duration::from_secs(120);
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-submission options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintOptions {
    pub duplex: DuplexMode,
    /// Booklet sheets force short-edge duplex at draft quality.
    pub booklet: bool,
    /// Spooler page range, e.g. `1-3,5`.
    pub page_range: Option<String>,
}

impl PrintOptions {
    pub fn one_sided() -> Self {
        Self {
            duplex: DuplexMode::Simplex,
            booklet: false,
            page_range: None,
        }
    }

    pub fn duplex() -> Self {
        Self {
            duplex: DuplexMode::LongEdge,
            ..Self::one_sided()
        }
    }

    pub fn booklet_sheet() -> Self {
        Self {
            duplex: DuplexMode::ShortEdge,
            booklet: true,
            page_range: None,
        }
    }

    pub fn with_page_range(mut self, range: impl Into<String>) -> Self {
        self.page_range = Some(range.into());
        self
    }

    fn effective_duplex(&self) -> DuplexMode {
        if self.booklet { DuplexMode::ShortEdge } else { self.duplex }
    }

    fn quality(&self) -> &'static str {
        if self.booklet { "300dpi" } else { "600dpi" }
    }
}

/// Submits files to one spooler queue.
pub struct PrintDispatcher {
    runner: Arc<dyn CommandRunner>,
    lp: String,
    printer: String,
    paper: PaperSize,
}

impl PrintDispatcher {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &AppConfig) -> Self {
        Self {
            runner,
            lp: config.tools.lp.clone(),
            printer: config.printer_name.clone(),
            paper: config.paper_size,
        }
    }

    pub fn printer(&self) -> &str {
        &self.printer
    }

    /// The full-featured submission. Fails with `Validation` on an unsafe
    /// page range.
    pub fn build_command(&self, file: &Path, options: &PrintOptions) -> Result<CommandSpec> {
        let duplex = options.effective_duplex();
        let mut spec = CommandSpec::new(&self.lp, "print submission", PRIMARY_TIMEOUT)
            .option("-d", &self.printer)
            .option("-o", format!("PageSize={}", self.paper.ppd_keyword()))
            .option("-o", format!("sides={}", duplex.sides_keyword()))
            .option("-o", format!("Duplex={}", duplex.ppd_duplex_keyword()))
            .option("-o", format!("Quality={}", options.quality()))
            .option("-o", "JCLEconomode=Off")
            .option("-o", "InputSlot=Auto")
            .option("-o", "MediaType=Plain")
            .option("-o", "ColorModel=Gray")
            .option("-o", "fit-to-page")
            .option("-o", "document-format=application/pdf");

        if let Some(range) = &options.page_range {
            if !is_spooler_safe(range) {
                return Err(PrintdeskError::Validation(format!(
                    "page range `{range}` may only contain digits, commas and dashes"
                )));
            }
            spec = spec.option("-o", format!("page-ranges={range}"));
        }

        Ok(spec.arg(file))
    }

    /// The stripped-down retry submission.
    pub fn minimal_command(&self, file: &Path) -> CommandSpec {
        CommandSpec::new(&self.lp, "minimal print submission", FALLBACK_TIMEOUT)
            .option("-d", &self.printer)
            .option("-o", format!("PageSize={}", self.paper.ppd_keyword()))
            .option("-o", "fit-to-page")
            .arg(file)
    }

    /// Submit `file`. `Degraded` means only the minimal retry was accepted.
    #[instrument(skip_all, fields(printer = %self.printer, file = %file.display()))]
    pub async fn submit(&self, file: &Path, options: &PrintOptions) -> Result<StageOutcome<()>> {
        let primary = self.build_command(file, options)?;
        let duplex = options.effective_duplex();
        info!(
            job = %primary.id,
            sides = duplex.sides_keyword(),
            quality = options.quality(),
            page_range = options.page_range.as_deref().unwrap_or("all"),
            "submitting print job"
        );

        let started = Instant::now();
        let primary_err = match self.runner.run(&primary).await {
            Ok(_) => {
                info!(elapsed_ms = started.elapsed().as_millis() as u64, "print job accepted");
                return Ok(StageOutcome::Complete(()));
            }
            Err(e) => e,
        };

        warn!(error = %primary_err, "primary submission failed, retrying with minimal options");
        match self.runner.run(&self.minimal_command(file)).await {
            Ok(_) => {
                info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "print job accepted with minimal options"
                );
                Ok(StageOutcome::Degraded {
                    value: (),
                    reason: primary_err.to_string(),
                })
            }
            Err(fallback_err) => {
                error!(error = %fallback_err, "minimal submission failed too");
                Err(PrintdeskError::Dispatch(format!(
                    "{primary_err}; retry: {fallback_err}"
                )))
            }
        }
    }

    /// Submit every booklet sheet in order. Stops at the first sheet that
    /// cannot be printed; success requires all of them.
    #[instrument(skip_all, fields(printer = %self.printer, sheets = sheets.len()))]
    pub async fn submit_booklet(&self, sheets: &[OwnedArtifact]) -> Result<StageOutcome<()>> {
        if sheets.is_empty() {
            return Err(PrintdeskError::Dispatch("booklet has no sheets".into()));
        }

        let mut degraded = Vec::new();
        for (index, sheet) in sheets.iter().enumerate() {
            match self.submit(sheet.path(), &PrintOptions::booklet_sheet()).await {
                Ok(StageOutcome::Complete(())) => {}
                Ok(StageOutcome::Degraded { reason, .. }) => {
                    degraded.push(format!("sheet {}: {reason}", index + 1));
                }
                Err(e) => {
                    error!(sheet = index + 1, total = sheets.len(), error = %e, "booklet sheet failed, stopping");
                    return Err(e);
                }
            }
        }

        if degraded.is_empty() {
            Ok(StageOutcome::Complete(()))
        } else {
            Ok(StageOutcome::Degraded {
                value: (),
                reason: degraded.join("; "),
            })
        }
    }
}
