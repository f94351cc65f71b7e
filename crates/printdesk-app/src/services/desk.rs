// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The print desk: ties conversion, imposition, dispatch and scanning to the
// per-user dialog.
//
// Every public operation is one interaction. It holds the user's session slot
// for its whole duration and always answers with a `Reply`; failures are
// logged in full and shown to the user as a short humanized line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::human_errors::humanize_error;
use printdesk_core::integrity::{hash_file, short_fingerprint};
use printdesk_core::status::{StatusSink, notify};
use printdesk_core::{AppConfig, IncomingArtifact, OwnedArtifact, PageRanges, PrintMode, SourceKind, UserId};
use printdesk_document::booklet::{BookletImposer, SignaturePolicy};
use printdesk_document::pdf::reader::count_pages;
use printdesk_document::pipeline::ConversionPipeline;
use printdesk_exec::CommandRunner;
use printdesk_print::{PrintDispatcher, PrintOptions, ScanAcquirer};
use tracing::{error, info, instrument, warn};

use crate::session::{Choice, Session, SessionEvent, SessionSlot, SessionTable, Transition, mode_choices};

/// Which scanner source to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    /// One page from the flatbed.
    Single,
    /// Everything in the document feeder.
    Batch,
}

/// Text for the user plus the options they can pick next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub choices: Vec<Choice>,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: Vec::new(),
        }
    }

    fn with_choices(text: impl Into<String>, choices: Vec<Choice>) -> Self {
        Self {
            text: text.into(),
            choices,
        }
    }

    /// Nothing to say.
    pub fn is_silent(&self) -> bool {
        self.text.is_empty() && self.choices.is_empty()
    }
}

pub struct PrintDesk {
    config: AppConfig,
    sessions: SessionTable,
    pipeline: ConversionPipeline,
    imposer: BookletImposer,
    dispatcher: PrintDispatcher,
    scanner: ScanAcquirer,
    policy: SignaturePolicy,
    session_dir: PathBuf,
    scan_output_dir: PathBuf,
}

impl PrintDesk {
    pub fn new(config: AppConfig, runner: Arc<dyn CommandRunner>, scan_output_dir: PathBuf) -> Self {
        let work_dir = config.work_dir();
        Self {
            sessions: SessionTable::new(),
            pipeline: ConversionPipeline::new(Arc::clone(&runner), config.tools.clone(), &work_dir),
            imposer: BookletImposer::new(&work_dir),
            dispatcher: PrintDispatcher::new(Arc::clone(&runner), &config),
            scanner: ScanAcquirer::new(runner, &config),
            policy: SignaturePolicy {
                sheets_per_signature: config.booklet.sheets_per_signature,
                single_signature_below_pages: config.booklet.single_signature_below_pages,
            },
            session_dir: config.session_dir(),
            scan_output_dir,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Usage notes for the booklet mode.
    pub fn booklet_help(&self) -> String {
        format!(
            "BOOKLET PRINTING\n\
             Available for PDF and office documents.\n\
             Signatures are worked out automatically:\n\
             - under {limit} pages: one signature\n\
             - {limit} pages or more: several signatures of {sheets} sheets",
            limit = self.policy.single_signature_below_pages,
            sheets = self.policy.sheets_per_signature,
        )
    }

    // -- Uploads --------------------------------------------------------------

    /// Convert an uploaded file and open a session for it. Single-page
    /// documents print straight away.
    #[instrument(skip_all, fields(user = %user, file = %incoming.original_name))]
    pub async fn accept_upload(&self, user: UserId, incoming: IncomingArtifact, status: &dyn StatusSink) -> Reply {
        let result = match self.sessions.acquire(user) {
            Ok(slot) => self.try_accept_upload(slot, &incoming, status).await,
            Err(e) => Err(e),
        };
        settle(result)
    }

    async fn try_accept_upload(
        &self,
        mut slot: SessionSlot,
        incoming: &IncomingArtifact,
        status: &dyn StatusSink,
    ) -> Result<Reply> {
        let kind = SourceKind::from_extension(&incoming.extension)
            .ok_or_else(|| PrintdeskError::UnsupportedDocument(incoming.extension.clone()))?;
        if incoming.declared_size > self.config.max_file_size {
            return Err(PrintdeskError::FileTooLarge {
                size: incoming.declared_size,
                limit: self.config.max_file_size,
            });
        }

        notify(status, "Processing the file...").await;
        let outcome = self
            .pipeline
            .to_canonical_pdf(&incoming.path, &incoming.extension, self.config.grayscale, status)
            .await?;
        let degraded = outcome.is_degraded();
        let pdf = outcome.into_value();

        let session = self.open_session(pdf, &incoming.original_name, kind, degraded).await?;

        // The superseded session, if any, is gone before the new one lands.
        if let Some(old) = slot.take() {
            info!(previous = %old.original_name, "discarding superseded session");
            drop(old);
        }

        if session.page_count == 1 {
            notify(status, "Printing the single page one-sided...").await;
            return self.print(session, PrintMode::Normal, None, status).await;
        }

        let mut text = format!(
            "File ready: {}\nPages: {}\nChoose a print mode:",
            session.original_name, session.page_count
        );
        if degraded {
            text.insert_str(0, "Note: grayscale conversion failed, the original colours are kept.\n");
        }
        let reply = Reply::with_choices(text, session.choices());
        *slot = Some(session);
        Ok(reply)
    }

    async fn open_session(
        &self,
        pdf: OwnedArtifact,
        original_name: &str,
        kind: SourceKind,
        degraded: bool,
    ) -> Result<Session> {
        // Out of reach of the periodic sweep for as long as the session lives.
        tokio::fs::create_dir_all(&self.session_dir).await?;
        let pdf = pdf.relocate(&self.session_dir, ".pdf")?;

        let pages = count_pages(pdf.path()).await?;
        if pages == 0 {
            return Err(PrintdeskError::PdfError("document has no pages".into()));
        }
        let page_count = u32::try_from(pages)
            .map_err(|_| PrintdeskError::PdfError(format!("{pages} pages is too many")))?;
        let fingerprint = hash_file(pdf.path())?;
        info!(
            pages = page_count,
            ?kind,
            degraded,
            fingerprint = short_fingerprint(&fingerprint),
            "session ready"
        );
        Ok(Session::new(pdf, original_name, page_count, kind, degraded, fingerprint))
    }

    // -- Dialog ---------------------------------------------------------------

    /// Feed one dialog event into the user's session.
    #[instrument(skip_all, fields(user = %user, event = ?event))]
    pub async fn handle_event(&self, user: UserId, event: SessionEvent, status: &dyn StatusSink) -> Reply {
        let result = match self.sessions.acquire(user) {
            Ok(slot) => self.try_handle_event(slot, event, status).await,
            Err(e) => Err(e),
        };
        settle(result)
    }

    async fn try_handle_event(
        &self,
        mut slot: SessionSlot,
        event: SessionEvent,
        status: &dyn StatusSink,
    ) -> Result<Reply> {
        let session = match slot.as_mut() {
            Some(session) => session,
            // Stray text from an idle user is not an error.
            None if matches!(event, SessionEvent::RangeText(_)) => return Ok(Reply::text("")),
            None => return Err(PrintdeskError::NoSession),
        };

        match session.apply(event) {
            Transition::ShowModes => Ok(Reply::with_choices(
                format!(
                    "File: {}\nPages: {}\nChoose a print mode:",
                    session.original_name, session.page_count
                ),
                session.choices(),
            )),
            Transition::ShowRangeChoice(mode) => Ok(Reply::with_choices(
                format!(
                    "Printing {}\nFile: {}\nPages: {}\nWhich pages?",
                    mode.label(),
                    session.original_name,
                    session.page_count
                ),
                session.choices(),
            )),
            Transition::AskRange(_) => Ok(Reply::with_choices(
                "Enter the pages to print (example: 1-3,5,7-9) or /cancel",
                session.choices(),
            )),
            Transition::Rejected(reason) => Ok(Reply::with_choices(reason, session.choices())),
            Transition::Ignored => Ok(Reply::text("")),
            Transition::Cancelled => {
                if let Some(session) = slot.take() {
                    info!(file = %session.original_name, mode = session.mode.label(), "session cancelled");
                }
                Ok(Reply::text("Cancelled."))
            }
            Transition::Dispatch { mode, range } => {
                let session = slot.take().ok_or(PrintdeskError::NoSession)?;
                self.print(session, mode, range, status).await
            }
        }
    }

    /// Print a session's document. The session is consumed whatever the
    /// outcome, so its PDF never outlives the attempt.
    async fn print(
        &self,
        session: Session,
        mode: PrintMode,
        range: Option<PageRanges>,
        status: &dyn StatusSink,
    ) -> Result<Reply> {
        info!(
            printer = self.dispatcher.printer(),
            file = %session.original_name,
            fingerprint = short_fingerprint(&session.fingerprint),
            mode = mode.label(),
            range = range.as_ref().map_or("all", PageRanges::as_str),
            degraded = session.degraded,
            session_age_secs = (chrono::Utc::now() - session.created_at).num_seconds(),
            "printing"
        );

        if mode == PrintMode::Booklet {
            return self.print_booklet(&session, status).await;
        }

        let mut options = if mode == PrintMode::Duplex {
            PrintOptions::duplex()
        } else {
            PrintOptions::one_sided()
        };
        if let Some(range) = &range {
            options = options.with_page_range(range.as_str());
        }

        notify(status, &format!("Printing {}...", mode.label())).await;
        let outcome = self.dispatcher.submit(session.artifact().path(), &options).await?;

        let pages = range
            .as_ref()
            .map_or_else(|| "all pages".to_string(), |r| format!("pages {r}"));
        let mut text = format!("Sent to the printer ({pages}).");
        if outcome.is_degraded() {
            text.push_str(" Basic print settings were used.");
        }
        Ok(Reply::text(text))
    }

    async fn print_booklet(&self, session: &Session, status: &dyn StatusSink) -> Result<Reply> {
        let config = self.policy.signature_config(session.page_count);
        notify(
            status,
            &format!(
                "Booklet printing\nFile: {}\nPages: {}\nSheets: {}\nSignatures: {} of {} sheets\nSheets including blanks: {}\nPreparing and printing...",
                session.original_name,
                session.page_count,
                config.total_sheets,
                config.num_signatures,
                config.sheets_per_signature,
                config.total_sheets_with_blanks,
            ),
        )
        .await;

        let sheets = self
            .imposer
            .impose(session.artifact().path(), config.sheets_per_signature)
            .await?;
        let outcome = self.dispatcher.submit_booklet(&sheets).await?;

        let mut text = format!(
            "Booklet sent to the printer.\nSignatures: {}\nSheets: {}",
            config.num_signatures, config.total_sheets_with_blanks
        );
        if outcome.is_degraded() {
            text.push_str("\nBasic print settings were used for some sheets.");
        }
        Ok(Reply::text(text))
    }

    // -- Scanning -------------------------------------------------------------

    /// Scan, combine the pages into a PDF, deliver it to the scan directory
    /// and make it the user's printable session.
    #[instrument(skip_all, fields(user = %user, kind = ?kind))]
    pub async fn scan(&self, user: UserId, kind: ScanKind, status: &dyn StatusSink) -> Reply {
        let result = match self.sessions.acquire(user) {
            Ok(slot) => self.try_scan(slot, kind, status).await,
            Err(e) => Err(e),
        };
        settle(result)
    }

    async fn try_scan(&self, mut slot: SessionSlot, kind: ScanKind, status: &dyn StatusSink) -> Result<Reply> {
        notify(status, "Preparing the scanner...").await;
        let (pages, partial) = match kind {
            ScanKind::Single => {
                notify(status, "Scanning one page from the flatbed...").await;
                (vec![self.scanner.acquire_single().await?], None)
            }
            ScanKind::Batch => {
                notify(status, "Scanning from the document feeder...").await;
                let outcome = self.scanner.acquire_batch().await?;
                let partial = outcome.degraded_reason().map(str::to_string);
                (outcome.into_value(), partial)
            }
        };

        notify(status, &format!("Combining {} page(s) into a PDF...", pages.len())).await;
        let paths: Vec<&Path> = pages.iter().map(OwnedArtifact::path).collect();
        let pdf = self.pipeline.images_to_pdf(&paths, status).await?;
        drop(pages);

        let delivered = self.deliver_scan(&pdf).await?;
        let name = delivered
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scan.pdf".into());
        let session = self.open_session(pdf, &name, SourceKind::Pdf, false).await?;

        if let Some(old) = slot.take() {
            info!(previous = %old.original_name, "discarding superseded session");
            drop(old);
        }

        let mut text = format!(
            "Scan saved to {} ({} page(s)).",
            delivered.display(),
            session.page_count
        );
        if let Some(reason) = partial {
            warn!(reason = %reason, "scan finished early");
            text.push_str("\nThe scanner stopped early; the pages above were kept.");
        }
        text.push_str("\nPrint it? Choose a print mode:");
        let reply = Reply::with_choices(text, mode_choices(session.kind));
        *slot = Some(session);
        Ok(reply)
    }

    /// Copy the combined scan into the output directory as
    /// `scan_YYYYmmdd_HHMMSS.pdf`.
    async fn deliver_scan(&self, pdf: &OwnedArtifact) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.scan_output_dir).await?;
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let mut dest = self.scan_output_dir.join(format!("scan_{stamp}.pdf"));
        let mut n = 2;
        while tokio::fs::try_exists(&dest).await? {
            dest = self.scan_output_dir.join(format!("scan_{stamp}_{n}.pdf"));
            n += 1;
        }
        tokio::fs::copy(pdf.path(), &dest).await?;
        info!(path = %dest.display(), "scan delivered");
        Ok(dest)
    }
}

/// Log a failed interaction in full and reduce it to one user-facing line.
fn settle(result: Result<Reply>) -> Reply {
    match result {
        Ok(reply) => reply,
        Err(e) => {
            match &e {
                PrintdeskError::SessionBusy | PrintdeskError::NoSession | PrintdeskError::Validation(_) => {
                    warn!(error = %e, "interaction rejected");
                }
                _ => error!(error = %e, "interaction failed"),
            }
            Reply::text(humanize_error(&e).to_line())
        }
    }
}
