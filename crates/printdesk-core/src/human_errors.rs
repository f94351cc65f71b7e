// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for people standing at the printer.
//
// Every technical error is mapped to a short sentence and a suggestion.
// Diagnostics (stderr, exit codes) stay in the logs.

use crate::error::PrintdeskError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Busy device, timeout: trying again usually works.
    Transient,
    /// User must do something (load paper, fix the page range).
    ActionRequired,
    /// Retrying will not help: wrong format, broken file.
    Permanent,
}

/// A human-readable error with a plain message and an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    pub message: String,
    pub suggestion: String,
    pub retriable: bool,
    pub severity: Severity,
}

impl HumanError {
    fn new(message: &str, suggestion: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            retriable: severity == Severity::Transient,
            severity,
        }
    }

    /// Single-line rendering for text transports.
    pub fn to_line(&self) -> String {
        format!("{} {}", self.message, self.suggestion)
    }
}

/// Convert a `PrintdeskError` into a `HumanError`.
pub fn humanize_error(err: &PrintdeskError) -> HumanError {
    match err {
        // -- External processes --
        PrintdeskError::ProcessTimeout { description, .. } => HumanError::new(
            "The operation took too long.",
            format!("The {description} step did not finish in time. Check the device and try again."),
            Severity::Transient,
        ),

        PrintdeskError::ProcessNonZeroExit { stderr, .. } => humanize_device_detail(stderr),

        PrintdeskError::ProcessSpawn { program, .. } => HumanError::new(
            "A required tool is missing on the print server.",
            format!("Ask the administrator to install `{program}`."),
            Severity::Permanent,
        ),

        // -- Documents --
        PrintdeskError::Conversion(_) => HumanError::new(
            "The document could not be converted for printing.",
            "Try saving it as a PDF and sending it again.",
            Severity::Permanent,
        ),

        PrintdeskError::Imposition(_) => HumanError::new(
            "The booklet could not be prepared.",
            "Try printing the document double-sided instead.",
            Severity::Permanent,
        ),

        PrintdeskError::UnsupportedDocument(detail) => HumanError::new(
            "This type of document isn't supported.",
            format!("Send a PDF, an office document or an image. (File type: {detail})"),
            Severity::Permanent,
        ),

        PrintdeskError::FileTooLarge { limit, .. } => HumanError::new(
            "The file is too large.",
            format!("The limit is {} MB. Try compressing it or splitting it up.", limit / (1024 * 1024)),
            Severity::ActionRequired,
        ),

        PrintdeskError::PdfError(_) => HumanError::new(
            "There's a problem with this PDF file.",
            "The file may be damaged. Check that it opens on a computer, or send a different file.",
            Severity::Permanent,
        ),

        // -- Print / scan --
        PrintdeskError::Dispatch(detail) => {
            let mut human = humanize_device_detail(detail);
            if human.severity == Severity::Transient && human.message.starts_with("The device") {
                human.message = "The printer did not accept the job.".into();
                human.suggestion = "Check that the printer is on and has paper, then try again.".into();
            }
            human
        }

        PrintdeskError::Scan(detail) => humanize_scan_error(detail),

        // -- Input --
        PrintdeskError::Validation(detail) => HumanError::new(
            "That input isn't valid.",
            detail.clone(),
            Severity::ActionRequired,
        ),

        // -- Session --
        PrintdeskError::NoSession => HumanError::new(
            "There is no document waiting.",
            "Send a file or start a scan first.",
            Severity::ActionRequired,
        ),

        PrintdeskError::SessionBusy => HumanError::new(
            "Still working on your previous request.",
            "Wait for it to finish, then try again.",
            Severity::Transient,
        ),

        // -- Storage --
        PrintdeskError::Config(detail) => HumanError::new(
            "The print server is misconfigured.",
            format!("Ask the administrator to check the settings. ({detail})"),
            Severity::Permanent,
        ),

        PrintdeskError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => HumanError::new(
                "The file couldn't be found.",
                "It may have been cleaned up already. Send it again.",
                Severity::ActionRequired,
            ),
            std::io::ErrorKind::PermissionDenied => HumanError::new(
                "The print server can't access that file.",
                "Ask the administrator to check the work directory permissions.",
                Severity::Permanent,
            ),
            _ => HumanError::new(
                "There was a problem reading or writing a file.",
                "Try again. If this keeps happening, the disk may be full.",
                Severity::Transient,
            ),
        },

        PrintdeskError::Serialization(_) => HumanError::new(
            "The print server had an internal data problem.",
            "Try again. If this keeps happening, please report it.",
            Severity::Transient,
        ),
    }
}

/// Scanner failures: the detail is either our own message or the
/// stderr of `scanimage`.
fn humanize_scan_error(detail: &str) -> HumanError {
    let lower = detail.to_ascii_lowercase();

    if lower.contains("timed out") || lower.contains("timeout") {
        HumanError::new(
            "Scanning timed out.",
            "Check the scanner and try again.",
            Severity::Transient,
        )
    } else if lower.contains("device busy") {
        HumanError::new(
            "The scanner is busy.",
            "Wait a moment and try again.",
            Severity::Transient,
        )
    } else if lower.contains("no documents") || lower.contains("document feeder out of documents") {
        HumanError::new(
            "There are no pages in the document feeder.",
            "Load the pages face down and try again.",
            Severity::ActionRequired,
        )
    } else {
        HumanError::new(
            "Scanning failed.",
            "Check that the scanner is on and connected, then try again.",
            Severity::Transient,
        )
    }
}

/// Spooler and scanner stderr share a handful of well-known phrases.
fn humanize_device_detail(detail: &str) -> HumanError {
    let lower = detail.to_ascii_lowercase();

    if lower.contains("device busy") {
        HumanError::new(
            "The device is busy.",
            "Wait a moment and try again.",
            Severity::Transient,
        )
    } else if lower.contains("no documents") {
        humanize_scan_error(detail)
    } else if lower.contains("does not exist") || lower.contains("unknown printer") {
        HumanError::new(
            "The printer is not set up on the print server.",
            "Ask the administrator to check the printer name.",
            Severity::Permanent,
        )
    } else if lower.contains("out of paper") || lower.contains("media-empty") {
        HumanError::new(
            "The printer is out of paper.",
            "Add paper to the tray, then try again.",
            Severity::ActionRequired,
        )
    } else {
        HumanError::new(
            "The device reported an error.",
            "Try again. If this keeps happening, turn the device off and on again.",
            Severity::Transient,
        )
    }
}
