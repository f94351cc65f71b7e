// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Printdesk.

use std::time::Duration;

use thiserror::Error;

/// Top-level error type for all Printdesk operations.
#[derive(Debug, Error)]
pub enum PrintdeskError {
    // -- External processes --
    #[error("{description} timed out after {}s", .timeout.as_secs())]
    ProcessTimeout {
        description: String,
        timeout: Duration,
    },

    #[error("{description} exited with code {}: {stderr}", exit_label(.code))]
    ProcessNonZeroExit {
        description: String,
        /// `None` when the child was terminated by a signal.
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to start {program} ({description}): {source}")]
    ProcessSpawn {
        program: String,
        description: String,
        #[source]
        source: std::io::Error,
    },

    // -- Document errors --
    #[error("conversion failed: {0}")]
    Conversion(String),

    #[error("booklet imposition failed: {0}")]
    Imposition(String),

    #[error("unsupported document type: {0}")]
    UnsupportedDocument(String),

    #[error("file too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    // -- Print / scan errors --
    #[error("print dispatch failed: {0}")]
    Dispatch(String),

    #[error("scan failed: {0}")]
    Scan(String),

    // -- Input validation --
    #[error("invalid input: {0}")]
    Validation(String),

    // -- Session --
    #[error("no active session")]
    NoSession,

    #[error("a job is already running for this session")]
    SessionBusy,

    // -- Storage / configuration --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PrintdeskError {
    /// Whether this error came from the process runner hitting its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ProcessTimeout { .. })
    }
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PrintdeskError>;
