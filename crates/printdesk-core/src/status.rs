// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Progress text sink.

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::error::{PrintdeskError, Result};

/// Receives human-readable progress lines ("Converting to PDF...").
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn update(&self, text: &str) -> Result<()>;
}

/// Deliver a status line, best-effort. A failing sink never fails the stage.
pub async fn notify(sink: &dyn StatusSink, text: &str) {
    if let Err(e) = sink.update(text).await {
        debug!(error = %e, text, "status update dropped");
    }
}

/// Discards every update.
pub struct NullStatus;

#[async_trait]
impl StatusSink for NullStatus {
    async fn update(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl StatusSink for UnboundedSender<String> {
    async fn update(&self, text: &str) -> Result<()> {
        self.send(text.to_string())
            .map_err(|_| {
                PrintdeskError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "status receiver closed",
                ))
            })
    }
}
