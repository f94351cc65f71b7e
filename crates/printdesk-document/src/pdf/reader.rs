// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: open a canonical PDF and inspect its pages.

use std::path::Path;

use lopdf::{Document, ObjectId};
use printdesk_core::error::{PrintdeskError, Result};
use tracing::{debug, instrument};

/// Read-only view over a PDF document.
pub struct PdfReader {
    document: Document,
}

impl PdfReader {
    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let document = Document::load(path_ref).map_err(|err| {
            PrintdeskError::PdfError(format!("failed to open {}: {err}", path_ref.display()))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded");
        Ok(Self { document })
    }

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data)
            .map_err(|err| PrintdeskError::PdfError(format!("failed to load PDF from memory: {err}")))?;
        Ok(Self { document })
    }

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Page object ids in reading order.
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.document.get_pages().into_values().collect()
    }

    /// Size in points of page `number` (1-indexed), honouring inherited MediaBoxes.
    pub fn page_size(&self, number: u32) -> Option<(f32, f32)> {
        let page_id = *self.document.get_pages().get(&number)?;
        super::page_size(&self.document, page_id)
    }

    pub(crate) fn into_document(self) -> Document {
        self.document
    }
}

/// Count the pages of the PDF at `path` on the blocking pool.
pub async fn count_pages(path: &Path) -> Result<usize> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || PdfReader::open(&path).map(|r| r.page_count()))
        .await
        .map_err(|e| PrintdeskError::PdfError(format!("page count task failed: {e}")))?
}
