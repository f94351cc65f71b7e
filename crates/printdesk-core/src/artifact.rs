// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Owned temporary files and the stale-file sweeper.
//
// Every intermediate file the pipeline produces is held by exactly one
// `OwnedArtifact`. Dropping the handle deletes the file, so error paths and
// cancelled tasks cannot leak documents onto disk.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tempfile::TempPath;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Name prefix shared by every file and stage directory Printdesk creates.
pub const TEMP_PREFIX: &str = "printdesk_";

/// Exclusive handle to a file that is deleted when the handle drops.
#[derive(Debug)]
pub struct OwnedArtifact {
    path: TempPath,
}

impl OwnedArtifact {
    /// Copy `source` into a fresh `printdesk_*<suffix>` file inside `dir`.
    /// The source is left untouched.
    pub fn copy_of(source: &Path, dir: &Path, suffix: &str) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(suffix)
            .tempfile_in(dir)?;
        let path = file.into_temp_path();
        std::fs::copy(source, &path)?;
        debug!(source = %source.display(), copy = %path.display(), "artifact copied");
        Ok(Self { path })
    }

    /// Write `bytes` into a fresh `printdesk_*<suffix>` file inside `dir`.
    pub fn write_new(dir: &Path, suffix: &str, bytes: &[u8]) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(suffix)
            .tempfile_in(dir)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    /// Move a file produced inside a stage directory out to `dir` under a
    /// fresh owned name.
    pub fn take_from(produced: &Path, dir: &Path, suffix: &str) -> Result<Self> {
        let owned = Self::copy_of(produced, dir, suffix)?;
        if let Err(e) = std::fs::remove_file(produced) {
            debug!(path = %produced.display(), error = %e, "stage output already gone");
        }
        Ok(owned)
    }

    /// Move the file into `dir` under a fresh owned name. The old name is
    /// gone afterwards.
    pub fn relocate(self, dir: &Path, suffix: &str) -> Result<Self> {
        let target = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(suffix)
            .tempfile_in(dir)?
            .into_temp_path();
        let from = self.path.to_path_buf();
        self.persist(&target)?;
        debug!(from = %from.display(), to = %target.display(), "artifact relocated");
        Ok(Self { path: target })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File size in bytes.
    pub fn len(&self) -> Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Keep the file past this handle by moving it to `dest`.
    pub fn persist(self, dest: &Path) -> Result<PathBuf> {
        match self.path.persist(dest) {
            Ok(()) => Ok(dest.to_path_buf()),
            Err(err) => {
                // Renames fail across filesystems; fall back to copy. The
                // returned TempPath deletes the original on drop.
                std::fs::copy(&err.path, dest)?;
                Ok(dest.to_path_buf())
            }
        }
    }
}

/// Remove regular files in `dir` whose name starts with `prefix` and whose
/// modification time is older than `max_age`. Returns how many were removed.
///
/// Subdirectories are not entered.
pub fn sweep_stale(dir: &Path, prefix: &str, max_age: Duration) -> Result<usize> {
    let now = SystemTime::now();
    let mut removed = 0;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_name().to_string_lossy().starts_with(prefix) {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(meta) if meta.is_file() => meta,
            _ => continue,
        };
        let age = meta
            .modified()
            .ok()
            .and_then(|mtime| now.duration_since(mtime).ok())
            .unwrap_or_default();
        if age <= max_age {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %entry.path().display(), error = %e, "failed to sweep temp file"),
        }
    }

    if removed > 0 {
        info!(dir = %dir.display(), removed, "swept stale temp files");
    }
    Ok(removed)
}
