// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Periodic removal of stale temp files left behind by crashed runs.
//
// Only loose files directly in the work directory are swept. Session PDFs
// live in a subdirectory and are swept once at startup, before any session
// exists.

use std::path::{Path, PathBuf};
use std::time::Duration;

use printdesk_core::artifact::{TEMP_PREFIX, sweep_stale};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// One pass over `dir`. Returns how many files were removed.
pub fn sweep_once(dir: &Path, max_age: Duration) -> usize {
    match sweep_stale(dir, TEMP_PREFIX, max_age) {
        Ok(0) => {
            debug!(dir = %dir.display(), "no stale temp files");
            0
        }
        Ok(removed) => {
            info!(dir = %dir.display(), removed, "stale temp files removed");
            removed
        }
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "temp sweep failed");
            0
        }
    }
}

/// Sweep now, then every `interval`, until the runtime shuts down.
pub fn spawn(dir: PathBuf, max_age: Duration, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            // The first tick completes immediately.
            ticker.tick().await;
            sweep_once(&dir, max_age);
        }
    })
}
