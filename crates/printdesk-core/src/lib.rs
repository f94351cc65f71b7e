// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk: core types and error definitions shared across all crates.

pub mod artifact;
pub mod config;
pub mod error;
pub mod human_errors;
pub mod integrity;
pub mod page_range;
pub mod status;
pub mod types;

pub use artifact::OwnedArtifact;
pub use config::AppConfig;
pub use error::{PrintdeskError, Result};
pub use page_range::PageRanges;
pub use status::StatusSink;
pub use types::*;
