// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk: external process execution with deadlines.

pub mod job;
pub mod runner;
pub mod stub;

pub use job::{CommandSpec, JobOutput};
pub use runner::{CommandRunner, ProcessRunner};
