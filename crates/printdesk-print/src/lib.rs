// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk Print: hands finished PDFs to the CUPS spooler and pulls pages
// off the scanner. Both sides talk to their devices only through the
// `CommandRunner` in `printdesk-exec`.

pub mod dispatcher;
pub mod scanner;

pub use dispatcher::{PrintDispatcher, PrintOptions};
pub use scanner::ScanAcquirer;
