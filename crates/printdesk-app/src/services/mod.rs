// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: the print desk itself plus the housekeeping around it
// (data directory, configuration file, temp sweeper).

pub mod config_file;
pub mod data_dir;
pub mod desk;
pub mod sweeper;
