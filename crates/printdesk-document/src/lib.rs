// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printdesk-document: document preparation for the Printdesk orchestrator.
//
// Provides the conversion pipeline (office/image to PDF, grayscale), booklet
// imposition, and PDF inspection.

pub mod booklet;
pub mod pdf;
pub mod pipeline;

pub use booklet::{BookletImposer, SignatureConfig, SignaturePolicy, compute_signature_config};
pub use pdf::reader::PdfReader;
pub use pdf::writer::PdfWriter;
pub use pipeline::ConversionPipeline;
