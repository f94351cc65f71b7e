// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Saddle-stitch booklet imposition.
//
// Pages are grouped into signatures of `sheets_per_signature * 4` pages. Each
// signature becomes one output PDF whose pages are sheet sides holding two
// source pages next to each other, ordered so that the printed stack, folded
// in the middle, reads in sequence. The spooler prints these with short-edge
// duplex.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use printdesk_core::OwnedArtifact;
use printdesk_core::error::{PrintdeskError, Result};
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::pdf::{self, reader::PdfReader};

/// Documents below this page count always fit one signature.
pub const SINGLE_SIGNATURE_PAGE_LIMIT: u32 = 29;

/// Horizontal gap around and between the two pages of a side, in points.
const GUTTER_X: f32 = 10.0;
/// Bottom margin of a side, in points.
const MARGIN_Y: f32 = 15.0;

// -- Signature maths ----------------------------------------------------------

/// How a document splits into signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignatureConfig {
    pub num_signatures: u32,
    pub sheets_per_signature: u32,
    pub total_sheets: u32,
    pub total_sheets_with_blanks: u32,
}

/// Configurable signature policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignaturePolicy {
    pub sheets_per_signature: u32,
    pub single_signature_below_pages: u32,
}

impl Default for SignaturePolicy {
    fn default() -> Self {
        Self {
            sheets_per_signature: 5,
            single_signature_below_pages: SINGLE_SIGNATURE_PAGE_LIMIT,
        }
    }
}

impl SignaturePolicy {
    pub fn signature_config(&self, page_count: u32) -> SignatureConfig {
        let default_sheets = self.sheets_per_signature.max(1);
        let total_sheets = page_count.div_ceil(4);

        if page_count < self.single_signature_below_pages {
            let sheets_per_signature = total_sheets.min(default_sheets);
            SignatureConfig {
                num_signatures: 1,
                sheets_per_signature,
                total_sheets,
                total_sheets_with_blanks: sheets_per_signature,
            }
        } else {
            let num_signatures = total_sheets.div_ceil(default_sheets);
            SignatureConfig {
                num_signatures,
                sheets_per_signature: default_sheets,
                total_sheets,
                total_sheets_with_blanks: default_sheets * num_signatures,
            }
        }
    }
}

/// Signature configuration with the standard 29-page single-signature limit.
pub fn compute_signature_config(page_count: u32, default_sheets: u32) -> SignatureConfig {
    SignaturePolicy {
        sheets_per_signature: default_sheets,
        single_signature_below_pages: SINGLE_SIGNATURE_PAGE_LIMIT,
    }
    .signature_config(page_count)
}

// -- Imposition plan ----------------------------------------------------------

/// One printed side: two page slots, `None` for a synthesized blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetSide {
    pub left: Option<usize>,
    pub right: Option<usize>,
}

/// Page window `[start, end)` of the source document and its sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureLayout {
    pub start: usize,
    pub end: usize,
    /// Window size after blank padding (`sheets_per_signature * 4`).
    pub padded_pages: usize,
    pub sides: Vec<SheetSide>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpositionPlan {
    pub signatures: Vec<SignatureLayout>,
}

/// `(left, right)` window-relative indices for each side of a window of
/// `total` pages.
pub fn signature_pairs(total: usize) -> Vec<(usize, usize)> {
    (0..total / 2)
        .map(|i| {
            let mirror = total - i - 1;
            if i % 2 == 0 { (mirror, i) } else { (i, mirror) }
        })
        .collect()
}

/// Split `page_count` pages (0-indexed) into padded signature windows.
pub fn build_imposition_plan(page_count: usize, sheets_per_signature: usize) -> ImpositionPlan {
    let window = sheets_per_signature.max(1) * 4;
    let pairs = signature_pairs(window);

    let signatures = (0..page_count)
        .step_by(window)
        .map(|start| {
            let end = (start + window).min(page_count);
            let slot = |offset: usize| (start + offset < end).then_some(start + offset);
            SignatureLayout {
                start,
                end,
                padded_pages: window,
                sides: pairs
                    .iter()
                    .map(|&(left, right)| SheetSide {
                        left: slot(left),
                        right: slot(right),
                    })
                    .collect(),
            }
        })
        .collect();

    ImpositionPlan { signatures }
}

// -- Rendering ----------------------------------------------------------------

/// Renders imposition plans into per-signature PDFs.
#[derive(Debug, Clone)]
pub struct BookletImposer {
    work_dir: PathBuf,
    /// Page size used when neither page of a side has a usable MediaBox.
    fallback_size: (f32, f32),
}

impl BookletImposer {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            fallback_size: printdesk_core::PaperSize::A4.dimensions_pt(),
        }
    }

    /// Impose `pdf` into one owned PDF per signature, in print order.
    ///
    /// Any failure aborts the whole run; sheets produced so far are deleted.
    #[instrument(skip_all, fields(pdf = %pdf.display(), sheets_per_signature))]
    pub async fn impose(&self, pdf: &Path, sheets_per_signature: u32) -> Result<Vec<OwnedArtifact>> {
        let pdf = pdf.to_path_buf();
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.impose_blocking(&pdf, sheets_per_signature as usize))
            .await
            .map_err(|e| PrintdeskError::Imposition(format!("imposition task failed: {e}")))?
    }

    fn impose_blocking(&self, pdf: &Path, sheets_per_signature: usize) -> Result<Vec<OwnedArtifact>> {
        let reader = PdfReader::open(pdf).map_err(|e| PrintdeskError::Imposition(e.to_string()))?;
        let page_ids = reader.page_ids();
        let source = reader.into_document();

        let plan = build_imposition_plan(page_ids.len(), sheets_per_signature);
        if plan.signatures.is_empty() {
            return Err(PrintdeskError::Imposition("document has no pages".into()));
        }
        info!(
            pages = page_ids.len(),
            signatures = plan.signatures.len(),
            sheets_per_signature,
            "imposing booklet"
        );

        let mut sheets = Vec::with_capacity(plan.signatures.len());
        for (index, signature) in plan.signatures.iter().enumerate() {
            let bytes = self.render_signature(&source, &page_ids, signature).map_err(|e| {
                error!(
                    signature = index,
                    window_start = signature.start,
                    window_end = signature.end,
                    error = %e,
                    "signature imposition failed"
                );
                PrintdeskError::Imposition(format!(
                    "pages {}-{}: {e}",
                    signature.start + 1,
                    signature.end
                ))
            })?;
            sheets.push(OwnedArtifact::write_new(&self.work_dir, ".pdf", &bytes)?);
            debug!(signature = index, bytes = bytes.len(), "signature written");
        }

        Ok(sheets)
    }

    fn render_signature(
        &self,
        source: &Document,
        page_ids: &[ObjectId],
        signature: &SignatureLayout,
    ) -> lopdf::Result<Vec<u8>> {
        let mut output = Document::with_version("1.5");
        let pages_id = output.new_object_id();
        let mut cache = HashMap::new();
        let mut kids = Vec::with_capacity(signature.sides.len());

        for side in &signature.sides {
            let left = side.left.and_then(|i| page_ids.get(i).copied());
            let right = side.right.and_then(|i| page_ids.get(i).copied());

            let (w, h) = left
                .and_then(|id| pdf::page_size(source, id))
                .or_else(|| right.and_then(|id| pdf::page_size(source, id)))
                .unwrap_or(self.fallback_size);

            let mut xobjects = Dictionary::new();
            let mut ops = String::new();
            for (name, page, x) in [("L", left, GUTTER_X), ("R", right, w + 3.0 * GUTTER_X)] {
                let Some(page_id) = page else { continue };
                let form = page_xobject(&mut output, source, page_id, &mut cache)?;
                xobjects.set(name, Object::Reference(form));
                ops.push_str(&format!("q 1 0 0 1 {x} {MARGIN_Y} cm /{name} Do Q\n"));
            }

            let content_id = output.add_object(Stream::new(Dictionary::new(), ops.into_bytes()));
            let page_id = output.add_object(dictionary! {
                "Type" => Object::Name(b"Page".to_vec()),
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(2.0 * w + 4.0 * GUTTER_X),
                    Object::Real(h + 2.0 * MARGIN_Y),
                ],
                "Resources" => dictionary! { "XObject" => xobjects },
                "Contents" => Object::Reference(content_id),
            });
            kids.push(Object::Reference(page_id));
        }

        output.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => Object::Name(b"Pages".to_vec()),
                "Count" => kids.len() as i64,
                "Kids" => kids,
            }),
        );
        let catalog_id = output.add_object(dictionary! {
            "Type" => Object::Name(b"Catalog".to_vec()),
            "Pages" => Object::Reference(pages_id),
        });
        output.trailer.set("Root", Object::Reference(catalog_id));

        let mut bytes = Vec::new();
        output.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

/// Wrap a source page as a Form XObject in `output`, resources deep-copied.
fn page_xobject(
    output: &mut Document,
    source: &Document,
    page_id: ObjectId,
    cache: &mut HashMap<ObjectId, ObjectId>,
) -> lopdf::Result<ObjectId> {
    let bbox = pdf::media_box(source, page_id)
        .map(|rect| rect.iter().map(|&v| Object::Real(v)).collect::<Vec<_>>())
        .unwrap_or_else(|| {
            let (w, h) = printdesk_core::PaperSize::A4.dimensions_pt();
            vec![Object::Integer(0), Object::Integer(0), Object::Real(w), Object::Real(h)]
        });
    let content = source.get_page_content(page_id)?;

    let mut form = dictionary! {
        "Type" => Object::Name(b"XObject".to_vec()),
        "Subtype" => Object::Name(b"Form".to_vec()),
        "FormType" => Object::Integer(1),
        "BBox" => bbox,
    };
    if let Some(resources) = pdf::inherited(source, page_id, b"Resources") {
        form.set("Resources", pdf::copy_object_deep(output, source, resources, cache)?);
    }

    Ok(output.add_object(Stream::new(form, content)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::writer::PdfWriter;
    use printdesk_core::PaperSize;

    #[test]
    fn config_splits_long_documents() {
        assert_eq!(
            compute_signature_config(40, 5),
            SignatureConfig {
                num_signatures: 2,
                sheets_per_signature: 5,
                total_sheets: 10,
                total_sheets_with_blanks: 10,
            }
        );
        assert_eq!(
            compute_signature_config(29, 5),
            SignatureConfig {
                num_signatures: 2,
                sheets_per_signature: 5,
                total_sheets: 8,
                total_sheets_with_blanks: 10,
            }
        );
    }

    #[test]
    fn config_keeps_short_documents_in_one_signature() {
        assert_eq!(
            compute_signature_config(20, 5),
            SignatureConfig {
                num_signatures: 1,
                sheets_per_signature: 5,
                total_sheets: 5,
                total_sheets_with_blanks: 5,
            }
        );
        let tiny = compute_signature_config(6, 5);
        assert_eq!((tiny.num_signatures, tiny.sheets_per_signature), (1, 2));
    }

    #[test]
    fn policy_threshold_is_configurable() {
        let policy = SignaturePolicy {
            sheets_per_signature: 4,
            single_signature_below_pages: 10,
        };
        assert_eq!(policy.signature_config(12).num_signatures, 1);
        assert_eq!(policy.signature_config(40).num_signatures, 3);
    }

    #[test]
    fn pairs_fold_outside_in() {
        assert_eq!(signature_pairs(8), vec![(7, 0), (1, 6), (5, 2), (3, 4)]);
        assert_eq!(signature_pairs(4), vec![(3, 0), (1, 2)]);
    }

    #[test]
    fn plan_pads_last_window_with_blanks() {
        let plan = build_imposition_plan(10, 1);
        assert_eq!(plan.signatures.len(), 3);

        let last = &plan.signatures[2];
        assert_eq!((last.start, last.end, last.padded_pages), (8, 10, 4));
        assert_eq!(last.sides[0], SheetSide { left: None, right: Some(8) });
        assert_eq!(last.sides[1], SheetSide { left: Some(9), right: None });
    }

    #[test]
    fn plan_uses_every_page_once() {
        let plan = build_imposition_plan(37, 5);
        let mut seen: Vec<usize> = plan
            .signatures
            .iter()
            .flat_map(|s| s.sides.iter().flat_map(|side| [side.left, side.right]))
            .flatten()
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..37).collect::<Vec<_>>());
    }

    #[test]
    fn config_and_plan_hold_for_every_page_count() {
        for pages in 1..=120u32 {
            let config = compute_signature_config(pages, 5);
            assert_eq!(config.total_sheets, pages.div_ceil(4), "pages={pages}");
            assert!(config.num_signatures >= 1, "pages={pages}");
            assert_eq!(
                config.total_sheets_with_blanks,
                config.sheets_per_signature * config.num_signatures,
                "pages={pages}"
            );
            if pages < SINGLE_SIGNATURE_PAGE_LIMIT {
                assert_eq!(config.num_signatures, 1, "pages={pages}");
                assert_eq!(config.sheets_per_signature, config.total_sheets.min(5), "pages={pages}");
            } else {
                assert_eq!(config.sheets_per_signature, 5, "pages={pages}");
                assert!(
                    config.sheets_per_signature * 4 * config.num_signatures >= pages,
                    "pages={pages}"
                );
            }

            // Whatever the summary says, the imposed windows carry every page.
            let plan = build_imposition_plan(pages as usize, config.sheets_per_signature as usize);
            let mut seen: Vec<usize> = plan
                .signatures
                .iter()
                .flat_map(|s| s.sides.iter().flat_map(|side| [side.left, side.right]))
                .flatten()
                .collect();
            seen.sort_unstable();
            assert_eq!(seen, (0..pages as usize).collect::<Vec<_>>(), "pages={pages}");
        }
    }

    #[tokio::test]
    async fn impose_writes_one_pdf_per_signature() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("source.pdf");
        PdfWriter::new(PaperSize::A4)
            .write_numbered_pages(&source, 44)
            .expect("fixture");

        let imposer = BookletImposer::new(dir.path());
        let sheets = imposer.impose(&source, 5).await.expect("impose");
        assert_eq!(sheets.len(), 3);

        let first = PdfReader::open(sheets[0].path()).expect("open sheet");
        assert_eq!(first.page_count(), 10);
        assert_eq!(first.page_size(1), Some((1230.0, 872.0)));

        let paths: Vec<_> = sheets.iter().map(|s| s.path().to_path_buf()).collect();
        drop(sheets);
        assert!(paths.iter().all(|p| !p.exists()));
    }

    #[tokio::test]
    async fn blank_only_side_uses_a4() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("source.pdf");
        PdfWriter::new(PaperSize::A5)
            .write_numbered_pages(&source, 1)
            .expect("fixture");

        let sheets = BookletImposer::new(dir.path()).impose(&source, 5).await.expect("impose");
        let reader = PdfReader::open(sheets[0].path()).expect("open");
        // Side 1 holds page 1 (A5); side 2 holds two blanks.
        assert_eq!(reader.page_size(1), Some((2.0 * 420.0 + 40.0, 595.0 + 30.0)));
        assert_eq!(reader.page_size(2), Some((1230.0, 872.0)));
    }

    #[tokio::test]
    async fn unreadable_source_aborts_without_leftovers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("broken.pdf");
        std::fs::write(&source, b"%PDF-1.4 truncated").expect("write");

        let result = BookletImposer::new(dir.path()).impose(&source, 5).await;
        assert!(matches!(result, Err(PrintdeskError::Imposition(_))));
        let leftovers = std::fs::read_dir(dir.path())
            .expect("read_dir")
            .filter(|e| {
                e.as_ref()
                    .map(|e| e.file_name().to_string_lossy().starts_with("printdesk_"))
                    .unwrap_or(false)
            })
            .count();
        assert_eq!(leftovers, 0);
    }
}
