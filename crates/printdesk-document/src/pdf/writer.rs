// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer: build small labelled documents with `lopdf`. Used for
// proof sheets and as fixture input for the imposition tests and benches.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use printdesk_core::PaperSize;
use printdesk_core::error::{PrintdeskError, Result};
use tracing::{debug, instrument};

/// Creates PDFs whose pages are labelled with their page number.
pub struct PdfWriter {
    paper_size: PaperSize,
}

impl PdfWriter {
    pub fn new(paper_size: PaperSize) -> Self {
        Self { paper_size }
    }

    /// A document of `count` pages, each showing "Page N". The MediaBox sits
    /// on the page tree root and is inherited by every page.
    #[instrument(skip(self))]
    pub fn numbered_pages(&self, count: usize) -> Result<Vec<u8>> {
        let (width, height) = self.paper_size.dimensions_pt();
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => Object::Name(b"Font".to_vec()),
            "Subtype" => Object::Name(b"Type1".to_vec()),
            "BaseFont" => Object::Name(b"Helvetica".to_vec()),
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => Object::Reference(font_id) },
        });

        let mut kids = Vec::with_capacity(count);
        for n in 1..=count {
            let content = format!("BT /F1 36 Tf 72 {} Td (Page {n}) Tj ET\n", height / 2.0);
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => Object::Name(b"Page".to_vec()),
                "Parent" => Object::Reference(pages_id),
                "Contents" => Object::Reference(content_id),
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => Object::Name(b"Pages".to_vec()),
                "Kids" => kids,
                "Count" => count as i64,
                "Resources" => Object::Reference(resources_id),
                "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Real(width), Object::Real(height)],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => Object::Name(b"Catalog".to_vec()),
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|err| PrintdeskError::PdfError(format!("failed to serialise PDF: {err}")))?;
        debug!(count, output_bytes = output.len(), "numbered PDF built");
        Ok(output)
    }

    pub fn write_numbered_pages(&self, path: &Path, count: usize) -> Result<()> {
        std::fs::write(path, self.numbered_pages(count)?)?;
        Ok(())
    }
}
