// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process PDF work: page inspection and object copying via `lopdf`.
// Nothing here rasterises; page content streams are carried over verbatim.

pub mod reader;
pub mod writer;

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Page-tree depth we are willing to walk looking for inherited attributes.
const MAX_INHERIT_DEPTH: usize = 32;

/// Look up `key` on a page, falling back to its ancestors in the page tree
/// (`MediaBox` and `Resources` are inheritable).
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERIT_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(resolve(doc, value));
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

/// A page's MediaBox as `[x0, y0, x1, y1]`, inherited if necessary.
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> Option<[f32; 4]> {
    let array = inherited(doc, page_id, b"MediaBox")?.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut rect = [0.0; 4];
    for (slot, obj) in rect.iter_mut().zip(array) {
        *slot = extract_number(resolve(doc, obj))?;
    }
    Some(rect)
}

/// Width and height of a page in points.
pub(crate) fn page_size(doc: &Document, page_id: ObjectId) -> Option<(f32, f32)> {
    let [x0, y0, x1, y1] = media_box(doc, page_id)?;
    let (w, h) = ((x1 - x0).abs(), (y1 - y0).abs());
    (w > 0.0 && h > 0.0).then_some((w, h))
}

pub(crate) fn extract_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Deep copy an object from `source` into `output`, following references.
///
/// `cache` maps source ids to already copied ids so shared fonts and images
/// are copied once. `/Parent` links are dropped; they would drag the source
/// page tree along.
pub(crate) fn copy_object_deep(
    output: &mut Document,
    source: &Document,
    obj: &Object,
    cache: &mut HashMap<ObjectId, ObjectId>,
) -> lopdf::Result<Object> {
    match obj {
        Object::Reference(id) => {
            if let Some(&new_id) = cache.get(id) {
                return Ok(Object::Reference(new_id));
            }
            // Reserve the id first so cyclic references terminate.
            let new_id = output.new_object_id();
            cache.insert(*id, new_id);
            let copied = copy_object_deep(output, source, source.get_object(*id)?, cache)?;
            output.objects.insert(new_id, copied);
            Ok(Object::Reference(new_id))
        }
        Object::Dictionary(dict) => Ok(Object::Dictionary(copy_dictionary(output, source, dict, cache)?)),
        Object::Array(items) => items
            .iter()
            .map(|item| copy_object_deep(output, source, item, cache))
            .collect::<lopdf::Result<Vec<_>>>()
            .map(Object::Array),
        Object::Stream(stream) => {
            let dict = copy_dictionary(output, source, &stream.dict, cache)?;
            Ok(Object::Stream(
                Stream::new(dict, stream.content.clone()).with_compression(stream.allows_compression),
            ))
        }
        _ => Ok(obj.clone()),
    }
}

fn copy_dictionary(
    output: &mut Document,
    source: &Document,
    dict: &Dictionary,
    cache: &mut HashMap<ObjectId, ObjectId>,
) -> lopdf::Result<Dictionary> {
    let mut copied = Dictionary::new();
    for (key, value) in dict.iter() {
        if key.as_slice() == b"Parent" {
            continue;
        }
        copied.set(key.clone(), copy_object_deep(output, source, value, cache)?);
    }
    Ok(copied)
}
