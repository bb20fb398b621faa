//! Split serializer.
//!
//! Emits a complete, self-contained document for a split request: dense
//! renumbering from 1 (catalog, pages root, page copies, then the closure
//! in first-seen order), canonical object forms, a classic cross-reference
//! table, and a trailer. The whole output is buffered in memory, so a
//! failure never leaves a partial file behind.

use super::collector::collect_closure;
use super::document::Document;
use super::error::SplitResult;
use super::page_tree::{PageNode, INHERITABLE_KEYS};
use super::parser::{Dict, Object, ObjectId};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

const CATALOG_NUM: u32 = 1;
const PAGES_NUM: u32 = 2;

/// Catalog entries that index pages and are dropped on split: carrying
/// them half-valid is worse than omitting them.
const DROPPED_CATALOG_KEYS: [&str; 6] = [
    "Outlines",
    "Dests",
    "PageLabels",
    "OpenAction",
    "StructTreeRoot",
    "Threads",
];

/// Catalog entries carried conservatively into the output.
const CARRIED_CATALOG_KEYS: [&str; 2] = ["Names", "AcroForm"];

/// Serializes the requested page occurrences into a standalone document.
pub fn write_split(doc: &Document, page_indices: &[usize]) -> SplitResult<Vec<u8>> {
    let pages = doc.page_nodes();

    // One page copy per requested occurrence; duplicates share their
    // resource closure but get their own page object.
    let copies: Vec<(ObjectId, Dict)> = page_indices
        .iter()
        .map(|&index| (pages[index].id, materialize_page(&pages[index])))
        .collect();

    // Closure roots: the materialized page values (once per distinct
    // page), plus the document-level structures carried conservatively.
    let mut roots: Vec<Object> = Vec::new();
    let mut seen_pages: FxHashSet<ObjectId> = FxHashSet::default();
    for (source_id, dict) in &copies {
        if seen_pages.insert(*source_id) {
            roots.extend(dict.values().cloned());
        }
    }

    let catalog = doc.catalog();
    for key in CARRIED_CATALOG_KEYS {
        if let Some(value) = catalog.get(key) {
            roots.push(value.clone());
        }
    }
    for key in DROPPED_CATALOG_KEYS {
        if catalog.contains_key(key) {
            debug!(key, "dropping catalog entry that indexes source pages");
        }
    }

    let info = doc.trailer().get("Info").cloned();
    if let Some(value @ Object::Reference(_)) = &info {
        roots.push(value.clone());
    }

    let closure = collect_closure(doc.xref(), &roots, doc.page_tree_ids())?;

    // Dense renumbering. A reference to a selected source page resolves
    // to its first occurrence's new number, so annotation back-references
    // stay valid.
    let first_copy_num = PAGES_NUM + 1;
    let mut renumber: FxHashMap<ObjectId, u32> = FxHashMap::default();
    for (occurrence, (source_id, _)) in copies.iter().enumerate() {
        renumber
            .entry(*source_id)
            .or_insert(first_copy_num + occurrence as u32);
    }
    let mut next_num = first_copy_num + copies.len() as u32;
    for id in &closure.order {
        renumber.insert(*id, next_num);
        next_num += 1;
    }
    let size = next_num;

    // Serialization
    let mut out: Vec<u8> = Vec::new();
    let (major, minor) = doc.version();
    out.extend_from_slice(format!("%PDF-{}.{}\n", major, minor).as_bytes());
    // Binary marker comment so transfer tools treat the file as binary
    out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let mut offsets: Vec<usize> = Vec::with_capacity(size as usize);

    // Object 1: catalog
    offsets.push(out.len());
    out.extend_from_slice(format!("{} 0 obj\n", CATALOG_NUM).as_bytes());
    out.extend_from_slice(format!("<< /Type /Catalog /Pages {} 0 R", PAGES_NUM).as_bytes());
    for key in CARRIED_CATALOG_KEYS {
        if let Some(value) = catalog.get(key) {
            out.push(b' ');
            push_name(&mut out, key);
            out.push(b' ');
            push_value(&mut out, value, &renumber);
        }
    }
    out.extend_from_slice(b" >>\nendobj\n");

    // Object 2: pages root
    offsets.push(out.len());
    out.extend_from_slice(format!("{} 0 obj\n", PAGES_NUM).as_bytes());
    out.extend_from_slice(format!("<< /Type /Pages /Count {} /Kids [", copies.len()).as_bytes());
    for occurrence in 0..copies.len() {
        if occurrence > 0 {
            out.push(b' ');
        }
        out.extend_from_slice(format!("{} 0 R", first_copy_num + occurrence as u32).as_bytes());
    }
    out.extend_from_slice(b"] >>\nendobj\n");

    // Page copies
    for (occurrence, (_, dict)) in copies.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(
            format!("{} 0 obj\n", first_copy_num + occurrence as u32).as_bytes(),
        );
        out.extend_from_slice(format!("<< /Parent {} 0 R", PAGES_NUM).as_bytes());
        for (key, value) in dict {
            out.push(b' ');
            push_name(&mut out, key);
            out.push(b' ');
            push_value(&mut out, value, &renumber);
        }
        out.extend_from_slice(b" >>\nendobj\n");
    }

    // Closure objects, in first-seen order
    for id in &closure.order {
        let num = renumber[id];
        let object = &closure.objects[id];
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", num).as_bytes());
        push_value(&mut out, object, &renumber);
        out.extend_from_slice(b"\nendobj\n");
    }

    // Classic cross-reference table, single subsection, 20-byte entries
    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }

    out.extend_from_slice(b"trailer\n");
    out.extend_from_slice(format!("<< /Size {} /Root {} 0 R", size, CATALOG_NUM).as_bytes());
    if let Some(Object::Reference(id)) = &info {
        if let Some(num) = renumber.get(id) {
            out.extend_from_slice(format!(" /Info {} 0 R", num).as_bytes());
        }
    }
    out.extend_from_slice(b" >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_offset).as_bytes());
    out.extend_from_slice(b"%%EOF\n");

    Ok(out)
}

/// Builds the output dictionary for one page occurrence: the leaf's own
/// entries with ancestors' inheritable attributes filled in where absent.
/// /Parent is left out; the serializer rewires it to the new pages root.
fn materialize_page(page: &PageNode) -> Dict {
    let mut dict = page.dict.clone();
    dict.remove("Parent");
    for key in INHERITABLE_KEYS {
        if !dict.contains_key(key) {
            if let Some(value) = page.inherited.get(key) {
                dict.insert(key.to_string(), value.clone());
            }
        }
    }
    dict.entry("Type".to_string())
        .or_insert_with(|| Object::Name("Page".to_string()));
    dict
}

/// Serializes one value in canonical form, rewriting references through
/// the renumber map. A reference with no mapping points into dropped
/// page-tree structure and serializes as null.
fn push_value(out: &mut Vec<u8>, value: &Object, renumber: &FxHashMap<ObjectId, u32>) {
    match value {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(true) => out.extend_from_slice(b"true"),
        Object::Boolean(false) => out.extend_from_slice(b"false"),
        Object::Integer(n) => out.extend_from_slice(format!("{}", n).as_bytes()),
        Object::Real(r) => push_real(out, *r),
        Object::String(s) => {
            out.push(b'(');
            push_escaped_string(out, s);
            out.push(b')');
        }
        Object::HexString(s) => {
            out.push(b'<');
            for byte in s {
                out.extend_from_slice(format!("{:02X}", byte).as_bytes());
            }
            out.push(b'>');
        }
        Object::Name(name) => push_name(out, name),
        Object::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                push_value(out, item, renumber);
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => {
            out.extend_from_slice(b"<< ");
            for (key, item) in dict {
                push_name(out, key);
                out.push(b' ');
                push_value(out, item, renumber);
                out.push(b' ');
            }
            out.extend_from_slice(b">>");
        }
        Object::Stream { dict, data } => {
            // /Length is always recomputed from the payload actually
            // emitted, never copied from the source.
            out.extend_from_slice(b"<< ");
            for (key, item) in dict {
                if key == "Length" {
                    continue;
                }
                push_name(out, key);
                out.push(b' ');
                push_value(out, item, renumber);
                out.push(b' ');
            }
            out.extend_from_slice(format!("/Length {} >>", data.len()).as_bytes());
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(data);
            out.extend_from_slice(b"\nendstream");
        }
        Object::Reference(id) => match renumber.get(id) {
            Some(num) => out.extend_from_slice(format!("{} 0 R", num).as_bytes()),
            None => {
                debug!(source = %id, "reference into dropped structure serialized as null");
                out.extend_from_slice(b"null");
            }
        },
    }
}

/// Formats a real without exponent notation (PDF reals do not allow it).
fn push_real(out: &mut Vec<u8>, value: f64) {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        out.extend_from_slice(format!("{}", value as i64).as_bytes());
    } else {
        let mut s = format!("{:.6}", value);
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
        out.extend_from_slice(s.as_bytes());
    }
}

/// Writes a literal string body with backslash escaping.
fn push_escaped_string(out: &mut Vec<u8>, s: &[u8]) {
    for &byte in s {
        match byte {
            b'(' => out.extend_from_slice(b"\\("),
            b')' => out.extend_from_slice(b"\\)"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            _ => out.push(byte),
        }
    }
}

/// Writes a name with its leading slash, #XX-escaping special characters.
fn push_name(out: &mut Vec<u8>, name: &str) {
    out.push(b'/');
    for byte in name.bytes() {
        match byte {
            b'/' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'%' | b'#' | b' ' => {
                out.extend_from_slice(format!("#{:02X}", byte).as_bytes());
            }
            _ => out.push(byte),
        }
    }
}
