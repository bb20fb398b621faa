//! End-to-end split behavior: extracted outputs are re-parsed with the
//! same library and checked page by page.

mod common;

use common::*;
use pdf_split::{Document, Object, SplitError};
use std::sync::Arc;

#[test]
fn test_concrete_scenario_two_ranges() {
    // Ten pages, request (2,4) and (7,7): output has exactly pages
    // 2, 3, 4, 7 in that order at indices 0..4.
    let doc = Document::open(ten_page_pdf()).unwrap();
    let output = doc.split_ranges(&[(2, 4), (7, 7)]).unwrap();

    let out_doc = Document::open(output).unwrap();
    assert_eq!(out_doc.page_count(), 4);

    for (out_index, source_index) in [(0, 1), (1, 2), (2, 3), (3, 6)] {
        assert_eq!(
            page_content(&out_doc, out_index),
            page_content(&doc, source_index),
            "output page {} should carry source page {}",
            out_index,
            source_index + 1
        );
    }
}

#[test]
fn test_round_trip_full_range() {
    let doc = Document::open(ten_page_pdf()).unwrap();
    let output = doc.split_ranges(&[(1, 10)]).unwrap();

    let out_doc = Document::open(output).unwrap();
    assert_eq!(out_doc.page_count(), doc.page_count());

    for index in 0..10 {
        assert_eq!(
            page_content(&out_doc, index),
            page_content(&doc, index),
            "content stream bytes must survive the round trip (page {})",
            index + 1
        );
    }
}

#[test]
fn test_split_is_idempotent() {
    let doc = Document::open(ten_page_pdf()).unwrap();
    let first = doc.split_ranges(&[(2, 4), (7, 7)]).unwrap();
    let second = doc.split_ranges(&[(2, 4), (7, 7)]).unwrap();
    assert_eq!(first, second, "repeated splits must be byte-identical");
}

#[test]
fn test_duplicate_page_request() {
    let doc = Document::open(ten_page_pdf()).unwrap();
    let output = doc.split_ranges(&[(2, 2), (2, 2)]).unwrap();

    let out_doc = Document::open(output).unwrap();
    assert_eq!(out_doc.page_count(), 2);

    // Two distinct page objects sharing the same content stream object
    let first = out_doc.page_at(0).unwrap();
    let second = out_doc.page_at(1).unwrap();
    assert_ne!(first, second);

    let contents_of = |index: usize| {
        out_doc
            .resolve(out_doc.page_at(index).unwrap())
            .unwrap()
            .as_dict()
            .unwrap()
            .get("Contents")
            .unwrap()
            .clone()
    };
    assert_eq!(contents_of(0), contents_of(1));
    assert_eq!(page_content(&out_doc, 0), page_content(&doc, 1));
}

#[test]
fn test_range_validity_at_boundary() {
    let doc = Document::open(ten_page_pdf()).unwrap();

    assert!(doc.split_ranges(&[(1, 10)]).is_ok());
    assert_eq!(
        doc.split_ranges(&[(1, 11)]),
        Err(SplitError::PageOutOfRange {
            requested: 11,
            count: 10
        })
    );
    assert_eq!(
        doc.split_ranges(&[(11, 11)]),
        Err(SplitError::PageOutOfRange {
            requested: 11,
            count: 10
        })
    );
}

#[test]
fn test_no_dangling_references_in_output() {
    let doc = Document::open(ten_page_pdf()).unwrap();
    let output = doc.split_ranges(&[(2, 4), (7, 7)]).unwrap();

    let out_doc = Document::open(output).unwrap();
    assert_no_dangling_references(&out_doc);
}

#[test]
fn test_inherited_attributes_materialized() {
    // MediaBox and Resources live on the source pages root; each output
    // page must carry them itself, because the new tree is flat.
    let doc = Document::open(ten_page_pdf()).unwrap();
    let output = doc.split_ranges(&[(5, 5)]).unwrap();

    let out_doc = Document::open(output).unwrap();
    let page = out_doc.resolve(out_doc.page_at(0).unwrap()).unwrap();
    let dict = page.as_dict().unwrap().clone();

    assert!(dict.contains_key("MediaBox"), "MediaBox not materialized");
    assert!(dict.contains_key("Resources"), "Resources not materialized");
    assert_no_dangling_references(&out_doc);
}

#[test]
fn test_annotation_references_rewired_and_dropped() {
    // Page 1 carries an annotation whose /P points back at the page and
    // whose /Dest names page 2. Splitting page 1 alone must keep /P valid
    // and null out the reference to the dropped page.
    let mut builder = PdfBuilder::new();
    builder.add_object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    builder.add_object(
        2,
        "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 612 792] >>",
    );
    builder.add_object(
        3,
        "<< /Type /Page /Parent 2 0 R /Contents 5 0 R /Annots [7 0 R] >>",
    );
    builder.add_object(4, "<< /Type /Page /Parent 2 0 R /Contents 6 0 R >>");
    builder.add_stream_object(5, "", b"BT (one) Tj ET");
    builder.add_stream_object(6, "", b"BT (two) Tj ET");
    builder.add_object(
        7,
        "<< /Type /Annot /Subtype /Link /P 3 0 R /Dest [4 0 R /Fit] /Rect [0 0 10 10] >>",
    );
    let doc = Document::open(builder.finish("")).unwrap();

    let output = doc.split_ranges(&[(1, 1)]).unwrap();
    let out_doc = Document::open(output).unwrap();
    assert_eq!(out_doc.page_count(), 1);

    let page_id = out_doc.page_at(0).unwrap();
    let page = out_doc.resolve(page_id).unwrap();
    let annots = page
        .as_dict()
        .unwrap()
        .get("Annots")
        .unwrap()
        .as_array()
        .unwrap()
        .to_vec();
    let annot = out_doc.resolve(annots[0].as_reference().unwrap()).unwrap();
    let annot_dict = annot.as_dict().unwrap();

    // /P follows the page into the output
    assert_eq!(
        annot_dict.get("P"),
        Some(&Object::Reference(page_id)),
        "annotation page back-reference must point at the new page object"
    );

    // /Dest named the unselected page; that reference is dropped to null
    let dest = annot_dict.get("Dest").unwrap().as_array().unwrap();
    assert_eq!(dest[0], Object::Null);
}

#[test]
fn test_info_carried_into_output() {
    let mut builder = PdfBuilder::new();
    builder.add_object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    builder.add_object(
        2,
        "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
    );
    builder.add_object(3, "<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>");
    builder.add_stream_object(4, "", b"BT (x) Tj ET");
    builder.add_object(5, "<< /Title (Quarterly Report) /Author (QA) >>");
    let doc = Document::open(builder.finish(" /Info 5 0 R")).unwrap();

    let output = doc.split_ranges(&[(1, 1)]).unwrap();
    let out_doc = Document::open(output).unwrap();

    let info = out_doc.info().unwrap().expect("info carried");
    assert_eq!(
        info.as_dict().unwrap().get("Title"),
        Some(&Object::String(b"Quarterly Report".to_vec()))
    );
}

#[test]
fn test_page_index_catalog_entries_dropped() {
    // /Outlines indexes pages of the source; the output must not carry it.
    let mut builder = PdfBuilder::new();
    builder.add_object(
        1,
        "<< /Type /Catalog /Pages 2 0 R /Outlines 5 0 R >>",
    );
    builder.add_object(
        2,
        "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
    );
    builder.add_object(3, "<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>");
    builder.add_stream_object(4, "", b"BT (x) Tj ET");
    builder.add_object(5, "<< /Type /Outlines /Count 0 >>");
    let doc = Document::open(builder.finish("")).unwrap();

    let output = doc.split_ranges(&[(1, 1)]).unwrap();
    let out_doc = Document::open(output).unwrap();

    assert!(!out_doc.catalog().contains_key("Outlines"));
    assert_no_dangling_references(&out_doc);
}

#[test]
fn test_concurrent_splits_are_identical() {
    let doc = Arc::new(Document::open(ten_page_pdf()).unwrap());

    let expected = doc.split_ranges(&[(1, 5)]).unwrap();
    let mut handles = Vec::new();
    for _ in 0..4 {
        let doc = Arc::clone(&doc);
        handles.push(std::thread::spawn(move || {
            doc.split_ranges(&[(1, 5)]).unwrap()
        }));
    }

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn test_split_output_is_itself_splittable() {
    let doc = Document::open(ten_page_pdf()).unwrap();
    let output = doc.split_ranges(&[(3, 6)]).unwrap();

    let out_doc = Document::open(output).unwrap();
    let again = out_doc.split_ranges(&[(2, 3)]).unwrap();

    let final_doc = Document::open(again).unwrap();
    assert_eq!(final_doc.page_count(), 2);
    // Pages 3..6 were taken first, so (2,3) of those are source pages 4, 5
    assert_eq!(page_content(&final_doc, 0), page_content(&doc, 3));
    assert_eq!(page_content(&final_doc, 1), page_content(&doc, 4));
}
