//! Synthetic PDF fixtures with programmatically computed offsets.

#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use pdf_split::{Document, Object, ObjectId};
use std::io::Write;

/// Assembles a classic-table PDF. Object 1 is assumed to be the catalog.
pub struct PdfBuilder {
    data: Vec<u8>,
    objects: Vec<(u32, usize)>,
    size: u32,
}

impl PdfBuilder {
    pub fn new() -> Self {
        PdfBuilder {
            data: b"%PDF-1.4\n".to_vec(),
            objects: Vec::new(),
            size: 1,
        }
    }

    pub fn add_object(&mut self, num: u32, body: &str) -> &mut Self {
        self.objects.push((num, self.data.len()));
        self.data
            .extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", num, body).as_bytes());
        self.size = self.size.max(num + 1);
        self
    }

    pub fn add_stream_object(&mut self, num: u32, dict_body: &str, payload: &[u8]) -> &mut Self {
        self.objects.push((num, self.data.len()));
        self.data.extend_from_slice(
            format!(
                "{} 0 obj\n<< {} /Length {} >>\nstream\n",
                num,
                dict_body,
                payload.len()
            )
            .as_bytes(),
        );
        self.data.extend_from_slice(payload);
        self.data.extend_from_slice(b"\nendstream\nendobj\n");
        self.size = self.size.max(num + 1);
        self
    }

    /// Writes the cross-reference table and trailer. `trailer_extra` is
    /// spliced into the trailer dictionary (e.g. " /Info 9 0 R").
    pub fn finish(&self, trailer_extra: &str) -> Vec<u8> {
        let mut data = self.data.clone();
        let xref_pos = data.len();

        data.extend_from_slice(format!("xref\n0 {}\n", self.size).as_bytes());
        data.extend_from_slice(b"0000000000 65535 f \n");
        for num in 1..self.size {
            match self.objects.iter().find(|(n, _)| *n == num) {
                Some((_, offset)) => {
                    data.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes())
                }
                None => data.extend_from_slice(b"0000000000 65535 f \n"),
            }
        }
        data.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R{} >>\nstartxref\n{}\n%%EOF\n",
                self.size, trailer_extra, xref_pos
            )
            .as_bytes(),
        );
        data
    }
}

/// Appends an incremental update redefining the given objects.
pub fn append_update(mut data: Vec<u8>, objects: &[(u32, &str)], size: u32) -> Vec<u8> {
    let prev = previous_startxref(&data);

    let mut offsets = Vec::new();
    for (num, body) in objects {
        offsets.push((*num, data.len()));
        data.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", num, body).as_bytes());
    }

    let xref_pos = data.len();
    data.extend_from_slice(b"xref\n");
    for (num, offset) in &offsets {
        data.extend_from_slice(
            format!("{} 1\n{:010} 00000 n \n", num, offset).as_bytes(),
        );
    }
    data.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R /Prev {} >>\nstartxref\n{}\n%%EOF\n",
            size, prev, xref_pos
        )
        .as_bytes(),
    );
    data
}

fn previous_startxref(data: &[u8]) -> usize {
    let keyword = b"startxref";
    let pos = data
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .expect("fixture has a startxref");
    let tail = &data[pos + keyword.len()..];
    let digits: String = tail
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .map(|b| *b as char)
        .collect();
    digits.parse().expect("fixture startxref offset")
}

/// A ten-page document: shared font, per-page content streams, MediaBox
/// and Resources inherited from the pages root.
pub fn ten_page_pdf() -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    builder.add_object(1, "<< /Type /Catalog /Pages 2 0 R >>");

    let kids: Vec<String> = (3..13).map(|n| format!("{} 0 R", n)).collect();
    builder.add_object(
        2,
        &format!(
            "<< /Type /Pages /Kids [{}] /Count 10 /MediaBox [0 0 612 792] /Resources << /Font << /F1 23 0 R >> >> >>",
            kids.join(" ")
        ),
    );

    for page in 0..10u32 {
        builder.add_object(
            3 + page,
            &format!("<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>", 13 + page),
        );
    }
    for page in 0..10u32 {
        let content = format!("BT /F1 12 Tf 72 720 Td (Page {}) Tj ET", page + 1);
        builder.add_stream_object(13 + page, "", content.as_bytes());
    }
    builder.add_object(
        23,
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>",
    );

    builder.finish("")
}

/// A single-page document whose structural objects live in an object
/// stream, indexed by an uncompressed cross-reference stream.
pub fn object_stream_pdf() -> Vec<u8> {
    let body_1 = "<< /Type /Catalog /Pages 2 0 R >>";
    let body_2 = "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>";
    let body_3 = "<< /Type /Page /Parent 2 0 R /Contents 5 0 R >>";

    let offset_2 = body_1.len() + 1;
    let offset_3 = offset_2 + body_2.len() + 1;
    let header = format!("1 0 2 {} 3 {} ", offset_2, offset_3);
    let first = header.len();

    let mut payload = header.into_bytes();
    payload.extend_from_slice(body_1.as_bytes());
    payload.push(b' ');
    payload.extend_from_slice(body_2.as_bytes());
    payload.push(b' ');
    payload.extend_from_slice(body_3.as_bytes());

    let mut data = b"%PDF-1.5\n".to_vec();

    let content = b"BT (Hello) Tj ET";
    let offset_5 = data.len();
    data.extend_from_slice(
        format!("5 0 obj\n<< /Length {} >>\nstream\n", content.len()).as_bytes(),
    );
    data.extend_from_slice(content);
    data.extend_from_slice(b"\nendstream\nendobj\n");

    let offset_4 = data.len();
    data.extend_from_slice(
        format!(
            "4 0 obj\n<< /Type /ObjStm /N 3 /First {} /Length {} >>\nstream\n",
            first,
            payload.len()
        )
        .as_bytes(),
    );
    data.extend_from_slice(&payload);
    data.extend_from_slice(b"\nendstream\nendobj\n");

    let offset_6 = data.len();
    let mut rows: Vec<u8> = Vec::new();
    let push_row = |rows: &mut Vec<u8>, kind: u8, f2: u32, f3: u16| {
        rows.push(kind);
        rows.extend_from_slice(&f2.to_be_bytes());
        rows.extend_from_slice(&f3.to_be_bytes());
    };
    push_row(&mut rows, 0, 0, 65535);
    push_row(&mut rows, 2, 4, 0); // object 1 in objstm 4, index 0
    push_row(&mut rows, 2, 4, 1);
    push_row(&mut rows, 2, 4, 2);
    push_row(&mut rows, 1, offset_4 as u32, 0);
    push_row(&mut rows, 1, offset_5 as u32, 0);
    push_row(&mut rows, 1, offset_6 as u32, 0);

    data.extend_from_slice(
        format!(
            "6 0 obj\n<< /Type /XRef /Size 7 /W [1 4 2] /Root 1 0 R /Length {} >>\nstream\n",
            rows.len()
        )
        .as_bytes(),
    );
    data.extend_from_slice(&rows);
    data.extend_from_slice(b"\nendstream\nendobj\n");

    data.extend_from_slice(format!("startxref\n{}\n%%EOF\n", offset_6).as_bytes());
    data
}

/// A single-page document indexed by a FlateDecode cross-reference stream
/// with a PNG Up predictor, the layout modern writers emit.
pub fn xref_stream_pdf() -> Vec<u8> {
    let mut data = b"%PDF-1.5\n".to_vec();

    let mut offsets = [0usize; 5]; // objects 1..=4, index 0 unused
    let bodies = [
        (1u32, "<< /Type /Catalog /Pages 2 0 R >>".to_string()),
        (
            2,
            "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>".to_string(),
        ),
        (3, "<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>".to_string()),
    ];
    for (num, body) in &bodies {
        offsets[*num as usize] = data.len();
        data.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", num, body).as_bytes());
    }

    let content = b"BT (Predicted) Tj ET";
    offsets[4] = data.len();
    data.extend_from_slice(
        format!("4 0 obj\n<< /Length {} >>\nstream\n", content.len()).as_bytes(),
    );
    data.extend_from_slice(content);
    data.extend_from_slice(b"\nendstream\nendobj\n");

    let stream_offset = data.len();

    // One row per object: [type, offset(4), generation(2)]
    let mut raw_rows: Vec<Vec<u8>> = Vec::new();
    let raw_row = |kind: u8, f2: u32, f3: u16| {
        let mut row = vec![kind];
        row.extend_from_slice(&f2.to_be_bytes());
        row.extend_from_slice(&f3.to_be_bytes());
        row
    };
    raw_rows.push(raw_row(0, 0, 65535));
    for num in 1..=4usize {
        raw_rows.push(raw_row(1, offsets[num] as u32, 0));
    }
    raw_rows.push(raw_row(1, stream_offset as u32, 0)); // the stream itself (object 5)

    // Apply the Up predictor, then compress
    let row_len = raw_rows[0].len();
    let mut filtered = Vec::new();
    let mut prev = vec![0u8; row_len];
    for row in &raw_rows {
        filtered.push(2u8);
        for i in 0..row_len {
            filtered.push(row[i].wrapping_sub(prev[i]));
        }
        prev = row.clone();
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&filtered).unwrap();
    let compressed = encoder.finish().unwrap();

    data.extend_from_slice(
        format!(
            "5 0 obj\n<< /Type /XRef /Size 6 /W [1 4 2] /Filter /FlateDecode \
             /DecodeParms << /Predictor 12 /Columns 7 >> /Root 1 0 R /Length {} >>\nstream\n",
            compressed.len()
        )
        .as_bytes(),
    );
    data.extend_from_slice(&compressed);
    data.extend_from_slice(b"\nendstream\nendobj\n");

    data.extend_from_slice(format!("startxref\n{}\n%%EOF\n", stream_offset).as_bytes());
    data
}

/// Returns the concatenated content stream bytes of a page.
pub fn page_content(doc: &Document, index: usize) -> Vec<u8> {
    let id = doc.page_at(index).expect("page index in range");
    let page = doc.resolve(id).expect("page resolves");
    let contents = page
        .as_dict()
        .expect("page is a dictionary")
        .get("Contents")
        .expect("page has contents")
        .clone();

    let contents = match contents {
        Object::Reference(id) => doc.resolve(id).expect("contents resolve"),
        other => other,
    };

    match contents {
        Object::Stream { data, .. } => data,
        Object::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                let resolved = match item {
                    Object::Reference(id) => doc.resolve(id).expect("contents resolve"),
                    other => other,
                };
                match resolved {
                    Object::Stream { data, .. } => out.extend_from_slice(&data),
                    other => panic!("contents element is not a stream: {:?}", other),
                }
            }
            out
        }
        other => panic!("contents is not a stream: {:?}", other),
    }
}

/// Walks every reference reachable from the catalog and pages, asserting
/// each one resolves to a real object.
pub fn assert_no_dangling_references(doc: &Document) {
    let mut visited: Vec<ObjectId> = Vec::new();
    let mut stack: Vec<Object> = vec![Object::Dictionary(doc.catalog().clone())];
    for index in 0..doc.page_count() {
        stack.push(Object::Reference(doc.page_at(index).unwrap()));
    }

    while let Some(value) = stack.pop() {
        match value {
            Object::Reference(id) => {
                if visited.contains(&id) {
                    continue;
                }
                visited.push(id);
                let resolved = doc.resolve(id).expect("reference resolves");
                assert!(
                    !resolved.is_null(),
                    "dangling reference to object {}",
                    id
                );
                stack.push(resolved);
            }
            Object::Array(items) => stack.extend(items),
            Object::Dictionary(dict) => stack.extend(dict.values().cloned()),
            Object::Stream { dict, .. } => stack.extend(dict.values().cloned()),
            _ => {}
        }
    }
}
