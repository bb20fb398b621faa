use super::error::{SplitError, SplitResult};
use super::page_tree::{self, PageNode};
use super::parser::{Dict, Object, ObjectId};
use super::stream::Stream;
use super::writer;
use super::xref::XRef;
use rustc_hash::FxHashSet;
use std::path::Path;
use tracing::debug;

/// A parsed PDF document.
///
/// `open` builds the model once: cross-reference chain, catalog, and an
/// eager page-tree walk (so structural cycles and malformed trees fail at
/// open time, not during a later split). After that the document is
/// immutable; independent split requests may run concurrently against a
/// shared instance, typically behind an `Arc`.
pub struct Document {
    /// The cross-reference table and object cache
    xref: XRef,

    /// The document catalog (root dictionary), resolved
    catalog: Dict,

    /// Ordered page leaves with their inherited attributes
    pages: Vec<PageNode>,

    /// Ids of every page-tree node, interior and leaf
    tree_ids: FxHashSet<ObjectId>,

    /// Header version, defaulting to 1.7
    version: (u8, u8),
}

impl Document {
    /// Opens a PDF document from its complete byte content.
    ///
    /// Fails with `CorruptXRef` when the cross-reference chain cannot be
    /// walked, `UnsupportedFeature` for encrypted documents, and
    /// `StructuralCycle` when the page tree loops. No partially built
    /// document ever escapes this function.
    ///
    /// # Example
    /// ```no_run
    /// use pdf_split::Document;
    ///
    /// let data = std::fs::read("document.pdf").unwrap();
    /// let doc = Document::open(data).unwrap();
    /// println!("{} pages", doc.page_count());
    /// ```
    pub fn open(data: Vec<u8>) -> SplitResult<Self> {
        let version = parse_header_version(&data);
        let startxref = find_startxref(&data)?;

        let mut xref = XRef::new(Stream::from_bytes(data));
        xref.parse_at(startxref)?;

        if xref.trailer().contains_key("Encrypt") {
            return Err(SplitError::UnsupportedFeature(
                "encrypted document".to_string(),
            ));
        }

        let catalog = xref.catalog()?;
        let (pages, tree_ids) = page_tree::walk_page_tree(&xref, &catalog)?;

        Ok(Document {
            xref,
            catalog,
            pages,
            tree_ids,
            version,
        })
    }

    /// Reads a file and opens it as a document.
    pub fn open_file<P: AsRef<Path>>(path: P) -> SplitResult<Self> {
        let data = std::fs::read(path).map_err(|e| SplitError::Io(e.to_string()))?;
        Self::open(data)
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// The id of the page at a 0-based index.
    pub fn page_at(&self, index: usize) -> SplitResult<ObjectId> {
        self.pages
            .get(index)
            .map(|page| page.id)
            .ok_or(SplitError::PageOutOfRange {
                requested: index,
                count: self.pages.len(),
            })
    }

    /// Resolves an indirect object to its most recent definition.
    pub fn resolve(&self, id: ObjectId) -> SplitResult<Object> {
        self.xref.fetch(id.num, id.generation)
    }

    /// The header version, e.g. `(1, 7)`.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// The document information dictionary from the trailer, if any.
    pub fn info(&self) -> SplitResult<Option<Object>> {
        match self.xref.trailer().get("Info") {
            Some(value) => Ok(Some(self.xref.fetch_if_reference(value)?)),
            None => Ok(None),
        }
    }

    /// The document catalog dictionary.
    pub fn catalog(&self) -> &Dict {
        &self.catalog
    }

    /// The merged trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        self.xref.trailer()
    }

    /// Extracts the requested page ranges into a standalone document.
    ///
    /// Ranges are 1-based inclusive `(start, end)` pairs, applied in
    /// caller order; a page requested twice appears twice. The result is
    /// a complete file image, all-or-nothing: on error nothing is
    /// returned and this document stays valid for further requests.
    ///
    /// # Example
    /// ```no_run
    /// use pdf_split::Document;
    ///
    /// let doc = Document::open_file("report.pdf").unwrap();
    /// let part = doc.split_ranges(&[(2, 4), (7, 7)]).unwrap();
    /// std::fs::write("part.pdf", part).unwrap();
    /// ```
    pub fn split_ranges(&self, ranges: &[(usize, usize)]) -> SplitResult<Vec<u8>> {
        let indices = page_tree::select_pages(ranges, self.pages.len())?;
        writer::write_split(self, &indices)
    }

    pub(crate) fn xref(&self) -> &XRef {
        &self.xref
    }

    pub(crate) fn page_nodes(&self) -> &[PageNode] {
        &self.pages
    }

    pub(crate) fn page_tree_ids(&self) -> &FxHashSet<ObjectId> {
        &self.tree_ids
    }
}

/// Finds the byte offset recorded after the final `startxref` keyword.
///
/// Searches the last KiB of the file, which is where conforming writers
/// put the `startxref ... %%EOF` tail.
fn find_startxref(data: &[u8]) -> SplitResult<usize> {
    let search_start = data.len().saturating_sub(1024);
    let search_data = &data[search_start..];

    let keyword = b"startxref";
    let pos = search_data
        .windows(keyword.len())
        .rposition(|window| window == keyword)
        .ok_or_else(|| SplitError::CorruptXRef {
            offset: data.len(),
            message: "startxref not found".to_string(),
        })?;

    let mut offset_start = search_start + pos + keyword.len();
    while offset_start < data.len() && data[offset_start].is_ascii_whitespace() {
        offset_start += 1;
    }

    let mut offset_end = offset_start;
    while offset_end < data.len() && data[offset_end].is_ascii_digit() {
        offset_end += 1;
    }

    if offset_start == offset_end {
        return Err(SplitError::CorruptXRef {
            offset: offset_start,
            message: "no offset after startxref".to_string(),
        });
    }

    std::str::from_utf8(&data[offset_start..offset_end])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| SplitError::CorruptXRef {
            offset: offset_start,
            message: "unparsable startxref offset".to_string(),
        })
}

/// Reads the `%PDF-x.y` header version, defaulting to 1.7.
fn parse_header_version(data: &[u8]) -> (u8, u8) {
    let window = &data[..data.len().min(1024)];
    if let Some(pos) = window.windows(5).position(|w| w == b"%PDF-") {
        let rest = &window[pos + 5..];
        if rest.len() >= 3 && rest[0].is_ascii_digit() && rest[1] == b'.' && rest[2].is_ascii_digit()
        {
            return (rest[0] - b'0', rest[2] - b'0');
        }
    }
    debug!("missing or malformed %PDF header, assuming 1.7");
    (1, 7)
}
