use super::base_stream::BaseStream;
use super::decode;
use super::error::{SplitError, SplitResult};
use super::lexer::{Lexer, Token};
use super::parser::{Dict, Object, ObjectId, Parser};
use super::stream::Stream;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::sync::RwLock;
use tracing::{debug, warn};

/// Sanity bound on object numbers, so a corrupt /Size or subsection header
/// cannot make the entry table balloon.
const MAX_OBJECTS: usize = 1 << 23;

/// Cross-reference table entry.
///
/// Each entry describes where to find an indirect object in the file.
#[derive(Debug, Clone)]
pub enum XRefEntry {
    /// Free entry: the object number is available for reuse
    Free { next_free: u64, generation: u32 },

    /// The object is stored uncompressed at the given byte offset
    Uncompressed { offset: u64, generation: u32 },

    /// The object is stored inside an object stream
    Compressed { container: u32, index: u32 },
}

impl XRefEntry {
    /// Returns true if this entry is free.
    pub fn is_free(&self) -> bool {
        matches!(self, XRefEntry::Free { .. })
    }

    /// Returns the generation number for this entry.
    pub fn generation(&self) -> u32 {
        match self {
            XRefEntry::Free { generation, .. } => *generation,
            XRefEntry::Uncompressed { generation, .. } => *generation,
            XRefEntry::Compressed { .. } => 0,
        }
    }
}

/// Cross-reference table for a PDF document.
///
/// Maps object numbers to their locations, merged across the whole
/// incremental-update chain: sections are walked newest-first and the first
/// section to define an object number wins, which is last-writer-wins in
/// file order. Both classic tables and cross-reference streams resolve into
/// the same entry table.
///
/// `fetch` takes `&self`: the memoization cache sits behind an `RwLock` and
/// inserts are idempotent, so independent split requests may resolve
/// objects concurrently. Duplicate first-resolutions do duplicate work,
/// never produce different results.
pub struct XRef {
    /// The source bytes (whole file)
    base: Stream,

    /// Entries indexed by object number
    entries: Vec<Option<XRefEntry>>,

    /// Merged trailer dictionary
    trailer: Dict,

    /// Cache of parsed objects
    cache: RwLock<FxHashMap<u32, Object>>,
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
}

impl XRef {
    /// Creates an empty cross-reference table over the source bytes.
    pub fn new(base: Stream) -> Self {
        XRef {
            base,
            entries: Vec::new(),
            trailer: Dict::default(),
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    /// Returns the merged trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Gets an entry from the table.
    pub fn get_entry(&self, num: u32) -> Option<&XRefEntry> {
        self.entries.get(num as usize)?.as_ref()
    }

    /// Returns the number of slots in the entry table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries were parsed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses the whole cross-reference chain starting at `startxref`.
    ///
    /// Follows /Prev pointers through incremental updates. A revisited
    /// offset or an offset outside the file aborts with `CorruptXRef`.
    pub fn parse_at(&mut self, startxref: usize) -> SplitResult<()> {
        let mut next = Some(startxref as u64);
        let mut seen: FxHashSet<u64> = FxHashSet::default();

        while let Some(offset64) = next {
            if !seen.insert(offset64) {
                return Err(SplitError::CorruptXRef {
                    offset: offset64 as usize,
                    message: "cycle in cross-reference section chain".to_string(),
                });
            }
            let offset = offset64 as usize;
            if offset >= self.base.length() {
                return Err(SplitError::CorruptXRef {
                    offset,
                    message: format!(
                        "cross-reference offset outside the file ({} bytes)",
                        self.base.length()
                    ),
                });
            }
            next = self.parse_section(offset)?;
        }

        if self.entries.is_empty() {
            return Err(SplitError::CorruptXRef {
                offset: startxref,
                message: "no cross-reference entries found".to_string(),
            });
        }
        Ok(())
    }

    /// Parses one cross-reference section, classic or stream form, and
    /// returns the /Prev offset when the chain continues.
    fn parse_section(&mut self, offset: usize) -> SplitResult<Option<u64>> {
        let window_end = (offset + 32).min(self.base.length());
        let window = self.base.get_byte_range(offset, window_end)?;
        let body = window
            .iter()
            .position(|b| !matches!(b, 0x00 | 0x09 | 0x0A | 0x0C | 0x0D | 0x20))
            .unwrap_or(window.len());

        if window[body..].starts_with(b"xref") {
            self.parse_table_section(offset)
        } else {
            self.parse_stream_section(offset)
        }
    }

    /// Parses a classic `xref` table section and its trailer.
    fn parse_table_section(&mut self, offset: usize) -> SplitResult<Option<u64>> {
        let sub = self
            .base
            .make_sub_stream(offset, self.base.length() - offset)?;
        let mut lexer = Lexer::new(sub)?;

        match lexer.next_token()? {
            Token::Keyword(k) if k == "xref" => {}
            other => {
                return Err(SplitError::CorruptXRef {
                    offset,
                    message: format!("expected 'xref', got {:?}", other),
                })
            }
        }

        loop {
            match lexer.next_token()? {
                Token::Keyword(k) if k == "trailer" => break,
                Token::Integer(first) if first >= 0 => {
                    let count = match lexer.next_token()? {
                        Token::Integer(c) if c >= 0 => c as u64,
                        other => {
                            return Err(SplitError::CorruptXRef {
                                offset,
                                message: format!("expected subsection count, got {:?}", other),
                            })
                        }
                    };

                    for i in 0..count {
                        let f1 = self.expect_entry_field(&mut lexer, offset)?;
                        let f2 = self.expect_entry_field(&mut lexer, offset)?;
                        let kind = match lexer.next_token()? {
                            Token::Keyword(k) => k,
                            other => {
                                return Err(SplitError::CorruptXRef {
                                    offset,
                                    message: format!("expected entry type, got {:?}", other),
                                })
                            }
                        };

                        let entry = match kind.as_str() {
                            "f" => XRefEntry::Free {
                                next_free: f1,
                                generation: f2 as u32,
                            },
                            "n" => XRefEntry::Uncompressed {
                                offset: f1,
                                generation: f2 as u32,
                            },
                            _ => {
                                return Err(SplitError::CorruptXRef {
                                    offset,
                                    message: format!("invalid entry type '{}'", kind),
                                })
                            }
                        };
                        self.set_entry(first as u64 + i, entry, offset)?;
                    }
                }
                other => {
                    return Err(SplitError::CorruptXRef {
                        offset,
                        message: format!("unexpected token {:?} in cross-reference table", other),
                    })
                }
            }
        }

        let mut parser = Parser::new(lexer)?;
        let trailer = match parser.parse_object()? {
            Object::Dictionary(dict) => dict,
            other => {
                return Err(SplitError::CorruptXRef {
                    offset,
                    message: format!("trailer is not a dictionary: {:?}", other),
                })
            }
        };

        let prev = trailer.get("Prev").and_then(Object::as_integer);
        let hybrid = trailer.get("XRefStm").and_then(Object::as_integer);
        self.merge_trailer(trailer);

        // Hybrid file: the table's companion cross-reference stream covers
        // the compressed objects. Its own /Prev is not part of the chain.
        if let Some(stm) = hybrid {
            if stm >= 0 && (stm as usize) < self.base.length() {
                if let Err(e) = self.parse_stream_section(stm as usize) {
                    warn!(offset = stm, error = %e, "ignoring broken /XRefStm section");
                }
            } else {
                warn!(offset = stm, "ignoring out-of-range /XRefStm offset");
            }
        }

        Ok(prev.filter(|p| *p >= 0).map(|p| p as u64))
    }

    fn expect_entry_field(&self, lexer: &mut Lexer, offset: usize) -> SplitResult<u64> {
        match lexer.next_token()? {
            Token::Integer(v) if v >= 0 => Ok(v as u64),
            other => Err(SplitError::CorruptXRef {
                offset,
                message: format!("expected entry field, got {:?}", other),
            }),
        }
    }

    /// Parses a cross-reference stream section (`/Type /XRef`).
    fn parse_stream_section(&mut self, offset: usize) -> SplitResult<Option<u64>> {
        let sub = self
            .base
            .make_sub_stream(offset, self.base.length() - offset)?;
        let mut parser = Parser::new(Lexer::new(sub)?)?;
        let (_, obj) = parser.parse_indirect_object()?;

        let (dict, data) = match obj {
            Object::Stream { dict, data } => (dict, data),
            other => {
                return Err(SplitError::CorruptXRef {
                    offset,
                    message: format!("expected a cross-reference stream, got {:?}", other),
                })
            }
        };

        if !dict.get("Type").map(|t| t.is_name("XRef")).unwrap_or(false) {
            return Err(SplitError::CorruptXRef {
                offset,
                message: "cross-reference stream missing /Type /XRef".to_string(),
            });
        }

        let decoded = decode::decode_stream_payload(&dict, &data)?;

        let size = dict
            .get("Size")
            .and_then(Object::as_integer)
            .filter(|s| *s >= 0)
            .ok_or_else(|| SplitError::CorruptXRef {
                offset,
                message: "cross-reference stream missing /Size".to_string(),
            })? as u64;

        let widths: SmallVec<[usize; 3]> = dict
            .get("W")
            .and_then(Object::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|o| o.as_integer().and_then(|n| usize::try_from(n).ok()))
                    .collect::<Option<SmallVec<[usize; 3]>>>()
            })
            .unwrap_or(None)
            .ok_or_else(|| SplitError::CorruptXRef {
                offset,
                message: "cross-reference stream missing or invalid /W".to_string(),
            })?;

        if widths.len() != 3 || widths.iter().any(|w| *w > 8) {
            return Err(SplitError::CorruptXRef {
                offset,
                message: format!("invalid /W {:?}", widths),
            });
        }
        let row_width: usize = widths.iter().sum();
        if row_width == 0 {
            return Err(SplitError::CorruptXRef {
                offset,
                message: "zero-width /W row".to_string(),
            });
        }

        let index_pairs: Vec<(u64, u64)> = match dict.get("Index").and_then(Object::as_array) {
            Some(items) => {
                if items.len() % 2 != 0 {
                    return Err(SplitError::CorruptXRef {
                        offset,
                        message: "odd-length /Index".to_string(),
                    });
                }
                items
                    .chunks(2)
                    .map(|pair| {
                        let a = pair[0].as_integer()?;
                        let b = pair[1].as_integer()?;
                        if a >= 0 && b >= 0 {
                            Some((a as u64, b as u64))
                        } else {
                            None
                        }
                    })
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| SplitError::CorruptXRef {
                        offset,
                        message: "invalid /Index".to_string(),
                    })?
            }
            None => vec![(0, size)],
        };

        let mut pos = 0usize;
        for (start, count) in index_pairs {
            for i in 0..count {
                if pos + row_width > decoded.len() {
                    return Err(SplitError::CorruptXRef {
                        offset,
                        message: "cross-reference stream data ends short of /Index".to_string(),
                    });
                }
                let kind = if widths[0] == 0 {
                    1
                } else {
                    read_be(&decoded[pos..pos + widths[0]])
                };
                let mid = pos + widths[0];
                let f2 = read_be(&decoded[mid..mid + widths[1]]);
                let f3 = read_be(&decoded[mid + widths[1]..mid + widths[1] + widths[2]]);
                pos += row_width;

                let num = start + i;
                let entry = match kind {
                    0 => XRefEntry::Free {
                        next_free: f2,
                        generation: f3 as u32,
                    },
                    1 => XRefEntry::Uncompressed {
                        offset: f2,
                        generation: f3 as u32,
                    },
                    2 => XRefEntry::Compressed {
                        container: f2 as u32,
                        index: f3 as u32,
                    },
                    other => {
                        warn!(kind = other, num, "skipping cross-reference entry of unknown type");
                        continue;
                    }
                };
                self.set_entry(num, entry, offset)?;
            }
        }

        let prev = dict.get("Prev").and_then(Object::as_integer);
        self.merge_trailer(dict);
        Ok(prev.filter(|p| *p >= 0).map(|p| p as u64))
    }

    /// Records an entry unless an earlier (newer) section already defined
    /// this object number.
    fn set_entry(&mut self, num: u64, entry: XRefEntry, section_offset: usize) -> SplitResult<()> {
        let idx = num as usize;
        if idx >= MAX_OBJECTS {
            return Err(SplitError::CorruptXRef {
                offset: section_offset,
                message: format!("unreasonable object number {}", num),
            });
        }
        if self.entries.len() <= idx {
            self.entries.resize_with(idx + 1, || None);
        }
        if self.entries[idx].is_none() {
            self.entries[idx] = Some(entry);
        }
        Ok(())
    }

    /// Folds a section's trailer keys into the merged trailer. Structural
    /// keys of the section itself do not carry over.
    fn merge_trailer(&mut self, section: Dict) {
        for (key, value) in section {
            if matches!(
                key.as_str(),
                "Type" | "W" | "Index" | "Filter" | "DecodeParms" | "Length" | "Prev" | "XRefStm"
            ) {
                continue;
            }
            self.trailer.entry(key).or_insert(value);
        }
    }

    /// Resolves an indirect object to its most recent definition.
    ///
    /// References to undefined or free objects resolve to null, matching
    /// standard reader behavior. Results are memoized.
    pub fn fetch(&self, num: u32, generation: u32) -> SplitResult<Object> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = cache.get(&num) {
                return Ok(cached.clone());
            }
        }

        let entry = match self.entries.get(num as usize).and_then(|e| e.as_ref()) {
            Some(entry) => entry,
            None => {
                warn!(num, generation, "reference to undefined object resolves to null");
                return Ok(Object::Null);
            }
        };

        let object = match entry {
            XRefEntry::Free { .. } => {
                warn!(num, "reference to free object resolves to null");
                return Ok(Object::Null);
            }
            XRefEntry::Uncompressed {
                offset,
                generation: entry_generation,
            } => {
                if generation != *entry_generation {
                    warn!(
                        num,
                        requested = generation,
                        actual = entry_generation,
                        "generation mismatch resolves to null"
                    );
                    return Ok(Object::Null);
                }
                self.parse_object_at(*offset as usize, num, generation)?
            }
            XRefEntry::Compressed { container, index } => {
                self.fetch_compressed(num, *container, *index)?
            }
        };

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        Ok(cache.entry(num).or_insert(object).clone())
    }

    /// Resolves `obj` when it is a reference, passes it through otherwise.
    pub fn fetch_if_reference(&self, obj: &Object) -> SplitResult<Object> {
        match obj {
            Object::Reference(id) => self.fetch(id.num, id.generation),
            _ => Ok(obj.clone()),
        }
    }

    /// Returns the document catalog referenced by the trailer /Root.
    pub fn catalog(&self) -> SplitResult<Dict> {
        let root = self
            .trailer
            .get("Root")
            .ok_or_else(|| SplitError::CorruptXRef {
                offset: 0,
                message: "no /Root in trailer".to_string(),
            })?
            .clone();

        match self.fetch_if_reference(&root)? {
            Object::Dictionary(dict) => Ok(dict),
            other => Err(SplitError::CorruptXRef {
                offset: 0,
                message: format!("document catalog is not a dictionary: {:?}", other),
            }),
        }
    }

    /// Parses an uncompressed indirect object at a byte offset, verifying
    /// that its framing names the expected object.
    fn parse_object_at(&self, offset: usize, num: u32, generation: u32) -> SplitResult<Object> {
        if offset >= self.base.length() {
            return Err(SplitError::CorruptXRef {
                offset,
                message: format!("object {} offset outside the file", num),
            });
        }
        let sub = self
            .base
            .make_sub_stream(offset, self.base.length() - offset)?;
        let mut parser = Parser::new(Lexer::new(sub)?)?;
        let (id, object) = parser.parse_indirect_object()?;

        if id.num != num || id.generation != generation {
            return Err(SplitError::CorruptXRef {
                offset,
                message: format!(
                    "cross-reference points at object {} but found {}",
                    ObjectId::new(num, generation),
                    id
                ),
            });
        }
        Ok(object)
    }

    /// Resolves an object stored inside an object stream.
    fn fetch_compressed(&self, num: u32, container: u32, index: u32) -> SplitResult<Object> {
        let centry = self
            .entries
            .get(container as usize)
            .and_then(|e| e.as_ref())
            .ok_or_else(|| SplitError::CorruptXRef {
                offset: 0,
                message: format!("object stream {} is not defined", container),
            })?;

        let (container_offset, container_generation) = match centry {
            XRefEntry::Uncompressed { offset, generation } => (*offset as usize, *generation),
            _ => {
                return Err(SplitError::CorruptXRef {
                    offset: 0,
                    message: format!("object stream {} is free or itself compressed", container),
                })
            }
        };

        // The container goes through the cache too: its entries usually
        // resolve in batches.
        let container_obj = {
            let cached = {
                let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
                cache.get(&container).cloned()
            };
            match cached {
                Some(obj) => obj,
                None => {
                    let parsed =
                        self.parse_object_at(container_offset, container, container_generation)?;
                    let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
                    cache.entry(container).or_insert(parsed).clone()
                }
            }
        };

        let (dict, data) = match container_obj {
            Object::Stream { dict, data } => (dict, data),
            other => {
                return Err(SplitError::CorruptXRef {
                    offset: container_offset,
                    message: format!("object stream container is not a stream: {:?}", other),
                })
            }
        };

        if !dict.get("Type").map(|t| t.is_name("ObjStm")).unwrap_or(false) {
            debug!(container, "object stream container missing /Type /ObjStm");
        }

        let decoded = decode::decode_stream_payload(&dict, &data)?;

        let n = dict
            .get("N")
            .and_then(Object::as_integer)
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| SplitError::CorruptXRef {
                offset: container_offset,
                message: "object stream missing /N".to_string(),
            })?;
        let first = dict
            .get("First")
            .and_then(Object::as_integer)
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| SplitError::CorruptXRef {
                offset: container_offset,
                message: "object stream missing /First".to_string(),
            })?;

        if index as usize >= n {
            return Err(SplitError::CorruptXRef {
                offset: container_offset,
                message: format!("object stream index {} out of range ({} entries)", index, n),
            });
        }
        if first > decoded.len() {
            return Err(SplitError::CorruptXRef {
                offset: container_offset,
                message: "object stream /First beyond data".to_string(),
            });
        }

        // Header: N pairs of (object number, relative offset)
        let header = Stream::from_bytes(decoded[..first].to_vec());
        let mut lexer = Lexer::new(Box::new(header))?;
        let mut pair = (0u64, 0u64);
        for _ in 0..=index as usize {
            let entry_num = match lexer.next_token()? {
                Token::Integer(v) if v >= 0 => v as u64,
                other => {
                    return Err(SplitError::CorruptXRef {
                        offset: container_offset,
                        message: format!("malformed object stream header: {:?}", other),
                    })
                }
            };
            let entry_offset = match lexer.next_token()? {
                Token::Integer(v) if v >= 0 => v as u64,
                other => {
                    return Err(SplitError::CorruptXRef {
                        offset: container_offset,
                        message: format!("malformed object stream header: {:?}", other),
                    })
                }
            };
            pair = (entry_num, entry_offset);
        }

        if pair.0 != num as u64 {
            return Err(SplitError::CorruptXRef {
                offset: container_offset,
                message: format!(
                    "object stream entry {} names object {}, expected {}",
                    index, pair.0, num
                ),
            });
        }

        let object_start = first + pair.1 as usize;
        if object_start >= decoded.len() {
            return Err(SplitError::CorruptXRef {
                offset: container_offset,
                message: "object stream entry offset beyond data".to_string(),
            });
        }

        let total = decoded.len();
        let sub = Stream::new(decoded, object_start, total - object_start);
        let mut parser = Parser::new(Lexer::new(Box::new(sub))?)?;
        parser.parse_object()
    }
}
