use super::error::{SplitError, SplitResult};
use super::parser::{Dict, Object, ObjectId};
use super::xref::XRef;
use rustc_hash::FxHashSet;
use tracing::warn;

/// Page attributes that inherit from ancestor /Pages nodes.
pub const INHERITABLE_KEYS: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// A page leaf found by the tree walk.
///
/// `inherited` holds the inheritable attributes accumulated along the
/// ancestor path (nearest ancestor wins); the leaf's own dictionary
/// overrides them. The writer materializes inherited values into each page
/// copy, because the copies are re-parented under a flat pages root.
#[derive(Debug, Clone)]
pub struct PageNode {
    /// The page object's id in the source document
    pub id: ObjectId,

    /// The page leaf's own dictionary
    pub dict: Dict,

    /// Inheritable attributes resolved along the ancestor path
    pub inherited: Dict,
}

struct Frame {
    kids: Vec<Object>,
    next: usize,
    id: ObjectId,
    inherited: Dict,
}

fn collect_inheritable(node: &Dict, base: &Dict) -> Dict {
    let mut inherited = base.clone();
    for key in INHERITABLE_KEYS {
        if let Some(value) = node.get(key) {
            inherited.insert(key.to_string(), value.clone());
        }
    }
    inherited
}

fn kids_of(node: &Dict, id: ObjectId) -> Vec<Object> {
    match node.get("Kids") {
        Some(Object::Array(kids)) => kids.clone(),
        Some(other) => {
            warn!(node = %id, "/Kids is not an array: {:?}", other);
            Vec::new()
        }
        None => {
            warn!(node = %id, "interior pages node without /Kids");
            Vec::new()
        }
    }
}

/// Walks the page tree depth-first, left-to-right over /Kids.
///
/// Returns the ordered page leaves (index order equals page order) and the
/// id set of every page-tree node, interior and leaf. A node revisited
/// along the current path is a `StructuralCycle`; sharing between disjoint
/// branches is tolerated.
pub fn walk_page_tree(
    xref: &XRef,
    catalog: &Dict,
) -> SplitResult<(Vec<PageNode>, FxHashSet<ObjectId>)> {
    let root_id = catalog
        .get("Pages")
        .and_then(Object::as_reference)
        .ok_or_else(|| SplitError::MalformedSyntax {
            offset: 0,
            message: "catalog /Pages missing or not an indirect reference".to_string(),
        })?;

    let root_dict = match xref.fetch(root_id.num, root_id.generation)? {
        Object::Dictionary(dict) => dict,
        other => {
            return Err(SplitError::MalformedSyntax {
                offset: 0,
                message: format!("page tree root {} is not a dictionary: {:?}", root_id, other),
            })
        }
    };

    let mut pages = Vec::new();
    let mut tree_ids: FxHashSet<ObjectId> = FxHashSet::default();
    let mut on_path: FxHashSet<ObjectId> = FxHashSet::default();

    tree_ids.insert(root_id);
    on_path.insert(root_id);

    let root_inherited = collect_inheritable(&root_dict, &Dict::default());
    let mut path = vec![Frame {
        kids: kids_of(&root_dict, root_id),
        next: 0,
        id: root_id,
        inherited: root_inherited,
    }];

    while let Some(frame) = path.last_mut() {
        if frame.next >= frame.kids.len() {
            on_path.remove(&frame.id);
            path.pop();
            continue;
        }

        let kid = frame.kids[frame.next].clone();
        frame.next += 1;
        let inherited = frame.inherited.clone();

        let kid_id = match kid.as_reference() {
            Some(id) => id,
            None => {
                warn!("skipping non-reference /Kids entry {:?}", kid);
                continue;
            }
        };

        if on_path.contains(&kid_id) {
            return Err(SplitError::StructuralCycle {
                num: kid_id.num,
                generation: kid_id.generation,
            });
        }

        let kid_dict = match xref.fetch(kid_id.num, kid_id.generation)? {
            Object::Dictionary(dict) => dict,
            other => {
                warn!(node = %kid_id, "skipping non-dictionary page tree node {:?}", other);
                continue;
            }
        };

        // Classify by /Type, falling back to the presence of /Kids
        let is_interior = match kid_dict.get("Type") {
            Some(t) if t.is_name("Pages") => true,
            Some(t) if t.is_name("Page") => false,
            _ => kid_dict.contains_key("Kids"),
        };

        tree_ids.insert(kid_id);

        if is_interior {
            on_path.insert(kid_id);
            let node_inherited = collect_inheritable(&kid_dict, &inherited);
            path.push(Frame {
                kids: kids_of(&kid_dict, kid_id),
                next: 0,
                id: kid_id,
                inherited: node_inherited,
            });
        } else {
            pages.push(PageNode {
                id: kid_id,
                dict: kid_dict,
                inherited,
            });
        }
    }

    Ok((pages, tree_ids))
}

/// Expands 1-based inclusive page ranges into 0-based page indices.
///
/// Caller order is preserved and duplicates are allowed: a page requested
/// twice appears twice in the output. A descending range yields its pages
/// in reverse order. Index zero or a bound beyond the page count is
/// `PageOutOfRange`.
pub fn select_pages(ranges: &[(usize, usize)], page_count: usize) -> SplitResult<Vec<usize>> {
    let mut selected = Vec::new();

    for &(start, end) in ranges {
        if start == 0 || end == 0 {
            return Err(SplitError::PageOutOfRange {
                requested: 0,
                count: page_count,
            });
        }
        let hi = start.max(end);
        if hi > page_count {
            return Err(SplitError::PageOutOfRange {
                requested: hi,
                count: page_count,
            });
        }

        if start <= end {
            selected.extend((start..=end).map(|p| p - 1));
        } else {
            selected.extend((end..=start).rev().map(|p| p - 1));
        }
    }

    Ok(selected)
}
