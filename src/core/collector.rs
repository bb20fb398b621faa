use super::error::SplitResult;
use super::parser::{Object, ObjectId};
use super::xref::XRef;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// The object closure of a split request.
///
/// `order` lists the members in first-seen order; the writer numbers them
/// in exactly this order, so related objects stay close together in the
/// output and repeated requests produce identical files.
pub struct Closure {
    pub order: Vec<ObjectId>,
    pub objects: FxHashMap<ObjectId, Object>,
}

/// Computes the set of objects transitively reachable from `roots`.
///
/// Breadth-first over every indirect reference, deduplicated with a
/// visited set so cyclic graphs terminate. References into `excluded`
/// (the source page-tree nodes) are not traversed: the writer either
/// rewires those to new page copies or drops them to null.
pub fn collect_closure(
    xref: &XRef,
    roots: &[Object],
    excluded: &FxHashSet<ObjectId>,
) -> SplitResult<Closure> {
    let mut visited: FxHashSet<ObjectId> = FxHashSet::default();
    let mut queue: VecDeque<ObjectId> = VecDeque::new();
    let mut order = Vec::new();
    let mut objects: FxHashMap<ObjectId, Object> = FxHashMap::default();

    for root in roots {
        scan_value(root, excluded, &mut visited, &mut queue);
    }

    while let Some(id) = queue.pop_front() {
        let object = xref.fetch(id.num, id.generation)?;
        scan_value(&object, excluded, &mut visited, &mut queue);
        order.push(id);
        objects.insert(id, object);
    }

    Ok(Closure { order, objects })
}

/// Enqueues every not-yet-seen reference inside `value`.
fn scan_value(
    value: &Object,
    excluded: &FxHashSet<ObjectId>,
    visited: &mut FxHashSet<ObjectId>,
    queue: &mut VecDeque<ObjectId>,
) {
    let mut stack = vec![value];

    while let Some(current) = stack.pop() {
        match current {
            Object::Reference(id) => {
                if !excluded.contains(id) && visited.insert(*id) {
                    queue.push_back(*id);
                }
            }
            Object::Array(items) => stack.extend(items.iter()),
            Object::Dictionary(dict) => stack.extend(dict.values()),
            Object::Stream { dict, .. } => stack.extend(dict.values()),
            _ => {}
        }
    }
}
