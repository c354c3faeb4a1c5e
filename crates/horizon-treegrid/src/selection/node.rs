//! Per-level selection state and the structural-change algorithm.
//!
//! Every realized level of the tree is a [`SelectionNode`] stored in a
//! key-indexed arena owned by the model. Tree edges are [`NodeKey`]s, so
//! subtree walks are explicit key traversals instead of recursion and no node
//! needs a back-reference to its owner.

use slotmap::{SlotMap, new_key_type};

use super::model::Operation;
use super::path::IndexPath;
use super::range::{IndexRange, RangeCollection};
use super::source::{CollectionChange, SourceRef};
use crate::signal::ConnectionId;

new_key_type! {
    /// Arena key for a realized selection node.
    pub(crate) struct NodeKey;
}

/// Selection state for the children of one item (or of the root collection).
///
/// Lifecycle: created without a source when first touched, gains a source and
/// subscription when its backing collection is resolved, and is detached
/// (source released, subscription disconnected) when the corresponding item
/// leaves its parent's collection. A detached node never receives another
/// notification.
pub(crate) struct SelectionNode<T> {
    /// This node's own position; empty for the root.
    pub(crate) path: IndexPath,
    /// The backing collection for this node's children, if resolved.
    pub(crate) source: Option<SourceRef<T>>,
    /// Connection token on the source's change signal.
    pub(crate) subscription: Option<ConnectionId>,
    /// Selected indices among this node's direct children.
    pub(crate) ranges: RangeCollection,
    /// Sparse child slots, index-aligned with the source collection. A slot is
    /// occupied only once that child has itself been visited or selected.
    pub(crate) children: Vec<Option<NodeKey>>,
}

impl<T> SelectionNode<T> {
    pub(crate) fn new(path: IndexPath) -> Self {
        Self {
            path,
            source: None,
            subscription: None,
            ranges: RangeCollection::new(),
            children: Vec::new(),
        }
    }

    /// Returns the realized child key at `index`, if any.
    pub(crate) fn get_child(&self, index: usize) -> Option<NodeKey> {
        self.children.get(index).copied().flatten()
    }

    /// Selects `range` among this node's children, clamped to the source
    /// bounds when a source is attached. Returns the newly selected sub-ranges.
    pub(crate) fn commit_select(&mut self, range: IndexRange) -> Vec<IndexRange> {
        match self.clamp(range) {
            Some(range) => self.ranges.select(range),
            None => Vec::new(),
        }
    }

    /// Deselects `range`, clamped like [`commit_select`](Self::commit_select).
    /// Returns the sub-ranges actually removed.
    pub(crate) fn commit_deselect(&mut self, range: IndexRange) -> Vec<IndexRange> {
        match self.clamp(range) {
            Some(range) => self.ranges.deselect(range),
            None => Vec::new(),
        }
    }

    /// Clamps a requested span to the current source bounds. Requests wholly
    /// outside the collection yield `None`; without a source the bounds are
    /// unknown and the span passes through.
    fn clamp(&self, range: IndexRange) -> Option<IndexRange> {
        let Some(source) = &self.source else {
            return Some(range);
        };
        let len = source.len();
        if len == 0 || range.begin() >= len {
            return None;
        }
        Some(IndexRange::new(range.begin(), range.end().min(len - 1)))
    }

    /// Disconnects from the source's change signal and releases the source
    /// reference. Terminal: the node is orphaned from future updates.
    pub(crate) fn release_source(&mut self) {
        if let (Some(source), Some(conn)) = (self.source.as_ref(), self.subscription.take()) {
            source.changed().disconnect(conn);
        }
        self.source = None;
    }
}

/// Data a node reports to the owning model after absorbing a structural
/// change: where indices shifted, by how much, and which selected item values
/// were removed (resolved while their sources were still reachable).
pub(crate) struct NodeChange<T> {
    pub(crate) path: IndexPath,
    pub(crate) shift_index: usize,
    pub(crate) shift_delta: isize,
    pub(crate) indexes_changed: bool,
    pub(crate) removed_items: Vec<T>,
}

/// Applies a backing-collection change to the node at `key`.
///
/// This is the consistency core: the node's own ranges are adjusted first,
/// children inside a removed span are torn down, surviving children and their
/// whole subtrees get their paths corrected, and the child array is spliced to
/// stay index-aligned with the source. Deselected ranges (own and torn-down
/// descendants) are recorded in `operation` in pre-change coordinates.
///
/// Precondition: one event per logical source mutation. A replacement arrives
/// as a single `Replaced` event so the child shift runs once with the net
/// delta, after the node's own range adjustment has completed.
///
/// Panics on `Reset`; there is no general strategy for reconciling an unknown
/// structural change and silently producing an inconsistent selection is
/// worse than failing.
pub(crate) fn apply_collection_change<T: Clone>(
    nodes: &mut SlotMap<NodeKey, SelectionNode<T>>,
    operation: &mut Operation<T>,
    key: NodeKey,
    change: &CollectionChange<T>,
) -> Option<NodeChange<T>> {
    let node = &mut nodes[key];
    let path = node.path.clone();

    let shift_index;
    let shift_delta;
    let mut indexes_changed;
    let mut removed_items = Vec::new();

    match change {
        CollectionChange::Inserted { index, items } => {
            shift_index = *index;
            shift_delta = items.len() as isize;
            indexes_changed = node.ranges.insert_items(*index, items.len());
        }
        CollectionChange::Removed { index, items } => {
            shift_index = *index;
            shift_delta = -(items.len() as isize);
            let (removed_ranges, changed) = node.ranges.remove_items(*index, items.len());
            indexes_changed = changed;
            capture_removed(&removed_ranges, *index, items, &mut removed_items);
            for range in removed_ranges {
                operation.deselect(path.clone(), range);
            }
        }
        CollectionChange::Replaced {
            index,
            old_items,
            new_items,
        } => {
            let (removed_ranges, _) = node.ranges.remove_items(*index, old_items.len());
            node.ranges.insert_items(*index, new_items.len());
            shift_index = *index;
            shift_delta = new_items.len() as isize - old_items.len() as isize;
            indexes_changed = shift_delta != 0;
            capture_removed(&removed_ranges, *index, old_items, &mut removed_items);
            for range in removed_ranges {
                operation.deselect(path.clone(), range);
            }
        }
        CollectionChange::Reset => {
            tracing::error!(
                target: "horizon_treegrid::selection",
                path = %path,
                "reset event on a tracked collection"
            );
            panic!("reset collection changes are not supported by the selection model");
        }
    }

    // Adjust the realized children. Children inside a removed span are torn
    // down; everything at or after the shift point has its subtree paths
    // corrected top-down, then the child array is spliced to stay aligned.
    let node = &mut nodes[key];
    if !node.children.is_empty() && shift_delta != 0 {
        let child_keys: Vec<(usize, Option<NodeKey>)> = node
            .children
            .iter()
            .enumerate()
            .skip(shift_index)
            .map(|(i, slot)| (i, *slot))
            .collect();
        let removed_span_end = shift_index + shift_delta.unsigned_abs();

        for (i, slot) in child_keys {
            if shift_delta < 0 && i < removed_span_end {
                if let Some(child) = slot {
                    ancestor_removed(nodes, operation, &mut removed_items, child);
                }
            } else {
                if let Some(child) = slot {
                    ancestor_index_changed(nodes, child, path.depth(), shift_index, shift_delta);
                }
                indexes_changed = true;
            }
        }

        let node = &mut nodes[key];
        if shift_delta > 0 {
            let at = shift_index.min(node.children.len());
            node.children
                .splice(at..at, std::iter::repeat_n(None, shift_delta as usize));
        } else {
            let end = removed_span_end.min(node.children.len());
            let begin = shift_index.min(end);
            node.children.drain(begin..end);
        }
    }

    if shift_delta != 0 || !removed_items.is_empty() {
        Some(NodeChange {
            path,
            shift_index,
            shift_delta,
            indexes_changed,
            removed_items,
        })
    } else {
        None
    }
}

/// Resolves deselected ranges back to item values using the change payload.
/// Ranges are in pre-removal coordinates, so `items[i - index]` is the value
/// that sat at index `i`.
fn capture_removed<T: Clone>(
    removed_ranges: &[IndexRange],
    index: usize,
    items: &[T],
    out: &mut Vec<T>,
) {
    for range in removed_ranges {
        for i in range.iter() {
            out.push(items[i - index].clone());
        }
    }
}

/// Tears down the subtree rooted at `start` after its item left the parent
/// collection.
///
/// Preorder walk with an explicit stack: each node's selected indices are
/// resolved to item values through its own, still-attached source view and
/// its deselected ranges recorded, then the source reference is released and
/// the node removed from the arena.
pub(crate) fn ancestor_removed<T: Clone>(
    nodes: &mut SlotMap<NodeKey, SelectionNode<T>>,
    operation: &mut Operation<T>,
    removed_items: &mut Vec<T>,
    start: NodeKey,
) {
    let mut stack = vec![start];
    while let Some(key) = stack.pop() {
        let Some(mut node) = nodes.remove(key) else {
            continue;
        };
        if !node.ranges.is_empty() {
            if let Some(source) = &node.source {
                for range in node.ranges.iter() {
                    for i in range.iter() {
                        if let Some(item) = source.get(i) {
                            removed_items.push(item);
                        }
                    }
                }
            }
            for range in node.ranges.iter() {
                operation.deselect(node.path.clone(), range);
            }
        }
        tracing::trace!(
            target: "horizon_treegrid::selection",
            path = %node.path,
            "detaching selection node"
        );
        node.release_source();
        stack.extend(node.children.iter().rev().flatten().copied());
    }
}

/// Corrects the paths of the subtree rooted at `start` after an ancestor's
/// sibling collection shifted at `shift_index` by `shift_delta`.
///
/// Explicit stack, visiting each node before its descendants: every
/// descendant path embeds the ancestor's index at `ancestor_depth`, so the
/// same element is corrected throughout the subtree using the already-updated
/// ancestor position.
pub(crate) fn ancestor_index_changed<T>(
    nodes: &mut SlotMap<NodeKey, SelectionNode<T>>,
    start: NodeKey,
    ancestor_depth: usize,
    shift_index: usize,
    shift_delta: isize,
) {
    let mut stack = vec![start];
    while let Some(key) = stack.pop() {
        let node = &mut nodes[key];
        if node
            .path
            .get(ancestor_depth)
            .is_some_and(|i| i >= shift_index)
        {
            node.path = node.path.with_shifted(ancestor_depth, shift_delta);
        }
        stack.extend(node.children.iter().flatten().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use super::super::source::ObservableList;

    fn arena_with_root<T>() -> (SlotMap<NodeKey, SelectionNode<T>>, NodeKey) {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SelectionNode::new(IndexPath::root()));
        (nodes, root)
    }

    #[test]
    fn test_commit_select_clamps_to_source() {
        let (mut nodes, root) = arena_with_root::<i32>();
        nodes[root].source = Some(Arc::new(ObservableList::new(vec![1, 2, 3])));

        let added = nodes[root].commit_select(IndexRange::new(1, 10));
        assert_eq!(added, vec![IndexRange::new(1, 2)]);
        assert!(nodes[root].commit_select(IndexRange::new(5, 9)).is_empty());
    }

    #[test]
    fn test_commit_select_unbounded_without_source() {
        let (mut nodes, root) = arena_with_root::<i32>();
        let added = nodes[root].commit_select(IndexRange::new(0, 4));
        assert_eq!(added, vec![IndexRange::new(0, 4)]);
    }

    #[test]
    fn test_insert_shifts_ranges_and_child_slots() {
        let (mut nodes, root) = arena_with_root::<i32>();
        nodes[root].commit_select(IndexRange::new(2, 4));
        let child = nodes.insert(SelectionNode::new(IndexPath::from([3])));
        nodes[root].children = vec![None, None, None, Some(child), None];

        let mut operation = Operation::default();
        let change = apply_collection_change(
            &mut nodes,
            &mut operation,
            root,
            &CollectionChange::Inserted {
                index: 1,
                items: vec![8, 9],
            },
        )
        .expect("insert shifts indices");

        assert_eq!(change.shift_index, 1);
        assert_eq!(change.shift_delta, 2);
        assert!(change.indexes_changed);
        assert_eq!(nodes[root].ranges.ranges(), &[IndexRange::new(4, 6)]);
        assert_eq!(nodes[root].children.len(), 7);
        assert_eq!(nodes[root].get_child(5), Some(child));
        assert_eq!(nodes[child].path, IndexPath::from([5]));
    }

    #[test]
    fn test_remove_captures_values_before_detach() {
        let (mut nodes, root) = arena_with_root::<&str>();
        nodes[root].commit_select(IndexRange::new(0, 4));

        let mut operation = Operation::default();
        let change = apply_collection_change(
            &mut nodes,
            &mut operation,
            root,
            &CollectionChange::Removed {
                index: 1,
                items: vec!["b", "c", "d"],
            },
        )
        .expect("removal changes indices");

        assert_eq!(change.shift_delta, -3);
        assert_eq!(change.removed_items, vec!["b", "c", "d"]);
        assert_eq!(
            nodes[root].ranges.ranges(),
            &[IndexRange::new(0, 0), IndexRange::new(1, 1)]
        );
    }

    #[test]
    fn test_removed_child_subtree_is_torn_down() {
        let (mut nodes, root) = arena_with_root::<&str>();
        let child_source = Arc::new(ObservableList::new(vec!["x", "y"]));
        let child = nodes.insert(SelectionNode::new(IndexPath::from([1])));
        nodes[child].source = Some(child_source.clone());
        nodes[child].commit_select(IndexRange::new(0, 1));
        nodes[root].children = vec![None, Some(child)];

        let mut operation = Operation::default();
        let change = apply_collection_change(
            &mut nodes,
            &mut operation,
            root,
            &CollectionChange::Removed {
                index: 1,
                items: vec!["parent"],
            },
        )
        .expect("removal changes indices");

        // The child's own selected values resolve through its source view.
        assert_eq!(change.removed_items, vec!["x", "y"]);
        assert!(!nodes.contains_key(child));
        assert_eq!(nodes[root].children, vec![None]);
    }

    #[test]
    #[should_panic(expected = "reset collection changes are not supported")]
    fn test_reset_is_fatal() {
        let (mut nodes, root) = arena_with_root::<i32>();
        let mut operation = Operation::default();
        apply_collection_change(&mut nodes, &mut operation, root, &CollectionChange::Reset);
    }
}
