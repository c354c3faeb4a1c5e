//! The tree selection model.
//!
//! [`TreeSelectionModel`] is the public entry point: it owns the node arena,
//! translates path-addressed select/deselect requests into node operations,
//! resolves child collections lazily through a caller-supplied resolver, and
//! publishes one aggregated [`SelectionChange`] per logical mutation.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_treegrid::{IndexPath, ObservableList, SourceRef, TreeSelectionModel};
//!
//! #[derive(Clone)]
//! struct Node {
//!     children: Arc<ObservableList<Node>>,
//! }
//!
//! let roots = Arc::new(ObservableList::new(vec![Node {
//!     children: Arc::new(ObservableList::new(Vec::new())),
//! }]));
//!
//! let selection = TreeSelectionModel::new(roots.clone(), |node: &Node| {
//!     Some(node.children.clone() as SourceRef<Node>)
//! });
//!
//! selection.selection_changed().connect(|change| {
//!     println!("+{} paths, -{} paths", change.selected.len(), change.deselected.len());
//! });
//!
//! selection.select(&IndexPath::from([0]));
//! assert!(selection.is_selected(&IndexPath::from([0])));
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::SlotMap;

use super::node::{self, NodeKey, SelectionNode};
use super::path::IndexPath;
use super::range::IndexRange;
use super::source::SourceRef;
use crate::signal::{ConnectionId, Signal};

/// Resolves the child collection of an item, or `None` if the item has no
/// children. Called at most once per realized node.
pub type ChildrenResolver<T> = Arc<dyn Fn(&T) -> Option<SourceRef<T>> + Send + Sync>;

/// A published selection change: everything that happened in one logical
/// mutation batch.
///
/// Range maps are keyed by the path of the node owning the ranges; the ranges
/// are sibling indices under that node. `removed_items` carries the values of
/// items that were selected when their collection removed them, resolved
/// before the backing source was released.
#[derive(Clone, Debug)]
pub struct SelectionChange<T> {
    /// Ranges that left the selection, per owning node path.
    pub deselected: BTreeMap<IndexPath, Vec<IndexRange>>,
    /// Ranges that entered the selection, per owning node path.
    pub selected: BTreeMap<IndexPath, Vec<IndexRange>>,
    /// Values of selected items removed from their collections.
    pub removed_items: Vec<T>,
}

/// Aggregation buffer for one logical mutation.
///
/// Accumulated across every node touched by a single select/deselect call or
/// a single source-collection change, then flushed as one [`SelectionChange`].
/// Never published with nothing in it.
pub(crate) struct Operation<T> {
    deselected: BTreeMap<IndexPath, Vec<IndexRange>>,
    selected: BTreeMap<IndexPath, Vec<IndexRange>>,
    removed_items: Vec<T>,
}

impl<T> Default for Operation<T> {
    fn default() -> Self {
        Self {
            deselected: BTreeMap::new(),
            selected: BTreeMap::new(),
            removed_items: Vec::new(),
        }
    }
}

impl<T> Operation<T> {
    pub(crate) fn select(&mut self, path: IndexPath, range: IndexRange) {
        self.selected.entry(path).or_default().push(range);
    }

    pub(crate) fn deselect(&mut self, path: IndexPath, range: IndexRange) {
        self.deselected.entry(path).or_default().push(range);
    }

    pub(crate) fn extend_removed(&mut self, items: Vec<T>) {
        self.removed_items.extend(items);
    }

    fn is_empty(&self) -> bool {
        self.deselected.is_empty() && self.selected.is_empty() && self.removed_items.is_empty()
    }

    fn into_change(self) -> SelectionChange<T> {
        SelectionChange {
            deselected: self.deselected,
            selected: self.selected,
            removed_items: self.removed_items,
        }
    }
}

struct Inner<T> {
    nodes: SlotMap<NodeKey, SelectionNode<T>>,
    root: NodeKey,
    operation: Operation<T>,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    resolver: ChildrenResolver<T>,
    selection_changed: Signal<SelectionChange<T>>,
}

/// Hierarchical selection model over a lazily-realized tree of collections.
///
/// The model tracks selection as per-node index ranges and keeps them
/// consistent while the backing collections mutate at arbitrary depth. All
/// operations are synchronous; mutations (selection requests and collection
/// change notifications) must arrive serialized on one logical thread.
pub struct TreeSelectionModel<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone + Send + Sync + 'static> TreeSelectionModel<T> {
    /// Creates a model tracking `source` as the root collection.
    ///
    /// `resolver` maps an item to its child collection; it is consulted
    /// lazily, at most once per realized node.
    pub fn new<F>(source: SourceRef<T>, resolver: F) -> Self
    where
        F: Fn(&T) -> Option<SourceRef<T>> + Send + Sync + 'static,
    {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SelectionNode::new(IndexPath::root()));
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                nodes,
                root,
                operation: Operation::default(),
            }),
            resolver: Arc::new(resolver),
            selection_changed: Signal::new(),
        });

        let conn = shared.subscribe(root, &source);
        {
            let mut inner = shared.inner.lock();
            let root = inner.root;
            let node = &mut inner.nodes[root];
            node.source = Some(source);
            node.subscription = Some(conn);
        }

        Self { shared }
    }

    /// The signal publishing aggregated selection changes, one emission per
    /// logical mutation batch.
    pub fn selection_changed(&self) -> &Signal<SelectionChange<T>> {
        &self.shared.selection_changed
    }

    /// Selects the item at `path`, realizing ancestor nodes on demand.
    ///
    /// Returns `false` (and publishes nothing) if the path is out of range or
    /// the item was already selected.
    pub fn select(&self, path: &IndexPath) -> bool {
        let (Some(parent), Some(leaf)) = (path.parent(), path.leaf()) else {
            return false;
        };
        self.select_range(&parent, IndexRange::single(leaf))
    }

    /// Deselects the item at `path`.
    ///
    /// Returns `false` if the item was not selected.
    pub fn deselect(&self, path: &IndexPath) -> bool {
        let (Some(parent), Some(leaf)) = (path.parent(), path.leaf()) else {
            return false;
        };
        self.deselect_range(&parent, IndexRange::single(leaf))
    }

    /// Selects a span of children under the node at `parent`.
    ///
    /// Spans reaching past the collection are clamped to the overlapping
    /// subset. Returns `true` if any index became selected.
    pub fn select_range(&self, parent: &IndexPath, range: impl Into<IndexRange>) -> bool {
        let range = range.into();
        let flushed = {
            let mut inner = self.shared.inner.lock();
            let Some(key) = inner.realize_path(&self.shared, parent) else {
                return false;
            };
            let added = inner.nodes[key].commit_select(range);
            if added.is_empty() {
                return false;
            }
            tracing::trace!(
                target: "horizon_treegrid::selection",
                parent = %parent,
                range = ?range,
                "select"
            );
            let path = inner.nodes[key].path.clone();
            for r in &added {
                inner.operation.select(path.clone(), *r);
            }
            inner.flush_operation()
        };
        self.publish(flushed)
    }

    /// Deselects a span of children under the node at `parent`.
    ///
    /// Returns `true` if any index left the selection.
    pub fn deselect_range(&self, parent: &IndexPath, range: impl Into<IndexRange>) -> bool {
        let range = range.into();
        let flushed = {
            let mut inner = self.shared.inner.lock();
            let Some(key) = inner.node_at(parent) else {
                return false;
            };
            let removed = inner.nodes[key].commit_deselect(range);
            if removed.is_empty() {
                return false;
            }
            tracing::trace!(
                target: "horizon_treegrid::selection",
                parent = %parent,
                range = ?range,
                "deselect"
            );
            let path = inner.nodes[key].path.clone();
            for r in &removed {
                inner.operation.deselect(path.clone(), *r);
            }
            inner.flush_operation()
        };
        self.publish(flushed)
    }

    /// Returns `true` if the item at `path` is selected.
    ///
    /// Never realizes nodes; probing an unrealized branch returns `false`.
    pub fn is_selected(&self, path: &IndexPath) -> bool {
        let (Some(parent), Some(leaf)) = (path.parent(), path.leaf()) else {
            return false;
        };
        let inner = self.shared.inner.lock();
        let Some(key) = inner.node_at(&parent) else {
            return false;
        };
        inner.nodes[key].ranges.contains(leaf)
    }

    /// Returns `true` if anything is selected.
    pub fn has_selection(&self) -> bool {
        let inner = self.shared.inner.lock();
        inner.nodes.values().any(|node| !node.ranges.is_empty())
    }

    /// Total number of selected items across the whole tree.
    pub fn count(&self) -> usize {
        let inner = self.shared.inner.lock();
        inner.nodes.values().map(|node| node.ranges.count()).sum()
    }

    /// Every selected path, sorted lexicographically.
    pub fn selected_paths(&self) -> Vec<IndexPath> {
        let inner = self.shared.inner.lock();
        let mut paths = Vec::new();
        for node in inner.nodes.values() {
            for range in node.ranges.iter() {
                for index in range.iter() {
                    paths.push(node.path.child(index));
                }
            }
        }
        paths.sort();
        paths
    }

    /// Every selected item value resolvable through a current source view,
    /// ordered by path.
    pub fn selected_items(&self) -> Vec<T> {
        let inner = self.shared.inner.lock();
        let mut entries = Vec::new();
        for node in inner.nodes.values() {
            let Some(source) = &node.source else {
                continue;
            };
            for range in node.ranges.iter() {
                for index in range.iter() {
                    if let Some(item) = source.get(index) {
                        entries.push((node.path.child(index), item));
                    }
                }
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().map(|(_, item)| item).collect()
    }

    /// Deselects everything and collapses the realized tree back to the root.
    ///
    /// Publishes one change carrying every previously selected range; child
    /// subscriptions are released synchronously.
    pub fn clear(&self) {
        let flushed = {
            let mut inner = self.shared.inner.lock();
            let root = inner.root;

            {
                let Inner {
                    nodes, operation, ..
                } = &mut *inner;
                let mut stack = vec![root];
                while let Some(key) = stack.pop() {
                    let node = &nodes[key];
                    for range in node.ranges.iter() {
                        operation.deselect(node.path.clone(), range);
                    }
                    stack.extend(node.children.iter().rev().flatten().copied());
                }
            }

            let child_keys: Vec<NodeKey> = inner.nodes.keys().filter(|k| *k != root).collect();
            for key in child_keys {
                if let Some(mut node) = inner.nodes.remove(key) {
                    node.release_source();
                }
            }
            let root_node = &mut inner.nodes[root];
            root_node.ranges.clear();
            root_node.children.clear();

            inner.flush_operation()
        };
        self.publish(flushed);
    }

    fn publish(&self, change: Option<SelectionChange<T>>) -> bool {
        match change {
            Some(change) => {
                self.shared.selection_changed.emit(&change);
                true
            }
            None => false,
        }
    }
}

impl<T> Drop for TreeSelectionModel<T> {
    /// Disconnects every live source subscription so no collection keeps a
    /// listener into a dead model.
    fn drop(&mut self) {
        let mut inner = self.shared.inner.lock();
        for node in inner.nodes.values_mut() {
            node.release_source();
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Shared<T> {
    /// Connects a listener for `key`'s source. The listener holds a weak
    /// reference; notifications arriving after the model is gone are dropped.
    fn subscribe(self: &Arc<Self>, key: NodeKey, source: &SourceRef<T>) -> ConnectionId {
        let weak = Arc::downgrade(self);
        source.changed().connect(move |change| {
            if let Some(shared) = weak.upgrade() {
                shared.handle_source_change(key, change);
            }
        })
    }

    /// Entry point for source-collection notifications: applies the node
    /// consistency algorithm, then flushes the aggregated operation as one
    /// public change event.
    fn handle_source_change(
        self: &Arc<Self>,
        key: NodeKey,
        change: &super::source::CollectionChange<T>,
    ) {
        let flushed = {
            let mut inner = self.inner.lock();
            if !inner.nodes.contains_key(key) {
                // Stale notification for a node detached mid-batch.
                return;
            }
            {
                let Inner {
                    nodes, operation, ..
                } = &mut *inner;
                if let Some(node_change) =
                    node::apply_collection_change(nodes, operation, key, change)
                {
                    tracing::debug!(
                        target: "horizon_treegrid::selection",
                        path = %node_change.path,
                        shift_index = node_change.shift_index,
                        shift_delta = node_change.shift_delta,
                        indexes_changed = node_change.indexes_changed,
                        removed = node_change.removed_items.len(),
                        "source collection changed"
                    );
                    operation.extend_removed(node_change.removed_items);
                }
            }
            inner.flush_operation()
        };
        if let Some(change) = flushed {
            self.selection_changed.emit(&change);
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Inner<T> {
    /// Finds the realized node at `path` without creating anything.
    fn node_at(&self, path: &IndexPath) -> Option<NodeKey> {
        let mut key = self.root;
        for index in path.iter() {
            key = self.nodes[key].get_child(index)?;
        }
        Some(key)
    }

    /// Walks to the node at `path`, realizing each level on demand.
    fn realize_path(&mut self, shared: &Arc<Shared<T>>, path: &IndexPath) -> Option<NodeKey> {
        let mut key = self.root;
        for index in path.iter() {
            key = self.get_or_create_child(shared, key, index)?;
        }
        Some(key)
    }

    /// Realizes the child node of `parent` at `index`.
    ///
    /// With a source attached the child count is the source length and
    /// out-of-bounds requests fail silently with `None`; without one, the
    /// known count is the largest index already realized, so a node whose
    /// item has no children refuses every realization request. Growing the
    /// child array only extends it with empty slots.
    fn get_or_create_child(
        &mut self,
        shared: &Arc<Shared<T>>,
        parent: NodeKey,
        index: usize,
    ) -> Option<NodeKey> {
        if let Some(existing) = self.nodes[parent].get_child(index) {
            return Some(existing);
        }

        let (parent_path, item, grow_to) = {
            let node = &self.nodes[parent];
            match &node.source {
                Some(source) => {
                    let len = source.len();
                    assert!(
                        node.children.len() <= len,
                        "selection children ({}) exceed source length ({}); \
                         the source mutated without a change notification",
                        node.children.len(),
                        len,
                    );
                    if index >= len {
                        return None;
                    }
                    (node.path.clone(), source.get(index), len)
                }
                None => {
                    if index >= node.children.len() {
                        return None;
                    }
                    (node.path.clone(), None, node.children.len())
                }
            }
        };

        let key = self.nodes.insert(SelectionNode::new(parent_path.child(index)));
        if let Some(source) = item.as_ref().and_then(|item| (shared.resolver)(item)) {
            let conn = shared.subscribe(key, &source);
            let child = &mut self.nodes[key];
            child.source = Some(source);
            child.subscription = Some(conn);
        }

        let node = &mut self.nodes[parent];
        if node.children.len() < grow_to {
            node.children.resize(grow_to, None);
        }
        node.children[index] = Some(key);
        Some(key)
    }

    /// Flushes the aggregation buffer, yielding the change to publish.
    /// Nothing accumulated means nothing to publish.
    fn flush_operation(&mut self) -> Option<SelectionChange<T>> {
        if self.operation.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.operation).into_change())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::super::source::{CollectionChange, ItemsSource, ObservableList};

    fn flat_model(items: Vec<&'static str>) -> (Arc<ObservableList<&'static str>>, TreeSelectionModel<&'static str>) {
        let list = Arc::new(ObservableList::new(items));
        let model = TreeSelectionModel::new(list.clone() as SourceRef<&'static str>, |_| None);
        (list, model)
    }

    fn recorded_changes<T: Clone + Send + Sync + 'static>(
        model: &TreeSelectionModel<T>,
    ) -> Arc<Mutex<Vec<SelectionChange<T>>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        model.selection_changed().connect(move |change| {
            sink.lock().push(change.clone());
        });
        events
    }

    #[test]
    fn test_select_publishes_once() {
        let (_list, model) = flat_model(vec!["a", "b", "c"]);
        let events = recorded_changes(&model);

        assert!(model.select(&IndexPath::from([1])));
        assert!(model.is_selected(&IndexPath::from([1])));
        assert_eq!(model.count(), 1);

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].selected.get(&IndexPath::root()),
            Some(&vec![IndexRange::single(1)])
        );
        assert!(events[0].deselected.is_empty());
    }

    #[test]
    fn test_reselect_is_silent() {
        let (_list, model) = flat_model(vec!["a", "b"]);
        model.select(&IndexPath::from([0]));
        let events = recorded_changes(&model);

        assert!(!model.select(&IndexPath::from([0])));
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_select_out_of_bounds_is_noop() {
        let (_list, model) = flat_model(vec!["a", "b"]);
        let events = recorded_changes(&model);

        assert!(!model.select(&IndexPath::from([7])));
        assert!(!model.select_range(&IndexPath::root(), 5..=9));
        assert!(!model.has_selection());
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_range_select_clamps() {
        let (_list, model) = flat_model(vec!["a", "b", "c"]);
        assert!(model.select_range(&IndexPath::root(), 1..=10));
        assert_eq!(
            model.selected_paths(),
            vec![IndexPath::from([1]), IndexPath::from([2])]
        );
        assert_eq!(model.selected_items(), vec!["b", "c"]);
    }

    #[test]
    fn test_deselect_reports_removed_range() {
        let (_list, model) = flat_model(vec!["a", "b", "c"]);
        model.select_range(&IndexPath::root(), 0..=2);
        let events = recorded_changes(&model);

        assert!(model.deselect(&IndexPath::from([1])));
        let events = events.lock();
        assert_eq!(
            events[0].deselected.get(&IndexPath::root()),
            Some(&vec![IndexRange::single(1)])
        );
        drop(events);
        assert_eq!(
            model.selected_paths(),
            vec![IndexPath::from([0]), IndexPath::from([2])]
        );
    }

    #[test]
    fn test_resolver_called_once_per_node() {
        #[derive(Clone)]
        struct Item {
            children: Arc<ObservableList<Item>>,
        }
        let leaf = || Item {
            children: Arc::new(ObservableList::new(Vec::new())),
        };
        let roots = Arc::new(ObservableList::new(vec![
            Item {
                children: Arc::new(ObservableList::new(vec![leaf(), leaf(), leaf()])),
            },
        ]));

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let model = TreeSelectionModel::new(roots as SourceRef<Item>, move |item: &Item| {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(item.children.clone() as SourceRef<Item>)
        });

        model.select(&IndexPath::from([0, 0]));
        model.select(&IndexPath::from([0, 2]));
        // Both selections live under the same realized node.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(model.count(), 2);
    }

    #[test]
    fn test_clear_collapses_and_publishes() {
        let (_list, model) = flat_model(vec!["a", "b", "c"]);
        model.select_range(&IndexPath::root(), 0..=1);
        let events = recorded_changes(&model);

        model.clear();
        assert!(!model.has_selection());
        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].deselected.get(&IndexPath::root()),
            Some(&vec![IndexRange::new(0, 1)])
        );

        // Clearing an empty model publishes nothing.
        drop(events);
        let events = recorded_changes(&model);
        model.clear();
        assert!(events.lock().is_empty());
    }

    #[test]
    #[should_panic(expected = "exceed source length")]
    fn test_silent_source_shrink_is_fatal() {
        struct ShrinkingSource {
            len: AtomicUsize,
            changed: Signal<CollectionChange<&'static str>>,
        }

        impl ItemsSource<&'static str> for ShrinkingSource {
            fn len(&self) -> usize {
                self.len.load(Ordering::SeqCst)
            }

            fn get(&self, index: usize) -> Option<&'static str> {
                (index < self.len()).then_some("item")
            }

            fn changed(&self) -> &Signal<CollectionChange<&'static str>> {
                &self.changed
            }
        }

        let source = Arc::new(ShrinkingSource {
            len: AtomicUsize::new(3),
            changed: Signal::new(),
        });
        let model = TreeSelectionModel::new(source.clone() as SourceRef<&'static str>, |_| None);

        // Realize a child slot while the source still reports three items.
        model.select(&IndexPath::from([2, 0]));

        // Shrink without a change notification: the next realization must
        // detect the contract breach instead of indexing a stale slot.
        source.len.store(1, Ordering::SeqCst);
        model.select(&IndexPath::from([0, 0]));
    }

    #[test]
    fn test_drop_disconnects_subscriptions() {
        let list = Arc::new(ObservableList::new(vec!["a"]));
        let model = TreeSelectionModel::new(list.clone() as SourceRef<&'static str>, |_| None);
        assert_eq!(list.changed().connection_count(), 1);
        drop(model);
        assert_eq!(list.changed().connection_count(), 0);
    }
}
