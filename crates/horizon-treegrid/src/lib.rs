//! Hierarchical selection model for tree data grids.
//!
//! This crate tracks which items are selected in a lazily-expanded tree of
//! collections and keeps that selection consistent while the collections
//! mutate at any depth:
//!
//! - **Index Paths**: Addressing items by their sibling-index path from the root
//! - **Index Ranges**: Per-level selection stored as compact inclusive ranges
//! - **Items Sources**: The observable-collection contract backing each level
//! - **Selection Tree**: Lazily-realized per-level nodes that absorb inserts,
//!   removals, and replacements in their backing collections
//! - **Selection Model**: The public API publishing one aggregated change event
//!   per logical mutation
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_treegrid::{IndexPath, ItemsSource, ObservableList, SourceRef, TreeSelectionModel};
//!
//! #[derive(Clone)]
//! struct Category {
//!     name: String,
//!     entries: Arc<ObservableList<Category>>,
//! }
//!
//! fn category(name: &str, entries: Vec<Category>) -> Category {
//!     Category {
//!         name: name.into(),
//!         entries: Arc::new(ObservableList::new(entries)),
//!     }
//! }
//!
//! let roots = Arc::new(ObservableList::new(vec![category(
//!     "fruit",
//!     vec![category("apple", Vec::new()), category("pear", Vec::new())],
//! )]));
//!
//! let selection = TreeSelectionModel::new(roots.clone(), |item: &Category| {
//!     Some(item.entries.clone() as SourceRef<Category>)
//! });
//!
//! // Select "pear" ([0, 1]); the branch node is realized on demand.
//! selection.select(&IndexPath::from([0, 1]));
//!
//! // Inserting a sibling before "pear" shifts the selection with it.
//! roots.get(0).unwrap().entries.insert(0, category("plum", Vec::new()));
//! assert!(selection.is_selected(&IndexPath::from([0, 2])));
//! assert_eq!(selection.selected_items()[0].name, "pear");
//! ```

pub mod selection;
mod signal;

pub use selection::{
    ChildrenResolver, CollectionChange, IndexPath, IndexRange, ItemsSource, ObservableList,
    ParsePathError, RangeCollection, SelectionChange, SourceRef, TreeSelectionModel,
};
pub use signal::{ConnectionId, Signal};
