//! Hierarchical selection tracking.
//!
//! The module is layered bottom-up: [`IndexPath`] addresses items in the
//! hierarchy, [`IndexRange`] and [`RangeCollection`] hold per-level selection
//! as compact inclusive ranges, [`ItemsSource`] is the contract backing
//! collections implement, and [`TreeSelectionModel`] ties the levels together
//! into a lazily-realized tree that stays consistent while the collections
//! mutate underneath it.

mod model;
mod node;
mod path;
mod range;
mod source;

pub use model::{ChildrenResolver, SelectionChange, TreeSelectionModel};
pub use path::{IndexPath, ParsePathError};
pub use range::{IndexRange, RangeCollection};
pub use source::{CollectionChange, ItemsSource, ObservableList, SourceRef};
