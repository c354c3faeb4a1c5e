//! Backing-collection contract and the stock observable list.
//!
//! The selection tree never owns the data it tracks. Each node holds a
//! non-owning reference to an [`ItemsSource`] and treats the source's change
//! signal as the sole source of truth for structural mutation. Any collection
//! can participate by implementing the trait; [`ObservableList`] is the stock
//! implementation used by applications and the test suite.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::signal::Signal;

/// A structural change to a backing collection.
///
/// Payloads carry the affected item values so that a listener can resolve
/// removed-but-selected items before its reference to them is gone.
///
/// Sources must emit exactly one event per logical mutation: a replacement is
/// a single `Replaced` event, never a `Removed` followed by an `Inserted`. The
/// selection model relies on this to compute one net index shift per event.
#[derive(Clone, Debug)]
pub enum CollectionChange<T> {
    /// `items.len()` items were inserted, the first at `index`.
    Inserted {
        /// Index of the first inserted item.
        index: usize,
        /// The inserted items, in order.
        items: Vec<T>,
    },
    /// `items.len()` contiguous items starting at `index` were removed.
    Removed {
        /// Index the removed run started at.
        index: usize,
        /// The removed items, in order.
        items: Vec<T>,
    },
    /// A contiguous run starting at `index` was replaced; the old and new
    /// runs may differ in length.
    Replaced {
        /// Index the replaced run started at.
        index: usize,
        /// The items that were removed.
        old_items: Vec<T>,
        /// The items that took their place.
        new_items: Vec<T>,
    },
    /// The collection changed wholesale with no index information.
    ///
    /// The selection model does not support this: there is no general
    /// strategy for reconciling an unknown change, so handling it is a fatal
    /// contract violation rather than a silent inconsistency.
    Reset,
}

/// Capability interface for collections the selection model can track.
///
/// `len`/`get` provide the current view of the items; `changed` provides the
/// subscription capability. A subscriber must be able to unsubscribe with the
/// token it got from [`Signal::connect`], and the selection tree does so
/// synchronously whenever a node is detached.
pub trait ItemsSource<T>: Send + Sync {
    /// Number of items currently in the collection.
    fn len(&self) -> usize;

    /// Returns `true` if the collection has no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the item at `index`, or `None` if out of bounds.
    fn get(&self, index: usize) -> Option<T>;

    /// The signal emitting this collection's structural changes.
    fn changed(&self) -> &Signal<CollectionChange<T>>;
}

/// Shared handle to a tracked collection.
pub type SourceRef<T> = Arc<dyn ItemsSource<T>>;

/// An observable growable list.
///
/// Mutations happen under a write lock; the change signal is emitted after
/// the lock is released, so listeners may read the list from inside a slot.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use horizon_treegrid::{CollectionChange, ItemsSource, ObservableList};
///
/// let list = Arc::new(ObservableList::new(vec!["a", "b"]));
/// list.changed().connect(|change| {
///     if let CollectionChange::Inserted { index, items } = change {
///         println!("{} items inserted at {index}", items.len());
///     }
/// });
/// list.push("c");
/// assert_eq!(list.len(), 3);
/// ```
pub struct ObservableList<T> {
    items: RwLock<Vec<T>>,
    changed: Signal<CollectionChange<T>>,
}

impl<T: Clone + Send + Sync> Default for ObservableList<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T: Clone + Send + Sync> ObservableList<T> {
    /// Creates a list with the given initial items.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items),
            changed: Signal::new(),
        }
    }

    /// Appends an item at the end.
    pub fn push(&self, item: T) {
        let index = {
            let mut items = self.items.write();
            items.push(item.clone());
            items.len() - 1
        };
        self.changed.emit(&CollectionChange::Inserted {
            index,
            items: vec![item],
        });
    }

    /// Inserts an item at `index`.
    pub fn insert(&self, index: usize, item: T) {
        self.insert_many(index, vec![item]);
    }

    /// Inserts a run of items, the first landing at `index`.
    pub fn insert_many(&self, index: usize, new_items: Vec<T>) {
        if new_items.is_empty() {
            return;
        }
        {
            let mut items = self.items.write();
            items.splice(index..index, new_items.iter().cloned());
        }
        self.changed.emit(&CollectionChange::Inserted {
            index,
            items: new_items,
        });
    }

    /// Removes and returns the item at `index`.
    pub fn remove(&self, index: usize) -> T {
        let item = self.items.write().remove(index);
        self.changed.emit(&CollectionChange::Removed {
            index,
            items: vec![item.clone()],
        });
        item
    }

    /// Removes `count` items starting at `index`.
    pub fn remove_range(&self, index: usize, count: usize) -> Vec<T> {
        if count == 0 {
            return Vec::new();
        }
        let removed: Vec<T> = {
            let mut items = self.items.write();
            items.drain(index..index + count).collect()
        };
        self.changed.emit(&CollectionChange::Removed {
            index,
            items: removed.clone(),
        });
        removed
    }

    /// Replaces `old_count` items starting at `index` with `new_items`.
    ///
    /// Emitted as a single `Replaced` event; the runs may differ in length.
    pub fn splice(&self, index: usize, old_count: usize, new_items: Vec<T>) -> Vec<T> {
        let old_items: Vec<T> = {
            let mut items = self.items.write();
            items
                .splice(index..index + old_count, new_items.iter().cloned())
                .collect()
        };
        self.changed.emit(&CollectionChange::Replaced {
            index,
            old_items: old_items.clone(),
            new_items,
        });
        old_items
    }

    /// Replaces the whole contents and emits `Reset`.
    ///
    /// A selection model tracking this list will treat the event as a fatal
    /// contract violation; this exists for collections with listeners that
    /// can handle wholesale changes.
    pub fn reset(&self, new_items: Vec<T>) {
        *self.items.write() = new_items;
        self.changed.emit(&CollectionChange::Reset);
    }

    /// Returns a snapshot of the current items.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.read().clone()
    }
}

impl<T: Clone + Send + Sync> ItemsSource<T> for ObservableList<T> {
    fn len(&self) -> usize {
        self.items.read().len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.items.read().get(index).cloned()
    }

    fn changed(&self) -> &Signal<CollectionChange<T>> {
        &self.changed
    }
}

impl<T: Clone + Send + Sync + std::fmt::Debug> std::fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObservableList")
            .field(&*self.items.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn record<T: Clone + Send + Sync + 'static>(
        list: &ObservableList<T>,
    ) -> Arc<Mutex<Vec<CollectionChange<T>>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        list.changed().connect(move |change| {
            sink.lock().push(change.clone());
        });
        events
    }

    #[test]
    fn test_insert_emits_with_items() {
        let list = ObservableList::new(vec![10, 30]);
        let events = record(&list);

        list.insert(1, 20);
        list.insert_many(3, vec![40, 50]);

        assert_eq!(list.to_vec(), vec![10, 20, 30, 40, 50]);
        let events = events.lock();
        assert!(
            matches!(&events[0], CollectionChange::Inserted { index: 1, items } if items == &[20])
        );
        assert!(
            matches!(&events[1], CollectionChange::Inserted { index: 3, items } if items == &[40, 50])
        );
    }

    #[test]
    fn test_remove_emits_removed_values() {
        let list = ObservableList::new(vec!["a", "b", "c", "d"]);
        let events = record(&list);

        assert_eq!(list.remove_range(1, 2), vec!["b", "c"]);
        assert_eq!(list.to_vec(), vec!["a", "d"]);
        assert!(matches!(
            &events.lock()[0],
            CollectionChange::Removed { index: 1, items } if items == &["b", "c"]
        ));
    }

    #[test]
    fn test_splice_emits_single_replaced() {
        let list = ObservableList::new(vec![1, 2, 3]);
        let events = record(&list);

        let old = list.splice(0, 2, vec![9]);
        assert_eq!(old, vec![1, 2]);
        assert_eq!(list.to_vec(), vec![9, 3]);

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            CollectionChange::Replaced { index: 0, old_items, new_items }
                if old_items == &[1, 2] && new_items == &[9]
        ));
    }

    #[test]
    fn test_listener_can_read_list_during_emit() {
        let list = Arc::new(ObservableList::new(vec![1]));
        let inner = list.clone();
        let seen = Arc::new(Mutex::new(0usize));
        let sink = seen.clone();
        list.changed().connect(move |_| {
            *sink.lock() = inner.len();
        });
        list.push(2);
        assert_eq!(*seen.lock(), 2);
    }
}
