//! Index paths for addressing items in a hierarchy.
//!
//! An [`IndexPath`] identifies an item by the sequence of sibling indices
//! leading from the root collection down to the item. The root itself is the
//! empty path.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// An immutable sequence of sibling indices identifying a position in a tree.
///
/// Element *i* is an index valid at depth *i* at the time the path was
/// produced. Paths held inside the selection tree are re-synchronized by the
/// model whenever an ancestor's sibling collection is mutated; paths held by
/// callers become stale across structural changes and should be used
/// immediately rather than stored.
///
/// # Example
///
/// ```
/// use horizon_treegrid::IndexPath;
///
/// let root = IndexPath::root();
/// let first = root.child(0);
/// let grandchild = first.child(2);
///
/// assert_eq!(grandchild.depth(), 2);
/// assert_eq!(grandchild.to_string(), "0.2");
/// assert_eq!(grandchild.parent(), Some(first));
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexPath {
    indices: Vec<usize>,
}

impl IndexPath {
    /// Returns the root path (empty sequence).
    #[inline]
    pub const fn root() -> Self {
        Self {
            indices: Vec::new(),
        }
    }

    /// Creates a path from a sequence of sibling indices.
    #[inline]
    pub fn new(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    /// Returns `true` if this is the root path.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.indices.is_empty()
    }

    /// Returns the depth of the addressed node; the root has depth 0.
    #[inline]
    pub fn depth(&self) -> usize {
        self.indices.len()
    }

    /// Returns the sibling index at the given depth.
    #[inline]
    pub fn get(&self, depth: usize) -> Option<usize> {
        self.indices.get(depth).copied()
    }

    /// Returns the last element of the path (the item's index within its
    /// parent), or `None` for the root.
    #[inline]
    pub fn leaf(&self) -> Option<usize> {
        self.indices.last().copied()
    }

    /// Returns a new path addressing the child of this path at `index`.
    pub fn child(&self, index: usize) -> IndexPath {
        let mut indices = Vec::with_capacity(self.indices.len() + 1);
        indices.extend_from_slice(&self.indices);
        indices.push(index);
        Self { indices }
    }

    /// Returns the parent path, or `None` for the root.
    pub fn parent(&self) -> Option<IndexPath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            indices: self.indices[..self.indices.len() - 1].to_vec(),
        })
    }

    /// Returns `true` if `ancestor` is a strict prefix of this path.
    pub fn is_descendant_of(&self, ancestor: &IndexPath) -> bool {
        self.depth() > ancestor.depth() && self.indices.starts_with(&ancestor.indices)
    }

    /// Iterates over the sibling indices from the root downwards.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    /// Returns the indices as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.indices
    }

    /// Replaces the element at `depth`, shifting it by `delta`.
    ///
    /// Used by the selection tree when an ancestor's sibling collection gains
    /// or loses items. Panics if `depth` is out of range or the shift would
    /// move the index below zero; both indicate a bookkeeping bug upstream.
    pub(crate) fn with_shifted(&self, depth: usize, delta: isize) -> IndexPath {
        let mut indices = self.indices.clone();
        let shifted = indices[depth] as isize + delta;
        debug_assert!(shifted >= 0, "path element shifted below zero");
        indices[depth] = shifted as usize;
        Self { indices }
    }
}

impl From<&[usize]> for IndexPath {
    fn from(indices: &[usize]) -> Self {
        Self {
            indices: indices.to_vec(),
        }
    }
}

impl<const N: usize> From<[usize; N]> for IndexPath {
    fn from(indices: [usize; N]) -> Self {
        Self {
            indices: indices.to_vec(),
        }
    }
}

impl fmt::Display for IndexPath {
    /// Formats the path as dot-separated indices, e.g. `"0.2.1"`; the root
    /// formats as the empty string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, index) in self.indices.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{index}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "IndexPath(root)")
        } else {
            write!(f, "IndexPath({self})")
        }
    }
}

/// Error returned when parsing a dotted index path fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid index path segment {segment:?}")]
pub struct ParsePathError {
    /// The segment that failed to parse as a non-negative integer.
    pub segment: String,
}

impl FromStr for IndexPath {
    type Err = ParsePathError;

    /// Parses a dot-separated path such as `"0.2.1"`. The empty string parses
    /// as the root path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        let mut indices = Vec::new();
        for segment in s.split('.') {
            let index = segment.parse().map_err(|_| ParsePathError {
                segment: segment.to_string(),
            })?;
            indices.push(index);
        }
        Ok(Self { indices })
    }
}
