//! Strongly-typed node identifiers.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A non-negative index into a dense node array, tagged with the node kind
/// it addresses.
///
/// The phantom `K` parameter keeps identifiers of different graphs apart at
/// compile time: an id into the concrete grid graph cannot be passed where
/// an abstract-graph id is expected. Identifier `i` always occupies slot `i`
/// of its graph's node array (see [`crate::Graph`]).
pub struct NodeId<K> {
    value: u32,
    _kind: PhantomData<K>,
}

impl<K> NodeId<K> {
    /// Wrap a raw index value.
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self {
            value,
            _kind: PhantomData,
        }
    }

    /// The raw index value.
    #[inline]
    pub const fn value(self) -> u32 {
        self.value
    }

    /// The raw index as a `usize`, for array indexing.
    #[inline]
    pub const fn index(self) -> usize {
        self.value as usize
    }
}

// Manual impls: derives would require `K` itself to satisfy the bounds,
// but `K` is only a phantom tag.

impl<K> Clone for NodeId<K> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for NodeId<K> {}

impl<K> PartialEq for NodeId<K> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<K> Eq for NodeId<K> {}

impl<K> Hash for NodeId<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<K> PartialOrd for NodeId<K> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for NodeId<K> {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<K> fmt::Debug for NodeId<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.value)
    }
}

impl<K> fmt::Display for NodeId<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[cfg(feature = "serde")]
impl<K> serde::Serialize for NodeId<K> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de, K> serde::Deserialize<'de> for NodeId<K> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(NodeId::new(u32::deserialize(deserializer)?))
    }
}
