//! Node identifiers.

use std::fmt::Debug;
use std::hash::Hash;

/// Anything usable as a node key in an arbor.
///
/// Keys are compared by value, so numeric IDs and their string forms are
/// distinct keys. Skeletons coming from a tracing backend use integer IDs.
pub trait NodeId: Debug + Clone + Hash + Eq + Ord {}

impl<T: Debug + Clone + Hash + Eq + Ord> NodeId for T {}
