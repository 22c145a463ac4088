/// Identifier for a branch in a [`crate::tree::Tree`].
///
/// This is an index into `Tree::nodes`, and is only meaningful within
/// the lifetime of a given `Tree` instance.
pub type NodeId = usize;

/// Position of a point inside [`crate::attractor::AttractorCloud::points`].
///
/// Stable for the duration of one growth step; invalidated by
/// [`crate::attractor::AttractorCloud::compact`].
pub type AttractorIndex = usize;

/// Identifier handed out by the cloud that created an attractor point.
pub type AttractorId = u32;
