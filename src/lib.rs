//! GenoFocus Core Library
//!
//! Focus-distorting genome coordinate scales, streaming interval
//! aggregation, annotation trees with lane layout, and parsers for the
//! track formats feeding them.

pub mod aggregate;
pub mod feature;
pub mod io;
pub mod layout;
pub mod scale;
pub mod tree;
pub mod types;

// Re-export commonly used types and functions
pub use aggregate::{IntervalAggregator, Summarizer};
pub use feature::{FeatureNode, FeatureRecord, NodeId};
pub use layout::{assign_lanes, LaneLayout, LaneMode, TypePolicy, TypePolicyMap};
pub use scale::{FocusScale, ScaleInterpolate};
pub use tree::{FeatureTree, TreeError, TreeVisitor};
pub use types::{ChromosomeModel, GenomicPos, IntervalLike, Strand};

/// Version information for the GenoFocus core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
