//! hmmviz Layout
//!
//! Deterministic 3-tier node placement for state transition diagrams.
//!
//! # Tiers
//!
//! A diagram of a discrete-state stochastic process has three kinds of node:
//! - the initial-state node (`START`), optional
//! - hidden-state nodes, arranged on a ring
//! - observation nodes, arranged on a second row (2D) or ring (3D)
//!
//! # Stability
//!
//! Positions are a pure function of `(TierCounts, LayoutMode)`. There is no
//! randomness and no iterative relaxation, so re-rendering the same model
//! never moves a node. [`LayoutCache`] recomputes only when the counts change
//! or a mode is requested for the first time.

mod cache;
mod ring;
mod tiers;

pub use cache::LayoutCache;
pub use ring::{ring_point, ring_radius, row_point};
pub use tiers::{compute_layout, Layout, LayoutMode, NodeId, Tier, TierCounts};

/// Arc length between adjacent nodes on a ring.
pub const NODE_SPACING: f32 = 120.0;

/// Smallest radius the hidden-state ring may use.
pub const MIN_RING_RADIUS: f32 = 140.0;

/// Distance between the hidden-state ring and the neighbouring tiers.
pub const TIER_GAP: f32 = 160.0;

/// Horizontal distance between adjacent observation nodes in 2D.
pub const ROW_SPACING: f32 = 100.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_gap_clears_node_spacing() {
        // Neighbouring tiers must not overlap a ring slot.
        assert!(TIER_GAP > NODE_SPACING);
        assert!(MIN_RING_RADIUS > NODE_SPACING / 2.0);
    }
}
