//! Cached layouts, recomputed only when the node counts change.

use crate::tiers::{compute_layout, Layout, LayoutMode, TierCounts};

/// Holds one layout per mode for the current counts.
///
/// Toggling between modes reuses the cached layout of the other mode, so a
/// round trip 2D → 3D → 2D puts every node back exactly where it was.
#[derive(Debug, Default)]
pub struct LayoutCache {
    counts: Option<TierCounts>,
    flat: Option<Layout>,
    volumetric: Option<Layout>,
    recomputes: u64,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout for `counts` in `mode`, computing it if needed.
    pub fn get(&mut self, counts: TierCounts, mode: LayoutMode) -> &Layout {
        if self.counts != Some(counts) {
            self.counts = Some(counts);
            self.flat = None;
            self.volumetric = None;
        }

        let slot = match mode {
            LayoutMode::Flat => &mut self.flat,
            LayoutMode::Volumetric => &mut self.volumetric,
        };
        if slot.is_none() {
            self.recomputes += 1;
        }
        slot.get_or_insert_with(|| compute_layout(counts, mode))
    }

    /// How many layouts have been computed since creation.
    pub fn recomputes(&self) -> u64 {
        self.recomputes
    }

    /// Whether no layout is currently held.
    pub fn is_empty(&self) -> bool {
        self.flat.is_none() && self.volumetric.is_none()
    }

    /// Drop every cached layout.
    pub fn invalidate(&mut self) {
        self.counts = None;
        self.flat = None;
        self.volumetric = None;
    }
}
