//! Ring and row placement primitives.
//!
//! All angles start at the top of the ring (`-π/2`) and advance clockwise in
//! screen space, where `+y` points down.

use glam::{Vec2, Vec3};
use std::f32::consts::{FRAC_PI_2, TAU};

use crate::{MIN_RING_RADIUS, NODE_SPACING, ROW_SPACING};

/// Radius needed to seat `count` nodes `NODE_SPACING` apart along the arc.
#[inline]
pub fn ring_radius(count: usize) -> f32 {
    let circumference = count as f32 * NODE_SPACING;
    (circumference / TAU).max(MIN_RING_RADIUS)
}

/// Position of slot `index` of `count` on a ring of `radius`.
///
/// `phase` is a fraction of one slot used to stagger concentric rings.
/// A ring of one node collapses to its centre.
pub fn ring_point(index: usize, count: usize, radius: f32, phase: f32) -> Vec2 {
    if count <= 1 {
        return Vec2::ZERO;
    }
    let step = TAU / count as f32;
    let angle = -FRAC_PI_2 + step * (index as f32 + phase);
    Vec2::new(radius * angle.cos(), radius * angle.sin())
}

/// Position of slot `index` of `count` on a horizontal row centred at `x = 0`.
pub fn row_point(index: usize, count: usize, y: f32) -> Vec3 {
    let span = count.saturating_sub(1) as f32 * ROW_SPACING;
    Vec3::new(-span / 2.0 + index as f32 * ROW_SPACING, y, 0.0)
}
