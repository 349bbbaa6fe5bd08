//! World-to-screen projection for both layout modes.

use glam::{Mat4, Vec2, Vec3};
use hmmviz_layout::{Layout, LayoutMode};

/// Vertical field of view of the orbit camera used in volumetric mode.
const FOV: f32 = std::f32::consts::FRAC_PI_4;

/// Camera elevation above the ring plane, as a fraction of its distance.
const ELEVATION: f32 = 0.45;

/// Camera distance from the origin, as a multiple of the layout extent.
const DISTANCE: f32 = 2.6;

/// Maps layout positions onto a 2D plane, before fitting to the surface.
///
/// Flat layouts pass through unchanged. Volumetric layouts are seen by a
/// fixed orbit camera looking at the origin from slightly above, and the
/// projected points are rescaled back to layout units so both modes fit the
/// surface the same way.
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    mode: LayoutMode,
    view_projection: Mat4,
    extent: f32,
}

impl Projection {
    pub fn new(layout: &Layout) -> Self {
        let (lo, hi) = layout.bounds();
        let extent = lo.abs().max(hi.abs()).max_element().max(1.0);

        // Layout y grows downward like screen space; the camera works with
        // y up, so the eye sits on the -y side to keep START on top.
        let eye = Vec3::new(0.0, ELEVATION, 1.0).normalize() * extent * DISTANCE;
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(FOV, 1.0, 0.1, extent * DISTANCE * 4.0);

        Self {
            mode: layout.mode,
            view_projection: projection * view,
            extent,
        }
    }

    /// Project one position. Returns the 2D point and its depth (larger is
    /// further from the viewer; always 0 in flat mode).
    pub fn project(&self, p: Vec3) -> (Vec2, f32) {
        match self.mode {
            LayoutMode::Flat => (Vec2::new(p.x, p.y), 0.0),
            LayoutMode::Volumetric => {
                let clip = self.view_projection * Vec3::new(p.x, -p.y, p.z).extend(1.0);
                if clip.w <= f32::EPSILON {
                    return (Vec2::new(p.x, p.y), 0.0);
                }
                let ndc = clip.truncate() / clip.w;
                // The cotangent of half the FOV undoes the perspective scale
                // at the origin, so a unit at the centre stays a unit.
                let scale = self.extent * DISTANCE * (FOV * 0.5).tan();
                (Vec2::new(ndc.x, -ndc.y) * scale, clip.w)
            }
        }
    }
}

/// Uniform scale and translation that fits a set of points into a rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fit {
    pub scale: f32,
    source_center: Vec2,
    target_center: Vec2,
}

/// Never enlarge a diagram by more than this.
const MAX_FIT_SCALE: f32 = 1.5;

impl Fit {
    /// Fit `points`, each padded by `pad` on every side, into the rectangle
    /// at `origin` of `size`.
    pub fn new(points: impl IntoIterator<Item = Vec2>, pad: f32, origin: Vec2, size: Vec2) -> Self {
        let mut points = points.into_iter();
        let target_center = origin + size * 0.5;
        let Some(first) = points.next() else {
            return Self {
                scale: 1.0,
                source_center: Vec2::ZERO,
                target_center,
            };
        };
        let (lo, hi) = points.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        let span = (hi - lo) + Vec2::splat(2.0 * pad.max(0.0));
        let span = span.max(Vec2::splat(1.0));
        let scale = (size.x / span.x)
            .min(size.y / span.y)
            .clamp(f32::EPSILON, MAX_FIT_SCALE);

        Self {
            scale,
            source_center: (lo + hi) * 0.5,
            target_center,
        }
    }

    pub fn apply(&self, p: Vec2) -> Vec2 {
        self.target_center + (p - self.source_center) * self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmmviz_layout::{compute_layout, TierCounts};

    #[test]
    fn flat_projection_is_identity() {
        let layout = compute_layout(TierCounts::new(3, 2, true), LayoutMode::Flat);
        let projection = Projection::new(&layout);
        let (p, depth) = projection.project(Vec3::new(12.0, -7.0, 0.0));
        assert_eq!(p, Vec2::new(12.0, -7.0));
        assert_eq!(depth, 0.0);
    }

    #[test]
    fn volumetric_keeps_start_above_observations() {
        let layout = compute_layout(TierCounts::new(4, 3, true), LayoutMode::Volumetric);
        let projection = Projection::new(&layout);
        let (start, _) = projection.project(layout.initial.unwrap());
        for obs in &layout.observations {
            let (o, _) = projection.project(*obs);
            assert!(start.y < o.y);
            assert!(o.is_finite());
        }
    }

    #[test]
    fn volumetric_depth_orders_ring_nodes() {
        let layout = compute_layout(TierCounts::new(4, 0, false), LayoutMode::Volumetric);
        let projection = Projection::new(&layout);
        let depths: Vec<f32> = layout
            .states
            .iter()
            .map(|p| projection.project(*p).1)
            .collect();
        // The first state sits on the far side of the ring, the third near.
        assert!(depths[0] > depths[2]);
    }

    #[test]
    fn fit_centres_and_bounds_scale() {
        let fit = Fit::new(
            [Vec2::new(-100.0, -50.0), Vec2::new(100.0, 50.0)],
            0.0,
            Vec2::ZERO,
            Vec2::new(400.0, 400.0),
        );
        assert_eq!(fit.scale, 1.5);
        assert_eq!(fit.apply(Vec2::ZERO), Vec2::new(200.0, 200.0));

        let fit = Fit::new(
            [Vec2::new(-1000.0, 0.0), Vec2::new(1000.0, 0.0)],
            0.0,
            Vec2::ZERO,
            Vec2::new(400.0, 400.0),
        );
        assert_eq!(fit.scale, 0.2);
    }

    #[test]
    fn fit_of_nothing_or_one_point_is_finite() {
        let empty = Fit::new(std::iter::empty(), 10.0, Vec2::ZERO, Vec2::new(100.0, 80.0));
        assert_eq!(empty.apply(Vec2::ZERO), Vec2::new(50.0, 40.0));

        let single = Fit::new([Vec2::new(5.0, 5.0)], 0.0, Vec2::ZERO, Vec2::new(100.0, 80.0));
        assert!(single.scale.is_finite());
        assert_eq!(single.apply(Vec2::new(5.0, 5.0)), Vec2::new(50.0, 40.0));
    }
}
