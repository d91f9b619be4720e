//! Occlusion queries: which points can the spotlight see?
//!
//! Two interchangeable strategies answer the same question. Both record,
//! for every angular column of the light's field of view, the nearest wall;
//! they differ only in what they store.
//!
//! - [`Lightmap`]: scanline fill of light-space depth (the CPU path)
//! - [`DepthMap`]: normalized depth written with a "less" depth test, the
//!   same thing the GPU shadow-map pass produces

pub mod depth_map;
pub mod scanline;

pub use depth_map::DepthMap;
pub use scanline::Lightmap;

use glam::Vec2;

use crate::scene::{Point2D, Spotlight, Wall};
use crate::visibility::{self, Visibility};

/// Answers lit-versus-shadowed for world points.
///
/// Implementors only store one depth per angular column; projecting a
/// point into its column and gating it by range is shared.
pub trait OcclusionQuery {
    /// The spotlight this query was built for.
    fn spotlight(&self) -> &Spotlight;

    /// Number of angular columns.
    fn width(&self) -> usize;

    /// Number of columns with an occluder.
    fn coverage(&self) -> usize;

    /// Whether a point at light-space `depth` is strictly nearer than the
    /// occluder in `column`. `None` when the column is out of range.
    fn nearer_than_occluder(&self, column: usize, depth: f32) -> Option<bool>;

    /// Classify a world (clip-space) point.
    fn classify(&self, point: Point2D) -> Visibility {
        visibility::classify(point, self)
    }

    fn is_lit(&self, point: Point2D) -> bool {
        self.classify(point).is_lit()
    }
}

/// Which occlusion representation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Strategy {
    /// 1D array of light-space depths filled wall by wall
    #[default]
    Scanline,
    /// Depth buffer of normalized depths, as rasterized by the GPU pass
    DepthBuffer,
}

impl Strategy {
    pub fn build(
        self,
        walls: &[Wall],
        spotlight: &Spotlight,
        width: usize,
    ) -> Box<dyn OcclusionQuery + Send + Sync> {
        match self {
            Strategy::Scanline => Box::new(Lightmap::build(walls, spotlight, width)),
            Strategy::DepthBuffer => Box::new(DepthMap::rasterize(walls, spotlight, width)),
        }
    }
}

/// Clip a light-space segment to the depth slab `near..=far`.
///
/// Endpoints that are already inside are returned untouched; clipped
/// endpoints are pinned onto the plane they were clipped against.
pub(crate) fn clip_segment_depth(a: Vec2, b: Vec2, near: f32, far: f32) -> Option<(Vec2, Vec2)> {
    let dy = b.y - a.y;
    let (mut t0, mut t1) = (0.0f32, 1.0f32);

    if dy == 0.0 {
        if !(a.y >= near && a.y <= far) {
            return None;
        }
    } else {
        let t_near = (near - a.y) / dy;
        let t_far = (far - a.y) / dy;
        let (enter, exit) = if dy > 0.0 { (t_near, t_far) } else { (t_far, t_near) };
        t0 = t0.max(enter);
        t1 = t1.min(exit);
        if !(t0 <= t1) {
            return None;
        }
    }

    let at = |t: f32| {
        if t == 0.0 {
            a
        } else if t == 1.0 {
            b
        } else {
            let p = a + (b - a) * t;
            Vec2::new(p.x, p.y.max(near).min(far))
        }
    };
    Some((at(t0), at(t1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_inside_untouched() {
        let a = Vec2::new(-0.3, 1.0);
        let b = Vec2::new(0.4, 2.0);
        assert_eq!(clip_segment_depth(a, b, 0.1, 10.0), Some((a, b)));
    }

    #[test]
    fn test_clip_crossing_near_plane() {
        let (a, b) = clip_segment_depth(Vec2::new(0.0, -1.0), Vec2::new(2.0, 1.0), 0.5, f32::INFINITY).unwrap();
        assert_eq!(a.y, 0.5);
        assert!((a.x - 1.5).abs() < 1e-6);
        assert_eq!(b, Vec2::new(2.0, 1.0));

        // Same segment, reversed direction
        let (a, b) = clip_segment_depth(Vec2::new(2.0, 1.0), Vec2::new(0.0, -1.0), 0.5, f32::INFINITY).unwrap();
        assert_eq!(a, Vec2::new(2.0, 1.0));
        assert_eq!(b.y, 0.5);
    }

    #[test]
    fn test_clip_rejects_outside_slab() {
        assert_eq!(clip_segment_depth(Vec2::new(0.0, -1.0), Vec2::new(1.0, 0.05), 0.1, 10.0), None);
        assert_eq!(clip_segment_depth(Vec2::new(0.0, 11.0), Vec2::new(1.0, 12.0), 0.1, 10.0), None);
        // Parallel to the planes, behind the light
        assert_eq!(clip_segment_depth(Vec2::new(-1.0, -0.5), Vec2::new(1.0, -0.5), 0.1, 10.0), None);
    }

    #[test]
    fn test_clip_both_planes() {
        let (a, b) = clip_segment_depth(Vec2::new(0.0, 0.0), Vec2::new(0.0, 20.0), 1.0, 10.0).unwrap();
        assert!((a.y - 1.0).abs() < 1e-6);
        assert_eq!(b.y, 10.0);
    }
}
