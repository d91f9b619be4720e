//! Scanline lightmap builder.
//!
//! The lightmap is a 1D depth buffer across the light's field of view: one
//! slot per angular column holding the light-space depth of the nearest
//! wall, or [`NO_OCCLUDER`]. Each wall is projected into column space and
//! its depth interpolated across the columns it covers; walls are merged by
//! taking the minimum.

use glam::Vec2;

use super::{OcclusionQuery, clip_segment_depth};
use crate::scene::{Spotlight, Wall};
use crate::transform::{clip_to_light, light_to_projected, projected_to_lightmap_index};

/// Depth recorded in a column that no wall covers.
pub const NO_OCCLUDER: f32 = f32::INFINITY;

/// A wall endpoint in column space.
#[derive(Debug, Clone, Copy)]
struct ColumnPoint {
    column: i64,
    depth: f32,
}

/// Nearest-occluder depth per angular column, built for one spotlight.
#[derive(Debug, Clone, PartialEq)]
pub struct Lightmap {
    spotlight: Spotlight,
    depths: Vec<f32>,
}

impl Lightmap {
    /// Build a lightmap `width` columns wide from scratch.
    pub fn build(walls: &[Wall], spotlight: &Spotlight, width: usize) -> Self {
        let mut lightmap = Lightmap {
            spotlight: *spotlight,
            depths: vec![NO_OCCLUDER; width],
        };
        for wall in walls {
            lightmap.fill_wall(wall);
        }
        lightmap
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.depths.len()
    }

    #[inline]
    pub fn depths(&self) -> &[f32] {
        &self.depths
    }

    /// Depth of the nearest occluder in `column`, `None` if out of range.
    #[inline]
    pub fn depth_at(&self, column: usize) -> Option<f32> {
        self.depths.get(column).copied()
    }

    pub fn spotlight(&self) -> &Spotlight {
        &self.spotlight
    }

    /// Number of columns with an occluder.
    pub fn coverage(&self) -> usize {
        self.depths.iter().filter(|d| d.is_finite()).count()
    }

    fn project(&self, point: Vec2) -> Option<ColumnPoint> {
        let projected = light_to_projected(point, &self.spotlight)?;
        Some(ColumnPoint {
            column: projected_to_lightmap_index(projected, self.width()),
            depth: point.y,
        })
    }

    fn fill_wall(&mut self, wall: &Wall) {
        let width = self.width() as i64;
        if width == 0 {
            return;
        }
        let spotlight = self.spotlight;

        // Never project anything at or behind the light
        let Some((a, b)) = clip_segment_depth(
            clip_to_light(wall.start, &spotlight),
            clip_to_light(wall.end, &spotlight),
            spotlight.focal_length,
            f32::INFINITY,
        ) else {
            return;
        };
        let (Some(mut start), Some(mut end)) = (self.project(a), self.project(b)) else {
            return;
        };

        if start.column > end.column {
            std::mem::swap(&mut start, &mut end);
        }
        if end.column < 0 || start.column >= width {
            return;
        }

        let first = start.column.clamp(0, width - 1);
        let last = end.column.clamp(0, width - 1);
        // Saturated columns from very wide walls would overflow in i64
        let span = end.column as f64 - start.column as f64;
        let depth_delta = end.depth - start.depth;

        for x in first..=last {
            let depth = if start.column == end.column {
                start.depth.min(end.depth)
            } else {
                let pct = ((x as f64 - start.column as f64) / span) as f32;
                start.depth + depth_delta * pct
            };
            if depth < spotlight.focal_length {
                continue;
            }
            let slot = &mut self.depths[x as usize];
            if depth < *slot {
                *slot = depth;
            }
        }
    }
}

impl OcclusionQuery for Lightmap {
    fn spotlight(&self) -> &Spotlight {
        &self.spotlight
    }

    fn width(&self) -> usize {
        self.depths.len()
    }

    fn coverage(&self) -> usize {
        Lightmap::coverage(self)
    }

    fn nearer_than_occluder(&self, column: usize, depth: f32) -> Option<bool> {
        self.depth_at(column).map(|nearest| depth < nearest)
    }
}

/// Format a lightmap as one line of depths for debugging.
pub fn lightmap_to_string(lightmap: &Lightmap) -> String {
    let mut result = String::new();
    for depth in lightmap.depths() {
        if depth.is_finite() {
            result.push_str(&format!("{:5.2} ", depth));
        } else {
            result.push_str("  inf ");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDTH: usize = 100;

    fn wall(x0: f32, y0: f32, x1: f32, y1: f32) -> Wall {
        Wall::new(Vec2::new(x0, y0), Vec2::new(x1, y1))
    }

    #[test]
    fn test_empty_scene_is_unobstructed() {
        let lightmap = Lightmap::build(&[], &Spotlight::default(), WIDTH);
        assert_eq!(lightmap.width(), WIDTH);
        assert!(lightmap.depths().iter().all(|&d| d == NO_OCCLUDER));
        assert_eq!(lightmap.coverage(), 0);
    }

    #[test]
    fn test_perpendicular_wall_fills_every_column() {
        // Light at (0,-1) facing +y; the wall sits one unit ahead and spans the cone
        let lightmap = Lightmap::build(&[wall(-5.0, 0.0, 5.0, 0.0)], &Spotlight::default(), WIDTH);
        assert!(lightmap.depths().iter().all(|&d| d == 1.0), "{}", lightmap_to_string(&lightmap));
    }

    #[test]
    fn test_nearest_wall_wins_regardless_of_order() {
        let far = wall(-5.0, 0.0, 5.0, 0.0);
        let near = wall(-0.1, -0.5, 0.1, -0.5);
        let spotlight = Spotlight::default();

        let a = Lightmap::build(&[far, near], &spotlight, WIDTH);
        let b = Lightmap::build(&[near, far], &spotlight, WIDTH);
        assert_eq!(a, b);

        assert_eq!(a.depth_at(50), Some(0.5));
        assert_eq!(a.depth_at(0), Some(1.0));
        assert_eq!(a.depth_at(WIDTH - 1), Some(1.0));
        assert_eq!(a.depth_at(WIDTH), None);
    }

    #[test]
    fn test_single_column_wall() {
        // Points straight away from the light: both ends land in column 50
        let lightmap = Lightmap::build(&[wall(0.0, -0.5, 0.0, 0.5)], &Spotlight::default(), WIDTH);
        assert_eq!(lightmap.coverage(), 1);
        assert_eq!(lightmap.depth_at(50), Some(0.5));
    }

    #[test]
    fn test_wall_outside_cone_is_rejected() {
        let lightmap = Lightmap::build(&[wall(0.9, -0.9, 0.95, -0.9)], &Spotlight::default(), WIDTH);
        assert_eq!(lightmap.coverage(), 0);
    }

    #[test]
    fn test_wall_behind_light_is_ignored() {
        let lightmap = Lightmap::build(&[wall(-1.0, -2.0, 1.0, -2.0)], &Spotlight::default(), WIDTH);
        assert_eq!(lightmap.coverage(), 0);
    }

    #[test]
    fn test_wall_crossing_near_plane() {
        let spotlight = Spotlight::default();
        // Starts behind the light and runs out ahead of it
        let lightmap = Lightmap::build(&[wall(-0.2, -1.5, 0.2, 0.0)], &spotlight, WIDTH);

        assert!(lightmap.coverage() > 0);
        for &depth in lightmap.depths().iter().filter(|d| d.is_finite()) {
            assert!(depth >= spotlight.focal_length);
            assert!(depth <= 1.0 + 1e-5);
        }
    }

    #[test]
    fn test_huge_wall_saturates_columns() {
        let spotlight = Spotlight::default();
        // Both endpoints project far past i64 column range
        let lightmap = Lightmap::build(&[wall(-1e30, 0.0, 1e30, 0.0)], &spotlight, 512);
        assert_eq!(lightmap.coverage(), 512);
        assert!(lightmap.depths().iter().all(|&d| (d - 1.0).abs() < 1e-5));

        let slanted = Lightmap::build(&[wall(-1e30, 0.0, 1e30, 1.0)], &spotlight, 512);
        assert!(slanted.depths().iter().all(|d| d.is_finite() && *d >= spotlight.focal_length));
    }

    #[test]
    fn test_zero_width_lightmap() {
        let lightmap = Lightmap::build(&[wall(-5.0, 0.0, 5.0, 0.0)], &Spotlight::default(), 0);
        assert_eq!(lightmap.width(), 0);
        assert_eq!(lightmap.depth_at(0), None);
    }
}
