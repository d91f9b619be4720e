//! Depth-buffer occlusion, the shape the GPU shadow-map pass produces.
//!
//! Walls are drawn as lines through the spotlight's view-projection into a
//! `width × 1` depth target cleared to 1.0 with a "less" depth test. The
//! stored value is normalized depth (0 at the focal length, 1 at max
//! distance), which interpolates linearly across columns.
//!
//! [`DepthMap::rasterize`] reproduces the pass on the CPU;
//! [`DepthMap::from_readback`] wraps the bytes copied back from the GPU.

use super::{OcclusionQuery, clip_segment_depth};
use crate::scene::{Spotlight, Wall};
use crate::transform::{
    clip_to_light, light_to_projected, normalized_depth, projected_to_lightmap_index,
};

/// Clear value of the depth target.
pub const DEPTH_CLEAR: f32 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    spotlight: Spotlight,
    depths: Vec<f32>,
}

impl DepthMap {
    /// Rasterize the walls the way the GPU line-list pass does.
    pub fn rasterize(walls: &[Wall], spotlight: &Spotlight, width: usize) -> Self {
        let mut map = DepthMap {
            spotlight: *spotlight,
            depths: vec![DEPTH_CLEAR; width],
        };
        for wall in walls {
            map.draw_line(wall);
        }
        map
    }

    /// Wrap depths produced elsewhere.
    pub fn from_depths(spotlight: &Spotlight, depths: Vec<f32>) -> Self {
        DepthMap {
            spotlight: *spotlight,
            depths,
        }
    }

    /// Decode a readback row of `Depth32Float` texels.
    ///
    /// `bytes` may carry row padding past `width * 4`; returns `None` when
    /// it is too short.
    pub fn from_readback(spotlight: &Spotlight, bytes: &[u8], width: usize) -> Option<Self> {
        let row = bytes.get(..width * std::mem::size_of::<f32>())?;
        let depths = row
            .chunks_exact(std::mem::size_of::<f32>())
            .map(bytemuck::pod_read_unaligned::<f32>)
            .collect();
        Some(Self::from_depths(spotlight, depths))
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.depths.len()
    }

    #[inline]
    pub fn depths(&self) -> &[f32] {
        &self.depths
    }

    #[inline]
    pub fn depth_at(&self, column: usize) -> Option<f32> {
        self.depths.get(column).copied()
    }

    /// Number of columns a wall was written to.
    pub fn coverage(&self) -> usize {
        self.depths.iter().filter(|&&d| d < DEPTH_CLEAR).count()
    }

    fn draw_line(&mut self, wall: &Wall) {
        let width = self.width() as i64;
        if width == 0 {
            return;
        }
        let spotlight = self.spotlight;

        // Near and far planes clip exactly like the hardware clipper
        let Some((a, b)) = clip_segment_depth(
            clip_to_light(wall.start, &spotlight),
            clip_to_light(wall.end, &spotlight),
            spotlight.focal_length,
            spotlight.max_distance,
        ) else {
            return;
        };
        let (Some(xa), Some(xb)) = (
            light_to_projected(a, &spotlight),
            light_to_projected(b, &spotlight),
        ) else {
            return;
        };

        let mut start = (xa, normalized_depth(a.y, &spotlight));
        let mut end = (xb, normalized_depth(b.y, &spotlight));
        if start.0 > end.0 {
            std::mem::swap(&mut start, &mut end);
        }

        let first = projected_to_lightmap_index(start.0, self.width());
        let last = projected_to_lightmap_index(end.0, self.width());
        if last < 0 || first >= width {
            return;
        }

        let span = end.0 - start.0;
        for column in first.clamp(0, width - 1)..=last.clamp(0, width - 1) {
            let z = if span > 0.0 {
                // Sample at the column center, as the rasterizer does
                let center = (column as f32 + 0.5) / width as f32 * 2.0 - 1.0;
                let t = ((center - start.0) / span).clamp(0.0, 1.0);
                start.1 + (end.1 - start.1) * t
            } else {
                start.1.min(end.1)
            };
            let slot = &mut self.depths[column as usize];
            if z < *slot {
                *slot = z;
            }
        }
    }
}

impl OcclusionQuery for DepthMap {
    fn spotlight(&self) -> &Spotlight {
        &self.spotlight
    }

    fn width(&self) -> usize {
        self.depths.len()
    }

    fn coverage(&self) -> usize {
        DepthMap::coverage(self)
    }

    fn nearer_than_occluder(&self, column: usize, depth: f32) -> Option<bool> {
        let z = normalized_depth(depth, &self.spotlight);
        self.depth_at(column).map(|stored| z < stored)
    }
}
