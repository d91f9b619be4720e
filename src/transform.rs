//! Coordinate transform pipeline.
//!
//! Four spaces are involved:
//! - canvas: pixels, origin top-left, y down
//! - clip: `[-1, 1]²`, origin center, y up (also the world space)
//! - light: `x` = lateral offset (+ right), `y` = depth along the light's forward axis
//! - projected: perspective-divided lateral offset, `[-1, 1]` inside the cone
//!
//! Everything here is pure.

use glam::{Mat4, Vec2, Vec4};

use crate::scene::{Point2D, Spotlight};

#[inline]
pub fn degrees_to_radians(degrees: f32) -> f32 {
    degrees.to_radians()
}

#[inline]
pub fn radians_to_degrees(radians: f32) -> f32 {
    radians.to_degrees()
}

/// Pixel coordinates to clip space.
#[inline]
pub fn canvas_to_clip(point: Point2D, width: f32, height: f32) -> Point2D {
    Vec2::new(
        (point.x / width) * 2.0 - 1.0,
        ((height - point.y) / height) * 2.0 - 1.0,
    )
}

/// Clip space back to pixel coordinates.
#[inline]
pub fn clip_to_canvas(point: Point2D, width: f32, height: f32) -> Point2D {
    Vec2::new(
        (point.x + 1.0) / 2.0 * width,
        (1.0 - point.y) / 2.0 * height,
    )
}

/// Move a clip-space point into the light's local frame.
#[inline]
pub fn clip_to_light(point: Point2D, spotlight: &Spotlight) -> Point2D {
    let d = point - spotlight.pos;
    let (s, c) = spotlight.rotation.sin_cos();
    // Rotate by -rotation so the forward vector lands on +y
    Vec2::new(c * d.x + s * d.y, c * d.y - s * d.x)
}

/// Inverse of [`clip_to_light`].
#[inline]
pub fn light_to_clip(point: Point2D, spotlight: &Spotlight) -> Point2D {
    let (s, c) = spotlight.rotation.sin_cos();
    Vec2::new(c * point.x - s * point.y, s * point.x + c * point.y) + spotlight.pos
}

/// One-axis perspective projection of a light-space point.
///
/// Returns `None` for points at or behind the light (`y <= 0`) and for a
/// spotlight whose cone extent is degenerate.
pub fn light_to_projected(point: Point2D, spotlight: &Spotlight) -> Option<f32> {
    if !(point.y > 0.0) {
        return None;
    }
    let right_extent = spotlight.right_extent();
    if !(right_extent > 0.0) || !right_extent.is_finite() {
        return None;
    }
    let scale_factor = 1.0 / right_extent;
    let scaled_focal_length = spotlight.focal_length * scale_factor;
    let scaled = point * scale_factor;
    let projected = scaled.x * scaled_focal_length / scaled.y;
    projected.is_finite().then_some(projected)
}

/// Map a projected coordinate to a lightmap column.
///
/// The result is unchecked: anything outside `0..width` lies outside the
/// field of view. NaN maps to `-1`.
#[inline]
pub fn projected_to_lightmap_index(x: f32, width: usize) -> i64 {
    if x.is_nan() {
        return -1;
    }
    ((x + 1.0) / 2.0 * width as f32).floor() as i64
}

/// Bounds-checked [`projected_to_lightmap_index`].
#[inline]
pub fn lightmap_column(x: f32, width: usize) -> Option<usize> {
    let index = projected_to_lightmap_index(x, width);
    (index >= 0 && index < width as i64).then_some(index as usize)
}

/// Depth-buffer value (`[0, 1]`, 0 at the focal length, 1 at max distance)
/// for a light-space depth. Matches the z of [`view_projection`].
#[inline]
pub fn normalized_depth(depth: f32, spotlight: &Spotlight) -> f32 {
    let near = spotlight.focal_length;
    let far = spotlight.max_distance;
    far * (depth - near) / (depth * (far - near))
}

/// World (x, y) → view space, with lateral on +x and forward on -z.
pub fn view_matrix(spotlight: &Spotlight) -> Mat4 {
    let (s, c) = spotlight.rotation.sin_cos();
    let p = spotlight.pos;
    Mat4::from_cols(
        Vec4::new(c, 0.0, s, 0.0),
        Vec4::new(s, 0.0, -c, 0.0),
        Vec4::new(0.0, 1.0, 0.0, 0.0),
        Vec4::new(-(c * p.x + s * p.y), 0.0, c * p.y - s * p.x, 1.0),
    )
}

/// Square perspective frustum: near = focal length, far = max distance.
pub fn projection_matrix(spotlight: &Spotlight) -> Mat4 {
    Mat4::perspective_rh(
        spotlight.field_of_view,
        1.0,
        spotlight.focal_length,
        spotlight.max_distance,
    )
}

pub fn view_projection(spotlight: &Spotlight) -> Mat4 {
    projection_matrix(spotlight) * view_matrix(spotlight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const EPS: f32 = 1e-4;

    fn light() -> Spotlight {
        Spotlight::default()
    }

    #[test]
    fn test_canvas_clip_round_trip() {
        let (w, h) = (640.0, 480.0);
        for &(x, y) in &[(0.0, 0.0), (320.0, 240.0), (639.0, 1.0), (17.5, 471.25)] {
            let p = Vec2::new(x, y);
            let back = clip_to_canvas(canvas_to_clip(p, w, h), w, h);
            assert!((back - p).length() < EPS, "{p} -> {back}");
        }
    }

    #[test]
    fn test_canvas_corners() {
        let top_left = canvas_to_clip(Vec2::ZERO, 100.0, 100.0);
        assert_eq!(top_left, Vec2::new(-1.0, 1.0));
        let bottom_right = canvas_to_clip(Vec2::new(100.0, 100.0), 100.0, 100.0);
        assert_eq!(bottom_right, Vec2::new(1.0, -1.0));
    }

    #[test]
    fn test_clip_to_light_axes() {
        let spotlight = light();
        // Directly ahead of the light, one unit away
        let ahead = clip_to_light(Vec2::new(0.0, 0.0), &spotlight);
        assert!((ahead - Vec2::new(0.0, 1.0)).length() < EPS);
        // To the right of the light
        let right = clip_to_light(Vec2::new(0.5, -1.0), &spotlight);
        assert!((right - Vec2::new(0.5, 0.0)).length() < EPS);

        // Facing -x: a point at -x is straight ahead, +y is to the right
        let turned = Spotlight { rotation: PI / 2.0, pos: Vec2::ZERO, ..spotlight };
        assert!((clip_to_light(Vec2::new(-2.0, 0.0), &turned) - Vec2::new(0.0, 2.0)).length() < EPS);
        assert!((clip_to_light(Vec2::new(0.0, 1.0), &turned) - Vec2::new(1.0, 0.0)).length() < EPS);
    }

    #[test]
    fn test_light_to_clip_inverse() {
        let spotlight = Spotlight { rotation: 0.7, pos: Vec2::new(0.3, -0.2), ..light() };
        for &(x, y) in &[(0.0, 0.0), (0.9, -0.9), (-0.4, 0.6)] {
            let p = Vec2::new(x, y);
            let back = light_to_clip(clip_to_light(p, &spotlight), &spotlight);
            assert!((back - p).length() < EPS);
        }
    }

    #[test]
    fn test_cone_edges_project_to_unit() {
        let spotlight = light();
        let tan = spotlight.tan_half_fov();
        for depth in [0.1, 1.0, 7.5] {
            let left = light_to_projected(Vec2::new(-depth * tan, depth), &spotlight).unwrap();
            let right = light_to_projected(Vec2::new(depth * tan, depth), &spotlight).unwrap();
            assert!((left + 1.0).abs() < EPS);
            assert!((right - 1.0).abs() < EPS);
        }
        let center = light_to_projected(Vec2::new(0.0, 3.0), &spotlight).unwrap();
        assert!(center.abs() < EPS);
    }

    #[test]
    fn test_projection_guards() {
        let spotlight = light();
        assert_eq!(light_to_projected(Vec2::new(0.2, 0.0), &spotlight), None);
        assert_eq!(light_to_projected(Vec2::new(0.2, -1.0), &spotlight), None);

        let degenerate = Spotlight { field_of_view: 0.0, ..spotlight };
        assert_eq!(light_to_projected(Vec2::new(0.0, 1.0), &degenerate), None);
    }

    #[test]
    fn test_lightmap_index() {
        assert_eq!(projected_to_lightmap_index(-1.0, 100), 0);
        assert_eq!(projected_to_lightmap_index(0.0, 100), 50);
        assert_eq!(projected_to_lightmap_index(0.999, 100), 99);
        assert_eq!(projected_to_lightmap_index(1.0, 100), 100);
        assert_eq!(projected_to_lightmap_index(-1.5, 100), -25);
        assert_eq!(projected_to_lightmap_index(f32::NAN, 100), -1);

        assert_eq!(lightmap_column(1.0, 100), None);
        assert_eq!(lightmap_column(-1.01, 100), None);
        assert_eq!(lightmap_column(0.5, 100), Some(75));
    }

    #[test]
    fn test_view_projection_matches_pipeline() {
        let spotlight = Spotlight { rotation: -0.4, pos: Vec2::new(0.1, -0.8), ..light() };
        let vp = view_projection(&spotlight);
        for &(x, y) in &[(0.0, 0.0), (0.3, 0.25), (-0.2, 0.9)] {
            let world = Vec2::new(x, y);
            let lp = clip_to_light(world, &spotlight);
            let clip = vp * Vec4::new(x, y, 0.0, 1.0);

            assert!((clip.w - lp.y).abs() < EPS, "w carries the light-space depth");
            let projected = light_to_projected(lp, &spotlight).unwrap();
            assert!((clip.x / clip.w - projected).abs() < EPS);
            assert!((clip.z / clip.w - normalized_depth(lp.y, &spotlight)).abs() < EPS);
        }
    }

    #[test]
    fn test_normalized_depth_range() {
        let spotlight = light();
        assert!(normalized_depth(spotlight.focal_length, &spotlight).abs() < EPS);
        assert!((normalized_depth(spotlight.max_distance, &spotlight) - 1.0).abs() < EPS);
        assert!(normalized_depth(1.0, &spotlight) < normalized_depth(2.0, &spotlight));
    }
}
