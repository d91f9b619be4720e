//! Visibility classifier: is a point lit by the spotlight?

use std::fmt;

use crate::occlusion::OcclusionQuery;
use crate::scene::{Point2D, Spotlight};
use crate::transform::{canvas_to_clip, clip_to_light, light_to_projected, lightmap_column};

/// Outcome of classifying one point. Only `Lit` is lit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Lit,
    /// At or behind the light's origin.
    BehindLight,
    /// Closer than the focal length.
    NearClip,
    /// Further than the max distance.
    FarClip,
    /// Outside the field of view.
    OutsideCone,
    /// A wall is at least as close to the light along this column.
    Occluded,
}

impl Visibility {
    #[inline]
    pub fn is_lit(self) -> bool {
        self == Visibility::Lit
    }

    pub fn label(self) -> &'static str {
        match self {
            Visibility::Lit => "lit",
            Visibility::BehindLight => "behind light",
            Visibility::NearClip => "closer than focal length",
            Visibility::FarClip => "beyond max distance",
            Visibility::OutsideCone => "outside field of view",
            Visibility::Occluded => "in shadow",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reject depths the light can never reach, whatever the walls.
#[inline]
pub(crate) fn depth_gate(depth: f32, spotlight: &Spotlight) -> Result<(), Visibility> {
    if !(depth > 0.0) {
        Err(Visibility::BehindLight)
    } else if depth < spotlight.focal_length {
        Err(Visibility::NearClip)
    } else if depth > spotlight.max_distance {
        Err(Visibility::FarClip)
    } else {
        Ok(())
    }
}

/// Every intermediate value of one classification, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightProbe {
    pub clip: Point2D,
    pub light: Point2D,
    pub projected: Option<f32>,
    pub column: Option<usize>,
    pub visibility: Visibility,
}

impl fmt::Display for LightProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "clip space: ({:.2}, {:.2})", self.clip.x, self.clip.y)?;
        writeln!(f, "light space: ({:.2}, {:.2})", self.light.x, self.light.y)?;
        match self.projected {
            Some(x) => writeln!(f, "projected light space: {:.3}", x)?,
            None => writeln!(f, "projected light space: -")?,
        }
        match self.column {
            Some(column) => writeln!(f, "lightmap column: {}", column)?,
            None => writeln!(f, "lightmap column: -")?,
        }
        write!(f, "is lit: {} ({})", self.visibility.is_lit(), self.visibility)
    }
}

/// Classify `point` against an occlusion query, keeping every intermediate
/// value.
pub fn probe<Q: OcclusionQuery + ?Sized>(point: Point2D, query: &Q) -> LightProbe {
    let spotlight = query.spotlight();
    let light = clip_to_light(point, spotlight);
    let projected = light_to_projected(light, spotlight);
    let column = projected.and_then(|x| lightmap_column(x, query.width()));

    // In front of the light, no projection means a degenerate cone
    let visibility = match depth_gate(light.y, spotlight) {
        Err(unlit) => unlit,
        Ok(()) => match column.and_then(|c| query.nearer_than_occluder(c, light.y)) {
            None => Visibility::OutsideCone,
            Some(true) => Visibility::Lit,
            Some(false) => Visibility::Occluded,
        },
    };

    LightProbe {
        clip: point,
        light,
        projected,
        column,
        visibility,
    }
}

/// Classify a clip-space point.
pub fn classify<Q: OcclusionQuery + ?Sized>(point: Point2D, query: &Q) -> Visibility {
    probe(point, query).visibility
}

/// Classify a canvas pixel of a `width × height` output.
pub fn classify_canvas<Q: OcclusionQuery + ?Sized>(
    query: &Q,
    pixel: Point2D,
    width: f32,
    height: f32,
) -> Visibility {
    query.classify(canvas_to_clip(pixel, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occlusion::Lightmap;
    use crate::scene::Wall;
    use glam::Vec2;

    fn perpendicular_wall_lightmap() -> Lightmap {
        let wall = Wall::new(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0));
        Lightmap::build(&[wall], &Spotlight::default(), 128)
    }

    #[test]
    fn test_depth_gate() {
        let spotlight = Spotlight::default();
        assert_eq!(depth_gate(-1.0, &spotlight), Err(Visibility::BehindLight));
        assert_eq!(depth_gate(0.0, &spotlight), Err(Visibility::BehindLight));
        assert_eq!(depth_gate(f32::NAN, &spotlight), Err(Visibility::BehindLight));
        assert_eq!(depth_gate(0.05, &spotlight), Err(Visibility::NearClip));
        assert_eq!(depth_gate(10.5, &spotlight), Err(Visibility::FarClip));
        assert_eq!(depth_gate(0.1, &spotlight), Ok(()));
        assert_eq!(depth_gate(10.0, &spotlight), Ok(()));
    }

    #[test]
    fn test_probe_records_each_stage() {
        let lightmap = perpendicular_wall_lightmap();
        let probe = probe(Vec2::new(0.0, -0.5), &lightmap);

        assert_eq!(probe.light, Vec2::new(0.0, 0.5));
        assert_eq!(probe.projected, Some(0.0));
        assert_eq!(probe.column, Some(64));
        assert_eq!(probe.visibility, Visibility::Lit);

        let text = probe.to_string();
        assert!(text.contains("light space: (0.00, 0.50)"));
        assert!(text.ends_with("is lit: true (lit)"));
    }

    #[test]
    fn test_equal_depth_is_not_lit() {
        let lightmap = perpendicular_wall_lightmap();
        // Exactly on the wall
        assert_eq!(classify(Vec2::new(0.2, 0.0), &lightmap), Visibility::Occluded);
    }

    #[test]
    fn test_behind_light_has_no_column() {
        let lightmap = perpendicular_wall_lightmap();
        let probe = probe(Vec2::new(0.0, -1.5), &lightmap);
        assert_eq!(probe.projected, None);
        assert_eq!(probe.column, None);
        assert_eq!(probe.visibility, Visibility::BehindLight);
    }

    #[test]
    fn test_degenerate_cone_is_outside_cone() {
        let lightmap = perpendicular_wall_lightmap();
        // Bypasses validation: a zero field of view has no extent
        let spotlight = Spotlight { field_of_view: 0.0, ..Spotlight::default() };
        let collapsed = Lightmap::build(&[], &spotlight, 128);

        let probe = probe(Vec2::new(0.0, -0.5), &collapsed);
        assert_eq!(probe.projected, None);
        assert_eq!(probe.visibility, Visibility::OutsideCone);
        assert_eq!(classify(Vec2::new(0.0, -0.5), &lightmap), Visibility::Lit);
    }

    #[test]
    fn test_classify_canvas_pixel() {
        let lightmap = perpendicular_wall_lightmap();
        // Pixel (50, 75) of a 100×100 canvas is clip (0, -0.5)
        assert_eq!(
            classify_canvas(&lightmap, Vec2::new(50.0, 75.0), 100.0, 100.0),
            Visibility::Lit
        );
        // Top row is beyond the wall
        assert_eq!(
            classify_canvas(&lightmap, Vec2::new(50.0, 0.0), 100.0, 100.0),
            Visibility::Occluded
        );
    }
}
