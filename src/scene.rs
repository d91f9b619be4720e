//! Scene data model: walls, the spotlight and the per-frame snapshot.
//!
//! World coordinates are clip-space coordinates: the scene occupies
//! `[-1, 1]²` with y pointing up.

use std::f32::consts::PI;

use glam::Vec2;

/// A point in whichever coordinate space the caller is working in.
pub type Point2D = Vec2;

/// Smallest field of view the boundary layer will accept when clamping.
pub const MIN_FIELD_OF_VIEW: f32 = PI / 180.0;
/// Largest field of view the boundary layer will accept when clamping.
pub const MAX_FIELD_OF_VIEW: f32 = PI - PI / 180.0;
/// Smallest focal length the boundary layer will accept when clamping.
pub const MIN_FOCAL_LENGTH: f32 = 0.01;

/// An opaque, zero-thickness occluder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    pub start: Point2D,
    pub end: Point2D,
}

impl Wall {
    pub fn new(start: Point2D, end: Point2D) -> Self {
        Wall { start, end }
    }
}

/// Invalid spotlight parameters.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum SpotlightError {
    #[error("spotlight {0} is not a finite number")]
    NonFinite(&'static str),

    #[error("focal length must be positive, got {0}")]
    FocalLength(f32),

    #[error("field of view must be strictly between 0 and π radians, got {0}")]
    FieldOfView(f32),

    #[error("max distance {max_distance} must exceed focal length {focal_length}")]
    ClipRange { focal_length: f32, max_distance: f32 },
}

/// A cone-shaped light source.
///
/// `rotation` is the angle of the forward vector measured counter-clockwise
/// from the +y axis, so rotation 0 faces "up" the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spotlight {
    pub pos: Point2D,
    pub rotation: f32,
    /// Near clip distance: nothing closer than this is lit.
    pub focal_length: f32,
    /// Full angular spread of the cone, in radians.
    pub field_of_view: f32,
    /// Far clip distance: nothing further than this is lit.
    pub max_distance: f32,
}

impl Default for Spotlight {
    fn default() -> Self {
        Spotlight {
            pos: Vec2::new(0.0, -1.0),
            rotation: 0.0,
            focal_length: 0.1,
            field_of_view: PI / 3.0,
            max_distance: 10.0,
        }
    }
}

impl Spotlight {
    /// Build a spotlight, rejecting degenerate parameters.
    pub fn new(
        pos: Point2D,
        rotation: f32,
        focal_length: f32,
        field_of_view: f32,
        max_distance: f32,
    ) -> Result<Self, SpotlightError> {
        let spotlight = Spotlight {
            pos,
            rotation,
            focal_length,
            field_of_view,
            max_distance,
        };
        spotlight.validate()?;
        Ok(spotlight)
    }

    pub fn validate(&self) -> Result<(), SpotlightError> {
        if !self.pos.is_finite() {
            return Err(SpotlightError::NonFinite("position"));
        }
        if !self.rotation.is_finite() {
            return Err(SpotlightError::NonFinite("rotation"));
        }
        if !self.max_distance.is_finite() {
            return Err(SpotlightError::NonFinite("max distance"));
        }
        if !(self.focal_length > 0.0) || !self.focal_length.is_finite() {
            return Err(SpotlightError::FocalLength(self.focal_length));
        }
        if !(self.field_of_view > 0.0 && self.field_of_view < PI)
            || !self.tan_half_fov().is_finite()
        {
            return Err(SpotlightError::FieldOfView(self.field_of_view));
        }
        if self.max_distance <= self.focal_length {
            return Err(SpotlightError::ClipRange {
                focal_length: self.focal_length,
                max_distance: self.max_distance,
            });
        }
        Ok(())
    }

    /// Pull every parameter back into its valid range.
    ///
    /// Used by interactive input, where a key press should saturate rather
    /// than fail.
    pub fn clamped(self) -> Self {
        let focal_length = self.focal_length.max(MIN_FOCAL_LENGTH);
        Spotlight {
            pos: self.pos,
            rotation: self.rotation,
            focal_length,
            field_of_view: self
                .field_of_view
                .clamp(MIN_FIELD_OF_VIEW, MAX_FIELD_OF_VIEW),
            max_distance: self.max_distance.max(focal_length + MIN_FOCAL_LENGTH),
        }
    }

    /// Unit vector the light faces, in world space.
    pub fn forward(&self) -> Vec2 {
        let (s, c) = self.rotation.sin_cos();
        Vec2::new(-s, c)
    }

    #[inline]
    pub fn tan_half_fov(&self) -> f32 {
        (self.field_of_view * 0.5).tan()
    }

    /// Half-width of the cone at the focal length.
    #[inline]
    pub fn right_extent(&self) -> f32 {
        self.focal_length * self.tan_half_fov()
    }
}

/// Everything a frame is rendered from.
///
/// Snapshots are replaced wholesale between frames; the `with_*` methods
/// build the next snapshot instead of mutating this one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scene {
    pub walls: Vec<Wall>,
    pub spotlight: Spotlight,
    pub cursor: Option<Point2D>,
}

impl Scene {
    pub fn new(walls: Vec<Wall>, spotlight: Spotlight) -> Result<Self, SpotlightError> {
        spotlight.validate()?;
        Ok(Scene {
            walls,
            spotlight,
            cursor: None,
        })
    }

    pub fn with_spotlight(&self, spotlight: Spotlight) -> Self {
        Scene {
            spotlight,
            ..self.clone()
        }
    }

    pub fn with_cursor(&self, cursor: Option<Point2D>) -> Self {
        Scene {
            cursor,
            ..self.clone()
        }
    }

    /// Append a wall.
    pub fn with_wall(&self, wall: Wall) -> Self {
        let mut walls = self.walls.clone();
        walls.push(wall);
        Scene {
            walls,
            ..self.clone()
        }
    }

    /// Move the end of the most recently added wall (drag in progress).
    /// A scene without walls is returned unchanged.
    pub fn with_last_wall_end(&self, end: Point2D) -> Self {
        let mut next = self.clone();
        if let Some(last) = next.walls.last_mut() {
            last.end = end;
        }
        next
    }

    /// Whether the lightmap built for `self` is still valid for `other`.
    pub fn same_geometry(&self, other: &Scene) -> bool {
        self.spotlight == other.spotlight && self.walls == other.walls
    }
}
