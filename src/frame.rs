//! Per-frame state: the current scene snapshot, its cached occlusion query,
//! and the pure motion step that produces the next spotlight.

use std::f32::consts::TAU;
use std::sync::Arc;

use glam::Vec2;

use crate::occlusion::{OcclusionQuery, Strategy};
use crate::scene::{Scene, Spotlight};

/// Translation speed in world units per second.
pub const VELOCITY: f32 = 0.5;
/// Turn speed in radians per second.
pub const ANGULAR_VELOCITY: f32 = 1.0;

/// Occlusion query shared between the renderer and the cursor diagnostics.
pub type SharedQuery = Arc<dyn OcclusionQuery + Send + Sync>;

/// The snapshot being rendered plus the occlusion query derived from it.
///
/// The query is either valid for the snapshot or absent (stale); any
/// change to walls or spotlight drops it, and it is rebuilt on demand with
/// the frame's strategy.
#[derive(Clone)]
pub struct FrameState {
    scene: Arc<Scene>,
    strategy: Strategy,
    lightmap_width: usize,
    query: Option<SharedQuery>,
}

impl FrameState {
    pub fn new(scene: Scene, strategy: Strategy, lightmap_width: usize) -> Self {
        FrameState {
            scene: Arc::new(scene),
            strategy,
            lightmap_width,
            query: None,
        }
    }

    pub fn scene(&self) -> &Arc<Scene> {
        &self.scene
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn is_stale(&self) -> bool {
        self.query.is_none()
    }

    /// Swap in the next snapshot. Returns whether the query went stale.
    pub fn replace(&mut self, next: Scene) -> bool {
        let invalidated = !self.scene.same_geometry(&next);
        self.scene = Arc::new(next);
        if invalidated {
            self.query = None;
        }
        invalidated
    }

    /// Derive the next snapshot from the current one.
    pub fn update(&mut self, f: impl FnOnce(&Scene) -> Scene) -> bool {
        let next = f(&self.scene);
        self.replace(next)
    }

    /// The occlusion query for the current snapshot, rebuilding it if stale.
    pub fn query(&mut self) -> SharedQuery {
        if let Some(query) = &self.query {
            return Arc::clone(query);
        }
        let query: SharedQuery = Arc::from(self.strategy.build(
            &self.scene.walls,
            &self.scene.spotlight,
            self.lightmap_width,
        ));
        log::debug!(
            "Rebuilt {:?} occlusion: {} walls, {}/{} columns occluded",
            self.strategy,
            self.scene.walls.len(),
            query.coverage(),
            self.lightmap_width
        );
        self.query = Some(Arc::clone(&query));
        query
    }
}

/// Directional intents currently held by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotionIntent {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub turn_left: bool,
    pub turn_right: bool,
}

impl MotionIntent {
    pub fn is_idle(&self) -> bool {
        *self == MotionIntent::default()
    }
}

#[inline]
fn axis(positive: bool, negative: bool) -> f32 {
    (positive as i8 - negative as i8) as f32
}

/// Advance the spotlight by `dt` seconds of held input.
///
/// Movement is along the world axes; turning left increases the rotation.
/// Opposite intents cancel out.
pub fn integrate_motion(spotlight: &Spotlight, intent: MotionIntent, dt: f32) -> Spotlight {
    if intent.is_idle() {
        return *spotlight;
    }
    let direction = Vec2::new(axis(intent.right, intent.left), axis(intent.up, intent.down));
    let turn = axis(intent.turn_left, intent.turn_right);
    Spotlight {
        pos: spotlight.pos + direction * VELOCITY * dt,
        rotation: (spotlight.rotation + turn * ANGULAR_VELOCITY * dt).rem_euclid(TAU),
        ..*spotlight
    }
}

/// Step the rotation by whole degrees, wrapping around the circle.
pub fn step_rotation_degrees(rotation: f32, delta_degrees: f32) -> f32 {
    (rotation + delta_degrees.to_radians()).rem_euclid(TAU)
}

/// Spotlight parameters nudged one step per key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    /// Whole degrees, wrapping around.
    Rotation,
    FocalLength,
    FieldOfView,
    MaxDistance,
}

impl Parameter {
    fn step(self) -> f32 {
        match self {
            Parameter::Rotation => 1.0,
            Parameter::FocalLength => 0.01,
            Parameter::FieldOfView => 1.0f32.to_radians(),
            Parameter::MaxDistance => 0.1,
        }
    }
}

/// Nudge one parameter up (`steps > 0`) or down, saturating at its limits.
pub fn adjust(spotlight: &Spotlight, parameter: Parameter, steps: f32) -> Spotlight {
    let delta = parameter.step() * steps;
    let mut next = *spotlight;
    match parameter {
        Parameter::Rotation => next.rotation = step_rotation_degrees(next.rotation, delta),
        Parameter::FocalLength => {
            // Never push the near plane past the far plane
            let ceiling = (next.max_distance - crate::scene::MIN_FOCAL_LENGTH).max(0.0);
            next.focal_length = (next.focal_length + delta).min(ceiling);
        }
        Parameter::FieldOfView => next.field_of_view += delta,
        Parameter::MaxDistance => next.max_distance += delta,
    }
    next.clamped()
}
