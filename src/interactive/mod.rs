//! Interactive viewers: a minifb window driving the CPU strategies and a
//! winit + wgpu window driving the GPU one. Both share the controls below.

mod viewer;
pub mod gpu_viewer;

pub use gpu_viewer::run_gpu_viewer;
pub use viewer::InteractiveViewer;

use std::time::Duration;

use crate::config::SceneConfig;
use crate::frame::Parameter;
use crate::gpu::GpuError;
use crate::occlusion::Strategy;
use crate::scene::{Point2D, Scene, Wall};
use crate::visibility::LightProbe;

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("invalid scene")]
    Config(#[from] crate::config::ConfigError),

    #[error("window error")]
    Window(#[from] minifb::Error),

    #[error("event loop error")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("failed to create window")]
    Os(#[from] winit::error::OsError),

    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Everything a viewer needs to open.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub width: usize,
    pub height: usize,
    pub lightmap_width: usize,
    pub scene: Scene,
    /// CPU viewer only; the GPU viewer always tests against a depth buffer.
    pub strategy: Strategy,
    /// GPU viewer only: read the shadow map back every frame.
    pub readback: bool,
}

impl ViewerConfig {
    pub fn from_scene_config(config: &SceneConfig) -> Result<Self, ViewerError> {
        Ok(Self {
            width: config.output.width,
            height: config.output.height,
            lightmap_width: config.lightmap_width(),
            scene: config.to_scene()?,
            strategy: Strategy::default(),
            readback: false,
        })
    }
}

pub(crate) const CONTROLS: &str = "\
Controls:
  Mouse       - Move cursor (diagnostics in the title)
  Left Drag   - Draw a wall
  W/A/S/D     - Move light
  Q/E         - Turn light left/right
  Z/X         - Rotate light by one degree
  [ / ]       - Focal length down/up
  - / =       - Field of view down/up
  , / .       - Max distance down/up
  ESC         - Exit";

/// Key that nudges a spotlight parameter, and in which direction.
pub(crate) fn parameter_for(key: char) -> Option<(Parameter, f32)> {
    match key {
        'z' => Some((Parameter::Rotation, 1.0)),
        'x' => Some((Parameter::Rotation, -1.0)),
        '[' => Some((Parameter::FocalLength, -1.0)),
        ']' => Some((Parameter::FocalLength, 1.0)),
        '-' => Some((Parameter::FieldOfView, -1.0)),
        '=' => Some((Parameter::FieldOfView, 1.0)),
        ',' => Some((Parameter::MaxDistance, -1.0)),
        '.' => Some((Parameter::MaxDistance, 1.0)),
        _ => None,
    }
}

/// Turns pointer samples into wall edits.
///
/// Pressing starts a new zero-length wall at the cursor; holding drags its
/// end; releasing leaves it in place.
#[derive(Debug, Default)]
pub struct WallDrag {
    active: bool,
}

impl WallDrag {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Fold one pointer sample into the next snapshot.
    pub fn apply(&mut self, scene: &Scene, cursor: Option<Point2D>, pressed: bool) -> Scene {
        let next = scene.with_cursor(cursor);
        match (cursor, pressed) {
            (Some(p), true) if !self.active => {
                self.active = true;
                next.with_wall(Wall::new(p, p))
            }
            (Some(p), true) => next.with_last_wall_end(p),
            (None, true) => next,
            (_, false) => {
                self.active = false;
                next
            }
        }
    }
}

/// Window title: cursor diagnostics and the last frame time.
pub(crate) fn title(probe: Option<&LightProbe>, frame_time: Option<Duration>, extra: &str) -> String {
    let mut title = String::from("Spotlight Shadows");
    if let Some(probe) = probe {
        title.push_str(&format!(
            " | clip ({:.2}, {:.2}) light ({:.2}, {:.2}) | {}",
            probe.clip.x, probe.clip.y, probe.light.x, probe.light.y, probe.visibility
        ));
        if let Some(column) = probe.column {
            title.push_str(&format!(" | column {}", column));
        }
    }
    if let Some(elapsed) = frame_time {
        title.push_str(&format!(" | {:.2} ms", elapsed.as_secs_f64() * 1000.0));
    }
    if !extra.is_empty() {
        title.push_str(" | ");
        title.push_str(extra);
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn test_drag_draws_a_wall() {
        let mut drag = WallDrag::default();
        let scene = Scene::default();
        let a = Vec2::new(0.1, 0.2);
        let b = Vec2::new(0.4, 0.2);

        let scene = drag.apply(&scene, Some(a), true);
        assert!(drag.is_active());
        assert_eq!(scene.walls, vec![Wall::new(a, a)]);

        let scene = drag.apply(&scene, Some(b), true);
        assert_eq!(scene.walls, vec![Wall::new(a, b)]);
        assert_eq!(scene.cursor, Some(b));

        let scene = drag.apply(&scene, Some(Vec2::ZERO), false);
        assert!(!drag.is_active());
        assert_eq!(scene.walls, vec![Wall::new(a, b)]);

        // A second press starts another wall
        let scene = drag.apply(&scene, Some(b), true);
        assert_eq!(scene.walls.len(), 2);
    }

    #[test]
    fn test_hover_only_moves_cursor() {
        let mut drag = WallDrag::default();
        let scene = drag.apply(&Scene::default(), Some(Vec2::ONE), false);
        assert!(scene.walls.is_empty());
        assert_eq!(scene.cursor, Some(Vec2::ONE));

        let scene = drag.apply(&scene, None, true);
        assert!(scene.walls.is_empty());
        assert_eq!(scene.cursor, None);
    }

    #[test]
    fn test_parameter_keys() {
        assert_eq!(parameter_for(']'), Some((Parameter::FocalLength, 1.0)));
        assert_eq!(parameter_for('-'), Some((Parameter::FieldOfView, -1.0)));
        assert_eq!(parameter_for('x'), Some((Parameter::Rotation, -1.0)));
        assert_eq!(parameter_for('w'), None);
    }

    #[test]
    fn test_title() {
        assert_eq!(title(None, None, ""), "Spotlight Shadows");
        let text = title(None, Some(Duration::from_micros(1500)), "readback");
        assert_eq!(text, "Spotlight Shadows | 1.50 ms | readback");
    }
}
