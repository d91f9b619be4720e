//! Scene configuration, loadable from TOML.
//!
//! Angles are written in degrees and converted to radians when the config
//! becomes a [`Scene`]; that conversion is also where the spotlight is
//! validated.

use std::path::{Path, PathBuf};

use glam::Vec2;
use serde::Deserialize;

use crate::scene::{Scene, Spotlight, SpotlightError, Wall};
use crate::transform::degrees_to_radians;

/// Errors turning a config file into a scene.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scene config")]
    Parse(#[from] toml::de::Error),

    #[error("invalid spotlight")]
    Spotlight(#[from] SpotlightError),

    #[error("wall {0} has a non-finite endpoint")]
    Wall(usize),

    #[error("output size must be non-zero, got {0}x{1}")]
    OutputSize(usize, usize),
}

/// Size of the rendered image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub width: usize,
    pub height: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpotlightConfig {
    pub position: [f32; 2],
    pub rotation_degrees: f32,
    pub focal_length: f32,
    pub field_of_view_degrees: f32,
    pub max_distance: f32,
}

impl Default for SpotlightConfig {
    fn default() -> Self {
        Self {
            position: [0.0, -1.0],
            rotation_degrees: 0.0,
            focal_length: 0.1,
            field_of_view_degrees: 60.0,
            max_distance: 10.0,
        }
    }
}

impl SpotlightConfig {
    pub fn to_spotlight(&self) -> Result<Spotlight, SpotlightError> {
        Spotlight::new(
            Vec2::from(self.position),
            degrees_to_radians(self.rotation_degrees),
            self.focal_length,
            degrees_to_radians(self.field_of_view_degrees),
            self.max_distance,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WallConfig {
    pub start: [f32; 2],
    pub end: [f32; 2],
}

impl From<WallConfig> for Wall {
    fn from(wall: WallConfig) -> Self {
        Wall::new(Vec2::from(wall.start), Vec2::from(wall.end))
    }
}

/// Everything needed to build the initial scene.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SceneConfig {
    pub output: OutputConfig,
    /// Lightmap resolution; defaults to the output width.
    pub lightmap_width: Option<usize>,
    pub spotlight: SpotlightConfig,
    pub walls: Vec<WallConfig>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            output: OutputConfig::default(),
            lightmap_width: None,
            spotlight: SpotlightConfig::default(),
            walls: vec![
                WallConfig { start: [0.25, 0.25], end: [0.75, 0.25] },
                WallConfig { start: [-0.25, -0.25], end: [-0.75, -0.25] },
                WallConfig { start: [0.25, -0.25], end: [0.25, -0.5] },
            ],
        }
    }
}

impl SceneConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded scene config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn lightmap_width(&self) -> usize {
        self.lightmap_width.unwrap_or(self.output.width)
    }

    /// Validate everything and build the initial snapshot.
    pub fn to_scene(&self) -> Result<Scene, ConfigError> {
        let OutputConfig { width, height } = self.output;
        if width == 0 || height == 0 || self.lightmap_width() == 0 {
            return Err(ConfigError::OutputSize(width, height));
        }

        let walls = self
            .walls
            .iter()
            .enumerate()
            .map(|(i, &wall)| {
                let wall = Wall::from(wall);
                if wall.start.is_finite() && wall.end.is_finite() {
                    Ok(wall)
                } else {
                    Err(ConfigError::Wall(i))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Scene::new(walls, self.spotlight.to_spotlight()?)?)
    }
}
