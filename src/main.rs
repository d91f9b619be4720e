mod config;
mod frame;
mod gpu;
mod interactive;
mod occlusion;
mod render;
mod scene;
mod transform;
mod visibility;

#[cfg(test)]
mod tests;

// Re-export public API
pub use config::{ConfigError, SceneConfig};
pub use frame::{FrameState, MotionIntent, integrate_motion};
pub use occlusion::{DepthMap, Lightmap, OcclusionQuery, Strategy};
pub use render::{draw_debug_overlay, render_visibility, save_ppm};
pub use scene::{Point2D, Scene, Spotlight, SpotlightError, Wall};
pub use visibility::{LightProbe, Visibility, classify, probe};

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::Vec2;

use interactive::{InteractiveViewer, ViewerConfig};
use occlusion::scanline::lightmap_to_string;
use transform::radians_to_degrees;

#[derive(Debug, Parser)]
#[command(name = "spotlight_shadows", version, about = "2D spotlight shadow casting")]
struct Cli {
    /// Scene file (TOML); the built-in demo scene when omitted
    #[arg(long, global = true, value_name = "FILE")]
    scene: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive CPU viewer
    Interactive {
        #[arg(long, value_enum, default_value_t)]
        strategy: Strategy,
    },
    /// Interactive GPU viewer
    Gpu {
        /// Read the shadow map back every frame and log it at debug level
        #[arg(long)]
        readback: bool,
    },
    /// Render one frame to a PPM file
    Render {
        #[arg(short, long, default_value = "spotlight.ppm")]
        output: PathBuf,
        #[arg(long, value_enum, default_value_t)]
        strategy: Strategy,
        /// Draw walls and the light cone on top
        #[arg(long)]
        overlay: bool,
    },
    /// Classify one clip-space point and print every intermediate value
    #[command(allow_negative_numbers = true)]
    Probe {
        x: f32,
        y: f32,
        /// Also print the lightmap
        #[arg(long)]
        lightmap: bool,
    },
    /// Time lightmap builds and full-frame classification
    Benchmark {
        #[arg(long, default_value_t = 20)]
        iterations: usize,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.scene {
        Some(path) => SceneConfig::load(path)
            .with_context(|| format!("loading scene {}", path.display()))?,
        None => SceneConfig::default(),
    };

    match cli.command {
        Command::Interactive { strategy } => run_interactive(&config, strategy),
        Command::Gpu { readback } => run_gpu(&config, readback),
        Command::Render {
            output,
            strategy,
            overlay,
        } => run_render(&config, &output, strategy, overlay),
        Command::Probe { x, y, lightmap } => run_probe(&config, Vec2::new(x, y), lightmap),
        Command::Benchmark { iterations } => run_benchmark(&config, iterations),
    }
}

fn run_interactive(config: &SceneConfig, strategy: Strategy) -> anyhow::Result<()> {
    let viewer_config = ViewerConfig {
        strategy,
        ..ViewerConfig::from_scene_config(config)?
    };
    let mut viewer = InteractiveViewer::new(viewer_config).context("failed to create viewer")?;
    viewer.run()?;
    Ok(())
}

fn run_gpu(config: &SceneConfig, readback: bool) -> anyhow::Result<()> {
    let viewer_config = ViewerConfig {
        readback,
        ..ViewerConfig::from_scene_config(config)?
    };
    interactive::run_gpu_viewer(viewer_config)?;
    Ok(())
}

fn run_render(
    config: &SceneConfig,
    output: &std::path::Path,
    strategy: Strategy,
    overlay: bool,
) -> anyhow::Result<()> {
    let scene = config.to_scene()?;
    let (width, height) = (config.output.width, config.output.height);

    let start = Instant::now();
    let query = strategy.build(&scene.walls, &scene.spotlight, config.lightmap_width());
    let mut buffer = render_visibility(query.as_ref(), width, height);
    log::info!("Rendered {}x{} with {:?} in {:?}", width, height, strategy, start.elapsed());

    if overlay {
        draw_debug_overlay(&mut buffer, width, height, &scene);
    }
    save_ppm(&buffer, width, height, output)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("Wrote {}", output.display());
    Ok(())
}

fn run_probe(config: &SceneConfig, point: Point2D, print_lightmap: bool) -> anyhow::Result<()> {
    let scene = config.to_scene()?;
    let spotlight = &scene.spotlight;
    let lightmap = Lightmap::build(&scene.walls, spotlight, config.lightmap_width());

    let facing = spotlight.forward();
    println!(
        "spotlight: ({:.2}, {:.2}) facing ({:.2}, {:.2}) rotation {:.1}° fov {:.1}° near {} far {}",
        spotlight.pos.x,
        spotlight.pos.y,
        facing.x,
        facing.y,
        radians_to_degrees(spotlight.rotation),
        radians_to_degrees(spotlight.field_of_view),
        spotlight.focal_length,
        spotlight.max_distance
    );
    println!("{}", probe(point, &lightmap));

    let depth_map = DepthMap::rasterize(&scene.walls, spotlight, config.lightmap_width());
    println!("depth buffer: {}", depth_map.classify(point));

    if print_lightmap {
        println!("{}", lightmap_to_string(&lightmap));
    }
    Ok(())
}

/// Walls arranged on concentric rings around the origin.
fn ring_walls(count: usize) -> Vec<Wall> {
    (0..count)
        .map(|i| {
            let ring = 0.2 + 0.15 * (i % 5) as f32;
            let angle = i as f32 * 0.61;
            let start = Vec2::from_angle(angle) * ring;
            let end = Vec2::from_angle(angle + 0.3) * ring;
            Wall::new(start, end)
        })
        .collect()
}

fn run_benchmark(config: &SceneConfig, iterations: usize) -> anyhow::Result<()> {
    let scene = config.to_scene()?;
    let spotlight = scene.spotlight;
    let iterations = iterations.max(1);

    println!("=== Lightmap Build Benchmark ===\n");

    for wall_count in [3, 100, 1000] {
        let walls = ring_walls(wall_count);
        println!("{} walls", wall_count);
        println!("-----------------------");

        for width in [128, 512, 2048] {
            let start = Instant::now();
            for _ in 0..iterations {
                let _ = Lightmap::build(&walls, &spotlight, width);
            }
            let scanline_ms = start.elapsed().as_secs_f64() * 1000.0 / iterations as f64;

            let start = Instant::now();
            for _ in 0..iterations {
                let _ = DepthMap::rasterize(&walls, &spotlight, width);
            }
            let depth_ms = start.elapsed().as_secs_f64() * 1000.0 / iterations as f64;

            println!(
                "  width {:>5}: scanline {:.4} ms/iter, depth buffer {:.4} ms/iter",
                width, scanline_ms, depth_ms
            );
        }
        println!();
    }

    // Full frame: build plus per-pixel classification
    let (width, height) = (config.output.width, config.output.height);
    println!("=== Full Frame ({}x{}, rayon rows) ===\n", width, height);

    for strategy in [Strategy::Scanline, Strategy::DepthBuffer] {
        let start = Instant::now();
        for _ in 0..iterations {
            let query = strategy.build(&scene.walls, &spotlight, config.lightmap_width());
            let _ = render_visibility(query.as_ref(), width, height);
        }
        let frame_ms = start.elapsed().as_secs_f64() * 1000.0 / iterations as f64;
        println!(
            "  {:?}: {:.3} ms/frame ({:.1} FPS)",
            strategy,
            frame_ms,
            1000.0 / frame_ms
        );
    }

    Ok(())
}
