//! Scenario tests for the shadow-casting pipeline

use clap::Parser;
use glam::Vec2;

use crate::transform::{canvas_to_clip, clip_to_canvas, clip_to_light};
use crate::{
    Cli, Command, DepthMap, Lightmap, OcclusionQuery, SceneConfig, Spotlight, Strategy,
    Visibility, Wall, classify, probe,
};

const WIDTH: usize = 256;

fn wall(x0: f32, y0: f32, x1: f32, y1: f32) -> Wall {
    Wall::new(Vec2::new(x0, y0), Vec2::new(x1, y1))
}

/// Points on an `n × n` grid covering the scene, offset off the axes.
fn grid(n: usize) -> impl Iterator<Item = Vec2> {
    let step = 2.0 / n as f32;
    (0..n).flat_map(move |j| {
        (0..n).map(move |i| {
            Vec2::new(
                -1.0 + (i as f32 + 0.5) * step,
                -1.0 + (j as f32 + 0.5) * step,
            )
        })
    })
}

fn distance_to_wall(point: Vec2, wall: &Wall) -> f32 {
    let d = wall.end - wall.start;
    let t = if d.length_squared() > 0.0 {
        ((point - wall.start).dot(d) / d.length_squared()).clamp(0.0, 1.0)
    } else {
        0.0
    };
    point.distance(wall.start + d * t)
}

fn demo_walls() -> Vec<Wall> {
    SceneConfig::default().to_scene().unwrap().walls
}

#[test]
fn test_canvas_round_trip() {
    for (w, h) in [(512.0, 512.0), (640.0, 360.0)] {
        for y in (0..h as usize).step_by(37) {
            for x in (0..w as usize).step_by(41) {
                let pixel = Vec2::new(x as f32, y as f32);
                let back = clip_to_canvas(canvas_to_clip(pixel, w, h), w, h);
                assert!((back - pixel).length() < 1e-3, "{:?} -> {:?}", pixel, back);
            }
        }
    }
}

#[test]
fn test_no_wall_world() {
    let spotlight = Spotlight::default();
    let lightmap = Lightmap::build(&[], &spotlight, WIDTH);

    for point in grid(40) {
        let probe = probe(point, &lightmap);
        let depth = probe.light.y;
        let in_range = depth >= spotlight.focal_length && depth <= spotlight.max_distance;
        let in_cone = probe.column.is_some();

        assert_eq!(probe.visibility.is_lit(), in_range && in_cone, "{}", probe);
    }
}

#[test]
fn test_single_perpendicular_wall() {
    let spotlight = Spotlight::default();
    // One unit ahead of the light, wider than the cone
    let lightmap = Lightmap::build(&[wall(-5.0, 0.0, 5.0, 0.0)], &spotlight, WIDTH);

    for point in grid(40) {
        let probe = probe(point, &lightmap);
        if probe.column.is_none() || probe.light.y < spotlight.focal_length {
            continue;
        }
        let expected = probe.light.y < 1.0;
        assert_eq!(probe.visibility.is_lit(), expected, "{}", probe);
        if !expected {
            assert_eq!(probe.visibility, Visibility::Occluded);
        }
    }
}

#[test]
fn test_near_and_far_clip_exclusion() {
    let spotlight = Spotlight {
        max_distance: 1.0,
        ..Spotlight::default()
    };
    let lightmap = Lightmap::build(&demo_walls(), &spotlight, WIDTH);

    for point in grid(40) {
        let depth = clip_to_light(point, &spotlight).y;
        let visibility = classify(point, &lightmap);
        if depth > 0.0 && depth < spotlight.focal_length {
            assert_eq!(visibility, Visibility::NearClip);
        }
        if depth > spotlight.max_distance {
            assert_eq!(visibility, Visibility::FarClip);
        }
    }
}

#[test]
fn test_occlusion_is_monotonic() {
    let spotlight = Spotlight::default();
    let mut walls = demo_walls();
    walls.push(wall(-0.6, 0.1, 0.1, 0.6));

    let lightmaps: Vec<_> = (0..=walls.len())
        .map(|n| Lightmap::build(&walls[..n], &spotlight, WIDTH))
        .collect();

    for point in grid(50) {
        for pair in lightmaps.windows(2) {
            if pair[1].is_lit(point) {
                assert!(pair[0].is_lit(point), "adding a wall lit {:?}", point);
            }
        }
    }
}

#[test]
fn test_concrete_scenario() {
    let spotlight = Spotlight::new(
        Vec2::new(0.0, -1.0),
        0.0,
        0.1,
        std::f32::consts::PI / 3.0,
        10.0,
    )
    .unwrap();
    let lightmap = Lightmap::build(&[wall(0.25, 0.25, 0.75, 0.25)], &spotlight, WIDTH);

    // Behind the wall, inside its projected columns
    let shadowed = probe(Vec2::new(0.4, 0.5), &lightmap);
    assert_eq!(shadowed.visibility, Visibility::Occluded, "{}", shadowed);

    // Same columns, in front of the wall
    assert_eq!(classify(Vec2::new(0.3, 0.0), &lightmap), Visibility::Lit);

    // Depth 0.05: closer than the focal length
    assert_eq!(classify(Vec2::new(0.0, -0.95), &lightmap), Visibility::NearClip);

    // Directly behind the light
    assert_eq!(classify(Vec2::new(0.0, -1.5), &lightmap), Visibility::BehindLight);
}

#[test]
fn test_degenerate_wall_column() {
    let spotlight = Spotlight::default();
    // Both ends straight ahead of the light: one column
    let lightmap = Lightmap::build(&[wall(0.0, -0.5, 0.0, 0.5)], &spotlight, 100);

    assert_eq!(lightmap.coverage(), 1);
    assert_eq!(lightmap.depth_at(50), Some(0.5));
    assert!(lightmap.depths().iter().all(|d| !d.is_nan()));

    assert_eq!(classify(Vec2::new(0.0, 0.7), &lightmap), Visibility::Occluded);
    assert_eq!(classify(Vec2::new(0.0, -0.7), &lightmap), Visibility::Lit);
    // Neighbouring column at the same depth is untouched
    let beside = probe(Vec2::new(0.03, 0.7), &lightmap);
    assert_eq!(beside.column, Some(51));
    assert_eq!(beside.visibility, Visibility::Lit);
}

#[test]
fn test_strategies_agree_away_from_walls() {
    let walls = demo_walls();
    for spotlight in [
        Spotlight::default(),
        Spotlight {
            pos: Vec2::new(-0.8, 0.6),
            rotation: -2.0,
            field_of_view: 1.6,
            ..Spotlight::default()
        },
    ] {
        let lightmap = Lightmap::build(&walls, &spotlight, WIDTH);
        let depth_map = DepthMap::rasterize(&walls, &spotlight, WIDTH);

        for point in grid(41) {
            if walls.iter().any(|w| distance_to_wall(point, w) < 0.1) {
                continue;
            }
            assert_eq!(
                lightmap.classify(point),
                depth_map.classify(point),
                "strategies disagree at {:?}",
                point
            );
        }
    }
}

#[test]
fn test_strategy_build_returns_matching_query() {
    let walls = demo_walls();
    let spotlight = Spotlight::default();
    let point = Vec2::new(0.4, 0.5);

    for strategy in [Strategy::Scanline, Strategy::DepthBuffer] {
        let query = strategy.build(&walls, &spotlight, WIDTH);
        assert_eq!(query.spotlight(), &spotlight);
        assert_eq!(query.classify(point), Visibility::Occluded, "{:?}", strategy);
    }
}

#[test]
fn test_cli_parsing() {
    let cli = Cli::try_parse_from(["spotlight_shadows", "probe", "-0.5", "0.25"]).unwrap();
    match cli.command {
        Command::Probe { x, y, lightmap } => {
            assert_eq!((x, y), (-0.5, 0.25));
            assert!(!lightmap);
        }
        other => panic!("unexpected command {:?}", other),
    }

    let cli = Cli::try_parse_from([
        "spotlight_shadows",
        "render",
        "--strategy",
        "depth-buffer",
        "--scene",
        "room.toml",
    ])
    .unwrap();
    assert_eq!(cli.scene.as_deref(), Some(std::path::Path::new("room.toml")));
    match cli.command {
        Command::Render { strategy, overlay, .. } => {
            assert_eq!(strategy, Strategy::DepthBuffer);
            assert!(!overlay);
        }
        other => panic!("unexpected command {:?}", other),
    }

    assert!(Cli::try_parse_from(["spotlight_shadows"]).is_err());
}
