//! Software rendering of the lit area into `0RGB` pixel buffers, plus the
//! debug overlay and PPM export.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use glam::Vec2;
use rayon::prelude::*;

use crate::occlusion::OcclusionQuery;
use crate::scene::{Point2D, Scene};
use crate::transform::{clip_to_canvas, light_to_clip};
use crate::visibility::classify_canvas;

/// Mid gray for lit pixels.
pub const LIT: u32 = 0x80_80_80;
pub const UNLIT: u32 = 0x00_00_00;
/// Wall lines in the overlay.
pub const WALL: u32 = 0xFF_FF_00;
/// Cone edges and light marker in the overlay.
pub const CONE: u32 = 0xFF_FF_FF;

const MARKER_RADIUS: i32 = 2;

/// Split a `0RGB` pixel into bytes.
#[inline]
pub fn to_rgb(pixel: u32) -> [u8; 3] {
    [(pixel >> 16) as u8, (pixel >> 8) as u8, pixel as u8]
}

/// Classify every pixel of a `width × height` canvas, one row per task.
pub fn render_visibility<Q>(query: &Q, width: usize, height: usize) -> Vec<u32>
where
    Q: OcclusionQuery + Sync + ?Sized,
{
    let mut buffer = vec![UNLIT; width * height];
    if width == 0 {
        return buffer;
    }
    let (w, h) = (width as f32, height as f32);

    buffer
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, pixel) in row.iter_mut().enumerate() {
                let visibility = classify_canvas(query, Vec2::new(x as f32, y as f32), w, h);
                *pixel = if visibility.is_lit() { LIT } else { UNLIT };
            }
        });

    buffer
}

fn put_pixel(buffer: &mut [u32], width: usize, height: usize, x: i32, y: i32, color: u32) {
    if x >= 0 && y >= 0 && (x as usize) < width && (y as usize) < height {
        buffer[y as usize * width + x as usize] = color;
    }
}

/// Liang-Barsky clip of a segment to the box `min..=max`.
fn clip_to_rect(a: Point2D, b: Point2D, min: Vec2, max: Vec2) -> Option<(Point2D, Point2D)> {
    if !a.is_finite() || !b.is_finite() {
        return None;
    }
    let d = b - a;
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    for (p, q) in [
        (-d.x, a.x - min.x),
        (d.x, max.x - a.x),
        (-d.y, a.y - min.y),
        (d.y, max.y - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let t = q / p;
            if p < 0.0 {
                t0 = t0.max(t);
            } else {
                t1 = t1.min(t);
            }
        }
    }
    (t0 <= t1).then(|| (a + d * t0, a + d * t1))
}

/// Bresenham line between two canvas points, clipped to the buffer.
pub fn draw_line(buffer: &mut [u32], width: usize, height: usize, from: Point2D, to: Point2D, color: u32) {
    let bounds = Vec2::new(width as f32, height as f32);
    let Some((from, to)) = clip_to_rect(from, to, Vec2::splat(-1.0), bounds) else {
        return;
    };

    let (mut x0, mut y0) = (from.x.round() as i32, from.y.round() as i32);
    let (x1, y1) = (to.x.round() as i32, to.y.round() as i32);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put_pixel(buffer, width, height, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_marker(buffer: &mut [u32], width: usize, height: usize, center: Point2D, color: u32) {
    let (cx, cy) = (center.x.round() as i32, center.y.round() as i32);
    for dy in -MARKER_RADIUS..=MARKER_RADIUS {
        for dx in -MARKER_RADIUS..=MARKER_RADIUS {
            if dx * dx + dy * dy <= MARKER_RADIUS * MARKER_RADIUS {
                put_pixel(buffer, width, height, cx + dx, cy + dy, color);
            }
        }
    }
}

/// Debug lines for a scene in clip space: walls, the cone edges out to
/// the max distance and the near plane.
pub fn overlay_lines(scene: &Scene) -> Vec<(Point2D, Point2D, u32)> {
    let spotlight = &scene.spotlight;
    let mut lines: Vec<_> = scene.walls.iter().map(|w| (w.start, w.end, WALL)).collect();

    let far_half = spotlight.max_distance * spotlight.tan_half_fov();
    let near_half = spotlight.right_extent();
    for side in [-1.0, 1.0] {
        let edge = light_to_clip(Vec2::new(side * far_half, spotlight.max_distance), spotlight);
        lines.push((spotlight.pos, edge, CONE));
    }
    lines.push((
        light_to_clip(Vec2::new(-near_half, spotlight.focal_length), spotlight),
        light_to_clip(Vec2::new(near_half, spotlight.focal_length), spotlight),
        CONE,
    ));
    lines
}

/// Draw [`overlay_lines`] and a marker at the light.
pub fn draw_debug_overlay(buffer: &mut [u32], width: usize, height: usize, scene: &Scene) {
    let (w, h) = (width as f32, height as f32);
    for (from, to, color) in overlay_lines(scene) {
        draw_line(buffer, width, height, clip_to_canvas(from, w, h), clip_to_canvas(to, w, h), color);
    }
    draw_marker(buffer, width, height, clip_to_canvas(scene.spotlight.pos, w, h), CONE);
}

/// Save a `0RGB` buffer as a plain-text PPM.
pub fn save_ppm(buffer: &[u32], width: usize, height: usize, path: &Path) -> io::Result<()> {
    if buffer.len() != width * height {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("buffer has {} pixels, expected {}x{}", buffer.len(), width, height),
        ));
    }

    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "P3")?;
    writeln!(file, "{} {}", width, height)?;
    writeln!(file, "255")?;

    for row in buffer.chunks(width.max(1)) {
        for &pixel in row {
            let [r, g, b] = to_rgb(pixel);
            write!(file, "{} {} {} ", r, g, b)?;
        }
        writeln!(file)?;
    }
    file.flush()
}
