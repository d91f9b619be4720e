//! CPU spotlight viewer - mouse draws walls, keys drive the light

use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec2;
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use super::{CONTROLS, ViewerConfig, ViewerError, WallDrag, parameter_for, title};
use crate::frame::{FrameState, MotionIntent, adjust, integrate_motion};
use crate::render::{draw_debug_overlay, render_visibility};
use crate::transform::canvas_to_clip;
use crate::visibility::probe;

const PARAMETER_KEYS: [(Key, char); 8] = [
    (Key::Z, 'z'),
    (Key::X, 'x'),
    (Key::LeftBracket, '['),
    (Key::RightBracket, ']'),
    (Key::Minus, '-'),
    (Key::Equal, '='),
    (Key::Comma, ','),
    (Key::Period, '.'),
];

/// Interactive viewer for the CPU strategies
pub struct InteractiveViewer {
    config: ViewerConfig,
    frame: FrameState,
    drag: WallDrag,
    window: Window,
    buffer: Vec<u32>,
    // Classified pixels, kept until the geometry changes
    lit: Vec<u32>,
    frame_time: Option<Duration>,
}

impl InteractiveViewer {
    pub fn new(config: ViewerConfig) -> Result<Self, ViewerError> {
        let (width, height) = (config.width, config.height);
        let window = Window::new(
            "Spotlight Shadows (ESC to exit)",
            width,
            height,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;

        let frame = FrameState::new(config.scene.clone(), config.strategy, config.lightmap_width);

        Ok(Self {
            config,
            frame,
            drag: WallDrag::default(),
            window,
            buffer: vec![0u32; width * height],
            lit: Vec::new(),
            frame_time: None,
        })
    }

    pub fn run(&mut self) -> Result<(), ViewerError> {
        self.window.set_target_fps(60);

        println!("=== Spotlight Viewer ({:?}) ===", self.config.strategy);
        println!("{}", CONTROLS);
        println!();

        let mut last = Instant::now();
        while self.window.is_open() && !self.window.is_key_down(Key::Escape) {
            let now = Instant::now();
            let dt = (now - last).as_secs_f32();
            last = now;

            self.handle_input(dt);
            self.render();

            self.window
                .update_with_buffer(&self.buffer, self.config.width, self.config.height)?;
        }

        Ok(())
    }

    fn intent(&self) -> MotionIntent {
        let down = |key| self.window.is_key_down(key);
        MotionIntent {
            up: down(Key::W),
            down: down(Key::S),
            left: down(Key::A),
            right: down(Key::D),
            turn_left: down(Key::Q),
            turn_right: down(Key::E),
        }
    }

    fn handle_input(&mut self, dt: f32) {
        let intent = self.intent();
        let mut spotlight = integrate_motion(&self.frame.scene().spotlight, intent, dt);

        for (key, symbol) in PARAMETER_KEYS {
            if self.window.is_key_pressed(key, KeyRepeat::Yes) {
                if let Some((parameter, steps)) = parameter_for(symbol) {
                    spotlight = adjust(&spotlight, parameter, steps);
                    log::info!("{:?} -> {:?}", parameter, spotlight);
                }
            }
        }

        let (w, h) = (self.config.width as f32, self.config.height as f32);
        let cursor = self
            .window
            .get_mouse_pos(MouseMode::Discard)
            .map(|(x, y)| canvas_to_clip(Vec2::new(x, y), w, h));
        let pressed = self.window.get_mouse_down(MouseButton::Left);

        let drag = &mut self.drag;
        self.frame
            .update(|scene| drag.apply(&scene.with_spotlight(spotlight), cursor, pressed));
    }

    fn render(&mut self) {
        let started = Instant::now();
        let (width, height) = (self.config.width, self.config.height);
        let stale = self.frame.is_stale() || self.lit.is_empty();
        let query = self.frame.query();

        if stale {
            self.lit = render_visibility(query.as_ref(), width, height);
            self.frame_time = Some(started.elapsed());
        }

        self.buffer.copy_from_slice(&self.lit);
        let scene = Arc::clone(self.frame.scene());
        draw_debug_overlay(&mut self.buffer, width, height, &scene);

        let cursor_probe = scene.cursor.map(|p| probe(p, query.as_ref()));
        let extra = if self.drag.is_active() { "drawing" } else { "" };
        self.window
            .set_title(&title(cursor_probe.as_ref(), self.frame_time, extra));
    }
}
