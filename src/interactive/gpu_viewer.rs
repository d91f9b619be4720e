//! GPU spotlight viewer using wgpu + winit

use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec2;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use super::{CONTROLS, ViewerConfig, ViewerError, WallDrag, parameter_for, title};
use crate::frame::{FrameState, MotionIntent, adjust, integrate_motion};
use crate::gpu::{GpuContext, SpotlightRenderer};
use crate::occlusion::Strategy;
use crate::transform::canvas_to_clip;
use crate::visibility::probe;

/// How often the window title is refreshed.
const TITLE_INTERVAL: Duration = Duration::from_millis(250);

fn parameter_symbol(key: KeyCode) -> Option<char> {
    match key {
        KeyCode::KeyZ => Some('z'),
        KeyCode::KeyX => Some('x'),
        KeyCode::BracketLeft => Some('['),
        KeyCode::BracketRight => Some(']'),
        KeyCode::Minus | KeyCode::NumpadSubtract => Some('-'),
        KeyCode::Equal | KeyCode::NumpadAdd => Some('='),
        KeyCode::Comma => Some(','),
        KeyCode::Period => Some('.'),
        _ => None,
    }
}

/// GPU viewer state, created once the window exists
struct ViewerState {
    gpu_ctx: GpuContext,
    renderer: SpotlightRenderer,
    frame: FrameState,
    drag: WallDrag,
    intent: MotionIntent,
    mouse_pos: Option<(f32, f32)>,
    left_mouse_down: bool,
    last_frame: Instant,
    last_title: Instant,
}

impl ViewerState {
    fn new(window: Arc<Window>, config: &ViewerConfig) -> Result<Self, ViewerError> {
        let gpu_ctx = GpuContext::new(window)?;
        let renderer = SpotlightRenderer::new(&gpu_ctx, config.lightmap_width as u32, config.readback);
        // Cursor diagnostics must agree with the shadow map on screen
        let frame = FrameState::new(
            config.scene.clone(),
            Strategy::DepthBuffer,
            config.lightmap_width,
        );

        Ok(Self {
            gpu_ctx,
            renderer,
            frame,
            drag: WallDrag::default(),
            intent: MotionIntent::default(),
            mouse_pos: None,
            left_mouse_down: false,
            last_frame: Instant::now(),
            last_title: Instant::now(),
        })
    }

    fn set_intent(&mut self, key: KeyCode, held: bool) {
        let intent = &mut self.intent;
        match key {
            KeyCode::KeyW => intent.up = held,
            KeyCode::KeyS => intent.down = held,
            KeyCode::KeyA => intent.left = held,
            KeyCode::KeyD => intent.right = held,
            KeyCode::KeyQ => intent.turn_left = held,
            KeyCode::KeyE => intent.turn_right = held,
            _ => {}
        }
    }

    fn nudge(&mut self, key: KeyCode) {
        let Some((parameter, steps)) = parameter_symbol(key).and_then(parameter_for) else {
            return;
        };
        self.frame.update(|scene| {
            let spotlight = adjust(&scene.spotlight, parameter, steps);
            log::info!("{:?} -> {:?}", parameter, spotlight);
            scene.with_spotlight(spotlight)
        });
    }

    fn cursor(&self) -> Option<Vec2> {
        let (w, h) = self.gpu_ctx.size;
        self.mouse_pos
            .map(|(x, y)| canvas_to_clip(Vec2::new(x, y), w as f32, h as f32))
    }

    fn update_and_render(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32();
        self.last_frame = now;

        let (intent, cursor, pressed) = (self.intent, self.cursor(), self.left_mouse_down);
        let drag = &mut self.drag;
        self.frame.update(|scene| {
            let spotlight = integrate_motion(&scene.spotlight, intent, dt);
            drag.apply(&scene.with_spotlight(spotlight), cursor, pressed)
        });

        let scene = Arc::clone(self.frame.scene());
        self.renderer.sync(&self.gpu_ctx, &scene);

        match self.renderer.render(&self.gpu_ctx) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost, reconfiguring");
                self.gpu_ctx.reconfigure();
            }
            Err(e) => log::error!("Render error: {:?}", e),
        }

        if now - self.last_title >= TITLE_INTERVAL {
            self.last_title = now;
            let query = self.frame.query();
            let cursor_probe = scene.cursor.map(|p| probe(p, query.as_ref()));
            let extra = match self.renderer.depth_map() {
                Some(map) => format!("shadow map {}/{} columns", map.coverage(), map.width()),
                None => String::new(),
            };
            let frame_time = self.renderer.frame_time();
            self.gpu_ctx
                .window()
                .set_title(&title(cursor_probe.as_ref(), frame_time, &extra));
        }
    }
}

/// Application handler for winit event loop
struct GpuViewerApp {
    config: ViewerConfig,
    state: Option<ViewerState>,
    error: Option<ViewerError>,
}

impl GpuViewerApp {
    fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            state: None,
            error: None,
        }
    }

    fn create_state(&self, event_loop: &ActiveEventLoop) -> Result<ViewerState, ViewerError> {
        let window_attrs = Window::default_attributes()
            .with_title("Spotlight Shadows - GPU (ESC to exit)")
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.width as u32,
                self.config.height as u32,
            ));
        let window = Arc::new(event_loop.create_window(window_attrs)?);
        ViewerState::new(window, &self.config)
    }
}

impl ApplicationHandler for GpuViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match self.create_state(event_loop) {
            Ok(state) => {
                println!("=== GPU Spotlight Viewer ===");
                println!("{}", CONTROLS);
                println!();

                self.state = Some(state);
            }
            Err(e) => {
                log::error!("Failed to create viewer state: {}", e);
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let state = match &mut self.state {
            Some(s) => s,
            None => return,
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                state.gpu_ctx.resize((size.width, size.height));
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        ..
                    },
                ..
            } => {
                let pressed = key_state == ElementState::Pressed;
                if key == KeyCode::Escape && pressed {
                    event_loop.exit();
                    return;
                }
                state.set_intent(key, pressed);
                if pressed {
                    state.nudge(key);
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                state.mouse_pos = Some((position.x as f32, position.y as f32));
            }

            WindowEvent::CursorLeft { .. } => {
                state.mouse_pos = None;
            }

            WindowEvent::MouseInput {
                state: button_state,
                button: MouseButton::Left,
                ..
            } => {
                state.left_mouse_down = button_state == ElementState::Pressed;
            }

            WindowEvent::RedrawRequested => {
                state.update_and_render();
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            // Request continuous redraw for smooth updates
            state.gpu_ctx.request_redraw();
        }
    }
}

/// Run the GPU viewer until the window closes
pub fn run_gpu_viewer(config: ViewerConfig) -> Result<(), ViewerError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuViewerApp::new(config);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
