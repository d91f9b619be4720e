//! Frame orchestration for the GPU strategy.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use super::context::GpuContext;
use super::pipelines::RenderingPass;
use super::shadow_map::ShadowMapPass;
use super::uniforms::overlay_vertices;
use crate::occlusion::DepthMap;
use crate::scene::Scene;

/// GPU frame times, reported when the queue finishes each submission.
pub struct FrameTimer {
    sender: Sender<Duration>,
    receiver: Receiver<Duration>,
    latest: Option<Duration>,
}

impl FrameTimer {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            latest: None,
        }
    }

    fn submitted(&self, queue: &wgpu::Queue, started: Instant) {
        let sender = self.sender.clone();
        queue.on_submitted_work_done(move || {
            let _ = sender.send(started.elapsed());
        });
    }

    /// Most recent completed frame time, if any.
    pub fn latest(&mut self) -> Option<Duration> {
        while let Ok(elapsed) = self.receiver.try_recv() {
            self.latest = Some(elapsed);
        }
        self.latest
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Shadow-map pass, rendering pass and the scene they were last synced to.
pub struct SpotlightRenderer {
    shadow_map: ShadowMapPass,
    rendering: RenderingPass,
    timer: FrameTimer,
    synced: Option<Arc<Scene>>,
    readback: bool,
    depth_map: Option<DepthMap>,
}

impl SpotlightRenderer {
    pub fn new(ctx: &GpuContext, lightmap_width: u32, readback: bool) -> Self {
        let shadow_map = ShadowMapPass::new(ctx, lightmap_width);
        let rendering = RenderingPass::new(ctx, &shadow_map);
        log::info!(
            "GPU shadow map: {} columns, readback {}",
            shadow_map.width(),
            if readback { "on" } else { "off" }
        );
        Self {
            shadow_map,
            rendering,
            timer: FrameTimer::new(),
            synced: None,
            readback,
            depth_map: None,
        }
    }

    /// Upload whatever changed since the last synced snapshot.
    pub fn sync(&mut self, ctx: &GpuContext, scene: &Arc<Scene>) {
        if self.synced.as_ref().is_some_and(|s| Arc::ptr_eq(s, scene)) {
            return;
        }
        let previous = self.synced.as_deref();

        if previous.is_none_or(|s| s.spotlight != scene.spotlight) {
            self.shadow_map.update_spotlight(ctx, &scene.spotlight);
        }
        if previous.is_none_or(|s| s.walls != scene.walls) {
            self.shadow_map.update_walls(ctx, &scene.walls);
        }
        if previous.is_none_or(|s| !s.same_geometry(scene)) {
            self.rendering.update_overlay(ctx, &overlay_vertices(scene));
        }
        self.synced = Some(Arc::clone(scene));
    }

    pub fn render(&mut self, ctx: &GpuContext) -> Result<(), wgpu::SurfaceError> {
        let output = ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let started = Instant::now();
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Spotlight Encoder"),
            });

        self.shadow_map.encode(&mut encoder);
        if self.readback {
            if let Some(scene) = &self.synced {
                self.shadow_map
                    .encode_readback(ctx, &mut encoder, &scene.spotlight);
            }
        }
        self.rendering.encode(&mut encoder, &view);

        ctx.queue.submit(std::iter::once(encoder.finish()));
        self.timer.submitted(&ctx.queue, started);
        if self.readback {
            self.shadow_map.begin_readback();
        }
        output.present();

        if let Some(map) = self.shadow_map.poll_readback(ctx) {
            self.depth_map = Some(map);
        }
        Ok(())
    }

    pub fn frame_time(&mut self) -> Option<Duration> {
        self.timer.latest()
    }

    /// The newest shadow map read back from the GPU.
    pub fn depth_map(&self) -> Option<&DepthMap> {
        self.depth_map.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_timer_keeps_latest() {
        let mut timer = FrameTimer::new();
        assert_eq!(timer.latest(), None);

        timer.sender.send(Duration::from_millis(5)).unwrap();
        timer.sender.send(Duration::from_millis(3)).unwrap();
        assert_eq!(timer.latest(), Some(Duration::from_millis(3)));
        // Nothing new: keep reporting the last value
        assert_eq!(timer.latest(), Some(Duration::from_millis(3)));
    }
}
