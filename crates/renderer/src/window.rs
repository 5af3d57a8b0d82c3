use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use crate::gpu::GpuState;
use crate::RendererConfig;

/// Caps redraw cadence to the configured FPS; uncapped renders every tick.
pub(crate) struct FramePacer {
    min_frame_time: Option<Duration>,
    next_frame: Instant,
}

impl FramePacer {
    pub(crate) fn new(target_fps: Option<f32>) -> Self {
        let min_frame_time = target_fps
            .filter(|fps| *fps > 0.0)
            .map(|fps| Duration::from_secs_f32(1.0 / fps));
        Self {
            min_frame_time,
            next_frame: Instant::now(),
        }
    }

    pub(crate) fn ready_for_frame(&self, now: Instant) -> bool {
        match self.min_frame_time {
            Some(_) => now >= self.next_frame,
            None => true,
        }
    }

    pub(crate) fn mark_rendered(&mut self, now: Instant) {
        if let Some(step) = self.min_frame_time {
            // Step from the previous deadline to keep cadence steady, but
            // never schedule into the past after a stall.
            let candidate = self.next_frame + step;
            self.next_frame = if candidate > now { candidate } else { now + step };
        }
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.min_frame_time.map(|_| self.next_frame)
    }
}

/// Runs the single-threaded event loop that owns the display surface and
/// invokes the renderer once per redraw.
pub(crate) fn run_windowed(config: &RendererConfig) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title("ravewall")
        .with_inner_size(window_size)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let mut gpu = GpuState::new(window.as_ref(), window.inner_size(), config)
        .context("failed to initialise renderer")?;
    let mut pacer = FramePacer::new(config.target_fps);

    let loop_window = window.clone();
    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { window_id, event } if window_id == loop_window.id() => {
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
                    WindowEvent::Resized(new_size) => gpu.resize(new_size),
                    WindowEvent::RedrawRequested => match gpu.render() {
                        Ok(()) => pacer.mark_rendered(Instant::now()),
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            gpu.resize(gpu.size());
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            tracing::error!("surface out of memory; shutting down");
                            elwt.exit();
                        }
                        // Expected under resize/backgrounding; the next tick
                        // simply tries again.
                        Err(err) => tracing::trace!(?err, "frame skipped"),
                    },
                    _ => {}
                }
            }
            Event::AboutToWait => {
                let now = Instant::now();
                if pacer.ready_for_frame(now) {
                    loop_window.request_redraw();
                    elwt.set_control_flow(ControlFlow::Wait);
                } else if let Some(deadline) = pacer.next_deadline() {
                    elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
                } else {
                    elwt.set_control_flow(ControlFlow::Wait);
                }
            }
            _ => {}
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncapped_pacer_is_always_ready() {
        let pacer = FramePacer::new(None);
        assert!(pacer.ready_for_frame(Instant::now()));
        assert_eq!(pacer.next_deadline(), None);

        let pacer = FramePacer::new(Some(0.0));
        assert!(pacer.ready_for_frame(Instant::now()));
    }

    #[test]
    fn capped_pacer_spaces_frames() {
        let mut pacer = FramePacer::new(Some(100.0));
        let start = Instant::now();
        assert!(pacer.ready_for_frame(start));
        pacer.mark_rendered(start);
        assert!(!pacer.ready_for_frame(start));
        assert!(pacer.ready_for_frame(start + Duration::from_millis(11)));
    }

    #[test]
    fn pacer_recovers_after_stall() {
        let mut pacer = FramePacer::new(Some(60.0));
        let start = Instant::now();
        pacer.mark_rendered(start);
        let stalled = start + Duration::from_secs(5);
        pacer.mark_rendered(stalled);
        let deadline = pacer.next_deadline().unwrap();
        assert!(deadline > stalled);
        assert!(deadline <= stalled + Duration::from_secs_f32(1.0 / 60.0));
    }
}
