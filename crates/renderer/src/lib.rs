//! Frame orchestration core for the ravewall visualizer.
//!
//! The crate glues the winit window host, the `wgpu` pipeline registry, and
//! the ping-pong feedback buffers together. The overall flow is:
//!
//! ```text
//!   CLI / ravewall
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ winit event loop ──▶ GpuState::render()
//!                                              │
//!                            scene rotation ◀──┤
//!                            feedback pass ────┤──▶ ping buffer
//!                            present pass ─────┘──▶ swapchain
//! ```
//!
//! `GpuState` owns all GPU resources (surface, device, scene pipelines, the
//! feedback texture pair, uniforms); `Renderer` is the thin entry point the
//! binary drives. Scene fragments come from the static manifest in
//! [`shaders`]; which one runs on a given frame is decided by the rotation
//! policy from the `scheduler` crate.

use std::time::Duration;

use anyhow::Result;
use vizconfig::RotationPolicy;

mod feedback;
mod gpu;
mod registry;
pub mod shaders;
mod window;

pub use registry::qualifying_names;
pub use shaders::{ProgramEntry, ProgramKind, ShaderLibrary};

/// Surface size used when neither the CLI nor the host supplies one.
pub const DEFAULT_SURFACE_SIZE: (u32, u32) = (1920, 1080);

/// Immutable configuration passed to the renderer at start-up.
///
/// Mirrors the CLI/config file surface: window size, rotation policy and
/// cadence, feedback buffer scale, and discovery prefixes.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Window or surface size in physical pixels.
    pub surface_size: (u32, u32),
    /// How long each scene stays active.
    pub switch_interval: Duration,
    /// Feedback buffers are `floor(surface * render_scale)` per axis.
    pub render_scale: f32,
    /// Optional redraw cadence cap; `None` renders every callback.
    pub target_fps: Option<f32>,
    /// Prefixes that qualify a library fragment as a rotating scene.
    pub scene_prefixes: Vec<String>,
    /// Scene-selection policy.
    pub policy: RotationPolicy,
    /// RGBA clear colour for freshly allocated feedback buffers.
    pub clear_color: [f64; 4],
    /// Seed for the occurrence-fair rotation RNG.
    pub seed: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: DEFAULT_SURFACE_SIZE,
            switch_interval: Duration::from_secs(15),
            render_scale: 0.7,
            target_fps: Some(120.0),
            scene_prefixes: vec!["scene_".into(), "feedback_".into()],
            policy: RotationPolicy::default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            seed: 0,
        }
    }
}

/// Entry point owned by the binary; wraps the window host.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn run(&mut self) -> Result<()> {
        tracing::info!(
            width = self.config.surface_size.0,
            height = self.config.surface_size.1,
            policy = %self.config.policy,
            interval_secs = self.config.switch_interval.as_secs_f32(),
            "starting renderer"
        );
        window::run_windowed(&self.config)
    }
}

/// Scene names the built-in library would rotate through for the given
/// prefixes, in registry order. Falls back to the known-good scene when the
/// filter matches nothing, so the result is never empty.
pub fn discovered_scene_names(prefixes: &[String]) -> Vec<String> {
    let names = registry::qualifying_names(&ShaderLibrary::builtin(), prefixes);
    if names.is_empty() {
        vec![shaders::FALLBACK_SCENE.to_string()]
    } else {
        names
    }
}
