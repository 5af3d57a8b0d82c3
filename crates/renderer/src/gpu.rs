use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use bytemuck::{Pod, Zeroable};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use scheduler::SceneRotation;
use winit::dpi::PhysicalSize;

use crate::feedback::FeedbackTargets;
use crate::feedback::PingPong;
use crate::registry::PipelineRegistry;
use crate::shaders::ShaderLibrary;
use crate::RendererConfig;

/// Per-frame parameters handed to both shader stages.
///
/// The band intensities are wired for an audio analyser that is not part of
/// this core and stay zero; `fade` is reserved and always written as 1. The
/// layout must match the `SceneParams` struct in the WGSL prelude.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub(crate) struct SceneUniforms {
    time: f32,
    _pad0: f32,
    resolution: [f32; 2],
    bass: f32,
    mid: f32,
    high: f32,
    fade: f32,
}

impl SceneUniforms {
    fn new(time: f32, size: PhysicalSize<u32>) -> Self {
        Self {
            time,
            _pad0: 0.0,
            resolution: [size.width as f32, size.height as f32],
            bass: 0.0,
            mid: 0.0,
            high: 0.0,
            fade: 1.0,
        }
    }
}

/// Owns every GPU resource and drives the two render passes per frame.
pub(crate) struct GpuState {
    _instance: wgpu::Instance,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    feedback_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    registry: PipelineRegistry,
    feedback: FeedbackTargets,
    ping_pong: PingPong,
    rotation: SceneRotation,
    start_time: Instant,
    last_logged_scene: Option<usize>,
}

impl GpuState {
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        options: &RendererConfig,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = wgpu::Instance::default();
        let window_handle = target
            .window_handle()
            .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .context("failed to create rendering surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let limits = adapter.limits();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("ravewall device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        let size = PhysicalSize::new(initial_size.width.max(1), initial_size.height.max(1));
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 1,
        };
        surface.configure(&device, &config);

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene uniforms"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let feedback_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("feedback texture layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let scene_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &feedback_layout],
            push_constant_ranges: &[],
        });
        let present_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("present pipeline layout"),
            bind_group_layouts: &[&feedback_layout],
            push_constant_ranges: &[],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene uniform bind group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("feedback sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let library = ShaderLibrary::builtin();
        let registry = PipelineRegistry::discover(
            &device,
            &library,
            &options.scene_prefixes,
            &scene_layout,
            &present_layout,
            surface_format,
        )
        .context("failed to build scene pipelines")?;

        let rotation = SceneRotation::new(
            options.policy,
            registry.scene_count(),
            options.switch_interval,
            options.seed,
        )
        .context("failed to initialise scene rotation")?;

        let clear_color = wgpu::Color {
            r: options.clear_color[0],
            g: options.clear_color[1],
            b: options.clear_color[2],
            a: options.clear_color[3],
        };
        let feedback = FeedbackTargets::new(options.render_scale, clear_color);

        let initial_scene = rotation.active_index();
        tracing::info!(
            scene = registry.scene_name(initial_scene),
            policy = %options.policy,
            "starting scene rotation"
        );

        Ok(Self {
            _instance: instance,
            surface,
            device,
            queue,
            config,
            size,
            uniform_buffer,
            uniform_bind_group,
            feedback_layout,
            sampler,
            registry,
            feedback,
            ping_pong: PingPong::new(),
            rotation,
            start_time: Instant::now(),
            last_logged_scene: Some(initial_scene),
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// Reconfigures the swapchain and funnels the feedback pair through the
    /// idempotent `ensure` so both textures always share one size.
    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.feedback.ensure(
            &self.device,
            &self.queue,
            &self.feedback_layout,
            &self.sampler,
            self.config.format,
            new_size,
        );
    }

    /// Renders one frame: feedback pass into the "next" buffer reading the
    /// "previous" one, then a present pass onto the swapchain, then the role
    /// flip. A missing frame target aborts the frame without side effects.
    pub(crate) fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let elapsed = self.start_time.elapsed().as_secs_f32();

        if let Some(switch) = self.rotation.advance(elapsed) {
            if self.last_logged_scene != Some(switch.to) {
                tracing::info!(
                    scene = self.registry.scene_name(switch.to),
                    at_secs = switch.at_secs,
                    "switched scene"
                );
                self.last_logged_scene = Some(switch.to);
            }
        }
        let scene_index = self.rotation.active_index();

        // Speculative; a no-op unless the surface changed size since last frame.
        self.feedback.ensure(
            &self.device,
            &self.queue,
            &self.feedback_layout,
            &self.sampler,
            self.config.format,
            self.size,
        );
        let Some(pair) = self.feedback.pair() else {
            return Ok(());
        };

        let uniforms = SceneUniforms::new(elapsed, self.size);
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let frame = self.surface.get_current_texture()?;
        let frame_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });

        let (prev, next) = self.ping_pong.roles();

        {
            // LoadOp::Load keeps the target's prior contents; that carry-over
            // is what produces the feedback trails.
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("feedback pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: pair.view(next),
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.registry.scene(scene_index).pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_bind_group(1, pair.bind_group(prev), &[]);
            pass.draw(0..3, 0..1);
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("present pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(self.registry.present());
            pass.set_bind_group(0, pair.bind_group(next), &[]);
            pass.draw(0..3, 0..1);
        }

        self.ping_pong.flip();
        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}
