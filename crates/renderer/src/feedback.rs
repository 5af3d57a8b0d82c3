use winit::dpi::PhysicalSize;

/// Which of the two feedback textures a role refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    A,
    B,
}

/// Role assignment for the texture pair; flips once per rendered frame.
///
/// Exactly one slot is "previous" (sampled) and the other is "next" (render
/// target) at any instant, so a texture is never read and written in the same
/// pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PingPong {
    use_a_as_prev: bool,
}

impl PingPong {
    pub(crate) fn new() -> Self {
        Self { use_a_as_prev: true }
    }

    /// `(previous, next)` for the current frame.
    pub(crate) fn roles(&self) -> (Slot, Slot) {
        if self.use_a_as_prev {
            (Slot::A, Slot::B)
        } else {
            (Slot::B, Slot::A)
        }
    }

    pub(crate) fn flip(&mut self) {
        self.use_a_as_prev = !self.use_a_as_prev;
    }
}

/// Offscreen dimensions for a given surface size and render scale, floored
/// with a 1x1 minimum per axis.
pub(crate) fn scaled_extent(size: PhysicalSize<u32>, scale: f32) -> (u32, u32) {
    let width = ((size.width as f32 * scale).floor() as u32).max(1);
    let height = ((size.height as f32 * scale).floor() as u32).max(1);
    (width, height)
}

struct FeedbackBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
}

pub(crate) struct TargetPair {
    a: FeedbackBuffer,
    b: FeedbackBuffer,
}

impl TargetPair {
    pub(crate) fn view(&self, slot: Slot) -> &wgpu::TextureView {
        match slot {
            Slot::A => &self.a.view,
            Slot::B => &self.b.view,
        }
    }

    pub(crate) fn bind_group(&self, slot: Slot) -> &wgpu::BindGroup {
        match slot {
            Slot::A => &self.a.bind_group,
            Slot::B => &self.b.bind_group,
        }
    }
}

/// Size-keyed allocation bookkeeping, separated from the GPU resources so
/// the idempotence rule is testable on its own.
///
/// `generation` increments only when a reallocation is recorded, so the
/// counter doubles as a cheap observable for "how many times did the pair
/// actually get rebuilt".
#[derive(Debug, Clone, Copy)]
pub(crate) struct AllocationTracker {
    last_size: PhysicalSize<u32>,
    allocated: bool,
    generation: u64,
}

impl AllocationTracker {
    pub(crate) fn new() -> Self {
        Self {
            last_size: PhysicalSize::new(0, 0),
            allocated: false,
            generation: 0,
        }
    }

    /// True when a call for `surface_size` must rebuild the texture pair:
    /// either nothing is allocated yet or the size changed.
    pub(crate) fn needs_realloc(&self, surface_size: PhysicalSize<u32>) -> bool {
        !self.allocated || self.last_size != surface_size
    }

    pub(crate) fn mark_allocated(&mut self, surface_size: PhysicalSize<u32>) {
        self.last_size = surface_size;
        self.allocated = true;
        self.generation += 1;
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

/// Owns the two low-resolution feedback textures and reallocates them when
/// the output surface changes size.
pub(crate) struct FeedbackTargets {
    scale: f32,
    clear_color: wgpu::Color,
    tracker: AllocationTracker,
    pair: Option<TargetPair>,
}

impl FeedbackTargets {
    pub(crate) fn new(scale: f32, clear_color: wgpu::Color) -> Self {
        Self {
            scale,
            clear_color,
            tracker: AllocationTracker::new(),
            pair: None,
        }
    }

    pub(crate) fn pair(&self) -> Option<&TargetPair> {
        self.pair.as_ref()
    }

    /// Idempotent (re)allocation keyed on the surface size.
    ///
    /// Safe to call both from the resize notification and speculatively at
    /// the start of every frame; the size check makes the double call free.
    /// Fresh textures are cleared immediately so stale memory never shows up
    /// as the first visible frame.
    pub(crate) fn ensure(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        format: wgpu::TextureFormat,
        surface_size: PhysicalSize<u32>,
    ) {
        if !self.tracker.needs_realloc(surface_size) {
            return;
        }
        self.tracker.mark_allocated(surface_size);

        let (width, height) = scaled_extent(surface_size, self.scale);
        tracing::debug!(width, height, "allocating feedback texture pair");

        let a = create_buffer(device, layout, sampler, format, width, height, "feedback A");
        let b = create_buffer(device, layout, sampler, format, width, height, "feedback B");

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("feedback clear encoder"),
        });
        clear_pass(&mut encoder, &a.view, self.clear_color);
        clear_pass(&mut encoder, &b.view, self.clear_color);
        queue.submit(std::iter::once(encoder.finish()));

        self.pair = Some(TargetPair { a, b });
    }
}

fn create_buffer(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    label: &str,
) -> FeedbackBuffer {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    FeedbackBuffer {
        _texture: texture,
        view,
        bind_group,
    }
}

fn clear_pass(encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView, color: wgpu::Color) {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("feedback clear"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(color),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        occlusion_query_set: None,
        timestamp_writes: None,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_alternate_strictly() {
        let mut ping_pong = PingPong::new();
        let mut last_prev = None;
        for _ in 0..32 {
            let (prev, next) = ping_pong.roles();
            assert_ne!(prev, next, "a slot can never hold both roles");
            if let Some(last) = last_prev {
                assert_ne!(prev, last, "previous role must alternate every frame");
            }
            last_prev = Some(prev);
            ping_pong.flip();
        }
    }

    #[test]
    fn extent_floors_at_render_scale() {
        let size = PhysicalSize::new(1920, 1080);
        assert_eq!(scaled_extent(size, 0.7), (1344, 756));
    }

    #[test]
    fn extent_never_collapses_below_one_pixel() {
        assert_eq!(scaled_extent(PhysicalSize::new(1, 1), 0.7), (1, 1));
        assert_eq!(scaled_extent(PhysicalSize::new(0, 0), 0.7), (1, 1));
    }

    #[test]
    fn odd_sizes_floor_toward_zero() {
        // floor(1365 * 0.7) = floor(955.5) = 955
        assert_eq!(scaled_extent(PhysicalSize::new(1365, 767), 0.7), (955, 536));
    }

    #[test]
    fn repeated_same_size_calls_allocate_once() {
        let mut tracker = AllocationTracker::new();
        let size = PhysicalSize::new(1920, 1080);

        assert!(tracker.needs_realloc(size), "nothing allocated yet");
        tracker.mark_allocated(size);
        assert_eq!(tracker.generation(), 1);

        // Per-frame speculative calls at an unchanged size are free.
        for _ in 0..16 {
            assert!(!tracker.needs_realloc(size));
        }
        assert_eq!(tracker.generation(), 1);
    }

    #[test]
    fn size_change_triggers_exactly_one_reallocation() {
        let mut tracker = AllocationTracker::new();
        tracker.mark_allocated(PhysicalSize::new(1920, 1080));

        let resized = PhysicalSize::new(1280, 720);
        assert!(tracker.needs_realloc(resized));
        tracker.mark_allocated(resized);
        assert_eq!(tracker.generation(), 2);
        assert!(!tracker.needs_realloc(resized));

        // Going back to a previously seen size still counts as a change.
        let original = PhysicalSize::new(1920, 1080);
        assert!(tracker.needs_realloc(original));
    }
}
