//! Built-in WGSL program manifest.
//!
//! The renderer never inspects shader names at runtime the way a reflection
//! API would; instead every program is registered here with an explicit name
//! and stage, and the registry filters this manifest. Scene fragments share a
//! common prelude (uniform block plus the previous-frame texture bindings)
//! that is prepended before compilation, in the same spirit as wrapping a
//! downloaded shader with a fixed header.

/// Stage a library program was authored for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramKind {
    Vertex,
    Fragment,
}

/// One named WGSL program in the manifest.
#[derive(Debug, Clone, Copy)]
pub struct ProgramEntry {
    pub name: &'static str,
    pub kind: ProgramKind,
    pub source: &'static str,
}

/// Ordered collection of shader programs available to the registry.
#[derive(Debug, Clone)]
pub struct ShaderLibrary {
    entries: Vec<ProgramEntry>,
}

/// Name of the shared full-screen triangle vertex program.
pub const FULLSCREEN_VERTEX: &str = "fullscreen_vs";
/// Name of the fixed presentation fragment program (never rotates).
pub const PRESENT_FRAGMENT: &str = "present_fs";
/// Known-good scene used when prefix discovery matches nothing.
pub const FALLBACK_SCENE: &str = "feedback_trails";

impl ShaderLibrary {
    /// The manifest shipped with the binary.
    pub fn builtin() -> Self {
        Self {
            entries: vec![
                ProgramEntry {
                    name: FULLSCREEN_VERTEX,
                    kind: ProgramKind::Vertex,
                    source: FULLSCREEN_VERTEX_WGSL,
                },
                ProgramEntry {
                    name: PRESENT_FRAGMENT,
                    kind: ProgramKind::Fragment,
                    source: PRESENT_FRAGMENT_WGSL,
                },
                ProgramEntry {
                    name: FALLBACK_SCENE,
                    kind: ProgramKind::Fragment,
                    source: FEEDBACK_TRAILS_WGSL,
                },
                ProgramEntry {
                    name: "scene_plasma",
                    kind: ProgramKind::Fragment,
                    source: SCENE_PLASMA_WGSL,
                },
                ProgramEntry {
                    name: "scene_rings",
                    kind: ProgramKind::Fragment,
                    source: SCENE_RINGS_WGSL,
                },
                ProgramEntry {
                    name: "scene_lattice",
                    kind: ProgramKind::Fragment,
                    source: SCENE_LATTICE_WGSL,
                },
            ],
        }
    }

    /// Builds a library from arbitrary entries; used to inject fakes in tests.
    pub fn from_entries(entries: Vec<ProgramEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ProgramEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&ProgramEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }
}

/// Prepends the shared scene prelude so a fragment body compiles standalone.
pub(crate) fn compose_scene_fragment(body: &str) -> String {
    format!("{SCENE_PRELUDE_WGSL}\n{body}")
}

/// Uniform block and previous-frame bindings shared by every scene fragment.
///
/// The struct layout must match `SceneUniforms` in `gpu.rs`.
const SCENE_PRELUDE_WGSL: &str = r"struct SceneParams {
    time: f32,
    _pad0: f32,
    resolution: vec2<f32>,
    bass: f32,
    mid: f32,
    high: f32,
    fade: f32,
};

@group(0) @binding(0) var<uniform> params: SceneParams;
@group(1) @binding(0) var prev_frame: texture_2d<f32>;
@group(1) @binding(1) var prev_sampler: sampler;
";

/// Full-screen triangle; no vertex buffers, three vertices cover the clip box.
const FULLSCREEN_VERTEX_WGSL: &str = r"struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -3.0),
        vec2<f32>(3.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    let pos = positions[index];
    var out: VertexOutput;
    out.position = vec4<f32>(pos, 0.0, 1.0);
    out.uv = pos * 0.5 + vec2<f32>(0.5, 0.5);
    return out;
}
";

/// Upscales the low-resolution feedback buffer onto the swapchain.
const PRESENT_FRAGMENT_WGSL: &str = r"@group(0) @binding(0) var src_frame: texture_2d<f32>;
@group(0) @binding(1) var src_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(src_frame, src_sampler, vec2<f32>(uv.x, 1.0 - uv.y));
}
";

const FEEDBACK_TRAILS_WGSL: &str = r"@fragment
fn fs_main(@builtin(position) frag_coord: vec4<f32>, @location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let tex = vec2<f32>(uv.x, 1.0 - uv.y);
    let center = vec2<f32>(0.5, 0.5);
    let zoomed = center + (tex - center) * 0.985;
    let history = textureSample(prev_frame, prev_sampler, zoomed).rgb * 0.97;

    let t = params.time;
    let orbit = center + 0.35 * vec2<f32>(cos(t * 0.9), sin(t * 1.3));
    let glow = vec3<f32>(0.9, 0.4, 1.0) * smoothstep(0.05, 0.0, distance(tex, orbit));

    return vec4<f32>(max(history, glow) * params.fade, 1.0);
}
";

const SCENE_PLASMA_WGSL: &str = r"@fragment
fn fs_main(@builtin(position) frag_coord: vec4<f32>, @location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let res = max(params.resolution, vec2<f32>(1.0, 1.0));
    let p = (frag_coord.xy * 2.0 - res) / min(res.x, res.y);
    let t = params.time;

    var v = sin(p.x * 5.0 + t);
    v = v + sin((p.y + t) * 4.0);
    v = v + sin((p.x + p.y) * 3.0 + t * 0.5);
    v = v + sin(length(p) * 6.0 - t) + params.bass;

    let color = vec3<f32>(
        0.5 + 0.5 * sin(v * 3.14159),
        0.5 + 0.5 * sin(v * 3.14159 + 2.094),
        0.5 + 0.5 * sin(v * 3.14159 + 4.188),
    );
    return vec4<f32>(color * params.fade, 1.0);
}
";

const SCENE_RINGS_WGSL: &str = r"@fragment
fn fs_main(@builtin(position) frag_coord: vec4<f32>, @location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let res = max(params.resolution, vec2<f32>(1.0, 1.0));
    let centered = frag_coord.xy / res - vec2<f32>(0.5, 0.5);
    let p = vec2<f32>(centered.x * res.x / res.y, centered.y);

    let r = length(p);
    let wave = 0.5 + 0.5 * sin(40.0 * r - params.time * 3.0 + params.mid);
    let hue = 0.5 + 0.5 * cos(params.time * 0.3 + r * 8.0 + vec3<f32>(0.0, 2.0, 4.0));
    return vec4<f32>(hue * wave * params.fade, 1.0);
}
";

const SCENE_LATTICE_WGSL: &str = r"@fragment
fn fs_main(@builtin(position) frag_coord: vec4<f32>, @location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let res = max(params.resolution, vec2<f32>(1.0, 1.0));
    let p = frag_coord.xy / res * 12.0;
    let t = params.time * 0.7;

    let cell = fract(p + vec2<f32>(sin(t + p.y), cos(t + p.x)) * 0.3) - vec2<f32>(0.5, 0.5);
    let d = length(cell);
    let pulse = smoothstep(0.4, 0.1, d) * (0.6 + 0.4 * sin(t * 4.0 + p.x + p.y) + params.high);

    let color = vec3<f32>(0.2, 0.8, 1.0) * pulse + vec3<f32>(0.05, 0.0, 0.1);
    return vec4<f32>(color * params.fade, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_library_carries_required_programs() {
        let library = ShaderLibrary::builtin();
        assert!(matches!(
            library.get(FULLSCREEN_VERTEX).map(|e| e.kind),
            Some(ProgramKind::Vertex)
        ));
        assert!(matches!(
            library.get(PRESENT_FRAGMENT).map(|e| e.kind),
            Some(ProgramKind::Fragment)
        ));
        assert!(matches!(
            library.get(FALLBACK_SCENE).map(|e| e.kind),
            Some(ProgramKind::Fragment)
        ));
    }

    #[test]
    fn composed_fragments_declare_prelude_bindings() {
        let library = ShaderLibrary::builtin();
        let body = library.get("scene_plasma").unwrap().source;
        let composed = compose_scene_fragment(body);
        assert!(composed.contains("var<uniform> params"));
        assert!(composed.contains("prev_frame"));
        assert!(composed.contains("fn fs_main"));
    }
}
