use anyhow::{anyhow, Context, Result};

use crate::shaders::{
    compose_scene_fragment, ProgramKind, ShaderLibrary, FALLBACK_SCENE, FULLSCREEN_VERTEX,
    PRESENT_FRAGMENT,
};

/// One rotating scene: a discovered fragment name and its compiled pipeline.
pub(crate) struct ScenePipeline {
    pub name: String,
    pub pipeline: wgpu::RenderPipeline,
}

/// Ordered scene pipelines plus the fixed present pipeline.
///
/// Discovery is deterministic: qualifying names are sorted lexicographically,
/// so index assignment is stable across runs, and the sequence is never empty
/// (the fallback scene is synthesised when the filter matches nothing).
pub(crate) struct PipelineRegistry {
    scenes: Vec<ScenePipeline>,
    present: wgpu::RenderPipeline,
}

impl PipelineRegistry {
    /// Compiles one pipeline per qualifying scene and the present pipeline.
    ///
    /// A name in the manifest is assumed compilable; any individual pipeline
    /// failure is surfaced as an error for the host to treat as fatal.
    pub(crate) fn discover(
        device: &wgpu::Device,
        library: &ShaderLibrary,
        prefixes: &[String],
        scene_layout: &wgpu::PipelineLayout,
        present_layout: &wgpu::PipelineLayout,
        format: wgpu::TextureFormat,
    ) -> Result<Self> {
        let vertex_entry = library
            .get(FULLSCREEN_VERTEX)
            .filter(|entry| entry.kind == ProgramKind::Vertex)
            .ok_or_else(|| anyhow!("shader library is missing '{FULLSCREEN_VERTEX}'"))?;
        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("fullscreen triangle vertex"),
            source: wgpu::ShaderSource::Wgsl(vertex_entry.source.into()),
        });

        let mut names = qualifying_names(library, prefixes);
        if names.is_empty() {
            tracing::warn!(
                ?prefixes,
                fallback = FALLBACK_SCENE,
                "no scene fragments matched the allowed prefixes; using fallback"
            );
            names.push(FALLBACK_SCENE.to_string());
        }

        let mut scenes = Vec::with_capacity(names.len());
        for name in names {
            let entry = library
                .get(&name)
                .ok_or_else(|| anyhow!("scene fragment '{name}' vanished from the library"))?;
            let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("scene fragment '{name}'")),
                source: wgpu::ShaderSource::Wgsl(compose_scene_fragment(entry.source).into()),
            });
            let pipeline = build_pipeline(
                device,
                scene_layout,
                &vertex_module,
                &fragment_module,
                format,
                &format!("scene pipeline '{name}'"),
            );
            scenes.push(ScenePipeline { name, pipeline });
        }

        let present_entry = library
            .get(PRESENT_FRAGMENT)
            .filter(|entry| entry.kind == ProgramKind::Fragment)
            .ok_or_else(|| anyhow!("shader library is missing '{PRESENT_FRAGMENT}'"))
            .context("cannot build present pipeline")?;
        let present_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("present fragment"),
            source: wgpu::ShaderSource::Wgsl(present_entry.source.into()),
        });
        let present = build_pipeline(
            device,
            present_layout,
            &vertex_module,
            &present_module,
            format,
            "present pipeline",
        );

        tracing::info!(
            scenes = ?scenes.iter().map(|scene| scene.name.as_str()).collect::<Vec<_>>(),
            "discovered scene pipelines"
        );

        Ok(Self { scenes, present })
    }

    pub(crate) fn scene(&self, index: usize) -> &ScenePipeline {
        &self.scenes[index]
    }

    pub(crate) fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    pub(crate) fn scene_name(&self, index: usize) -> &str {
        &self.scenes[index].name
    }

    pub(crate) fn present(&self) -> &wgpu::RenderPipeline {
        &self.present
    }
}

/// Names that qualify for rotation: fragment-stage programs whose name starts
/// with any allowed prefix, in lexicographic order.
pub fn qualifying_names(library: &ShaderLibrary, prefixes: &[String]) -> Vec<String> {
    let mut names: Vec<String> = library
        .entries()
        .iter()
        .filter(|entry| entry.kind == ProgramKind::Fragment)
        .filter(|entry| prefixes.iter().any(|prefix| entry.name.starts_with(prefix.as_str())))
        .map(|entry| entry.name.to_string())
        .collect();
    names.sort();
    names
}

fn build_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    vertex_module: &wgpu::ShaderModule,
    fragment_module: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: vertex_module,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: fragment_module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaders::ProgramEntry;

    fn fake_library() -> ShaderLibrary {
        ShaderLibrary::from_entries(vec![
            ProgramEntry {
                name: "scene_zeta",
                kind: ProgramKind::Fragment,
                source: "",
            },
            ProgramEntry {
                name: "scene_alpha",
                kind: ProgramKind::Fragment,
                source: "",
            },
            // Prefix matches but wrong stage; must be filtered out.
            ProgramEntry {
                name: "scene_warp_vs",
                kind: ProgramKind::Vertex,
                source: "",
            },
            ProgramEntry {
                name: "feedback_echo",
                kind: ProgramKind::Fragment,
                source: "",
            },
            ProgramEntry {
                name: "present_fs",
                kind: ProgramKind::Fragment,
                source: "",
            },
        ])
    }

    fn prefixes() -> Vec<String> {
        vec!["scene_".into(), "feedback_".into()]
    }

    #[test]
    fn filters_by_prefix_and_stage_in_sorted_order() {
        let names = qualifying_names(&fake_library(), &prefixes());
        assert_eq!(names, vec!["feedback_echo", "scene_alpha", "scene_zeta"]);
    }

    #[test]
    fn discovery_order_is_deterministic() {
        let library = fake_library();
        let first = qualifying_names(&library, &prefixes());
        for _ in 0..10 {
            assert_eq!(qualifying_names(&library, &prefixes()), first);
        }
    }

    #[test]
    fn unmatched_prefixes_yield_no_names() {
        let names = qualifying_names(&fake_library(), &["viz_".to_string()]);
        assert!(names.is_empty());
    }

    #[test]
    fn builtin_library_discovers_default_scenes() {
        let names = qualifying_names(&ShaderLibrary::builtin(), &prefixes());
        assert_eq!(
            names,
            vec!["feedback_trails", "scene_lattice", "scene_plasma", "scene_rings"]
        );
        assert!(!names.contains(&"present_fs".to_string()));
    }
}
