//! Graphics pipeline creation and SPIR-V loading.

use crate::error::{GpuError, Result};
use crate::render_pass::RenderPass;
use ash::vk;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// SPIR-V magic number.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Convert raw SPIR-V bytes into words, validating length and magic number.
pub fn spirv_from_bytes(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(GpuError::ShaderLoad(format!(
            "SPIR-V length {} is not a non-zero multiple of 4",
            bytes.len()
        )));
    }

    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if words[0] != SPIRV_MAGIC {
        return Err(GpuError::ShaderLoad(format!(
            "Bad SPIR-V magic number {:#010x}",
            words[0]
        )));
    }

    Ok(words)
}

/// Read a compiled shader from disk.
pub fn load_spirv(path: impl AsRef<Path>) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|e| GpuError::ShaderLoad(format!("{}: {e}", path.display())))?;
    spirv_from_bytes(&bytes).map_err(|e| match e {
        GpuError::ShaderLoad(msg) => GpuError::ShaderLoad(format!("{}: {msg}", path.display())),
        other => other,
    })
}

/// Where a shader's SPIR-V comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderSource {
    /// Compiled file read when the pipeline is built.
    File(PathBuf),
    /// Words already in memory, e.g. embedded at build time.
    Spirv(Vec<u32>),
}

impl ShaderSource {
    /// Resolve to validated SPIR-V words.
    pub fn load(&self) -> Result<Vec<u32>> {
        match self {
            Self::File(path) => load_spirv(path),
            Self::Spirv(words) => match words.first() {
                Some(&SPIRV_MAGIC) => Ok(words.clone()),
                Some(&other) => Err(GpuError::ShaderLoad(format!(
                    "Bad SPIR-V magic number {other:#010x}"
                ))),
                None => Err(GpuError::ShaderLoad("Empty SPIR-V module".to_string())),
            },
        }
    }
}

impl From<PathBuf> for ShaderSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<&str> for ShaderSource {
    fn from(path: &str) -> Self {
        Self::File(PathBuf::from(path))
    }
}

impl From<Vec<u32>> for ShaderSource {
    fn from(words: Vec<u32>) -> Self {
        Self::Spirv(words)
    }
}

/// Graphics pipeline configuration.
#[derive(Clone)]
pub struct GraphicsPipelineConfig {
    pub vertex_shader: Vec<u32>,
    pub fragment_shader: Vec<u32>,
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub extent: vk::Extent2D,
    pub topology: vk::PrimitiveTopology,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub alpha_blend: bool,
    pub depth_test: bool,
    pub depth_write: bool,
}

impl Default for GraphicsPipelineConfig {
    fn default() -> Self {
        Self {
            vertex_shader: Vec::new(),
            fragment_shader: Vec::new(),
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            extent: vk::Extent2D::default(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            cull_mode: vk::CullModeFlags::BACK,
            // Projection flips Y, which reverses winding
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            alpha_blend: true,
            depth_test: true,
            depth_write: true,
        }
    }
}

/// Blend state for the single color attachment.
pub fn color_blend_attachment(alpha_blend: bool) -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(alpha_blend)
        .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
        .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
        .alpha_blend_op(vk::BlendOp::ADD)
}

/// Viewport and scissor covering the whole extent.
pub fn full_viewport(extent: vk::Extent2D) -> (vk::Viewport, vk::Rect2D) {
    let viewport = vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    };
    let scissor = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    };
    (viewport, scissor)
}

/// Shader module destroyed when dropped.
struct ShaderModule<'a> {
    device: &'a ash::Device,
    module: vk::ShaderModule,
}

impl<'a> ShaderModule<'a> {
    fn new(device: &'a ash::Device, code: &[u32], stage: &str) -> Result<Self> {
        let info = vk::ShaderModuleCreateInfo::default().code(code);
        let module = unsafe { device.create_shader_module(&info, None) }
            .map_err(|e| GpuError::PipelineCreation(format!("{stage} shader module: {e}")))?;
        Ok(Self { device, module })
    }
}

impl Drop for ShaderModule<'_> {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Graphics pipeline and its layout.
pub struct GraphicsPipeline {
    device: Arc<ash::Device>,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Create a graphics pipeline for subpass 0 of `render_pass`.
    ///
    /// Shader modules only live for the duration of this call.
    pub fn new(
        device: Arc<ash::Device>,
        render_pass: &RenderPass,
        config: &GraphicsPipelineConfig,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> Result<Self> {
        let vert_module = ShaderModule::new(&device, &config.vertex_shader, "Vertex")?;
        let frag_module = ShaderModule::new(&device, &config.fragment_shader, "Fragment")?;

        // Shader stages
        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vert_module.module)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(frag_module.module)
                .name(c"main"),
        ];

        // Vertex input
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&config.vertex_bindings)
            .vertex_attribute_descriptions(&config.vertex_attributes);

        // Input assembly
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(config.topology)
            .primitive_restart_enable(false);

        // Viewport (static)
        let (viewport, scissor) = full_viewport(config.extent);
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(std::slice::from_ref(&viewport))
            .scissors(std::slice::from_ref(&scissor));

        // Rasterization
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(config.cull_mode)
            .front_face(config.front_face)
            .depth_bias_enable(false)
            .line_width(1.0);

        // Multisampling
        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .sample_shading_enable(false);

        // Depth stencil
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(config.depth_test)
            .depth_write_enable(config.depth_write)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        // Color blending
        let blend_attachment = color_blend_attachment(config.alpha_blend);
        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(std::slice::from_ref(&blend_attachment));

        // Pipeline layout
        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(descriptor_set_layouts)
            .push_constant_ranges(push_constant_ranges);

        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .map_err(|e| GpuError::PipelineCreation(e.to_string()))?;

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .layout(layout)
            .render_pass(render_pass.handle())
            .subpass(0);

        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        };

        let pipeline = match pipelines {
            Ok(pipelines) => pipelines[0],
            Err((_, e)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(GpuError::PipelineCreation(e.to_string()));
            }
        };

        drop(vert_module);
        drop(frag_module);

        tracing::info!("Graphics pipeline created");

        Ok(Self {
            device,
            pipeline,
            layout,
        })
    }

    /// Get the raw pipeline handle.
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Get the pipeline layout.
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spirv_header() -> Vec<u8> {
        let mut bytes = Vec::new();
        for word in [SPIRV_MAGIC, 0x0001_0000, 0, 1, 0] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn in_memory_source_checks_magic() {
        let words = vec![SPIRV_MAGIC, 0x0001_0000, 0, 1, 0];
        assert_eq!(ShaderSource::from(words.clone()).load().unwrap(), words);

        assert!(matches!(
            ShaderSource::Spirv(vec![0xdead_beef]).load(),
            Err(GpuError::ShaderLoad(_))
        ));
        assert!(matches!(
            ShaderSource::Spirv(Vec::new()).load(),
            Err(GpuError::ShaderLoad(_))
        ));
    }

    #[test]
    fn file_source_reports_missing_path() {
        let source = ShaderSource::from("does/not/exist.spv");
        match source.load() {
            Err(GpuError::ShaderLoad(msg)) => assert!(msg.contains("exist.spv")),
            other => panic!("expected ShaderLoad, got {other:?}"),
        }
    }

    #[test]
    fn spirv_words_from_valid_bytes() {
        let words = spirv_from_bytes(&spirv_header()).unwrap();
        assert_eq!(words.len(), 5);
        assert_eq!(words[0], SPIRV_MAGIC);
        assert_eq!(words[1], 0x0001_0000);
    }

    #[test]
    fn spirv_rejects_misaligned_and_empty() {
        let mut bytes = spirv_header();
        bytes.push(0);
        assert!(matches!(
            spirv_from_bytes(&bytes),
            Err(GpuError::ShaderLoad(_))
        ));
        assert!(matches!(spirv_from_bytes(&[]), Err(GpuError::ShaderLoad(_))));
    }

    #[test]
    fn spirv_rejects_bad_magic() {
        let bytes = b"#version 450\n\0\0\0".to_vec();
        assert_eq!(bytes.len() % 4, 0);
        assert!(matches!(
            spirv_from_bytes(&bytes),
            Err(GpuError::ShaderLoad(_))
        ));
    }

    #[test]
    fn missing_shader_file_is_a_load_error() {
        let path = std::env::temp_dir().join("ember-missing-shader.spv");
        let _ = std::fs::remove_file(&path);
        match load_spirv(&path) {
            Err(GpuError::ShaderLoad(msg)) => assert!(msg.contains("ember-missing-shader.spv")),
            other => panic!("expected ShaderLoad, got {other:?}"),
        }
    }

    #[test]
    fn default_config_matches_fixed_pipeline() {
        let config = GraphicsPipelineConfig::default();
        assert_eq!(config.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(config.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(config.front_face, vk::FrontFace::COUNTER_CLOCKWISE);
        assert!(config.alpha_blend && config.depth_test && config.depth_write);
    }

    #[test]
    fn alpha_blend_factors() {
        let blend = color_blend_attachment(true);
        assert_eq!(blend.blend_enable, vk::TRUE);
        assert_eq!(blend.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
        assert_eq!(
            blend.dst_color_blend_factor,
            vk::BlendFactor::ONE_MINUS_SRC_ALPHA
        );
        assert_eq!(color_blend_attachment(false).blend_enable, vk::FALSE);
    }

    #[test]
    fn viewport_covers_extent() {
        let (viewport, scissor) = full_viewport(vk::Extent2D {
            width: 800,
            height: 600,
        });
        assert_eq!(viewport.width, 800.0);
        assert_eq!(viewport.height, 600.0);
        assert_eq!(viewport.max_depth, 1.0);
        assert_eq!(scissor.extent.width, 800);
        assert_eq!(scissor.offset.x, 0);
    }
}
