//! The owning renderer.

use crate::backend::VulkanFrameDevice;
use crate::camera::Camera;
use crate::frame::{FrameOrchestrator, FrameSlot, MAX_FRAMES_IN_FLIGHT};
use crate::mesh::GpuMesh;
use crate::registry::MeshRegistry;
use crate::texture::{TexturePixels, TextureRegistry};
use crate::uniforms::{ModelPushConstant, ViewProjection};
use crate::vertex::Vertex;
use ash::vk;
use ember_gpu::image::find_depth_format;
use ember_gpu::{
    write_combined_image_sampler, write_uniform_buffer, CommandPool, DescriptorPool,
    DescriptorSetLayout, DescriptorSetLayoutBuilder, FrameSync, Framebuffers, GpuBuffer,
    GpuContext, GpuContextBuilder, GpuError, GpuImage, GraphicsPipeline, GraphicsPipelineConfig,
    RenderPass, Result, Sampler, ShaderSource, Swapchain, TransferContext,
};
use glam::Mat4;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::path::Path;

/// Index of the texture every renderer starts with.
pub const DEFAULT_TEXTURE: usize = 0;

/// Renderer configuration.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub app_name: String,
    pub validation: bool,
    pub vertex_shader: ShaderSource,
    pub fragment_shader: ShaderSource,
    pub clear_color: [f32; 4],
    /// Upper bound on meshes and on textures.
    pub max_objects: usize,
    pub require_anisotropy: bool,
    pub camera: Camera,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            app_name: "Ember".to_string(),
            validation: cfg!(debug_assertions),
            vertex_shader: ShaderSource::from("assets/shaders/vert.spv"),
            fragment_shader: ShaderSource::from("assets/shaders/frag.spv"),
            clear_color: [0.6, 0.65, 0.4, 1.0],
            max_objects: 16,
            require_anisotropy: true,
            camera: Camera::default(),
        }
    }
}

impl RendererConfig {
    /// Descriptor pool sizes: one view-projection set per image plus one
    /// texture set per object.
    pub fn descriptor_pool_sizes(&self, image_count: usize) -> (u32, [vk::DescriptorPoolSize; 2]) {
        let image_count = image_count as u32;
        let max_objects = self.max_objects as u32;
        (
            image_count + max_objects,
            [
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::UNIFORM_BUFFER,
                    descriptor_count: image_count,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    descriptor_count: max_objects,
                },
            ],
        )
    }
}

/// A window's renderer: one render pass, one pipeline, a fixed set of meshes.
///
/// Fields drop top to bottom, so dependents are listed before what they
/// depend on and the GPU context comes last.
pub struct Renderer {
    frames: FrameOrchestrator,
    frame_sync: Vec<FrameSync>,
    command_pool: CommandPool,
    meshes: MeshRegistry<GpuMesh>,
    textures: TextureRegistry<GpuImage>,
    sampler: Sampler,
    view_projection_sets: Vec<vk::DescriptorSet>,
    descriptor_pool: DescriptorPool,
    uniform_buffers: Vec<GpuBuffer>,
    pipeline: GraphicsPipeline,
    texture_layout: DescriptorSetLayout,
    view_projection_layout: DescriptorSetLayout,
    framebuffers: Framebuffers,
    depth_image: GpuImage,
    render_pass: RenderPass,
    swapchain: Swapchain,
    transfer: TransferContext,
    camera: Camera,
    clear_color: [f32; 4],
    gpu: GpuContext,
}

impl Renderer {
    /// Create every GPU object needed to draw into `window`.
    ///
    /// `width` and `height` are the window's framebuffer size in pixels.
    pub fn new<W>(window: &W, width: u32, height: u32, config: RendererConfig) -> Result<Self>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let gpu = GpuContextBuilder::new()
            .app_name(config.app_name.clone())
            .validation(config.validation)
            .require_anisotropy(config.require_anisotropy)
            .build(window)?;
        let device = gpu.device().clone();

        let swapchain = Swapchain::new(&gpu, width, height)?;
        let extent = swapchain.extent();
        let image_count = swapchain.image_count();

        let depth_format = find_depth_format(|format| gpu.format_properties(format))?;
        tracing::debug!("Depth format: {:?}", depth_format);

        let render_pass = RenderPass::new(device.clone(), swapchain.format(), depth_format)?;
        let depth_image =
            GpuImage::depth_attachment(device.clone(), gpu.memory_properties(), extent, depth_format)?;
        let framebuffers = Framebuffers::new(
            device.clone(),
            &render_pass,
            swapchain.image_views(),
            depth_image.view(),
            extent,
        )?;

        let view_projection_layout = DescriptorSetLayoutBuilder::new()
            .uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .build(device.clone())?;
        let texture_layout = DescriptorSetLayoutBuilder::new()
            .combined_image_sampler(0, vk::ShaderStageFlags::FRAGMENT)
            .build(device.clone())?;

        let set_layouts = [view_projection_layout.handle(), texture_layout.handle()];
        let pipeline = create_pipeline(&gpu, &render_pass, &config, extent, &set_layouts)?;

        let uniform_buffers = (0..image_count)
            .map(|_| {
                GpuBuffer::new(
                    device.clone(),
                    gpu.memory_properties(),
                    ViewProjection::SIZE,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let (max_sets, pool_sizes) = config.descriptor_pool_sizes(image_count);
        let descriptor_pool = DescriptorPool::new(device.clone(), max_sets, &pool_sizes)?;

        let view_projection_sets =
            descriptor_pool.allocate(&vec![view_projection_layout.handle(); image_count])?;
        for (&set, buffer) in view_projection_sets.iter().zip(&uniform_buffers) {
            unsafe {
                write_uniform_buffer(&device, set, 0, buffer.handle(), 0, ViewProjection::SIZE);
            }
        }

        let sampler = Sampler::new(device.clone(), gpu.anisotropy_enabled())?;
        let transfer = TransferContext::new(&gpu)?;

        let command_pool = CommandPool::new(device.clone(), gpu.queue_families().graphics)?;
        let command_buffers = command_pool.allocate_command_buffers(MAX_FRAMES_IN_FLIGHT as u32)?;
        let frame_sync = FrameSync::create_slots(&device, MAX_FRAMES_IN_FLIGHT)?;
        let slots = frame_sync
            .iter()
            .zip(&command_buffers)
            .map(|(sync, &command_buffer)| FrameSlot {
                image_available: sync.image_available,
                render_finished: sync.render_finished,
                in_flight: sync.in_flight,
                command_buffer,
            })
            .collect();
        let frames = FrameOrchestrator::new(slots, image_count)?;

        let mut camera = config.camera.clone();
        camera.set_viewport(extent.width, extent.height);

        let mut renderer = Self {
            frames,
            frame_sync,
            command_pool,
            meshes: MeshRegistry::new(config.max_objects),
            textures: TextureRegistry::new(config.max_objects),
            sampler,
            view_projection_sets,
            descriptor_pool,
            uniform_buffers,
            pipeline,
            texture_layout,
            view_projection_layout,
            framebuffers,
            depth_image,
            render_pass,
            swapchain,
            transfer,
            camera,
            clear_color: config.clear_color,
            gpu,
        };

        let white = renderer.create_texture_from_pixels(&TexturePixels::white())?;
        debug_assert_eq!(white, DEFAULT_TEXTURE);

        tracing::info!(
            "Renderer ready on {}: {}x{}, {} swapchain images, {} frames in flight",
            renderer.gpu.device_name(),
            extent.width,
            extent.height,
            image_count,
            MAX_FRAMES_IN_FLIGHT
        );

        Ok(renderer)
    }

    /// Upload a mesh and register it. Returns the object index.
    ///
    /// Pass an empty index slice to draw the vertices directly.
    pub fn add_mesh(&mut self, vertices: &[Vertex], indices: &[u32], texture_id: usize) -> Result<usize> {
        if !self.textures.contains(texture_id) {
            return Err(GpuError::ResourceNotFound(format!("Texture {texture_id}")));
        }
        if self.meshes.is_full() {
            return Err(GpuError::InvalidState(format!(
                "Cannot add more than {} meshes",
                self.meshes.capacity()
            )));
        }

        let mesh = GpuMesh::upload(&self.transfer, vertices, indices)?;
        let index = self.meshes.add(mesh, texture_id)?;

        tracing::debug!(
            "Mesh {index}: {} vertices, {} indices, texture {texture_id}",
            vertices.len(),
            indices.len()
        );
        Ok(index)
    }

    /// Load an image file as a new texture. Returns the texture id.
    pub fn create_texture(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let pixels = TexturePixels::load(path)?;
        let id = self.create_texture_from_pixels(&pixels)?;
        tracing::info!(
            "Texture {id} loaded from {} ({}x{})",
            path.display(),
            pixels.width,
            pixels.height
        );
        Ok(id)
    }

    /// Upload decoded pixels as a new texture. Returns the texture id.
    pub fn create_texture_from_pixels(&mut self, pixels: &TexturePixels) -> Result<usize> {
        self.textures.ensure_capacity()?;

        let image = self
            .transfer
            .upload_texture(&pixels.rgba, pixels.width, pixels.height)?;

        let set = self
            .descriptor_pool
            .allocate(&[self.texture_layout.handle()])?
            .into_iter()
            .next()
            .ok_or_else(|| GpuError::InvalidState("No texture descriptor set".to_string()))?;
        unsafe {
            write_combined_image_sampler(
                self.gpu.device(),
                set,
                0,
                image.view(),
                self.sampler.handle(),
            );
        }

        self.textures.insert(image, set)
    }

    /// Set the model matrix of an object. Out-of-range indices are ignored.
    pub fn update_model(&mut self, index: usize, model: Mat4) {
        self.meshes.update_model(index, model);
    }

    /// Record, submit and present one frame.
    pub fn draw(&mut self) -> Result<()> {
        let draws = self.meshes.draw_list(&self.textures.descriptor_sets())?;
        let uniforms = self.camera.view_projection();

        let mut backend = VulkanFrameDevice {
            device: self.gpu.device(),
            swapchain: &self.swapchain,
            render_pass: &self.render_pass,
            framebuffers: &self.framebuffers,
            pipeline: &self.pipeline,
            uniform_buffers: &self.uniform_buffers,
            view_projection_sets: &self.view_projection_sets,
            graphics_queue: self.gpu.graphics_queue(),
            present_queue: self.gpu.present_queue(),
            clear_color: self.clear_color,
        };

        self.frames.draw(&mut backend, &draws, &uniforms)?;
        Ok(())
    }

    /// Block until the GPU has finished all submitted work.
    pub fn wait_idle(&self) -> Result<()> {
        self.gpu.wait_idle()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // No in-flight work may reference what the fields release
        if let Err(e) = self.gpu.wait_idle() {
            tracing::error!("Device wait failed during shutdown: {e}");
        }
        tracing::info!(
            "Renderer shutting down after {} frames",
            self.frames.frames_submitted()
        );
    }
}

fn create_pipeline(
    gpu: &GpuContext,
    render_pass: &RenderPass,
    config: &RendererConfig,
    extent: vk::Extent2D,
    set_layouts: &[vk::DescriptorSetLayout],
) -> Result<GraphicsPipeline> {
    let pipeline_config = GraphicsPipelineConfig {
        vertex_shader: config.vertex_shader.load()?,
        fragment_shader: config.fragment_shader.load()?,
        vertex_bindings: vec![Vertex::binding_description()],
        vertex_attributes: Vertex::attribute_descriptions().to_vec(),
        extent,
        ..GraphicsPipelineConfig::default()
    };

    GraphicsPipeline::new(
        gpu.device().clone(),
        render_pass,
        &pipeline_config,
        set_layouts,
        &[ModelPushConstant::range()],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = RendererConfig::default();
        assert_eq!(config.max_objects, 16);
        assert_eq!(config.clear_color, [0.6, 0.65, 0.4, 1.0]);
        assert_eq!(
            config.vertex_shader,
            ShaderSource::File("assets/shaders/vert.spv".into())
        );
        assert_eq!(
            config.fragment_shader,
            ShaderSource::File("assets/shaders/frag.spv".into())
        );
    }

    #[test]
    fn pool_holds_image_and_texture_sets() {
        let config = RendererConfig {
            max_objects: 5,
            ..RendererConfig::default()
        };
        let (max_sets, sizes) = config.descriptor_pool_sizes(3);

        assert_eq!(max_sets, 8);
        assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(sizes[0].descriptor_count, 3);
        assert_eq!(sizes[1].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(sizes[1].descriptor_count, 5);
    }
}
