//! Staged uploads into device-local memory.
//!
//! Every upload goes through a host-visible, host-coherent staging buffer and
//! a one-shot command buffer, then blocks until the queue drains before the
//! staging buffer is released. Uploads only happen at load time.

use crate::command::{execute_single_time_commands, CommandPool};
use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::image::GpuImage;
use crate::memory::GpuBuffer;
use ash::vk;
use std::sync::Arc;

/// Memory flags for staging buffers.
pub const STAGING_MEMORY: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

/// Format textures are uploaded in.
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Layouts a texture passes through during upload, in order.
pub const TEXTURE_UPLOAD_LAYOUTS: [vk::ImageLayout; 3] = [
    vk::ImageLayout::UNDEFINED,
    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
];

/// Access and stage masks for one supported layout transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTransition {
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

impl LayoutTransition {
    /// Resolve barrier masks for a transition.
    ///
    /// Only `UNDEFINED -> TRANSFER_DST_OPTIMAL` and
    /// `TRANSFER_DST_OPTIMAL -> SHADER_READ_ONLY_OPTIMAL` are supported.
    pub fn between(old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> Result<Self> {
        let (src_access, dst_access, src_stage, dst_stage) = match (old_layout, new_layout) {
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => (
                vk::AccessFlags::empty(),
                vk::AccessFlags::TRANSFER_WRITE,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
            ),
            (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => (
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::SHADER_READ,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
            ),
            (old, new) => return Err(GpuError::UnsupportedLayoutTransition { old, new }),
        };

        Ok(Self {
            old_layout,
            new_layout,
            src_access,
            dst_access,
            src_stage,
            dst_stage,
        })
    }

    /// Record the barrier for this transition.
    ///
    /// # Safety
    /// The command buffer must be recording and the image must be valid.
    pub unsafe fn record(&self, device: &ash::Device, cmd: vk::CommandBuffer, image: vk::Image) {
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(self.old_layout)
            .new_layout(self.new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            )
            .src_access_mask(self.src_access)
            .dst_access_mask(self.dst_access);

        unsafe {
            device.cmd_pipeline_barrier(
                cmd,
                self.src_stage,
                self.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                std::slice::from_ref(&barrier),
            );
        }
    }
}

/// Resolve every transition along a layout chain.
pub fn layout_chain(layouts: &[vk::ImageLayout]) -> Result<Vec<LayoutTransition>> {
    layouts
        .windows(2)
        .map(|pair| LayoutTransition::between(pair[0], pair[1]))
        .collect()
}

/// Record a tightly packed buffer-to-image copy covering the whole image.
///
/// # Safety
/// The command buffer must be recording and the image must be in
/// `TRANSFER_DST_OPTIMAL`.
pub unsafe fn copy_buffer_to_image(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    buffer: vk::Buffer,
    image: vk::Image,
    extent: vk::Extent2D,
) {
    let region = vk::BufferImageCopy::default()
        .buffer_offset(0)
        .buffer_row_length(0)
        .buffer_image_height(0)
        .image_subresource(
            vk::ImageSubresourceLayers::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .mip_level(0)
                .base_array_layer(0)
                .layer_count(1),
        )
        .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
        .image_extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        });

    unsafe {
        device.cmd_copy_buffer_to_image(
            cmd,
            buffer,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            std::slice::from_ref(&region),
        );
    }
}

/// Uploads CPU data to device-local buffers and images.
pub struct TransferContext {
    device: Arc<ash::Device>,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    queue: vk::Queue,
    pool: CommandPool,
}

impl TransferContext {
    /// Create a transfer context on the graphics queue.
    pub fn new(gpu: &GpuContext) -> Result<Self> {
        let families = gpu.queue_families();
        let pool = CommandPool::new(gpu.device().clone(), families.graphics)?;

        Ok(Self {
            device: gpu.device().clone(),
            memory_properties: *gpu.memory_properties(),
            queue: gpu.graphics_queue(),
            pool,
        })
    }

    /// Create a staging buffer holding a copy of `bytes`.
    pub fn create_staging_buffer(&self, bytes: &[u8]) -> Result<GpuBuffer> {
        if bytes.is_empty() {
            return Err(GpuError::ResourceUpload(
                "Cannot stage an empty payload".to_string(),
            ));
        }

        let staging = GpuBuffer::new(
            self.device.clone(),
            &self.memory_properties,
            bytes.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            STAGING_MEMORY,
        )?;
        staging.write_bytes(bytes)?;
        Ok(staging)
    }

    /// Upload data to a new device-local buffer with the given final usage.
    pub fn upload_buffer<T: bytemuck::Pod>(
        &self,
        data: &[T],
        usage: vk::BufferUsageFlags,
    ) -> Result<GpuBuffer> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let staging = self.create_staging_buffer(bytes)?;

        let buffer = GpuBuffer::new(
            self.device.clone(),
            &self.memory_properties,
            staging.size(),
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        let region = vk::BufferCopy::default().size(staging.size());
        execute_single_time_commands(&self.pool, self.queue, |device, cmd| {
            unsafe {
                device.cmd_copy_buffer(
                    cmd,
                    staging.handle(),
                    buffer.handle(),
                    std::slice::from_ref(&region),
                );
            }
            Ok(())
        })
        .map_err(|e| GpuError::ResourceUpload(format!("Buffer copy failed: {e}")))?;

        tracing::debug!("Uploaded {} bytes to device-local buffer", bytes.len());

        Ok(buffer)
    }

    /// Upload RGBA8 pixels to a new sampled texture.
    ///
    /// The returned image is in `SHADER_READ_ONLY_OPTIMAL`.
    pub fn upload_texture(&self, rgba: &[u8], width: u32, height: u32) -> Result<GpuImage> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || rgba.len() != expected {
            return Err(GpuError::ResourceUpload(format!(
                "Texture {width}x{height} needs {expected} bytes, got {}",
                rgba.len()
            )));
        }

        let transitions = layout_chain(&TEXTURE_UPLOAD_LAYOUTS)?;
        let staging = self.create_staging_buffer(rgba)?;
        let extent = vk::Extent2D { width, height };

        let mut image = GpuImage::new(
            self.device.clone(),
            &self.memory_properties,
            extent,
            TEXTURE_FORMAT,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::ImageAspectFlags::COLOR,
        )?;

        // Copy sits between the two barriers
        execute_single_time_commands(&self.pool, self.queue, |device, cmd| {
            let (first, rest) = transitions
                .split_first()
                .ok_or_else(|| GpuError::InvalidState("Empty transition chain".to_string()))?;
            unsafe {
                first.record(device, cmd, image.handle());
                copy_buffer_to_image(device, cmd, staging.handle(), image.handle(), extent);
                for transition in rest {
                    transition.record(device, cmd, image.handle());
                }
            }
            Ok(())
        })
        .map_err(|e| GpuError::ResourceUpload(format!("Texture upload failed: {e}")))?;

        if let Some(last) = transitions.last() {
            image.set_layout(last.new_layout);
        }

        tracing::debug!("Uploaded {width}x{height} texture");

        Ok(image)
    }
}
