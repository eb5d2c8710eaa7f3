//! [`FrameDevice`] over real Vulkan objects.

use crate::frame::{DrawCommand, FrameDevice, FrameSubmission};
use crate::uniforms::ViewProjection;
use ash::vk;
use ember_gpu::command::{begin_command_buffer, end_command_buffer, submit_command_buffers};
use ember_gpu::sync::{reset_fence, wait_for_fence};
use ember_gpu::{Framebuffers, GpuBuffer, GpuError, GraphicsPipeline, RenderPass, Result, Swapchain};

/// Clear values for the color and depth attachments.
pub fn clear_values(color: [f32; 4]) -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue { float32: color },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        },
    ]
}

/// Borrowed view of the renderer's objects for one frame.
pub struct VulkanFrameDevice<'a> {
    pub device: &'a ash::Device,
    pub swapchain: &'a Swapchain,
    pub render_pass: &'a RenderPass,
    pub framebuffers: &'a Framebuffers,
    pub pipeline: &'a GraphicsPipeline,
    pub uniform_buffers: &'a [GpuBuffer],
    pub view_projection_sets: &'a [vk::DescriptorSet],
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub clear_color: [f32; 4],
}

impl VulkanFrameDevice<'_> {
    fn per_image<T: Copy>(items: &[T], image_index: u32, what: &str) -> Result<T> {
        items.get(image_index as usize).copied().ok_or_else(|| {
            GpuError::ResourceNotFound(format!("{what} for swapchain image {image_index}"))
        })
    }
}

impl FrameDevice for VulkanFrameDevice<'_> {
    fn wait_for_fence(&mut self, fence: vk::Fence) -> Result<()> {
        unsafe { wait_for_fence(self.device, fence, u64::MAX) }
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> Result<()> {
        unsafe { reset_fence(self.device, fence) }
    }

    fn acquire_next_image(&mut self, semaphore: vk::Semaphore) -> Result<u32> {
        unsafe { self.swapchain.acquire_next_image(semaphore) }
    }

    fn record(
        &mut self,
        command_buffer: vk::CommandBuffer,
        image_index: u32,
        draws: &[DrawCommand],
    ) -> Result<()> {
        let framebuffer = self
            .framebuffers
            .get(image_index as usize)
            .ok_or_else(|| {
                GpuError::ResourceNotFound(format!("Framebuffer for swapchain image {image_index}"))
            })?;
        let view_projection_set =
            Self::per_image(self.view_projection_sets, image_index, "View-projection set")?;

        let device = self.device;
        let layout = self.pipeline.layout();
        let clear_values = clear_values(self.clear_color);

        let render_pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass.handle())
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.swapchain.extent(),
            })
            .clear_values(&clear_values);

        unsafe {
            device.reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())?;
            begin_command_buffer(device, command_buffer, vk::CommandBufferUsageFlags::empty())?;

            device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_info,
                vk::SubpassContents::INLINE,
            );
            device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.handle(),
            );

            for draw in draws {
                device.cmd_bind_vertex_buffers(command_buffer, 0, &[draw.vertex_buffer], &[0]);
                device.cmd_push_constants(
                    command_buffer,
                    layout,
                    vk::ShaderStageFlags::VERTEX,
                    0,
                    bytemuck::bytes_of(&draw.model),
                );
                device.cmd_bind_descriptor_sets(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    layout,
                    0,
                    &[view_projection_set, draw.texture_set],
                    &[],
                );

                match draw.index_buffer {
                    Some(index_buffer) => {
                        device.cmd_bind_index_buffer(
                            command_buffer,
                            index_buffer,
                            0,
                            vk::IndexType::UINT32,
                        );
                        device.cmd_draw_indexed(command_buffer, draw.index_count, 1, 0, 0, 0);
                    }
                    None => device.cmd_draw(command_buffer, draw.vertex_count, 1, 0, 0),
                }
            }

            device.cmd_end_render_pass(command_buffer);
            end_command_buffer(device, command_buffer)?;
        }

        Ok(())
    }

    fn write_view_projection(&mut self, image_index: u32, uniforms: &ViewProjection) -> Result<()> {
        let buffer = self
            .uniform_buffers
            .get(image_index as usize)
            .ok_or_else(|| {
                GpuError::ResourceNotFound(format!("Uniform buffer for swapchain image {image_index}"))
            })?;
        buffer.write(std::slice::from_ref(uniforms))
    }

    fn submit(&mut self, submission: &FrameSubmission) -> Result<()> {
        unsafe {
            submit_command_buffers(
                self.device,
                self.graphics_queue,
                &[submission.command_buffer],
                &[submission.wait_semaphore],
                &[submission.wait_stage],
                &[submission.signal_semaphore],
                submission.fence,
            )
        }
    }

    fn present(&mut self, image_index: u32, wait_semaphore: vk::Semaphore) -> Result<()> {
        unsafe {
            self.swapchain
                .present(self.present_queue, image_index, &[wait_semaphore])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clears_color_and_far_depth() {
        let [color, depth] = clear_values([0.6, 0.65, 0.4, 1.0]);
        unsafe {
            assert_eq!(color.color.float32, [0.6, 0.65, 0.4, 1.0]);
            assert_eq!(depth.depth_stencil.depth, 1.0);
            assert_eq!(depth.depth_stencil.stencil, 0);
        }
    }
}
