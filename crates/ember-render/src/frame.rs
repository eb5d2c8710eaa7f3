//! Per-frame acquire, record, submit and present cycle.
//!
//! The orchestrator owns no GPU objects. It sequences calls on a
//! [`FrameDevice`] using the handles of each [`FrameSlot`], which keeps the
//! synchronization rules independent of the Vulkan backend.
//!
//! Two index spaces are in play: the frame slot (`0..slots`) selects the
//! semaphores, fence and command buffer, while the acquired swapchain image
//! index selects the framebuffer and the view-projection uniform buffer.

use crate::uniforms::{ModelPushConstant, ViewProjection};
use ash::vk;
use ember_gpu::{GpuError, Result};

/// Frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Synchronization handles and command buffer for one frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlot {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight: vk::Fence,
    pub command_buffer: vk::CommandBuffer,
}

/// Everything needed to record one mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCommand {
    pub vertex_buffer: vk::Buffer,
    pub index_buffer: Option<vk::Buffer>,
    pub vertex_count: u32,
    pub index_count: u32,
    pub model: ModelPushConstant,
    pub texture_set: vk::DescriptorSet,
}

/// One queue submission for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSubmission {
    pub command_buffer: vk::CommandBuffer,
    pub wait_semaphore: vk::Semaphore,
    pub wait_stage: vk::PipelineStageFlags,
    pub signal_semaphore: vk::Semaphore,
    pub fence: vk::Fence,
}

/// Device operations the frame cycle is built from.
pub trait FrameDevice {
    /// Block until the fence is signaled.
    fn wait_for_fence(&mut self, fence: vk::Fence) -> Result<()>;

    /// Return the fence to the unsignaled state.
    fn reset_fence(&mut self, fence: vk::Fence) -> Result<()>;

    /// Acquire the next swapchain image, signaling `semaphore` when it is ready.
    fn acquire_next_image(&mut self, semaphore: vk::Semaphore) -> Result<u32>;

    /// Reset and record `command_buffer` to draw into the given image.
    fn record(
        &mut self,
        command_buffer: vk::CommandBuffer,
        image_index: u32,
        draws: &[DrawCommand],
    ) -> Result<()>;

    /// Write the uniform buffer owned by the given image.
    fn write_view_projection(&mut self, image_index: u32, uniforms: &ViewProjection) -> Result<()>;

    fn submit(&mut self, submission: &FrameSubmission) -> Result<()>;

    /// Present the image once `wait_semaphore` is signaled.
    fn present(&mut self, image_index: u32, wait_semaphore: vk::Semaphore) -> Result<()>;
}

/// Drives frames through a ring of frame slots.
#[derive(Debug)]
pub struct FrameOrchestrator {
    slots: Vec<FrameSlot>,
    // Fence of the slot that last rendered into each swapchain image
    images_in_flight: Vec<Option<vk::Fence>>,
    current_frame: usize,
    frames_submitted: u64,
}

impl FrameOrchestrator {
    /// Create an orchestrator over `slots` for a swapchain of `image_count` images.
    ///
    /// Slot fences must be created signaled.
    pub fn new(slots: Vec<FrameSlot>, image_count: usize) -> Result<Self> {
        if slots.is_empty() {
            return Err(GpuError::InvalidState(
                "At least one frame slot is required".to_string(),
            ));
        }
        if image_count == 0 {
            return Err(GpuError::InvalidState(
                "Swapchain has no images".to_string(),
            ));
        }

        Ok(Self {
            slots,
            images_in_flight: vec![None; image_count],
            current_frame: 0,
            frames_submitted: 0,
        })
    }

    /// Index of the slot the next frame will use.
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[FrameSlot] {
        &self.slots
    }

    /// Frames submitted so far.
    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    /// Render and present one frame. Returns the swapchain image index used.
    ///
    /// Any error is fatal for the renderer. The frame slot is not advanced,
    /// and its fence is only reset once an image has been acquired.
    pub fn draw<D: FrameDevice>(
        &mut self,
        device: &mut D,
        draws: &[DrawCommand],
        uniforms: &ViewProjection,
    ) -> Result<u32> {
        let slot = self.slots[self.current_frame];

        // Throttle: the previous submission from this slot must be finished
        device.wait_for_fence(slot.in_flight)?;

        let image_index = device.acquire_next_image(slot.image_available)?;
        let image = image_index as usize;
        let owner = self
            .images_in_flight
            .get(image)
            .copied()
            .ok_or_else(|| {
                GpuError::InvalidState(format!(
                    "Acquired image {image_index} but the swapchain has {} images",
                    self.images_in_flight.len()
                ))
            })?;

        // Another slot may still be rendering into this image
        if let Some(fence) = owner {
            if fence != slot.in_flight {
                device.wait_for_fence(fence)?;
            }
        }
        self.images_in_flight[image] = Some(slot.in_flight);

        device.reset_fence(slot.in_flight)?;

        device.record(slot.command_buffer, image_index, draws)?;
        device.write_view_projection(image_index, uniforms)?;

        device.submit(&FrameSubmission {
            command_buffer: slot.command_buffer,
            wait_semaphore: slot.image_available,
            wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            signal_semaphore: slot.render_finished,
            fence: slot.in_flight,
        })?;
        self.frames_submitted += 1;

        device.present(image_index, slot.render_finished)?;

        tracing::trace!(
            "Frame {} presented image {image_index} from slot {}",
            self.frames_submitted,
            self.current_frame
        );

        self.current_frame = (self.current_frame + 1) % self.slots.len();

        Ok(image_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MeshRegistry;
    use crate::testing::{frame_slots, Call, FakeMesh, MockFrameDevice};
    use glam::{Mat4, Vec3};

    fn orchestrator(image_count: usize) -> FrameOrchestrator {
        FrameOrchestrator::new(frame_slots(MAX_FRAMES_IN_FLIGHT), image_count).unwrap()
    }

    fn quad_scene() -> MeshRegistry<FakeMesh> {
        let mut registry = MeshRegistry::new(4);
        registry.add(FakeMesh::quad(1), 0).unwrap();
        registry.add(FakeMesh::quad(2), 0).unwrap();
        registry
    }

    fn texture_sets() -> Vec<vk::DescriptorSet> {
        use ash::vk::Handle;
        vec![vk::DescriptorSet::from_raw(0x7e0)]
    }

    #[test]
    fn in_flight_frames_never_exceed_limit() {
        let mut device = MockFrameDevice::new(3);
        let mut frames = orchestrator(3);
        let scene = quad_scene();

        for _ in 0..10 {
            let draws = scene.draw_list(&texture_sets()).unwrap();
            frames.draw(&mut device, &draws, &ViewProjection::default()).unwrap();
            assert!(device.in_flight() <= MAX_FRAMES_IN_FLIGHT);
        }

        assert_eq!(device.max_in_flight(), MAX_FRAMES_IN_FLIGHT);
        assert_eq!(frames.frames_submitted(), 10);
    }

    #[test]
    fn throttle_engages_on_slot_reuse() {
        let mut device = MockFrameDevice::new(3);
        let mut frames = orchestrator(3);
        let mut scene = quad_scene();
        let slot0_fence = frames.slots()[0].in_flight;

        for frame in 0..=MAX_FRAMES_IN_FLIGHT {
            let angle = (frame as f32 * 10.0).to_radians();
            scene.update_model(0, Mat4::from_rotation_z(angle));
            scene.update_model(1, Mat4::from_rotation_z(-angle));

            let draws = scene.draw_list(&texture_sets()).unwrap();
            frames.draw(&mut device, &draws, &ViewProjection::default()).unwrap();
        }

        // Third frame reuses slot 0 while its first submission is pending
        assert!(device.pending_waits().contains(&slot0_fence));
        assert_eq!(frames.current_frame(), 1);
    }

    #[test]
    fn steps_run_in_order() {
        let mut device = MockFrameDevice::new(3);
        let mut frames = orchestrator(3);
        let slot = frames.slots()[0];

        frames.draw(&mut device, &[], &ViewProjection::default()).unwrap();

        assert_eq!(
            device.calls(),
            &[
                Call::WaitFence(slot.in_flight),
                Call::Acquire(slot.image_available),
                Call::ResetFence(slot.in_flight),
                Call::Record(slot.command_buffer, 0),
                Call::WriteUniforms(0),
                Call::Submit(FrameSubmission {
                    command_buffer: slot.command_buffer,
                    wait_semaphore: slot.image_available,
                    wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                    signal_semaphore: slot.render_finished,
                    fence: slot.in_flight,
                }),
                Call::Present(0, slot.render_finished),
            ]
        );
    }

    #[test]
    fn uniforms_follow_image_index_not_slot() {
        let mut device = MockFrameDevice::new(3).with_acquire_order(vec![2, 0, 1]);
        let mut frames = orchestrator(3);

        let first = frames.draw(&mut device, &[], &ViewProjection::default()).unwrap();
        let second = frames.draw(&mut device, &[], &ViewProjection::default()).unwrap();

        assert_eq!((first, second), (2, 0));
        assert_eq!(device.uniform_writes(), &[2, 0]);
        assert_eq!(device.presented(), &[2, 0]);
    }

    #[test]
    fn waits_for_image_owned_by_other_slot() {
        // Image 0 comes back while slot 0 is still rendering into it
        let mut device = MockFrameDevice::new(3).with_acquire_order(vec![0, 1, 2, 0]);
        let mut frames = orchestrator(3);
        let slot0_fence = frames.slots()[0].in_flight;
        let slot1_fence = frames.slots()[1].in_flight;

        for _ in 0..3 {
            frames.draw(&mut device, &[], &ViewProjection::default()).unwrap();
        }
        device.clear_calls();

        frames.draw(&mut device, &[], &ViewProjection::default()).unwrap();

        let waits: Vec<vk::Fence> = device
            .calls()
            .iter()
            .filter_map(|call| match call {
                Call::WaitFence(fence) => Some(*fence),
                _ => None,
            })
            .collect();
        assert_eq!(waits, vec![slot1_fence, slot0_fence]);
    }

    #[test]
    fn model_matrix_reaches_push_constants() {
        let mut device = MockFrameDevice::new(3);
        let mut frames = orchestrator(3);
        let mut scene = quad_scene();

        let model = Mat4::from_scale_rotation_translation(
            Vec3::splat(0.5),
            glam::Quat::from_rotation_z(1.25),
            Vec3::new(0.1, -0.2, 0.0),
        );
        scene.update_model(1, model);

        let draws = scene.draw_list(&texture_sets()).unwrap();
        frames.draw(&mut device, &draws, &ViewProjection::default()).unwrap();

        let recorded = device.last_recorded(frames.slots()[0].command_buffer).unwrap();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[1].model, ModelPushConstant::from(model));
        assert_eq!(recorded[0].model, ModelPushConstant::from(Mat4::IDENTITY));
    }

    #[test]
    fn out_of_range_update_is_ignored() {
        let mut device = MockFrameDevice::new(3);
        let mut frames = orchestrator(3);
        let mut scene = quad_scene();
        let kept = Mat4::from_rotation_z(0.3);
        scene.update_model(0, kept);

        scene.update_model(2, Mat4::from_scale(Vec3::splat(9.0)));
        scene.update_model(usize::MAX, Mat4::ZERO);

        let draws = scene.draw_list(&texture_sets()).unwrap();
        frames.draw(&mut device, &draws, &ViewProjection::default()).unwrap();

        let recorded = device.last_recorded(frames.slots()[0].command_buffer).unwrap();
        assert_eq!(recorded[0].model, ModelPushConstant::from(kept));
        assert_eq!(recorded[1].model, ModelPushConstant::from(Mat4::IDENTITY));
    }

    #[test]
    fn failed_acquire_leaves_slot_usable() {
        let mut device = MockFrameDevice::new(3);
        let mut frames = orchestrator(3);
        let slot = frames.slots()[0];

        device.fail_next_acquire();
        assert!(frames.draw(&mut device, &[], &ViewProjection::default()).is_err());
        assert_eq!(frames.current_frame(), 0);
        assert_eq!(frames.frames_submitted(), 0);
        assert!(!device.calls().contains(&Call::ResetFence(slot.in_flight)));

        // Fence is still signaled, so the retry does not block forever
        frames.draw(&mut device, &[], &ViewProjection::default()).unwrap();
        assert_eq!(frames.current_frame(), 1);
    }

    #[test]
    fn rejects_image_index_outside_swapchain() {
        let mut device = MockFrameDevice::new(3).with_acquire_order(vec![5]);
        let mut frames = orchestrator(3);

        assert!(matches!(
            frames.draw(&mut device, &[], &ViewProjection::default()),
            Err(GpuError::InvalidState(_))
        ));
    }

    #[test]
    fn requires_slots_and_images() {
        assert_eq!(orchestrator(3).slot_count(), MAX_FRAMES_IN_FLIGHT);
        assert!(FrameOrchestrator::new(Vec::new(), 3).is_err());
        assert!(FrameOrchestrator::new(frame_slots(2), 0).is_err());
    }
}
