//! Recording fakes for GPU-free tests.

use crate::frame::{DrawCommand, FrameDevice, FrameSlot, FrameSubmission};
use crate::mesh::MeshBuffers;
use crate::uniforms::ViewProjection;
use ash::vk::{self, Handle};
use ember_gpu::{GpuError, Result};
use std::collections::{HashMap, HashSet, VecDeque};

/// Frame slots with distinct fake handles.
pub fn frame_slots(count: usize) -> Vec<FrameSlot> {
    (0..count as u64)
        .map(|i| FrameSlot {
            image_available: vk::Semaphore::from_raw(0x100 + i),
            render_finished: vk::Semaphore::from_raw(0x200 + i),
            in_flight: vk::Fence::from_raw(0x300 + i),
            command_buffer: vk::CommandBuffer::from_raw(0x400 + i),
        })
        .collect()
}

/// Mesh backed by fake buffer handles.
#[derive(Debug, Clone, Copy)]
pub struct FakeMesh {
    vertex_buffer: vk::Buffer,
    index_buffer: Option<vk::Buffer>,
    vertex_count: u32,
    index_count: u32,
}

impl FakeMesh {
    /// Four vertices and six indices.
    pub fn quad(id: u64) -> Self {
        Self {
            vertex_buffer: vk::Buffer::from_raw(id << 4),
            index_buffer: Some(vk::Buffer::from_raw((id << 4) | 1)),
            vertex_count: 4,
            index_count: 6,
        }
    }

    pub fn non_indexed(id: u64, vertex_count: u32) -> Self {
        Self {
            vertex_buffer: vk::Buffer::from_raw(id << 4),
            index_buffer: None,
            vertex_count,
            index_count: 0,
        }
    }
}

impl MeshBuffers for FakeMesh {
    fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer
    }

    fn index_buffer(&self) -> Option<vk::Buffer> {
        self.index_buffer
    }

    fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Observable device calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    WaitFence(vk::Fence),
    ResetFence(vk::Fence),
    Acquire(vk::Semaphore),
    Record(vk::CommandBuffer, u32),
    WriteUniforms(u32),
    Submit(FrameSubmission),
    Present(u32, vk::Semaphore),
}

/// Simulated device where a submission completes when its fence is waited on.
///
/// Misuse that would be undefined on a real device is reported as an error:
/// resetting or resubmitting a pending fence, waiting on a fence nothing will
/// signal, and re-recording a command buffer that is still executing.
#[derive(Debug, Default)]
pub struct MockFrameDevice {
    image_count: u32,
    next_image: u32,
    acquire_order: Option<VecDeque<u32>>,
    fail_next_acquire: bool,
    unsignaled: HashSet<vk::Fence>,
    pending: HashSet<vk::Fence>,
    max_in_flight: usize,
    pending_waits: Vec<vk::Fence>,
    busy_command_buffers: HashMap<vk::CommandBuffer, vk::Fence>,
    recorded: HashMap<vk::CommandBuffer, Vec<DrawCommand>>,
    uniform_writes: Vec<u32>,
    presented: Vec<u32>,
    calls: Vec<Call>,
}

impl MockFrameDevice {
    /// Device whose swapchain hands out images round-robin.
    pub fn new(image_count: u32) -> Self {
        Self {
            image_count,
            ..Self::default()
        }
    }

    /// Hand out images in a fixed order instead.
    pub fn with_acquire_order(mut self, order: Vec<u32>) -> Self {
        self.acquire_order = Some(order.into());
        self
    }

    pub fn fail_next_acquire(&mut self) {
        self.fail_next_acquire = true;
    }

    /// Submissions not yet observed complete.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Fences that were waited on while their submission was still pending.
    pub fn pending_waits(&self) -> &[vk::Fence] {
        &self.pending_waits
    }

    pub fn last_recorded(&self, command_buffer: vk::CommandBuffer) -> Option<&[DrawCommand]> {
        self.recorded.get(&command_buffer).map(Vec::as_slice)
    }

    pub fn uniform_writes(&self) -> &[u32] {
        &self.uniform_writes
    }

    pub fn presented(&self) -> &[u32] {
        &self.presented
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn misuse(msg: impl Into<String>) -> GpuError {
        GpuError::InvalidState(msg.into())
    }
}

impl FrameDevice for MockFrameDevice {
    fn wait_for_fence(&mut self, fence: vk::Fence) -> Result<()> {
        self.calls.push(Call::WaitFence(fence));

        if self.pending.remove(&fence) {
            self.pending_waits.push(fence);
            self.unsignaled.remove(&fence);
            self.busy_command_buffers.retain(|_, f| *f != fence);
            Ok(())
        } else if self.unsignaled.contains(&fence) {
            Err(Self::misuse("Wait on an unsignaled fence with no pending work"))
        } else {
            Ok(())
        }
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> Result<()> {
        self.calls.push(Call::ResetFence(fence));

        if self.pending.contains(&fence) {
            return Err(Self::misuse("Reset of a fence still in flight"));
        }
        self.unsignaled.insert(fence);
        Ok(())
    }

    fn acquire_next_image(&mut self, semaphore: vk::Semaphore) -> Result<u32> {
        self.calls.push(Call::Acquire(semaphore));

        if std::mem::take(&mut self.fail_next_acquire) {
            return Err(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DATE_KHR));
        }

        let index = match self.acquire_order.as_mut() {
            Some(order) => order
                .pop_front()
                .ok_or_else(|| Self::misuse("Acquire order exhausted"))?,
            None => {
                let index = self.next_image;
                self.next_image = (self.next_image + 1) % self.image_count.max(1);
                index
            }
        };
        Ok(index)
    }

    fn record(
        &mut self,
        command_buffer: vk::CommandBuffer,
        image_index: u32,
        draws: &[DrawCommand],
    ) -> Result<()> {
        self.calls.push(Call::Record(command_buffer, image_index));

        if self.busy_command_buffers.contains_key(&command_buffer) {
            return Err(Self::misuse("Recording a command buffer still executing"));
        }
        self.recorded.insert(command_buffer, draws.to_vec());
        Ok(())
    }

    fn write_view_projection(&mut self, image_index: u32, _uniforms: &ViewProjection) -> Result<()> {
        self.calls.push(Call::WriteUniforms(image_index));
        self.uniform_writes.push(image_index);
        Ok(())
    }

    fn submit(&mut self, submission: &FrameSubmission) -> Result<()> {
        self.calls.push(Call::Submit(*submission));

        if self.pending.contains(&submission.fence) {
            return Err(Self::misuse("Submit with a fence already in flight"));
        }
        if !self.unsignaled.contains(&submission.fence) {
            return Err(Self::misuse("Submit with a signaled fence"));
        }

        self.pending.insert(submission.fence);
        self.busy_command_buffers
            .insert(submission.command_buffer, submission.fence);
        self.max_in_flight = self.max_in_flight.max(self.pending.len());
        Ok(())
    }

    fn present(&mut self, image_index: u32, wait_semaphore: vk::Semaphore) -> Result<()> {
        self.calls.push(Call::Present(image_index, wait_semaphore));
        self.presented.push(image_index);
        Ok(())
    }
}
