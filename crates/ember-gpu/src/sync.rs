//! Synchronization primitives.

use crate::error::Result;
use ash::vk;
use std::sync::Arc;

/// Create a semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    let semaphore = unsafe { device.create_semaphore(&create_info, None)? };
    Ok(semaphore)
}

/// Create a fence.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    let fence = unsafe { device.create_fence(&create_info, None)? };
    Ok(fence)
}

/// Wait for a fence to be signaled.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn wait_for_fence(device: &ash::Device, fence: vk::Fence, timeout_ns: u64) -> Result<()> {
    unsafe { device.wait_for_fences(&[fence], true, timeout_ns)? };
    Ok(())
}

/// Reset a fence to unsignaled state.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn reset_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    unsafe { device.reset_fences(&[fence])? };
    Ok(())
}

/// Synchronization objects for one frame slot.
pub struct FrameSync {
    device: Arc<ash::Device>,
    /// Semaphore signaled when image is available
    pub image_available: vk::Semaphore,
    /// Semaphore signaled when rendering is complete
    pub render_finished: vk::Semaphore,
    /// Fence to wait for frame completion, created signaled
    pub in_flight: vk::Fence,
}

impl FrameSync {
    /// Create frame synchronization resources.
    pub fn new(device: Arc<ash::Device>) -> Result<Self> {
        let mut this = Self {
            device,
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight: vk::Fence::null(),
        };

        unsafe {
            this.image_available = create_semaphore(&this.device)?;
            this.render_finished = create_semaphore(&this.device)?;
            this.in_flight = create_fence(&this.device, true)?;
        }

        Ok(this)
    }

    /// Create `count` frame slots.
    pub fn create_slots(device: &Arc<ash::Device>, count: usize) -> Result<Vec<Self>> {
        (0..count).map(|_| Self::new(device.clone())).collect()
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        // Destroying null handles is a no-op
        unsafe {
            self.device.destroy_semaphore(self.image_available, None);
            self.device.destroy_semaphore(self.render_finished, None);
            self.device.destroy_fence(self.in_flight, None);
        }
    }
}
