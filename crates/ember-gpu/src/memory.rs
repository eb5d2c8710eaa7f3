//! Device memory selection and buffers.

use crate::error::{GpuError, Result};
use ash::vk;
use std::sync::Arc;

/// Find the first memory type allowed by `type_bits` whose flags contain `properties`.
pub fn find_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    properties: vk::MemoryPropertyFlags,
) -> Result<u32> {
    memory_properties.memory_types[..memory_properties.memory_type_count as usize]
        .iter()
        .enumerate()
        .find(|(index, memory_type)| {
            type_bits & (1 << index) != 0 && memory_type.property_flags.contains(properties)
        })
        .map(|(index, _)| index as u32)
        .ok_or(GpuError::NoCompatibleMemoryType {
            type_bits,
            properties,
        })
}

/// Allocate device memory for the given requirements.
///
/// # Safety
/// The device must be valid.
pub unsafe fn allocate_memory(
    device: &ash::Device,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    requirements: vk::MemoryRequirements,
    properties: vk::MemoryPropertyFlags,
) -> Result<vk::DeviceMemory> {
    let memory_type_index =
        find_memory_type_index(memory_properties, requirements.memory_type_bits, properties)?;

    let allocate_info = vk::MemoryAllocateInfo::default()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    let memory = unsafe { device.allocate_memory(&allocate_info, None)? };
    Ok(memory)
}

/// Buffer and the memory bound to it.
///
/// Both are released together on drop.
pub struct GpuBuffer {
    device: Arc<ash::Device>,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    properties: vk::MemoryPropertyFlags,
}

impl GpuBuffer {
    /// Create a buffer with exclusive sharing and bind fresh memory to it.
    pub fn new(
        device: Arc<ash::Device>,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<Self> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None)? };

        // From here on `Drop` owns cleanup, including a null memory handle
        let mut this = Self {
            device,
            buffer,
            memory: vk::DeviceMemory::null(),
            size,
            properties,
        };

        let requirements = unsafe { this.device.get_buffer_memory_requirements(buffer) };
        this.memory =
            unsafe { allocate_memory(&this.device, memory_properties, requirements, properties)? };
        unsafe { this.device.bind_buffer_memory(buffer, this.memory, 0)? };

        Ok(this)
    }

    /// Get the buffer handle.
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Size in bytes requested at creation.
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Whether the CPU can map this buffer.
    pub fn is_host_visible(&self) -> bool {
        self.properties
            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
    }

    /// Copy data into the buffer through a temporary mapping.
    ///
    /// No flush is issued; the buffer must be host-coherent.
    pub fn write<T: bytemuck::Pod>(&self, data: &[T]) -> Result<()> {
        self.write_bytes(bytemuck::cast_slice(data))
    }

    /// Copy raw bytes into the start of the buffer.
    pub fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        if !self.is_host_visible() {
            return Err(GpuError::InvalidState(
                "Buffer is not host-visible".to_string(),
            ));
        }

        if bytes.len() as vk::DeviceSize > self.size {
            return Err(GpuError::ResourceUpload(format!(
                "Write of {} bytes exceeds buffer size {}",
                bytes.len(),
                self.size
            )));
        }

        unsafe {
            let ptr = self.device.map_memory(
                self.memory,
                0,
                bytes.len() as vk::DeviceSize,
                vk::MemoryMapFlags::empty(),
            )?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.cast::<u8>(), bytes.len());
            self.device.unmap_memory(self.memory);
        }

        Ok(())
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            if self.memory != vk::DeviceMemory::null() {
                self.device.free_memory(self.memory, None);
            }
        }
    }
}
