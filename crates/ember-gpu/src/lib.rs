//! Explicit Vulkan layer for the Ember renderer.
//!
//! This crate provides:
//! - Vulkan instance, surface and device creation with first-fit adapter selection
//! - Memory-type selection and owned buffers and images
//! - Staged uploads with explicit layout transitions
//! - Swapchain, render pass, framebuffer and pipeline creation
//! - Frame synchronization primitives
//!
//! Every resource type holds a clone of the logical device and releases its
//! handles on drop. Owners must drop them before the [`GpuContext`].

pub mod capabilities;
pub mod command;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod image;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod render_pass;
pub mod swapchain;
pub mod sync;
pub mod transfer;

pub use capabilities::{DeviceCandidate, DeviceRequirements, GpuVendor, QueueFamilyIndices};
pub use command::{execute_single_time_commands, CommandPool};
pub use context::{GpuContext, GpuContextBuilder, SurfaceSupport};
pub use descriptors::{
    write_combined_image_sampler, write_uniform_buffer, DescriptorPool, DescriptorSetLayout,
    DescriptorSetLayoutBuilder,
};
pub use error::{GpuError, Result};
pub use image::{find_depth_format, GpuImage, Sampler};
pub use memory::{find_memory_type_index, GpuBuffer};
pub use pipeline::{load_spirv, GraphicsPipeline, GraphicsPipelineConfig, ShaderSource};
pub use render_pass::{Framebuffers, RenderPass};
pub use swapchain::Swapchain;
pub use sync::FrameSync;
pub use transfer::{LayoutTransition, TransferContext};

pub use ash;
pub use ash::vk;
