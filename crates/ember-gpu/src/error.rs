//! GPU error types.

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
///
/// Every variant is fatal at the point it is raised. Callers propagate with
/// `?` up to the application boundary, which logs and exits.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// Instance or logical device creation failed.
    #[error("Device creation failed: {0}")]
    DeviceCreation(String),

    /// No adapter satisfied the queue, extension, feature and surface requirements.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// No memory type matched both the resource mask and the requested properties.
    #[error("No compatible memory type (allowed types {type_bits:#b}, properties {properties:?})")]
    NoCompatibleMemoryType {
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    },

    /// None of the candidate formats support the requested features.
    #[error("No supported format among {0:?}")]
    NoSupportedFormat(Vec<vk::Format>),

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// Shader bytecode could not be read or is not SPIR-V.
    #[error("Shader load failed: {0}")]
    ShaderLoad(String),

    /// Pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// Staging or copying data into device memory failed.
    #[error("Resource upload failed: {0}")]
    ResourceUpload(String),

    /// A texture file was missing or could not be decoded.
    #[error("Texture load failed: {0}")]
    TextureLoad(String),

    /// The engine only knows two image layout transitions.
    #[error("Unsupported image layout transition: {old:?} -> {new:?}")]
    UnsupportedLayoutTransition {
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    },

    /// Resource not found.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
