//! Frame orchestration and scene resources for the Ember renderer.
//!
//! This crate provides:
//! - The per-frame acquire, record, submit and present cycle
//! - Vertex layout, view-projection uniforms and model push constants
//! - Staged mesh and texture uploads with fixed-capacity registries
//! - A perspective camera
//! - [`Renderer`], which owns every GPU object for one window

pub mod backend;
pub mod camera;
pub mod frame;
pub mod mesh;
pub mod registry;
pub mod renderer;
pub mod texture;
pub mod uniforms;
pub mod vertex;

#[cfg(test)]
mod testing;

pub use camera::Camera;
pub use frame::{DrawCommand, FrameDevice, FrameOrchestrator, FrameSlot, MAX_FRAMES_IN_FLIGHT};
pub use mesh::{GpuMesh, MeshBuffers};
pub use registry::MeshRegistry;
pub use renderer::{Renderer, RendererConfig, DEFAULT_TEXTURE};
pub use texture::{TexturePixels, TextureRegistry};
pub use uniforms::{ModelPushConstant, ViewProjection};
pub use vertex::Vertex;
