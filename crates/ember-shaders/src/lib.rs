//! Shaders for the Ember renderer.
//!
//! With the `compile` feature the GLSL sources in `assets/shaders` are
//! compiled by the build script and embedded here. Without it nothing is
//! embedded and the renderer loads `.spv` files from disk.

/// Whether SPIR-V was compiled into this build.
pub const EMBEDDED: bool = cfg!(feature = "compile");

/// Convert byte slice to aligned u32 Vec (SPIR-V requires 4-byte alignment).
#[cfg_attr(not(feature = "compile"), allow(dead_code))]
fn bytes_to_spirv(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(feature = "compile")]
mod embedded {
    use std::sync::OnceLock;

    static VERT_BYTES: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/vert.spv"));
    static FRAG_BYTES: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/frag.spv"));

    static VERT: OnceLock<Vec<u32>> = OnceLock::new();
    static FRAG: OnceLock<Vec<u32>> = OnceLock::new();

    /// Embedded vertex shader.
    pub fn vertex_shader() -> Option<&'static [u32]> {
        Some(VERT.get_or_init(|| super::bytes_to_spirv(VERT_BYTES)))
    }

    /// Embedded fragment shader.
    pub fn fragment_shader() -> Option<&'static [u32]> {
        Some(FRAG.get_or_init(|| super::bytes_to_spirv(FRAG_BYTES)))
    }
}

#[cfg(not(feature = "compile"))]
mod embedded {
    /// No shader was compiled into this build.
    pub fn vertex_shader() -> Option<&'static [u32]> {
        None
    }

    /// No shader was compiled into this build.
    pub fn fragment_shader() -> Option<&'static [u32]> {
        None
    }
}

pub use embedded::{fragment_shader, vertex_shader};
