//! Device-local mesh geometry.

use crate::vertex::Vertex;
use ash::vk;
use ember_gpu::{GpuBuffer, Result, TransferContext};

/// Buffer handles and counts needed to draw a mesh.
pub trait MeshBuffers {
    fn vertex_buffer(&self) -> vk::Buffer;

    /// `None` for meshes drawn without indices.
    fn index_buffer(&self) -> Option<vk::Buffer>;

    fn vertex_count(&self) -> u32;

    fn index_count(&self) -> u32;
}

/// Vertex buffer and optional index buffer in device-local memory.
pub struct GpuMesh {
    vertex_buffer: GpuBuffer,
    index_buffer: Option<GpuBuffer>,
    vertex_count: u32,
    index_count: u32,
}

impl GpuMesh {
    /// Stage vertices and indices into device-local buffers.
    ///
    /// An empty index slice produces a non-indexed mesh.
    pub fn upload(transfer: &TransferContext, vertices: &[Vertex], indices: &[u32]) -> Result<Self> {
        let vertex_buffer = transfer.upload_buffer(vertices, vk::BufferUsageFlags::VERTEX_BUFFER)?;

        let index_buffer = if indices.is_empty() {
            None
        } else {
            Some(transfer.upload_buffer(indices, vk::BufferUsageFlags::INDEX_BUFFER)?)
        };

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_count: vertices.len() as u32,
            index_count: indices.len() as u32,
        })
    }
}

impl MeshBuffers for GpuMesh {
    fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.handle()
    }

    fn index_buffer(&self) -> Option<vk::Buffer> {
        self.index_buffer.as_ref().map(GpuBuffer::handle)
    }

    fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    fn index_count(&self) -> u32 {
        self.index_count
    }
}
