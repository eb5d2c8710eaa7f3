//! Drawable objects and their per-object transforms.

use crate::frame::DrawCommand;
use crate::mesh::{GpuMesh, MeshBuffers};
use crate::uniforms::ModelPushConstant;
use ash::vk;
use ember_gpu::{GpuError, Result};
use glam::Mat4;

/// A registered mesh with its transform and texture.
pub struct MeshEntry<M> {
    pub mesh: M,
    pub model: Mat4,
    pub texture_id: usize,
}

/// Fixed-capacity list of drawable meshes, addressed by insertion index.
pub struct MeshRegistry<M = GpuMesh> {
    entries: Vec<MeshEntry<M>>,
    capacity: usize,
}

impl<M: MeshBuffers> MeshRegistry<M> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Register a mesh with an identity transform. Returns its index.
    pub fn add(&mut self, mesh: M, texture_id: usize) -> Result<usize> {
        if self.is_full() {
            return Err(GpuError::InvalidState(format!(
                "Mesh registry is full ({} objects)",
                self.capacity
            )));
        }

        self.entries.push(MeshEntry {
            mesh,
            model: Mat4::IDENTITY,
            texture_id,
        });
        Ok(self.entries.len() - 1)
    }

    /// Replace the model matrix of a mesh.
    ///
    /// Indices past the end are ignored.
    pub fn update_model(&mut self, index: usize, model: Mat4) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.model = model;
        }
    }

    pub fn model(&self, index: usize) -> Option<Mat4> {
        self.entries.get(index).map(|entry| entry.model)
    }

    pub fn get(&self, index: usize) -> Option<&MeshEntry<M>> {
        self.entries.get(index)
    }

    /// Draw commands in registration order.
    ///
    /// `texture_sets[id]` is the descriptor set for texture `id`.
    pub fn draw_list(&self, texture_sets: &[vk::DescriptorSet]) -> Result<Vec<DrawCommand>> {
        self.entries
            .iter()
            .map(|entry| {
                let texture_set = texture_sets.get(entry.texture_id).copied().ok_or_else(|| {
                    GpuError::ResourceNotFound(format!("Texture {}", entry.texture_id))
                })?;

                Ok(DrawCommand {
                    vertex_buffer: entry.mesh.vertex_buffer(),
                    index_buffer: entry.mesh.index_buffer(),
                    vertex_count: entry.mesh.vertex_count(),
                    index_count: entry.mesh.index_count(),
                    model: ModelPushConstant::from(entry.model),
                    texture_set,
                })
            })
            .collect()
    }
}
