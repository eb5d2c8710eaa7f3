//! GPU-visible uniform and push-constant blocks.

use ash::vk;
use glam::Mat4;

/// View-projection uniform, one copy per swapchain image.
///
/// Field order matches the shader block: projection first.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ViewProjection {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
}

impl ViewProjection {
    pub fn new(projection: Mat4, view: Mat4) -> Self {
        Self {
            projection: projection.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
        }
    }

    /// Size of the uniform buffer backing one copy.
    pub const SIZE: vk::DeviceSize = std::mem::size_of::<Self>() as vk::DeviceSize;
}

impl Default for ViewProjection {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY)
    }
}

/// Per-draw model matrix pushed to the vertex stage.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelPushConstant {
    pub model: [[f32; 4]; 4],
}

impl ModelPushConstant {
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;

    /// Push-constant range declared in the pipeline layout.
    pub fn range() -> vk::PushConstantRange {
        vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::VERTEX)
            .offset(0)
            .size(Self::SIZE)
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.model)
    }
}

impl From<Mat4> for ModelPushConstant {
    fn from(model: Mat4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_sizes() {
        assert_eq!(ViewProjection::SIZE, 128);
        assert_eq!(ModelPushConstant::SIZE, 64);
        assert_eq!(ModelPushConstant::range().size, 64);
        assert_eq!(
            ModelPushConstant::range().stage_flags,
            vk::ShaderStageFlags::VERTEX
        );
    }

    #[test]
    fn push_constant_bytes_are_column_major() {
        let model = Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0));
        let push = ModelPushConstant::from(model);
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&push));

        assert_eq!(floats.len(), 16);
        assert_eq!(&floats[12..15], &[1.0, 2.0, 3.0]);
        assert_eq!(push.matrix(), model);
    }
}
