//! Camera and view management.

use crate::uniforms::ViewProjection;
use glam::{Mat4, Vec3};

/// Perspective camera looking at a fixed target.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 2.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: 45.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Camera {
    /// Set the camera position.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Look at a target position.
    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    /// Set the aspect ratio from a pixel size.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Projection with depth in [0, 1] and Y pointing down in clip space.
    pub fn projection_matrix(&self) -> Mat4 {
        let mut projection = Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far);
        projection.y_axis.y *= -1.0;
        projection
    }

    /// Matrices for the view-projection uniform.
    pub fn view_projection(&self) -> ViewProjection {
        ViewProjection::new(self.projection_matrix(), self.view_matrix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn clip(camera: &Camera, point: Vec3) -> Vec3 {
        let clip = camera.projection_matrix() * camera.view_matrix() * point.extend(1.0);
        clip.truncate() / clip.w
    }

    #[test]
    fn origin_projects_to_center() {
        let camera = Camera::default();
        let ndc = clip(&camera, Vec3::ZERO);
        assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(ndc.y, 0.0, epsilon = 1e-6);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn up_in_world_is_negative_clip_y() {
        let camera = Camera::default();
        let ndc = clip(&camera, Vec3::new(0.0, 0.5, 0.0));
        assert!(ndc.y < 0.0);
    }

    #[test]
    fn depth_range_is_zero_to_one() {
        let camera = Camera::default();
        let near = clip(&camera, Vec3::new(0.0, 0.0, 2.0 - camera.near));
        let far = clip(&camera, Vec3::new(0.0, 0.0, 2.0 - camera.far));
        assert_relative_eq!(near.z, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn moved_camera_centers_its_target() {
        let mut camera = Camera::default();
        camera.set_position(Vec3::new(3.0, 1.0, 4.0));
        camera.look_at(Vec3::new(3.0, 1.0, 0.0));

        let ndc = clip(&camera, Vec3::new(3.0, 1.0, 0.0));
        assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(ndc.y, 0.0, epsilon = 1e-6);

        // The old target is now off to the left
        assert!(clip(&camera, Vec3::ZERO).x < 0.0);
    }

    #[test]
    fn viewport_sets_aspect() {
        let mut camera = Camera::default();
        camera.set_viewport(800, 400);
        assert_relative_eq!(camera.aspect, 2.0);

        camera.set_viewport(800, 0);
        assert_relative_eq!(camera.aspect, 2.0);
    }

    #[test]
    fn uniform_carries_both_matrices() {
        let camera = Camera::default();
        let vp = camera.view_projection();
        assert_eq!(Mat4::from_cols_array_2d(&vp.view), camera.view_matrix());
        assert_eq!(
            Mat4::from_cols_array_2d(&vp.projection),
            camera.projection_matrix()
        );
        assert!(Mat4::from_cols_array_2d(&vp.projection).y_axis.y < 0.0);
    }
}
