//! Two spinning quads.

use ember_app::{RenderApp, Renderer, Vertex};
use ember_render::DEFAULT_TEXTURE;
use glam::Mat4;
use tracing::info;

/// Rotation speed of the first quad in degrees per second.
pub const SPIN_DEGREES_PER_SECOND: f32 = 10.0;

/// The second quad spins this many times faster, in the opposite direction.
pub const SECOND_QUAD_FACTOR: f32 = -100.0;

pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

pub const LEFT_QUAD: [Vertex; 4] = [
    Vertex::new([-0.1, -0.4, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0]),
    Vertex::new([-0.1, 0.4, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0]),
    Vertex::new([-0.9, 0.4, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
    Vertex::new([-0.9, -0.4, 0.0], [0.0, 1.0, 0.0], [0.0, 1.0]),
];

pub const RIGHT_QUAD: [Vertex; 4] = [
    Vertex::new([0.9, -0.4, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0]),
    Vertex::new([0.9, 0.4, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0]),
    Vertex::new([0.1, 0.4, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
    Vertex::new([0.1, -0.4, 0.0], [0.0, 1.0, 0.0], [0.0, 1.0]),
];

/// Accumulated rotation in degrees, kept within one turn.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Spin {
    angle: f32,
}

impl Spin {
    pub fn advance(&mut self, dt: f32) {
        self.angle += SPIN_DEGREES_PER_SECOND * dt;
        if self.angle > 360.0 {
            self.angle -= 360.0;
        }
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Model matrices for the two quads.
    pub fn models(&self) -> [Mat4; 2] {
        [
            Mat4::from_rotation_z(self.angle.to_radians()),
            Mat4::from_rotation_z((self.angle * SECOND_QUAD_FACTOR).to_radians()),
        ]
    }
}

/// Texture path from the first positional argument.
pub fn texture_from_args(args: impl IntoIterator<Item = String>) -> Option<String> {
    args.into_iter().skip(1).find(|arg| !arg.starts_with('-'))
}

pub struct Viewer {
    spin: Spin,
    quads: [usize; 2],
}

impl RenderApp for Viewer {
    fn init(renderer: &mut Renderer) -> anyhow::Result<Self> {
        let texture = match texture_from_args(std::env::args()) {
            Some(path) => renderer.create_texture(&path)?,
            None => DEFAULT_TEXTURE,
        };

        let quads = [
            renderer.add_mesh(&LEFT_QUAD, &QUAD_INDICES, texture)?,
            renderer.add_mesh(&RIGHT_QUAD, &QUAD_INDICES, texture)?,
        ];
        info!(
            "Scene: {} meshes, {} textures, quads use texture {}",
            renderer.mesh_count(),
            renderer.texture_count(),
            texture
        );

        Ok(Self {
            spin: Spin::default(),
            quads,
        })
    }

    fn update(&mut self, renderer: &mut Renderer, dt: f32) {
        self.spin.advance(dt);
        for (&quad, model) in self.quads.iter().zip(self.spin.models()) {
            renderer.update_model(quad, model);
        }
    }
}
