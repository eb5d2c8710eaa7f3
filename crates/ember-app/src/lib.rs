//! Application framework for the Ember renderer.
//!
//! This crate handles the boilerplate around a [`Renderer`]:
//! - Logging initialization
//! - Window creation
//! - Renderer construction and ordered teardown
//! - Event loop handling
//!
//! # Example
//!
//! ```no_run
//! use ember_app::{run_app, AppConfig, RenderApp, Renderer};
//!
//! struct MyApp;
//!
//! impl RenderApp for MyApp {
//!     fn init(renderer: &mut Renderer) -> anyhow::Result<Self> {
//!         Ok(MyApp)
//!     }
//!
//!     fn update(&mut self, renderer: &mut Renderer, dt: f32) {}
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app::<MyApp>(AppConfig::default())
//! }
//! ```

mod app;
mod runner;

pub use app::RenderApp;
pub use runner::{init_logging, run_app, AppConfig};

// Re-export commonly used types for convenience
pub use ember_gpu::{GpuError, ShaderSource};
pub use ember_render::{Camera, Renderer, RendererConfig, Vertex};
pub use winit::event::WindowEvent;
