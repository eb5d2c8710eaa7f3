//! `RenderApp` trait definition.

use ember_render::Renderer;
use winit::event::WindowEvent;

/// Trait for Ember applications.
///
/// The framework creates the window and the [`Renderer`], then calls
/// [`update`](RenderApp::update) before drawing every frame.
pub trait RenderApp: Sized {
    /// Initialize the application.
    ///
    /// Called once after the renderer exists. Upload meshes and textures here.
    fn init(renderer: &mut Renderer) -> anyhow::Result<Self>;

    /// Update application state.
    ///
    /// # Arguments
    /// * `renderer` - Renderer whose objects and camera may be changed
    /// * `dt` - Delta time in seconds since last frame
    fn update(&mut self, renderer: &mut Renderer, dt: f32);

    /// Handle window events.
    ///
    /// Return `true` if the event was handled and should not be processed
    /// further. Default implementation returns `false`.
    #[allow(unused_variables)]
    fn on_event(&mut self, event: &WindowEvent) -> bool {
        false
    }
}
