//! Application runner and event loop.

use std::sync::Arc;
use std::time::Instant;

use ember_render::{Renderer, RendererConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::app::RenderApp;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window title, also used as the Vulkan application name.
    pub title: String,
    /// Window width.
    pub width: u32,
    /// Window height.
    pub height: u32,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Renderer settings.
    pub renderer: RendererConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Ember".to_string(),
            width: 800,
            height: 600,
            validation: cfg!(debug_assertions),
            renderer: RendererConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Replace the renderer settings.
    pub fn with_renderer(mut self, renderer: RendererConfig) -> Self {
        self.renderer = renderer;
        self
    }

    /// Renderer settings with the window title and validation applied.
    pub fn renderer_config(&self) -> RendererConfig {
        RendererConfig {
            app_name: self.title.clone(),
            validation: self.validation,
            ..self.renderer.clone()
        }
    }
}

/// Install the global `tracing` subscriber: `RUST_LOG` if set, otherwise `info`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Keep a subscriber the host already installed
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Run a [`RenderApp`] with the given configuration.
///
/// Initializes logging, creates the window and renderer, and runs the event
/// loop until the window closes. Returns the first fatal error.
pub fn run_app<A: RenderApp + 'static>(config: AppConfig) -> anyhow::Result<()> {
    init_logging();

    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner::<A> {
        config,
        state: None,
        error: None,
    };

    event_loop.run_app(&mut runner)?;

    match runner.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Internal application runner that implements winit's ApplicationHandler.
struct AppRunner<A: RenderApp> {
    config: AppConfig,
    state: Option<AppState<A>>,
    error: Option<anyhow::Error>,
}

/// Internal application state.
///
/// Fields drop in order: the renderer releases the surface before the
/// window goes away.
struct AppState<A: RenderApp> {
    app: A,
    renderer: Renderer,
    window: Arc<Window>,
    last_frame_time: Instant,
    frame_count: u64,
}

impl<A: RenderApp + 'static> ApplicationHandler for AppRunner<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        info!("Creating application state...");

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready!");
            }
            Err(e) => self.fail(event_loop, e.context("Failed to initialize application")),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Some(state) = &mut self.state {
            if state.app.on_event(&event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                if let Some(state) = self.state.take() {
                    state.shutdown();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                let Some(state) = &mut self.state else {
                    return;
                };
                match state.render_frame() {
                    Ok(()) => state.window.request_redraw(),
                    Err(e) => self.fail(event_loop, e.context("Render error")),
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}

impl<A: RenderApp + 'static> AppRunner<A> {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState<A>> {
        // The swapchain is never recreated
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let size = window.inner_size();

        let mut renderer = Renderer::new(
            window.as_ref(),
            size.width,
            size.height,
            self.config.renderer_config(),
        )?;

        let app = A::init(&mut renderer)?;

        Ok(AppState {
            app,
            renderer,
            window,
            last_frame_time: Instant::now(),
            frame_count: 0,
        })
    }

    /// Record a fatal error, tear down and leave the event loop.
    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        error!("{e:#}");
        if let Some(state) = self.state.take() {
            state.shutdown();
        }
        self.error.get_or_insert(e);
        event_loop.exit();
    }
}

impl<A: RenderApp> AppState<A> {
    fn render_frame(&mut self) -> anyhow::Result<()> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;

        self.app.update(&mut self.renderer, dt);
        self.renderer.draw()?;

        self.frame_count += 1;
        tracing::trace!("Frame {} drawn in {:.3} ms", self.frame_count, dt * 1000.0);
        Ok(())
    }

    fn shutdown(self) {
        if let Err(e) = self.renderer.wait_idle() {
            error!("Failed to wait for device idle: {e}");
        }
        info!("Shutting down after {} frames", self.frame_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let config = AppConfig::new("Quads")
            .with_size(1024, 768)
            .with_validation(false);
        assert_eq!(config.title, "Quads");
        assert_eq!((config.width, config.height), (1024, 768));
        assert!(!config.validation);
    }

    #[test]
    fn renderer_config_takes_title_and_validation() {
        let config = AppConfig::new("Quads")
            .with_validation(true)
            .with_renderer(RendererConfig {
                max_objects: 4,
                validation: false,
                ..RendererConfig::default()
            });

        let renderer = config.renderer_config();
        assert_eq!(renderer.app_name, "Quads");
        assert!(renderer.validation);
        assert_eq!(renderer.max_objects, 4);
    }
}
