//! Ember Demo Viewer
//!
//! Draws two colored quads spinning in opposite directions around the view axis.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p ember-viewer -- [TEXTURE]
//! cargo run -p ember-viewer --features compile-shaders -- [TEXTURE]
//! ```
//!
//! `TEXTURE` is an optional image file applied to both quads. Without it the
//! quads show their vertex colors.
//!
//! Shaders are read from `assets/shaders/vert.spv` and `assets/shaders/frag.spv`
//! relative to the working directory. Build with `--features compile-shaders`
//! to compile the GLSL sources with shaderc and embed them instead.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;

use ember_app::{run_app, AppConfig, RendererConfig};

use crate::app::Viewer;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    run_app::<Viewer>(
        AppConfig::new("Ember Viewer")
            .with_size(WIDTH, HEIGHT)
            .with_renderer(renderer_config()),
    )
}

#[cfg(feature = "compile-shaders")]
fn renderer_config() -> RendererConfig {
    let mut config = RendererConfig::default();
    if let (Some(vert), Some(frag)) = (
        ember_shaders::vertex_shader(),
        ember_shaders::fragment_shader(),
    ) {
        config.vertex_shader = vert.to_vec().into();
        config.fragment_shader = frag.to_vec().into();
    }
    config
}

#[cfg(not(feature = "compile-shaders"))]
fn renderer_config() -> RendererConfig {
    RendererConfig::default()
}

fn print_help() {
    eprintln!(
        "Ember Demo Viewer

USAGE:
    cargo run -p ember-viewer -- [TEXTURE]
    cargo run -p ember-viewer --features compile-shaders -- [TEXTURE]

ARGS:
    [TEXTURE]               Image file sampled by both quads (PNG, JPEG, ...)

OPTIONS:
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}
