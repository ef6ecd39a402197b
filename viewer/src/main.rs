mod app;
mod input;
mod overlay;
mod ui;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pbr_engine::EngineConfig;
use winit::event_loop::EventLoop;

use app::App;

/// Interactive PBR/IBL scene viewer.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct ViewerArgs {
    /// Equirectangular HDR image used for image based lighting.
    #[arg(long, value_name = "HDR")]
    pub environment: Option<PathBuf>,

    /// glTF model to add to the scene. May be repeated.
    #[arg(long = "model", value_name = "GLTF")]
    pub models: Vec<PathBuf>,

    /// Directory containing pbr.wgsl and skybox.wgsl.
    #[arg(long, value_name = "DIR")]
    pub shader_dir: Option<PathBuf>,

    /// Present without waiting for vertical sync.
    #[arg(long)]
    pub no_vsync: bool,

    /// Do not watch shader files for changes.
    #[arg(long)]
    pub no_hot_reload: bool,
}

impl ViewerArgs {
    pub fn engine_config(&self) -> EngineConfig {
        let defaults = EngineConfig::default();
        EngineConfig {
            environment_hdr: self.environment.clone(),
            shader_dir: self.shader_dir.clone().unwrap_or(defaults.shader_dir.clone()),
            vsync: !self.no_vsync,
            hot_reload: !self.no_hot_reload,
            ..defaults
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = ViewerArgs::parse();
    log::debug!("{:?}", args);

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = App::new(args);
    event_loop.run_app(&mut app).context("Event loop failed")?;
    app.exit_status()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_map_to_engine_defaults() {
        let args = ViewerArgs::parse_from(["pbr-viewer"]);
        assert_eq!(args.engine_config(), EngineConfig::default());
    }

    #[test]
    fn test_flags_map_to_config() {
        let args = ViewerArgs::parse_from([
            "pbr-viewer",
            "--environment",
            "sky.hdr",
            "--model",
            "a.gltf",
            "--model",
            "b.glb",
            "--shader-dir",
            "/tmp/shaders",
            "--no-vsync",
            "--no-hot-reload",
        ]);
        assert_eq!(args.models, vec![PathBuf::from("a.gltf"), PathBuf::from("b.glb")]);

        let config = args.engine_config();
        assert_eq!(config.environment_hdr, Some(PathBuf::from("sky.hdr")));
        assert_eq!(config.shader_dir, PathBuf::from("/tmp/shaders"));
        assert!(!config.vsync);
        assert!(!config.hot_reload);
    }
}
