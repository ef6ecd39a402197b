use std::path::PathBuf;

/// Directory the PBR and skybox shaders are read (and hot reloaded) from.
pub const DEFAULT_SHADER_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/src/shaders");

/// Startup options for the [`Renderer`](crate::Renderer).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Equirectangular HDR environment. Without one, IBL is built from a
    /// uniform grey environment.
    pub environment_hdr: Option<PathBuf>,
    pub shader_dir: PathBuf,
    /// Present with `Fifo` when set, otherwise prefer `Mailbox`/`Immediate`.
    pub vsync: bool,
    pub clear_color: wgpu::Color,
    /// Poll shader files for changes every frame.
    pub hot_reload: bool,
    /// Parameter buffer size in bytes. `None` uses the device maximum.
    pub param_buffer_capacity: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            environment_hdr: None,
            shader_dir: PathBuf::from(DEFAULT_SHADER_DIR),
            vsync: true,
            clear_color: wgpu::Color {
                r: 0.04,
                g: 0.04,
                b: 0.04,
                a: 1.0,
            },
            hot_reload: true,
            param_buffer_capacity: None,
        }
    }
}

impl EngineConfig {
    /// Device limits to request: wgpu defaults, with the limits the engine
    /// sizes resources from raised (or lowered) to what the adapter reports.
    pub fn required_limits(adapter: &wgpu::Limits) -> wgpu::Limits {
        wgpu::Limits {
            max_uniform_buffer_binding_size: adapter.max_uniform_buffer_binding_size,
            max_buffer_size: adapter.max_buffer_size,
            max_texture_dimension_2d: adapter.max_texture_dimension_2d,
            min_uniform_buffer_offset_alignment: adapter.min_uniform_buffer_offset_alignment,
            ..wgpu::Limits::default()
        }
    }

    /// Parameter buffer size for a device, clamped to its uniform binding limit.
    pub fn param_buffer_size(&self, limits: &wgpu::Limits) -> u64 {
        let max = limits.max_uniform_buffer_binding_size as u64;
        match self.param_buffer_capacity {
            Some(requested) if requested > max => {
                log::warn!(
                    "Requested parameter buffer of {} bytes exceeds the device limit, using {}",
                    requested,
                    max
                );
                max
            }
            Some(requested) => requested,
            None => max,
        }
    }

    pub fn present_mode(&self, available: &[wgpu::PresentMode]) -> wgpu::PresentMode {
        let preferred: &[wgpu::PresentMode] = if self.vsync {
            &[wgpu::PresentMode::Fifo]
        } else {
            &[wgpu::PresentMode::Mailbox, wgpu::PresentMode::Immediate]
        };
        preferred
            .iter()
            .copied()
            .find(|mode| available.contains(mode))
            .unwrap_or(wgpu::PresentMode::Fifo)
    }

    pub fn pbr_shader_path(&self) -> PathBuf {
        self.shader_dir.join("pbr.wgsl")
    }

    pub fn skybox_shader_path(&self) -> PathBuf {
        self.shader_dir.join("skybox.wgsl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_uses_device_maximum() {
        let limits = wgpu::Limits::default();
        let config = EngineConfig::default();
        assert_eq!(
            config.param_buffer_size(&limits),
            limits.max_uniform_buffer_binding_size as u64
        );
    }

    #[test]
    fn test_capacity_override_is_clamped() {
        let limits = wgpu::Limits::default();
        let config = EngineConfig {
            param_buffer_capacity: Some(u64::MAX),
            ..Default::default()
        };
        assert_eq!(
            config.param_buffer_size(&limits),
            limits.max_uniform_buffer_binding_size as u64
        );

        let small = EngineConfig {
            param_buffer_capacity: Some(4096),
            ..Default::default()
        };
        assert_eq!(small.param_buffer_size(&limits), 4096);
    }

    #[test]
    fn test_required_limits_follow_adapter() {
        let adapter = wgpu::Limits {
            max_uniform_buffer_binding_size: 1 << 20,
            max_texture_dimension_2d: 16384,
            min_uniform_buffer_offset_alignment: 64,
            ..wgpu::Limits::default()
        };
        let limits = EngineConfig::required_limits(&adapter);
        assert_eq!(limits.max_uniform_buffer_binding_size, 1 << 20);
        assert_eq!(limits.max_texture_dimension_2d, 16384);
        assert_eq!(limits.min_uniform_buffer_offset_alignment, 64);
        assert_eq!(limits.max_bind_groups, wgpu::Limits::default().max_bind_groups);

        let config = EngineConfig::default();
        assert_eq!(config.param_buffer_size(&limits), 1 << 20);
    }

    #[test]
    fn test_required_limits_never_exceed_small_adapter() {
        let adapter = wgpu::Limits {
            max_uniform_buffer_binding_size: 16 << 10,
            max_texture_dimension_2d: 4096,
            ..wgpu::Limits::default()
        };
        let limits = EngineConfig::required_limits(&adapter);
        assert_eq!(limits.max_uniform_buffer_binding_size, 16 << 10);
        assert_eq!(limits.max_texture_dimension_2d, 4096);
    }

    #[test]
    fn test_present_mode_selection() {
        let all = [
            wgpu::PresentMode::Fifo,
            wgpu::PresentMode::Mailbox,
            wgpu::PresentMode::Immediate,
        ];
        let vsync = EngineConfig::default();
        assert_eq!(vsync.present_mode(&all), wgpu::PresentMode::Fifo);

        let no_vsync = EngineConfig {
            vsync: false,
            ..Default::default()
        };
        assert_eq!(no_vsync.present_mode(&all), wgpu::PresentMode::Mailbox);
        assert_eq!(
            no_vsync.present_mode(&[wgpu::PresentMode::Fifo, wgpu::PresentMode::Immediate]),
            wgpu::PresentMode::Immediate
        );
        assert_eq!(no_vsync.present_mode(&[wgpu::PresentMode::Fifo]), wgpu::PresentMode::Fifo);
    }

    #[test]
    fn test_shader_paths_live_in_shader_dir() {
        let config = EngineConfig {
            shader_dir: PathBuf::from("/tmp/shaders"),
            ..Default::default()
        };
        assert_eq!(config.pbr_shader_path(), PathBuf::from("/tmp/shaders/pbr.wgsl"));
        assert_eq!(config.skybox_shader_path(), PathBuf::from("/tmp/shaders/skybox.wgsl"));
    }
}
