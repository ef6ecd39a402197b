//! WGSL programs loaded from disk, with vertex input reflection and hot reload.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{anyhow, Context, Result};

use crate::gpu;

/// A vertex stage input: shader location plus number of `f32` components.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ShaderInput {
    pub location: u32,
    pub components: u32,
}

/// Lists the `@location` inputs of a vertex entry point, sorted by location.
///
/// Inputs may be plain arguments or members of a struct argument; builtins
/// are skipped.
pub fn reflect_vertex_inputs(source: &str, entry_point: &str) -> Result<Vec<ShaderInput>> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| anyhow!(e.emit_to_string(source)))?;
    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga::ShaderStage::Vertex && ep.name == entry_point)
        .ok_or_else(|| anyhow!("No vertex entry point named '{}'", entry_point))?;

    let mut inputs = Vec::new();
    for argument in &entry.function.arguments {
        let inner = &module.types[argument.ty].inner;
        match (&argument.binding, inner) {
            (Some(naga::Binding::Location { location, .. }), inner) => inputs.push(ShaderInput {
                location: *location,
                components: component_count(inner),
            }),
            (None, naga::TypeInner::Struct { members, .. }) => {
                for member in members {
                    if let Some(naga::Binding::Location { location, .. }) = &member.binding {
                        inputs.push(ShaderInput {
                            location: *location,
                            components: component_count(&module.types[member.ty].inner),
                        });
                    }
                }
            }
            _ => {}
        }
    }
    inputs.sort_by_key(|input| input.location);
    Ok(inputs)
}

fn component_count(inner: &naga::TypeInner) -> u32 {
    match inner {
        naga::TypeInner::Scalar(_) => 1,
        naga::TypeInner::Vector { size, .. } => *size as u32,
        _ => 0,
    }
}

/// A compiled shader module tied to its source file.
///
/// `generation` starts at 0 and increases with every successful reload, so
/// anything derived from the module can tell whether it is stale.
pub struct ShaderProgram {
    path: PathBuf,
    module: wgpu::ShaderModule,
    inputs: Vec<ShaderInput>,
    generation: u64,
    modified: Option<SystemTime>,
}

impl ShaderProgram {
    pub fn load(device: &wgpu::Device, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let modified = modified_time(&path);
        let (module, inputs) = compile(device, &path)?;
        log::info!("Loaded shader {} ({} vertex inputs)", path.display(), inputs.len());
        Ok(Self {
            path,
            module,
            inputs,
            generation: 0,
            modified,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn module(&self) -> &wgpu::ShaderModule {
        &self.module
    }

    pub fn inputs(&self) -> &[ShaderInput] {
        &self.inputs
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Recompiles when the file's modification time changed.
    ///
    /// Returns true if a new module was installed. A source that fails to
    /// parse or validate is logged and the current module stays in use.
    pub fn reload_if_changed(&mut self, device: &wgpu::Device) -> bool {
        let modified = modified_time(&self.path);
        if modified.is_none() || modified == self.modified {
            return false;
        }
        // Record the attempt either way so a broken file is not retried every frame.
        self.modified = modified;

        match compile(device, &self.path) {
            Ok((module, inputs)) => {
                self.module = module;
                self.inputs = inputs;
                self.generation += 1;
                log::info!("Reloaded shader {} (generation {})", self.path.display(), self.generation);
                true
            }
            Err(err) => {
                log::error!("Keeping previous shader {}: {:#}", self.path.display(), err);
                false
            }
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn compile(device: &wgpu::Device, path: &Path) -> Result<(wgpu::ShaderModule, Vec<ShaderInput>)> {
    let source =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read shader {}", path.display()))?;
    let inputs = reflect_vertex_inputs(&source, "vs_main")
        .with_context(|| format!("Failed to parse shader {}", path.display()))?;
    let label = path.display().to_string();
    let module = gpu::checked(device, &label, || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&label),
            source: wgpu::ShaderSource::Wgsl(source.as_str().into()),
        })
    })?;
    Ok((module, inputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SHADER_DIR;
    use crate::ibl::capture::CAPTURE_VERTEX_SHADER;

    fn read_shader(relative: &str) -> String {
        let path = Path::new(DEFAULT_SHADER_DIR).join(relative);
        std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
    }

    fn assert_parses(name: &str, source: &str) {
        if let Err(e) = naga::front::wgsl::parse_str(source) {
            panic!("{} failed to parse:\n{}", name, e.emit_to_string(source));
        }
    }

    #[test]
    fn test_reflects_struct_inputs() {
        let source = r#"
            struct VertexInput {
                @location(2) uv: vec2<f32>,
                @location(0) position: vec3<f32>,
                @builtin(vertex_index) index: u32,
            };
            @vertex
            fn vs_main(in: VertexInput) -> @builtin(position) vec4<f32> {
                return vec4<f32>(in.position, 1.0);
            }
        "#;
        let inputs = reflect_vertex_inputs(source, "vs_main").unwrap();
        assert_eq!(
            inputs,
            vec![
                ShaderInput { location: 0, components: 3 },
                ShaderInput { location: 2, components: 2 },
            ]
        );
    }

    #[test]
    fn test_reflects_argument_inputs() {
        let source = r#"
            @vertex
            fn vs_main(@location(1) weight: f32, @location(0) position: vec4<f32>) -> @builtin(position) vec4<f32> {
                return position * weight;
            }
        "#;
        let inputs = reflect_vertex_inputs(source, "vs_main").unwrap();
        assert_eq!(
            inputs,
            vec![
                ShaderInput { location: 0, components: 4 },
                ShaderInput { location: 1, components: 1 },
            ]
        );
    }

    #[test]
    fn test_missing_entry_point() {
        let source = "@vertex fn other() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }";
        assert!(reflect_vertex_inputs(source, "vs_main").is_err());
    }

    #[test]
    fn test_parse_error_is_reported() {
        assert!(reflect_vertex_inputs("fn broken( {", "vs_main").is_err());
    }

    #[test]
    fn test_pbr_shader_inputs() {
        let inputs = reflect_vertex_inputs(&read_shader("pbr.wgsl"), "vs_main").unwrap();
        let locations: Vec<u32> = inputs.iter().map(|i| i.location).collect();
        assert_eq!(locations, vec![0, 1, 2]);
        assert_eq!(inputs[2].components, 2);
    }

    #[test]
    fn test_render_shaders_parse() {
        for name in ["pbr.wgsl", "skybox.wgsl", "ibl/brdf_lut.wgsl", "ibl/mipmap.wgsl"] {
            assert_parses(name, &read_shader(name));
        }
    }

    #[test]
    fn test_capture_shaders_parse() {
        for name in ["ibl/equirect_to_cube.wgsl", "ibl/irradiance.wgsl", "ibl/prefilter.wgsl"] {
            let source = format!("{}\n{}", CAPTURE_VERTEX_SHADER, read_shader(name));
            assert_parses(name, &source);
        }
    }
}
