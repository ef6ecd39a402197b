use anyhow::{bail, Context, Result};
use pbr_engine_scene::{FlyCamera, Scene};

use crate::buffer::{BufferUsageClass, GpuAlignedBuffer};
use crate::config::EngineConfig;
use crate::gpu;
use crate::ibl::{self, CaptureRig, EnvironmentMapSet, EquirectSource};
use crate::params::{self, FrameInputs, GLOBAL_BINDING_SIZE};
use crate::shaders::ShaderProgram;
use crate::texture::{FallbackTextures, GpuTexture, GpuTextures};

mod binding_cache;
mod materials;
mod meshes;
mod pipeline;
mod skybox;
mod slots;
mod submit;

pub use binding_cache::{link_attributes, BindingCache, LinkError, SubmeshKey};
pub use slots::TextureSlot;
pub use submit::{plan_draws, DrawCommand, DrawStats, SubmitError};

use materials::{GpuMaterials, MaterialBindContext};
use meshes::GpuMeshes;
use pipeline::PbrPipelines;
use skybox::Skybox;
use slots::SlotSamplers;
use submit::SubmitContext;

/// Environment used when no HDR file is configured.
const DEFAULT_ENVIRONMENT_SIZE: (u32, u32) = (64, 32);
const DEFAULT_ENVIRONMENT_RADIANCE: [f32; 3] = [0.3, 0.3, 0.3];

/// Numbers from the last rendered frame.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FrameStats {
    pub draws: usize,
    pub skipped: usize,
    /// Bytes of the parameter buffer written this frame.
    pub param_bytes: u64,
}

/// GPU-side resource counts, for display.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ResourceCounts {
    pub textures: usize,
    pub meshes: usize,
    pub materials: usize,
    pub pipelines: usize,
}

pub struct Renderer<'a> {
    surface: wgpu::Surface<'a>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    adapter_info: wgpu::AdapterInfo,
    engine_config: EngineConfig,
    depth: GpuTexture,

    params: GpuAlignedBuffer,
    param_group: wgpu::BindGroup,
    min_offset_alignment: u64,

    texture_layout: wgpu::BindGroupLayout,
    samplers: SlotSamplers,
    fallbacks: FallbackTextures,
    textures: GpuTextures,
    materials: GpuMaterials,
    meshes: GpuMeshes,

    environment: EnvironmentMapSet,
    pipelines: PbrPipelines,
    skybox: Skybox,
    last_frame: FrameStats,
}

impl<'a> Renderer<'a> {
    /// Creates the device, runs the IBL precomputation and loads the shaders.
    pub async fn new<T>(target: T, width: u32, height: u32, engine_config: EngineConfig) -> Result<Renderer<'a>>
    where
        T: Into<wgpu::SurfaceTarget<'a>>,
    {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(target).context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable GPU adapter")?;
        let adapter_info = adapter.get_info();
        log::info!("Using adapter {} ({:?})", adapter_info.name, adapter_info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: EngineConfig::required_limits(&adapter.limits()),
                label: None,
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
                experimental_features: Default::default(),
            })
            .await
            .context("Failed to create device")?;
        gpu::log_uncaptured_errors(&device);
        let limits = device.limits();

        let surface_caps = surface.get_capabilities(&adapter);
        let Some(&first_format) = surface_caps.formats.first() else {
            bail!("Surface reports no supported formats");
        };
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(first_format);
        let present_mode = engine_config.present_mode(&surface_caps.present_modes);
        let (width, height) = gpu::surface_extent(width, height, limits.max_texture_dimension_2d);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode,
            alpha_mode: surface_caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        gpu::checked(&device, "Surface", || surface.configure(&device, &config))?;
        log::info!("Surface {:?} {}x{} {:?}", surface_format, config.width, config.height, present_mode);

        let depth = GpuTexture::depth(&device, config.width, config.height)?;

        let param_capacity = engine_config.param_buffer_size(&limits);
        if param_capacity < GLOBAL_BINDING_SIZE {
            bail!(
                "Parameter buffer of {} bytes cannot hold the {} byte global block",
                param_capacity,
                GLOBAL_BINDING_SIZE
            );
        }
        let params = GpuAlignedBuffer::create(&device, param_capacity, BufferUsageClass::Uniform, "Frame Parameters")?;
        let param_layout = slots::create_param_layout(&device);
        let param_group = slots::create_param_bind_group(&device, &param_layout, params.buffer());
        let texture_layout = slots::create_texture_layout(&device);

        let environment = Self::build_environment(&device, &queue, &engine_config)?;

        let samplers = SlotSamplers::new(&device);
        let fallbacks = FallbackTextures::new(&device, &queue)?;
        let textures = GpuTextures::new();
        let materials = GpuMaterials::new(
            &device,
            &MaterialBindContext {
                layout: &texture_layout,
                environment: &environment,
                textures: &textures,
                fallbacks: &fallbacks,
                samplers: &samplers,
            },
        );

        let pbr = ShaderProgram::load(&device, engine_config.pbr_shader_path())?;
        let pipelines = PbrPipelines::new(&device, pbr, &param_layout, &texture_layout, surface_format);
        let skybox_program = ShaderProgram::load(&device, engine_config.skybox_shader_path())?;
        let skybox = Skybox::new(&device, &queue, skybox_program, &environment, surface_format)?;

        Ok(Self {
            surface,
            device,
            queue,
            config,
            adapter_info,
            engine_config,
            depth,
            params,
            param_group,
            min_offset_alignment: limits.min_uniform_buffer_offset_alignment as u64,
            texture_layout,
            samplers,
            fallbacks,
            textures,
            materials,
            meshes: GpuMeshes::new(),
            environment,
            pipelines,
            skybox,
            last_frame: FrameStats::default(),
        })
    }

    fn build_environment(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: &EngineConfig,
    ) -> Result<EnvironmentMapSet> {
        let source = match &config.environment_hdr {
            Some(path) => ibl::load_equirect(path)?,
            None => {
                log::info!("No environment configured, using a uniform grey environment");
                let (width, height) = DEFAULT_ENVIRONMENT_SIZE;
                EquirectSource::solid(width, height, DEFAULT_ENVIRONMENT_RADIANCE)
            }
        };
        let rig = CaptureRig::new();
        let environment = ibl::build_environment(device, queue, &source, &rig).context("IBL precomputation failed")?;
        Ok(environment)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn environment(&self) -> &EnvironmentMapSet {
        &self.environment
    }

    pub fn param_buffer_capacity(&self) -> u64 {
        self.params.capacity()
    }

    pub fn last_frame(&self) -> FrameStats {
        self.last_frame
    }

    pub fn resource_counts(&self) -> ResourceCounts {
        ResourceCounts {
            textures: self.textures.uploaded(),
            meshes: self.meshes.mesh_count(),
            materials: self.materials.len(),
            pipelines: self.pipelines.cached(),
        }
    }

    /// Generation of the PBR program; bumps on every successful hot reload.
    pub fn shader_generation(&self) -> u64 {
        self.pipelines.program().generation()
    }

    /// Reconfigures the surface and depth buffer. On failure the previous
    /// configuration stays in place.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        let (width, height) = gpu::surface_extent(width, height, self.device.limits().max_texture_dimension_2d);
        let config = wgpu::SurfaceConfiguration {
            width,
            height,
            ..self.config.clone()
        };
        gpu::checked(&self.device, "Surface Resize", || {
            self.surface.configure(&self.device, &config)
        })?;
        let depth = GpuTexture::depth(&self.device, width, height)?;
        self.config = config;
        self.depth = depth;
        log::debug!("Resized surface to {}x{}", width, height);
        Ok(())
    }

    /// Polls shader files when hot reload is enabled. Returns true if any program changed.
    pub fn reload_shaders(&mut self) -> bool {
        if !self.engine_config.hot_reload {
            return false;
        }
        let pbr = self.pipelines.reload_if_changed(&self.device);
        let skybox = self.skybox.reload_if_changed(&self.device);
        pbr || skybox
    }

    /// Uploads anything new in the scene: textures, meshes, material bind groups.
    fn sync_scene(&mut self, scene: &Scene) -> Result<()> {
        self.textures.sync(&self.device, &self.queue, &scene.textures);
        self.meshes.sync(&self.device, &self.queue, &scene.meshes)?;
        self.materials.sync(
            &self.device,
            &scene.materials,
            &MaterialBindContext {
                layout: &self.texture_layout,
                environment: &self.environment,
                textures: &self.textures,
                fallbacks: &self.fallbacks,
                samplers: &self.samplers,
            },
        );
        Ok(())
    }

    /// Draws one frame: skybox and scene, then `overlay` into the same
    /// target before presenting.
    pub fn render<F>(&mut self, scene: &Scene, camera: &FlyCamera, overlay: F) -> Result<FrameStats>
    where
        F: FnOnce(&wgpu::Device, &wgpu::Queue, &mut wgpu::CommandEncoder, &wgpu::TextureView),
    {
        self.sync_scene(scene)?;

        let inputs = FrameInputs::from_scene(scene, camera);
        let frame = params::pack_frame(
            &mut self.params,
            &self.device,
            &self.queue,
            self.min_offset_alignment,
            &inputs,
        )?;
        self.skybox
            .update(&self.device, &self.queue, inputs.view, inputs.projection)?;
        let commands = plan_draws(scene, &frame)?;

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost, reconfiguring");
                gpu::checked(&self.device, "Surface", || {
                    self.surface.configure(&self.device, &self.config)
                })?;
                return Ok(self.last_frame);
            }
            Err(err) => return Err(err).context("Failed to acquire surface texture"),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        let stats = {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Main Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.engine_config.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            let ctx = SubmitContext {
                device: &self.device,
                scene,
                meshes: &self.meshes,
                materials: &self.materials,
                params: &self.param_group,
            };
            let stats = submit::record_draws(&mut pass, &mut self.pipelines, &ctx, &commands)?;
            // Depth 1 everywhere the scene left uncovered.
            self.skybox.draw(&mut pass);
            stats
        };

        overlay(&self.device, &self.queue, &mut encoder, &view);

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        self.last_frame = FrameStats {
            draws: stats.draws,
            skipped: stats.skipped,
            param_bytes: self.params.host().head(),
        };
        Ok(self.last_frame)
    }
}
