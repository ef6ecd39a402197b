//! Equirectangular to cubemap conversion.

use crate::gpu;

use super::capture::{capture_pipeline, source_bind_group, source_layout, CaptureUniforms};
use super::cubemap::{full_mip_count, GpuCubemap};
use super::target::CaptureTarget;
use super::{CubeFace, EquirectSource, IblError, ENVIRONMENT_CUBEMAP_SIZE};

const EQUIRECT_TO_CUBE_SHADER: &str = include_str!("../shaders/ibl/equirect_to_cube.wgsl");

/// Format of the uploaded source image. Not filterable without an optional
/// device feature, so the source is point sampled.
pub const EQUIRECT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

pub struct EquirectToCubePipeline {
    pipeline: wgpu::RenderPipeline,
    source_layout: wgpu::BindGroupLayout,
}

impl EquirectToCubePipeline {
    pub fn new(device: &wgpu::Device, faces: &CaptureUniforms) -> Result<Self, IblError> {
        let source_layout = source_layout(
            device,
            "Equirect Source Layout",
            wgpu::TextureViewDimension::D2,
            false,
        );
        let pipeline = capture_pipeline(
            device,
            "Equirect to Cube Pipeline",
            EQUIRECT_TO_CUBE_SHADER,
            &source_layout,
            faces,
        )?;
        Ok(Self {
            pipeline,
            source_layout,
        })
    }

    /// Uploads `source` and renders it onto the six faces of a new radiance cubemap.
    ///
    /// Only mip 0 is written; the caller fills the rest of the chain.
    pub fn convert(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        faces: &CaptureUniforms,
        target: &mut CaptureTarget,
        source: &EquirectSource,
    ) -> Result<(wgpu::Texture, GpuCubemap), IblError> {
        let input = upload_source(device, queue, source)?;
        let input_view = input.create_view(&wgpu::TextureViewDescriptor::default());
        let input_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Equirect Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let bind_group = source_bind_group(
            device,
            "Equirect Source Bind Group",
            &self.source_layout,
            &input_view,
            &input_sampler,
        );

        let cubemap = GpuCubemap::new(
            device,
            ENVIRONMENT_CUBEMAP_SIZE,
            full_mip_count(ENVIRONMENT_CUBEMAP_SIZE),
            "Environment Cubemap",
        )?;
        target.resize(device, ENVIRONMENT_CUBEMAP_SIZE)?;

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Equirect to Cube Encoder"),
        });
        for face in CubeFace::ALL {
            let view = target.attach(device, &cubemap.texture, 0, face.layer())?;
            let mut pass = target.begin_pass(&mut encoder, &view, "Equirect to Cube Pass");
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(1, &bind_group, &[]);
            faces.draw_face(&mut pass, 0, face);
        }
        gpu::checked(device, "Equirect to Cube Submit", || {
            queue.submit(std::iter::once(encoder.finish()));
        })?;

        Ok((input, cubemap))
    }
}

fn upload_source(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    source: &EquirectSource,
) -> Result<wgpu::Texture, IblError> {
    let size = wgpu::Extent3d {
        width: source.width,
        height: source.height,
        depth_or_array_layers: 1,
    };
    let texture = gpu::checked(device, "Equirect Source", || {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Equirect Source"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: EQUIRECT_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&source.texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(source.width * 16),
                rows_per_image: Some(source.height),
            },
            size,
        );
        texture
    })?;
    Ok(texture)
}
