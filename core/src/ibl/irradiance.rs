//! Diffuse irradiance convolution.

use crate::gpu;

use super::capture::{capture_pipeline, source_bind_group, source_layout, CaptureUniforms};
use super::cubemap::GpuCubemap;
use super::target::CaptureTarget;
use super::{CubeFace, IblError, IRRADIANCE_CUBEMAP_SIZE};

const IRRADIANCE_SHADER: &str = include_str!("../shaders/ibl/irradiance.wgsl");

pub struct IrradiancePipeline {
    pipeline: wgpu::RenderPipeline,
    source_layout: wgpu::BindGroupLayout,
}

impl IrradiancePipeline {
    pub fn new(device: &wgpu::Device, faces: &CaptureUniforms) -> Result<Self, IblError> {
        let source_layout = source_layout(
            device,
            "Irradiance Source Layout",
            wgpu::TextureViewDimension::Cube,
            true,
        );
        let pipeline = capture_pipeline(device, "Irradiance Pipeline", IRRADIANCE_SHADER, &source_layout, faces)?;
        Ok(Self {
            pipeline,
            source_layout,
        })
    }

    /// Integrates `radiance` over the cosine-weighted hemisphere around each texel direction.
    pub fn generate(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        faces: &CaptureUniforms,
        target: &mut CaptureTarget,
        radiance: &GpuCubemap,
    ) -> Result<GpuCubemap, IblError> {
        let bind_group = source_bind_group(
            device,
            "Irradiance Source Bind Group",
            &self.source_layout,
            &radiance.view,
            &radiance.sampler,
        );
        let cubemap = GpuCubemap::new(device, IRRADIANCE_CUBEMAP_SIZE, 1, "Irradiance Cubemap")?;
        target.resize(device, IRRADIANCE_CUBEMAP_SIZE)?;

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Irradiance Encoder"),
        });
        for face in CubeFace::ALL {
            let view = target.attach(device, &cubemap.texture, 0, face.layer())?;
            let mut pass = target.begin_pass(&mut encoder, &view, "Irradiance Pass");
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(1, &bind_group, &[]);
            faces.draw_face(&mut pass, 0, face);
        }
        gpu::checked(device, "Irradiance Submit", || {
            queue.submit(std::iter::once(encoder.finish()));
        })?;

        Ok(cubemap)
    }
}
