//! Specular prefiltering: one GGX convolution per mip level, with roughness
//! rising linearly from 0 at mip 0 to 1 at the last mip.

use crate::gpu;

use super::capture::{capture_pipeline, source_bind_group, source_layout, CaptureUniforms};
use super::cubemap::GpuCubemap;
use super::target::CaptureTarget;
use super::{CubeFace, IblError, PREFILTERED_CUBEMAP_SIZE, PREFILTERED_MIP_LEVELS};

const PREFILTER_SHADER: &str = include_str!("../shaders/ibl/prefilter.wgsl");

/// Roughness the given mip level is convolved with.
pub fn prefilter_roughness(mip: u32) -> f32 {
    mip as f32 / (PREFILTERED_MIP_LEVELS - 1) as f32
}

/// Face size of the given mip level.
pub fn prefilter_mip_size(mip: u32) -> u32 {
    (PREFILTERED_CUBEMAP_SIZE >> mip).max(1)
}

pub struct PrefilterPipeline {
    pipeline: wgpu::RenderPipeline,
    source_layout: wgpu::BindGroupLayout,
}

impl PrefilterPipeline {
    pub fn new(device: &wgpu::Device, faces: &CaptureUniforms) -> Result<Self, IblError> {
        let source_layout = source_layout(
            device,
            "Prefilter Source Layout",
            wgpu::TextureViewDimension::Cube,
            true,
        );
        let pipeline = capture_pipeline(device, "Prefilter Pipeline", PREFILTER_SHADER, &source_layout, faces)?;
        Ok(Self {
            pipeline,
            source_layout,
        })
    }

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
            "Prefilter Source Bind Group",
            &self.source_layout,
            &radiance.view,
            &radiance.sampler,
        );
        let cubemap = GpuCubemap::new(
            device,
            PREFILTERED_CUBEMAP_SIZE,
            PREFILTERED_MIP_LEVELS,
            "Prefiltered Cubemap",
        )?;

        for mip in 0..PREFILTERED_MIP_LEVELS {
            // The depth buffer must match the mip being written.
            target.resize(device, prefilter_mip_size(mip))?;
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Prefilter Encoder"),
            });
            for face in CubeFace::ALL {
                let view = target.attach(device, &cubemap.texture, mip, face.layer())?;
                let mut pass = target.begin_pass(&mut encoder, &view, "Prefilter Pass");
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(1, &bind_group, &[]);
                faces.draw_face(&mut pass, mip as usize, face);
            }
            gpu::checked(device, "Prefilter Submit", || {
                queue.submit(std::iter::once(encoder.finish()));
            })?;
            log::debug!(
                "Prefiltered mip {} ({}x{}, roughness {:.2})",
                mip,
                prefilter_mip_size(mip),
                prefilter_mip_size(mip),
                prefilter_roughness(mip)
            );
        }

        Ok(cubemap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_mip_sizes_halve() {
        let sizes: Vec<u32> = (0..PREFILTERED_MIP_LEVELS).map(prefilter_mip_size).collect();
        assert_eq!(sizes, vec![128, 64, 32, 16, 8]);
    }

    #[test]
    fn test_roughness_spans_zero_to_one() {
        let expected = [0.0, 0.25, 0.5, 0.75, 1.0];
        for (mip, r) in expected.iter().enumerate() {
            assert!((prefilter_roughness(mip as u32) - r).abs() < EPSILON);
        }
    }
}
