//! Image Based Lighting (IBL) precomputation.
//!
//! An equirectangular HDR image is turned into the textures the PBR shader
//! samples for ambient lighting. The work runs once, as four strictly ordered
//! stages that each render through the shared [`CaptureRig`]:
//!
//! 1. equirectangular source -> radiance cubemap (+ mip chain)
//! 2. radiance -> diffuse irradiance cubemap
//! 3. radiance -> specular prefiltered cubemap, one roughness per mip
//! 4. split-sum BRDF integration LUT
//!
//! Any failure aborts the whole build; there is no partially built set.

mod brdf_lut;
pub(crate) mod capture;
pub mod capture_rig;
mod cubemap;
mod equirect;
mod irradiance;
mod mipmap;
mod prefilter;
mod source;
mod target;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::buffer::BufferError;
use crate::gpu::GpuError;

pub use brdf_lut::BrdfLut;
pub use capture_rig::{CaptureRig, CubeFace};
pub use cubemap::GpuCubemap;
pub use prefilter::{prefilter_mip_size, prefilter_roughness};
pub use source::{load_equirect, EquirectSource};
pub use target::{validate_attachment, AttachmentInfo, TargetIncomplete};

use brdf_lut::BrdfLutPipeline;
use capture::CaptureUniforms;
use equirect::EquirectToCubePipeline;
use irradiance::IrradiancePipeline;
use mipmap::MipGenerator;
use prefilter::PrefilterPipeline;
use target::CaptureTarget;

/// Size of the radiance cubemap (per face).
pub const ENVIRONMENT_CUBEMAP_SIZE: u32 = 512;

/// Size of the irradiance cubemap (per face). Low resolution since irradiance is low-frequency.
pub const IRRADIANCE_CUBEMAP_SIZE: u32 = 32;

/// Size of the pre-filtered environment cubemap base level (per face).
pub const PREFILTERED_CUBEMAP_SIZE: u32 = 128;

/// Number of mip levels for the pre-filtered cubemap (roughness levels).
pub const PREFILTERED_MIP_LEVELS: u32 = 5;

/// Size of the BRDF integration LUT.
pub const BRDF_LUT_SIZE: u32 = 512;

/// Format of every IBL cubemap.
pub const CUBEMAP_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// One step of the precomputation, in execution order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum IblStage {
    EquirectToCube,
    Irradiance,
    Prefilter,
    BrdfLut,
}

impl IblStage {
    /// The stage whose output this stage needs.
    pub fn previous(self) -> Option<IblStage> {
        match self {
            IblStage::EquirectToCube => None,
            IblStage::Irradiance => Some(IblStage::EquirectToCube),
            IblStage::Prefilter => Some(IblStage::Irradiance),
            IblStage::BrdfLut => Some(IblStage::Prefilter),
        }
    }
}

impl fmt::Display for IblStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IblStage::EquirectToCube => "equirect-to-cube",
            IblStage::Irradiance => "irradiance",
            IblStage::Prefilter => "prefilter",
            IblStage::BrdfLut => "BRDF LUT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum IblError {
    #[error("{stage} stage cannot run before the {missing} stage has completed")]
    StageOutOfOrder { stage: IblStage, missing: IblStage },
    #[error("capture target incomplete: {0}")]
    Target(#[from] TargetIncomplete),
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error(transparent)]
    Buffer(#[from] BufferError),
    #[error("failed to load environment {}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Tracks which stages have finished and refuses out-of-order stages.
#[derive(Debug, Default, Clone)]
pub struct IblProgress {
    completed: Option<IblStage>,
}

impl IblProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_completed(&self, stage: IblStage) -> bool {
        self.completed.is_some_and(|done| done >= stage)
    }

    /// Fails unless the stage `stage` depends on has completed.
    pub fn begin(&self, stage: IblStage) -> Result<(), IblError> {
        match stage.previous() {
            Some(missing) if !self.has_completed(missing) => {
                Err(IblError::StageOutOfOrder { stage, missing })
            }
            _ => {
                log::debug!("IBL {} stage started", stage);
                Ok(())
            }
        }
    }

    pub fn complete(&mut self, stage: IblStage) {
        self.completed = Some(stage);
        log::info!("IBL {} stage complete", stage);
    }

    pub fn is_complete(&self) -> bool {
        self.has_completed(IblStage::BrdfLut)
    }
}

/// The complete set of IBL textures, immutable once built.
pub struct EnvironmentMapSet {
    /// Equirectangular source image.
    pub equirect: wgpu::Texture,
    /// Source as a cubemap, with a full mip chain.
    pub radiance: GpuCubemap,
    /// Cosine-weighted hemisphere integral per direction.
    pub irradiance: GpuCubemap,
    /// GGX-convolved radiance, roughness = mip / (mips - 1).
    pub prefiltered: GpuCubemap,
    pub brdf_lut: BrdfLut,
}

/// Runs all four stages for `source`.
///
/// The capture target and per-stage pipelines are dropped when this returns.
pub fn build_environment(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    source: &EquirectSource,
    rig: &CaptureRig,
) -> Result<EnvironmentMapSet, IblError> {
    let mut progress = IblProgress::new();
    let faces = CaptureUniforms::new(device, queue, rig)?;
    let mut target = CaptureTarget::new(device, ENVIRONMENT_CUBEMAP_SIZE)?;

    progress.begin(IblStage::EquirectToCube)?;
    let (equirect, radiance) =
        EquirectToCubePipeline::new(device, &faces)?.convert(device, queue, &faces, &mut target, source)?;
    MipGenerator::new(device)?.generate(device, queue, &radiance)?;
    progress.complete(IblStage::EquirectToCube);

    progress.begin(IblStage::Irradiance)?;
    let irradiance = IrradiancePipeline::new(device, &faces)?.generate(device, queue, &faces, &mut target, &radiance)?;
    progress.complete(IblStage::Irradiance);

    progress.begin(IblStage::Prefilter)?;
    let prefiltered = PrefilterPipeline::new(device, &faces)?.generate(device, queue, &faces, &mut target, &radiance)?;
    progress.complete(IblStage::Prefilter);

    progress.begin(IblStage::BrdfLut)?;
    let brdf_lut = BrdfLutPipeline::new(device)?.generate(device, queue, &mut target)?;
    progress.complete(IblStage::BrdfLut);
    log::info!("IBL precomputation finished ({} bytes of face uniforms)", faces.uniform_bytes());

    Ok(EnvironmentMapSet {
        equirect,
        radiance,
        irradiance,
        prefiltered,
        brdf_lut,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_stage_needs_nothing() {
        let progress = IblProgress::new();
        assert!(progress.begin(IblStage::EquirectToCube).is_ok());
    }

    #[test]
    fn test_later_stages_fail_without_radiance() {
        let progress = IblProgress::new();
        for stage in [IblStage::Irradiance, IblStage::Prefilter, IblStage::BrdfLut] {
            assert!(
                matches!(progress.begin(stage), Err(IblError::StageOutOfOrder { .. })),
                "{} ran without its input",
                stage
            );
        }
    }

    #[test]
    fn test_irradiance_names_missing_radiance() {
        let err = IblProgress::new().begin(IblStage::Irradiance).unwrap_err();
        match err {
            IblError::StageOutOfOrder { stage, missing } => {
                assert_eq!(stage, IblStage::Irradiance);
                assert_eq!(missing, IblStage::EquirectToCube);
            }
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn test_stages_run_in_order() {
        let mut progress = IblProgress::new();
        let stages = [
            IblStage::EquirectToCube,
            IblStage::Irradiance,
            IblStage::Prefilter,
            IblStage::BrdfLut,
        ];
        for stage in stages {
            assert!(!progress.is_complete());
            progress.begin(stage).unwrap();
            progress.complete(stage);
        }
        assert!(progress.is_complete());
    }

    #[test]
    fn test_skipping_a_stage_fails() {
        let mut progress = IblProgress::new();
        progress.complete(IblStage::EquirectToCube);
        assert!(progress.begin(IblStage::Irradiance).is_ok());
        assert!(progress.begin(IblStage::Prefilter).is_err());
        assert!(progress.begin(IblStage::BrdfLut).is_err());
    }
}
