//! Off-screen render target shared by the capture stages.
//!
//! A [`CaptureTarget`] owns the depth attachment; each face pass attaches one
//! mip level and array layer of a destination texture as its color attachment.
//! Attachments are checked before use so an unusable combination fails with
//! a [`TargetIncomplete`] instead of a device validation error.

use thiserror::Error;

use crate::gpu;

use super::IblError;

pub const CAPTURE_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TargetIncomplete {
    #[error("attachment has zero extent")]
    ZeroExtent,
    #[error("extent {extent} exceeds the device limit of {limit}")]
    ExceedsMaxDimension { extent: u32, limit: u32 },
    #[error("mip level {mip} out of range ({count} levels)")]
    MipOutOfRange { mip: u32, count: u32 },
    #[error("array layer {layer} out of range ({count} layers)")]
    LayerOutOfRange { layer: u32, count: u32 },
    #[error("texture was not created with RENDER_ATTACHMENT usage")]
    NotRenderAttachment,
    #[error("{0:?} cannot be rendered to")]
    FormatNotRenderable(wgpu::TextureFormat),
    #[error("color attachment is {color}x{color} but depth is {depth}x{depth}")]
    DepthExtentMismatch { color: u32, depth: u32 },
}

/// What a color attachment binds: one mip level and layer of a texture.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AttachmentInfo {
    pub format: wgpu::TextureFormat,
    /// Width of mip 0. Capture textures are square.
    pub base_size: u32,
    pub mip_level_count: u32,
    pub array_layers: u32,
    pub usage: wgpu::TextureUsages,
    pub mip: u32,
    pub layer: u32,
}

impl AttachmentInfo {
    pub fn of(texture: &wgpu::Texture, mip: u32, layer: u32) -> Self {
        Self {
            format: texture.format(),
            base_size: texture.width(),
            mip_level_count: texture.mip_level_count(),
            array_layers: texture.depth_or_array_layers(),
            usage: texture.usage(),
            mip,
            layer,
        }
    }

    /// Extent of the attached mip level.
    pub fn extent(&self) -> u32 {
        if self.base_size == 0 {
            return 0;
        }
        (self.base_size >> self.mip.min(31)).max(1)
    }
}

/// Checks that `info` can be rendered into alongside a `depth_size` square depth buffer.
pub fn validate_attachment(
    info: &AttachmentInfo,
    depth_size: u32,
    limits: &wgpu::Limits,
    features: wgpu::Features,
) -> Result<(), TargetIncomplete> {
    if info.base_size == 0 || depth_size == 0 {
        return Err(TargetIncomplete::ZeroExtent);
    }
    let limit = limits.max_texture_dimension_2d;
    if info.base_size > limit {
        return Err(TargetIncomplete::ExceedsMaxDimension {
            extent: info.base_size,
            limit,
        });
    }
    if info.mip >= info.mip_level_count {
        return Err(TargetIncomplete::MipOutOfRange {
            mip: info.mip,
            count: info.mip_level_count,
        });
    }
    if info.layer >= info.array_layers {
        return Err(TargetIncomplete::LayerOutOfRange {
            layer: info.layer,
            count: info.array_layers,
        });
    }
    if !info.usage.contains(wgpu::TextureUsages::RENDER_ATTACHMENT) {
        return Err(TargetIncomplete::NotRenderAttachment);
    }
    let renderable = info
        .format
        .guaranteed_format_features(features)
        .allowed_usages
        .contains(wgpu::TextureUsages::RENDER_ATTACHMENT);
    if !renderable {
        return Err(TargetIncomplete::FormatNotRenderable(info.format));
    }
    if info.extent() != depth_size {
        return Err(TargetIncomplete::DepthExtentMismatch {
            color: info.extent(),
            depth: depth_size,
        });
    }
    Ok(())
}

/// Depth attachment plus the current square viewport size.
pub struct CaptureTarget {
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
    size: u32,
}

impl CaptureTarget {
    pub fn new(device: &wgpu::Device, size: u32) -> Result<Self, IblError> {
        let (depth, depth_view) = Self::create_depth(device, size)?;
        Ok(Self {
            depth,
            depth_view,
            size,
        })
    }

    fn create_depth(device: &wgpu::Device, size: u32) -> Result<(wgpu::Texture, wgpu::TextureView), IblError> {
        let limit = device.limits().max_texture_dimension_2d;
        if size == 0 {
            return Err(TargetIncomplete::ZeroExtent.into());
        }
        if size > limit {
            return Err(TargetIncomplete::ExceedsMaxDimension { extent: size, limit }.into());
        }
        let depth = gpu::checked(device, "Capture Depth", || {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Capture Depth"),
                size: wgpu::Extent3d {
                    width: size,
                    height: size,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: CAPTURE_DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
        })?;
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
        Ok((depth, depth_view))
    }

    /// Reallocates the depth buffer if `size` differs from the current one.
    pub fn resize(&mut self, device: &wgpu::Device, size: u32) -> Result<(), IblError> {
        if size == self.size {
            return Ok(());
        }
        let (depth, depth_view) = Self::create_depth(device, size)?;
        log::debug!("Capture target resized {} -> {}", self.size, size);
        self.depth = depth;
        self.depth_view = depth_view;
        self.size = size;
        Ok(())
    }

    /// Validates and returns a single-layer view of `texture` to render into.
    pub fn attach(
        &self,
        device: &wgpu::Device,
        texture: &wgpu::Texture,
        mip: u32,
        layer: u32,
    ) -> Result<wgpu::TextureView, IblError> {
        let info = AttachmentInfo::of(texture, mip, layer);
        validate_attachment(&info, self.size, &device.limits(), device.features())?;
        Ok(texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Capture Attachment"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_mip_level: mip,
            mip_level_count: Some(1),
            base_array_layer: layer,
            array_layer_count: Some(1),
            ..Default::default()
        }))
    }

    /// Begins a pass that clears `color` and the depth buffer.
    pub fn begin_pass<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        color: &wgpu::TextureView,
        label: &str,
    ) -> wgpu::RenderPass<'e> {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        let size = self.size as f32;
        pass.set_viewport(0.0, 0.0, size, size, 0.0, 1.0);
        pass
    }
}

/// Depth state used by every pipeline that draws into a [`CaptureTarget`].
pub fn capture_depth_state() -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: CAPTURE_DEPTH_FORMAT,
        depth_write_enabled: true,
        depth_compare: wgpu::CompareFunction::LessEqual,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_info(mip: u32, layer: u32) -> AttachmentInfo {
        AttachmentInfo {
            format: wgpu::TextureFormat::Rgba16Float,
            base_size: 128,
            mip_level_count: 5,
            array_layers: 6,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            mip,
            layer,
        }
    }

    fn check(info: &AttachmentInfo, depth: u32) -> Result<(), TargetIncomplete> {
        validate_attachment(info, depth, &wgpu::Limits::default(), wgpu::Features::empty())
    }

    #[test]
    fn test_every_prefilter_face_and_mip_is_complete() {
        for mip in 0..5 {
            for layer in 0..6 {
                let info = cube_info(mip, layer);
                assert_eq!(check(&info, 128 >> mip), Ok(()));
            }
        }
    }

    #[test]
    fn test_zero_extent() {
        let mut info = cube_info(0, 0);
        info.base_size = 0;
        assert_eq!(check(&info, 128), Err(TargetIncomplete::ZeroExtent));
        assert_eq!(check(&cube_info(0, 0), 0), Err(TargetIncomplete::ZeroExtent));
    }

    #[test]
    fn test_exceeds_max_dimension() {
        let mut info = cube_info(0, 0);
        info.base_size = wgpu::Limits::default().max_texture_dimension_2d * 2;
        assert!(matches!(
            check(&info, info.base_size),
            Err(TargetIncomplete::ExceedsMaxDimension { .. })
        ));
    }

    #[test]
    fn test_mip_and_layer_ranges() {
        assert_eq!(
            check(&cube_info(5, 0), 4),
            Err(TargetIncomplete::MipOutOfRange { mip: 5, count: 5 })
        );
        assert_eq!(
            check(&cube_info(0, 6), 128),
            Err(TargetIncomplete::LayerOutOfRange { layer: 6, count: 6 })
        );
    }

    #[test]
    fn test_depth_must_match_mip_extent() {
        assert_eq!(
            check(&cube_info(2, 0), 128),
            Err(TargetIncomplete::DepthExtentMismatch { color: 32, depth: 128 })
        );
    }

    #[test]
    fn test_requires_render_attachment_usage() {
        let mut info = cube_info(0, 0);
        info.usage = wgpu::TextureUsages::TEXTURE_BINDING;
        assert_eq!(check(&info, 128), Err(TargetIncomplete::NotRenderAttachment));
    }

    #[test]
    fn test_unrenderable_format() {
        let mut info = cube_info(0, 0);
        info.format = wgpu::TextureFormat::Rgb9e5Ufloat;
        assert_eq!(
            check(&info, 128),
            Err(TargetIncomplete::FormatNotRenderable(wgpu::TextureFormat::Rgb9e5Ufloat))
        );
    }

    #[test]
    fn test_extent_never_drops_below_one() {
        let info = cube_info(4, 0);
        assert_eq!(info.extent(), 8);
        let tiny = AttachmentInfo {
            base_size: 2,
            mip_level_count: 4,
            mip: 3,
            ..cube_info(0, 0)
        };
        assert_eq!(tiny.extent(), 1);
    }
}
