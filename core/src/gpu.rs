//! `Result`-returning wrapper around state-changing wgpu calls.
//!
//! wgpu reports most failures asynchronously through the device. Wrapping a
//! call in [`checked`] pushes validation and out-of-memory error scopes, runs
//! the call, pops the scopes and turns whatever was captured into a
//! [`GpuError`] tagged with the call-site context.

use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GpuError {
    #[error("{context}: validation failed: {message}")]
    Validation { context: String, message: String },
    #[error("{context}: out of memory")]
    OutOfMemory { context: String },
    #[error("{context}: device error: {message}")]
    Internal { context: String, message: String },
}

impl GpuError {
    pub(crate) fn from_wgpu(context: &str, error: wgpu::Error) -> Self {
        let context = context.to_string();
        match error {
            wgpu::Error::OutOfMemory { .. } => GpuError::OutOfMemory { context },
            wgpu::Error::Validation { description, .. } => GpuError::Validation {
                context,
                message: description,
            },
            other => GpuError::Internal {
                context,
                message: other.to_string(),
            },
        }
    }

    pub fn context(&self) -> &str {
        match self {
            GpuError::Validation { context, .. }
            | GpuError::OutOfMemory { context }
            | GpuError::Internal { context, .. } => context,
        }
    }
}

/// Runs `f` inside validation and out-of-memory error scopes.
///
/// Blocks until the device has processed the scopes. Errors are logged with
/// `context` before being returned; nothing is retried.
pub fn checked<T>(device: &wgpu::Device, context: &str, f: impl FnOnce() -> T) -> Result<T, GpuError> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());

    match validation.or(out_of_memory) {
        Some(error) => {
            let error = GpuError::from_wgpu(context, error);
            log::error!("{}", error);
            Err(error)
        }
        None => Ok(value),
    }
}

/// Routes errors raised outside any [`checked`] scope to the log instead of
/// wgpu's default handler, which panics.
pub fn log_uncaptured_errors(device: &wgpu::Device) {
    device.on_uncaptured_error(Arc::new(|error: wgpu::Error| {
        log::error!("{}", GpuError::from_wgpu("Uncaptured", error));
    }));
}

/// Surface size to configure: zero and oversized extents are clamped into
/// `1..=max_dimension`.
pub fn surface_extent(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let clamp = |v: u32| v.clamp(1, max_dimension.max(1));
    (clamp(width), clamp(height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_keeps_description() {
        let error = wgpu::Error::Validation {
            source: Box::new(std::fmt::Error),
            description: "binding size too small".to_string(),
        };
        let converted = GpuError::from_wgpu("Frame Parameters", error);
        assert_eq!(
            converted,
            GpuError::Validation {
                context: "Frame Parameters".to_string(),
                message: "binding size too small".to_string(),
            }
        );
        assert_eq!(converted.context(), "Frame Parameters");
        assert!(converted.to_string().starts_with("Frame Parameters: validation failed"));
    }

    #[test]
    fn test_out_of_memory_maps_to_variant() {
        let error = wgpu::Error::OutOfMemory {
            source: Box::new(std::fmt::Error),
        };
        assert!(matches!(
            GpuError::from_wgpu("Radiance Cubemap", error),
            GpuError::OutOfMemory { .. }
        ));
    }

    #[test]
    fn test_internal_error_keeps_message() {
        let error = wgpu::Error::Internal {
            source: Box::new(std::fmt::Error),
            description: "device lost".to_string(),
        };
        let converted = GpuError::from_wgpu("Uncaptured", error);
        assert!(matches!(converted, GpuError::Internal { .. }));
        assert_eq!(converted.context(), "Uncaptured");
    }

    #[test]
    fn test_surface_extent_clamps_to_device_limit() {
        assert_eq!(surface_extent(1280, 720, 8192), (1280, 720));
        assert_eq!(surface_extent(20000, 720, 8192), (8192, 720));
        assert_eq!(surface_extent(0, 0, 8192), (1, 1));
    }
}
