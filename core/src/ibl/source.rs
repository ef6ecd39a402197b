use std::path::Path;

use super::IblError;

/// Linear RGBA float texels of an equirectangular environment image.
#[derive(Debug, Clone)]
pub struct EquirectSource {
    pub width: u32,
    pub height: u32,
    /// Row-major, top row first, four floats per texel.
    pub texels: Vec<f32>,
}

impl EquirectSource {
    /// A uniformly colored environment.
    pub fn solid(width: u32, height: u32, rgb: [f32; 3]) -> Self {
        let texels = (0..width * height)
            .flat_map(|_| [rgb[0], rgb[1], rgb[2], 1.0])
            .collect();
        Self { width, height, texels }
    }
}

/// Decodes a `.hdr` (or any format `image` reads) into float texels.
pub fn load_equirect(path: impl AsRef<Path>) -> Result<EquirectSource, IblError> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|source| IblError::Source {
        path: path.to_path_buf(),
        source,
    })?;
    let image = image.into_rgba32f();
    log::info!("Loaded environment {} ({}x{})", path.display(), image.width(), image.height());
    Ok(EquirectSource {
        width: image.width(),
        height: image.height(),
        texels: image.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_source_layout() {
        let source = EquirectSource::solid(4, 2, [0.5, 1.0, 2.0]);
        assert_eq!(source.texels.len(), 4 * 2 * 4);
        assert_eq!(&source.texels[4..8], &[0.5, 1.0, 2.0, 1.0]);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = load_equirect("nowhere/sky.hdr").unwrap_err();
        assert!(matches!(err, IblError::Source { .. }));
        assert!(err.to_string().contains("nowhere/sky.hdr"));
    }
}
