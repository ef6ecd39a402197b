//! Model import from glTF 2.0 files.
//!
//! Produces one [`Mesh`] whose submeshes are the triangle primitives of the
//! default scene, with node transforms baked into the vertex data, plus the
//! materials those submeshes index.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use cgmath::{InnerSpace, Matrix, Matrix3, Matrix4, SquareMatrix, Vector3, Vector4};
use gltf::image::Format;
use image::{DynamicImage, ImageBuffer};

use crate::material::Material;
use crate::mesh::{Mesh, Submesh, VertexLayout, VertexSemantic};
use crate::texture::{TextureData, TextureId, TextureRegistry};

/// Result of importing a model file.
#[derive(Debug, Clone)]
pub struct ImportedModel {
    pub name: String,
    pub mesh: Mesh,
    /// Materials in file order; `Submesh::material_index` points into this list.
    pub materials: Vec<Material>,
}

struct ImportContext<'a> {
    path: &'a Path,
    buffers: &'a [gltf::buffer::Data],
    images: &'a [gltf::image::Data],
}

/// Imports a `.gltf`/`.glb` file. Textures are decoded into `textures`.
pub fn import_gltf(path: impl AsRef<Path>, textures: &mut TextureRegistry) -> Result<ImportedModel> {
    let path = path.as_ref();
    let (document, buffers, images) =
        gltf::import(path).with_context(|| format!("Failed to read glTF {}", path.display()))?;
    let ctx = ImportContext {
        path,
        buffers: &buffers,
        images: &images,
    };

    let mut materials: Vec<Material> = document
        .materials()
        .map(|m| load_material(&ctx, &m, textures))
        .collect();
    // Primitives without a material use this trailing default.
    let default_material = materials.len();
    materials.push(Material::new("default"));

    let mut submeshes = Vec::new();
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| anyhow!("glTF {} contains no scene", path.display()))?;
    for node in scene.nodes() {
        load_node(&ctx, &node, Matrix4::identity(), default_material, &mut submeshes)?;
    }

    if submeshes.is_empty() {
        bail!("glTF {} contains no triangle meshes", path.display());
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    log::info!("Imported {} ({} submeshes, {} materials)", name, submeshes.len(), materials.len());

    Ok(ImportedModel {
        mesh: Mesh {
            name: name.clone(),
            submeshes,
        },
        name,
        materials,
    })
}

fn load_node(
    ctx: &ImportContext,
    node: &gltf::Node,
    parent: Matrix4<f32>,
    default_material: usize,
    submeshes: &mut Vec<Submesh>,
) -> Result<()> {
    let transform = parent * Matrix4::from(node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!("Skipping non-triangle primitive in mesh {:?}", mesh.name());
                continue;
            }
            let material_index = primitive.material().index().unwrap_or(default_material);
            submeshes.push(load_primitive(ctx, &primitive, transform, material_index)?);
        }
    }

    for child in node.children() {
        load_node(ctx, &child, transform, default_material, submeshes)?;
    }
    Ok(())
}

/// Reads one primitive into an interleaved position/normal/uv (+tangent) submesh.
fn load_primitive(
    ctx: &ImportContext,
    primitive: &gltf::Primitive,
    transform: Matrix4<f32>,
    material_index: usize,
) -> Result<Submesh> {
    let reader = primitive.reader(|buffer| Some(&ctx.buffers[buffer.index()]));

    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .ok_or_else(|| anyhow!("Primitive missing positions"))?
        .collect();
    let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|n| n.collect());
    let tex_coords: Option<Vec<[f32; 2]>> = reader.read_tex_coords(0).map(|t| t.into_f32().collect());
    let tangents: Option<Vec<[f32; 4]>> = reader.read_tangents().map(|t| t.collect());

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };

    let mut attributes = vec![
        (VertexSemantic::Position, 3),
        (VertexSemantic::Normal, 3),
        (VertexSemantic::TexCoord, 2),
    ];
    if tangents.is_some() {
        attributes.push((VertexSemantic::Tangent, 4));
    }
    let layout = VertexLayout::interleaved(&attributes);

    let normal_matrix = normal_matrix(&transform);
    let mut vertices = Vec::with_capacity(positions.len() * layout.floats_per_vertex());
    for (i, position) in positions.iter().enumerate() {
        let p = transform * Vector4::new(position[0], position[1], position[2], 1.0);
        vertices.extend_from_slice(&[p.x, p.y, p.z]);

        let n = normals.as_ref().map_or([0.0, 1.0, 0.0], |n| n[i]);
        let n = (normal_matrix * Vector3::from(n)).normalize();
        vertices.extend_from_slice(&[n.x, n.y, n.z]);

        let uv = tex_coords.as_ref().map_or([0.0, 0.0], |t| t[i]);
        vertices.extend_from_slice(&uv);

        if let Some(tangents) = &tangents {
            let t = tangents[i];
            let dir = (transform * Vector4::new(t[0], t[1], t[2], 0.0)).truncate();
            let dir = if dir.magnitude2() > 0.0 { dir.normalize() } else { dir };
            vertices.extend_from_slice(&[dir.x, dir.y, dir.z, t[3]]);
        }
    }

    Ok(Submesh {
        layout,
        vertices,
        indices,
        material_index,
    })
}

/// Inverse-transpose of the upper 3x3, for transforming normals.
fn normal_matrix(transform: &Matrix4<f32>) -> Matrix3<f32> {
    let upper = Matrix3::from_cols(transform.x.truncate(), transform.y.truncate(), transform.z.truncate());
    upper.invert().map(|m| m.transpose()).unwrap_or(upper)
}

fn load_material(ctx: &ImportContext, material: &gltf::Material, textures: &mut TextureRegistry) -> Material {
    let name = material
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("material{}", material.index().unwrap_or(0)));
    let pbr = material.pbr_metallic_roughness();

    // A map that fails to load is left unset so the renderer binds its fallback.
    let mut load = |texture: Option<gltf::Texture<'_>>, srgb: bool, slot: &str| -> Option<TextureId> {
        let texture = texture?;
        match load_texture(ctx, &texture, srgb, textures) {
            Ok(id) => Some(id),
            Err(err) => {
                log::warn!("Material '{}': dropping {} map: {:#}", name, slot, err);
                None
            }
        }
    };

    let albedo = load(pbr.base_color_texture().map(|info| info.texture()), true, "base color");
    // glTF packs roughness in G and metallic in B; both slots read that texture.
    let metallic_roughness = load(
        pbr.metallic_roughness_texture().map(|info| info.texture()),
        false,
        "metallic-roughness",
    );
    let normal = load(material.normal_texture().map(|n| n.texture()), false, "normal");
    let ao = load(material.occlusion_texture().map(|o| o.texture()), false, "occlusion");

    Material {
        albedo,
        normal,
        metallic: metallic_roughness,
        roughness: metallic_roughness,
        ao,
        ..Material::new(name.clone())
    }
}

fn load_texture(
    ctx: &ImportContext,
    texture: &gltf::Texture,
    srgb: bool,
    textures: &mut TextureRegistry,
) -> Result<TextureId> {
    let image = texture.source();
    if let Some(path) = resolve_image_path(ctx, &image) {
        return textures.load(path, srgb);
    }

    let data = ctx
        .images
        .get(image.index())
        .ok_or_else(|| anyhow!("glTF image {} has no decoded data", image.index()))?;
    let key = PathBuf::from(format!("{}#image{}", ctx.path.display(), image.index()));
    Ok(textures.insert_keyed(key, convert_image(data)?, srgb))
}

/// Resolves an external image URI relative to the glTF file.
fn resolve_image_path(ctx: &ImportContext, image: &gltf::Image) -> Option<PathBuf> {
    let gltf::image::Source::Uri { uri, .. } = image.source() else {
        return None;
    };
    if uri.starts_with("data:") {
        return None;
    }
    let path = ctx.path.parent()?.join(uri);
    path.exists().then_some(path)
}

/// Converts decoded image data of any glTF pixel format to 8-bit texels.
///
/// Wide formats arrive as native-endian bytes; they are rebuilt into the
/// matching `image` buffer and narrowed by it.
fn convert_image(data: &gltf::image::Data) -> Result<TextureData> {
    let (w, h) = (data.width, data.height);
    let bytes = &data.pixels;
    let image = match data.format {
        Format::R8 => ImageBuffer::from_raw(w, h, bytes.clone()).map(DynamicImage::ImageLuma8),
        Format::R8G8 => ImageBuffer::from_raw(w, h, bytes.clone()).map(DynamicImage::ImageLumaA8),
        Format::R8G8B8 => ImageBuffer::from_raw(w, h, bytes.clone()).map(DynamicImage::ImageRgb8),
        Format::R8G8B8A8 => ImageBuffer::from_raw(w, h, bytes.clone()).map(DynamicImage::ImageRgba8),
        Format::R16 => ImageBuffer::from_raw(w, h, words(bytes)).map(DynamicImage::ImageLuma16),
        Format::R16G16 => ImageBuffer::from_raw(w, h, words(bytes)).map(DynamicImage::ImageLumaA16),
        Format::R16G16B16 => ImageBuffer::from_raw(w, h, words(bytes)).map(DynamicImage::ImageRgb16),
        Format::R16G16B16A16 => ImageBuffer::from_raw(w, h, words(bytes)).map(DynamicImage::ImageRgba16),
        Format::R32G32B32FLOAT => ImageBuffer::from_raw(w, h, floats(bytes)).map(DynamicImage::ImageRgb32F),
        Format::R32G32B32A32FLOAT => ImageBuffer::from_raw(w, h, floats(bytes)).map(DynamicImage::ImageRgba32F),
    };
    let image = image.ok_or_else(|| {
        anyhow!(
            "glTF image data ({} bytes) is too short for {}x{} {:?}",
            bytes.len(),
            w,
            h,
            data.format
        )
    })?;
    Ok(TextureData::from_image(image))
}

fn words(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|b| u16::from_ne_bytes([b[0], b[1]]))
        .collect()
}

fn floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_matrix_of_uniform_scale_keeps_direction() {
        let m = Matrix4::from_scale(3.0);
        let n = (normal_matrix(&m) * Vector3::new(0.0, 1.0, 0.0)).normalize();
        assert!((n - Vector3::new(0.0, 1.0, 0.0)).magnitude() < 1e-6);
    }

    #[test]
    fn test_import_missing_file_fails() {
        let mut textures = TextureRegistry::new();
        let err = import_gltf("missing/model.gltf", &mut textures).unwrap_err();
        assert!(err.to_string().contains("missing/model.gltf"));
    }

    fn image_data(format: Format, width: u32, height: u32, pixels: Vec<u8>) -> gltf::image::Data {
        gltf::image::Data {
            pixels,
            format,
            width,
            height,
        }
    }

    #[test]
    fn test_sixteen_bit_image_narrows_to_eight_bit() {
        let texels: [u16; 6] = [0, 32896, 65535, 65535, 257, 0];
        let pixels = texels.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let data = convert_image(&image_data(Format::R16G16B16, 2, 1, pixels)).unwrap();

        assert_eq!(data.channels, 3);
        assert_eq!((data.width, data.height), (2, 1));
        assert_eq!(data.pixels, vec![0, 128, 255, 255, 1, 0]);
    }

    #[test]
    fn test_float_image_clamps_to_unit_range() {
        let texels: [f32; 4] = [-0.5, 0.5, 1.0, 4.0];
        let pixels = texels.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let data = convert_image(&image_data(Format::R32G32B32A32FLOAT, 1, 1, pixels)).unwrap();

        assert_eq!(data.channels, 4);
        assert_eq!(data.pixels[0], 0);
        assert!((data.pixels[1] as i32 - 128).abs() <= 1);
        assert_eq!(&data.pixels[2..], &[255, 255]);
    }

    #[test]
    fn test_eight_bit_image_passes_through() {
        let data = convert_image(&image_data(Format::R8G8, 1, 2, vec![10, 20, 30, 40])).unwrap();
        assert_eq!(data.channels, 2);
        assert_eq!(data.pixels, vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_truncated_image_data_fails() {
        let err = convert_image(&image_data(Format::R16, 4, 4, vec![0; 8])).unwrap_err();
        assert!(err.to_string().contains("R16"));
    }
}
