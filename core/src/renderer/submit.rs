//! Scene submission: one indexed draw per submesh of every entity, in list order.

use pbr_engine_scene::{EntityId, MaterialId, MeshId, ModelId, Scene};
use thiserror::Error;

use crate::gpu::GpuError;
use crate::params::FrameParams;

use super::binding_cache::{LinkError, SubmeshKey};
use super::materials::GpuMaterials;
use super::meshes::GpuMeshes;
use super::pipeline::PbrPipelines;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("entity {entity} refers to missing model {model}")]
    UnknownModel { entity: EntityId, model: ModelId },
    #[error("model {model} refers to missing mesh {mesh}")]
    UnknownMesh { model: ModelId, mesh: MeshId },
    #[error("entity {entity} has no parameter block this frame")]
    MissingLocalRange { entity: EntityId },
    #[error("cannot bind {key:?}: {source}")]
    Link {
        key: SubmeshKey,
        #[source]
        source: LinkError,
    },
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Everything one draw binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawCommand {
    pub entity: EntityId,
    pub key: SubmeshKey,
    pub material: Option<MaterialId>,
    /// `[global, local]` offsets for the parameter group.
    pub dynamic_offsets: [wgpu::DynamicOffset; 2],
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct DrawStats {
    pub draws: usize,
    /// Submeshes without vertex or index data.
    pub skipped: usize,
}

/// Resolves entity → model → mesh → submeshes for the frame.
pub fn plan_draws(scene: &Scene, params: &FrameParams) -> Result<Vec<DrawCommand>, SubmitError> {
    let mut commands = Vec::new();
    for (entity_id, entity) in scene.entities.iter().enumerate() {
        let model = scene.models.get(entity.model).ok_or(SubmitError::UnknownModel {
            entity: entity_id,
            model: entity.model,
        })?;
        let mesh = scene.meshes.get(model.mesh).ok_or(SubmitError::UnknownMesh {
            model: entity.model,
            mesh: model.mesh,
        })?;
        let local = params
            .locals
            .get(entity_id)
            .ok_or(SubmitError::MissingLocalRange { entity: entity_id })?;

        for (index, submesh) in mesh.submeshes.iter().enumerate() {
            commands.push(DrawCommand {
                entity: entity_id,
                key: SubmeshKey {
                    mesh: model.mesh,
                    submesh: index,
                },
                material: model.material_for(submesh),
                dynamic_offsets: [params.global.dynamic_offset(), local.dynamic_offset()],
            });
        }
    }
    Ok(commands)
}

/// What recording draws needs besides the pass.
pub struct SubmitContext<'a> {
    pub device: &'a wgpu::Device,
    pub scene: &'a Scene,
    pub meshes: &'a GpuMeshes,
    pub materials: &'a GpuMaterials,
    pub params: &'a wgpu::BindGroup,
}

/// Records the planned draws into `pass`.
pub fn record_draws(
    pass: &mut wgpu::RenderPass<'_>,
    pipelines: &mut PbrPipelines,
    ctx: &SubmitContext,
    commands: &[DrawCommand],
) -> Result<DrawStats, SubmitError> {
    let mut stats = DrawStats::default();
    for command in commands {
        let key = command.key;
        let Some(submesh) = ctx.scene.meshes.get(key.mesh).and_then(|m| m.submeshes.get(key.submesh)) else {
            stats.skipped += 1;
            continue;
        };
        let Some(range) = ctx.meshes.range(key) else {
            stats.skipped += 1;
            continue;
        };

        let pipeline = pipelines.get_or_create(ctx.device, key, &submesh.layout)?;
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, ctx.params, &command.dynamic_offsets);
        pass.set_bind_group(1, ctx.materials.get(command.material), &[]);
        if !ctx.meshes.bind(pass, &range) {
            stats.skipped += 1;
            continue;
        }
        pass.draw_indexed(0..range.index_count, 0, 0..1);
        stats.draws += 1;
    }
    Ok(stats)
}
