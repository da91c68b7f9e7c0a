use std::collections::HashMap;

use log::debug;

use crate::{
    properties::{config, PropertyStore},
    scene::Scene,
    Result,
};

use super::{PostProcessStage, PostProcessSteps, SharedPostProcessState};

/// Default maximum number of bone influences per vertex.
pub const DEFAULT_WEIGHT_LIMIT: usize = 4;

/// Caps the number of bone influences per vertex at a configurable limit.
/// The strongest influences survive and are renormalized to sum to one, so
/// skinning shaders with fixed-size weight registers can consume the mesh
/// directly.
#[derive(Debug)]
pub struct LimitBoneWeights {
    limit: usize,
}

impl Default for LimitBoneWeights {
    fn default() -> Self {
        Self {
            limit: DEFAULT_WEIGHT_LIMIT,
        }
    }
}

impl PostProcessStage for LimitBoneWeights {
    fn name(&self) -> &'static str {
        "LimitBoneWeights"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::LIMIT_BONE_WEIGHTS
    }

    fn setup_properties(&mut self, properties: &PropertyStore) {
        self.limit = properties.int(config::BONE_WEIGHT_LIMIT, DEFAULT_WEIGHT_LIMIT as i32).max(1) as usize;
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        shared.assert_no_spatial_sorts(self.name());
        let mut removed = 0usize;
        for mesh in &mut scene.meshes {
            if !mesh.has_bones() {
                continue;
            }
            // per vertex: (bone index, weight)
            let mut influences: Vec<Vec<(usize, f32)>> = vec![Vec::new(); mesh.vertex_count()];
            for (bone_index, bone) in mesh.bones.iter().enumerate() {
                for weight in &bone.weights {
                    influences[weight.vertex_id as usize].push((bone_index, weight.weight));
                }
            }

            // vertex -> surviving (bone, renormalized weight) pairs
            let mut limited: HashMap<u32, Vec<(usize, f32)>> = HashMap::new();
            for (vertex, mut list) in influences.into_iter().enumerate() {
                if list.len() <= self.limit {
                    continue;
                }
                list.sort_by(|a, b| b.1.total_cmp(&a.1));
                removed += list.len() - self.limit;
                list.truncate(self.limit);
                let total: f32 = list.iter().map(|(_, weight)| weight).sum();
                if total > 0.0 {
                    for (_, weight) in &mut list {
                        *weight /= total;
                    }
                }
                limited.insert(vertex as u32, list);
            }

            if removed == 0 {
                continue;
            }
            for (bone_index, bone) in mesh.bones.iter_mut().enumerate() {
                bone.weights.retain_mut(|weight| match limited.get(&weight.vertex_id) {
                    // vertex was within the limit, nothing changes
                    None => true,
                    Some(survivors) => match survivors.iter().find(|(bone, _)| *bone == bone_index) {
                        None => false,
                        Some((_, renormalized)) => {
                            weight.weight = *renormalized;
                            true
                        }
                    },
                });
            }
            mesh.bones.retain(|bone| !bone.weights.is_empty());
        }
        if removed > 0 {
            debug!("Removed {removed} bone influences above the limit of {}", self.limit);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{Matrix4, Vector3};

    use crate::scene::{Bone, Face, Mesh, VertexWeight};

    use super::*;

    fn skinned_triangle(weights_on_vertex0: &[f32]) -> Mesh {
        let mut mesh = Mesh {
            positions: vec![Vector3::zeros(), Vector3::x(), Vector3::y()],
            faces: vec![Face::new(vec![0, 1, 2])],
            ..Mesh::default()
        };
        for (bone_index, weight) in weights_on_vertex0.iter().enumerate() {
            mesh.bones.push(Bone {
                node_name: format!("bone{bone_index}"),
                offset_matrix: Matrix4::identity(),
                weights: vec![VertexWeight::new(0, *weight)],
            });
        }
        mesh
    }

    #[test]
    fn weakest_influences_are_dropped_and_rest_renormalized() {
        let mut scene = Scene::with_root("root");
        scene.meshes.push(skinned_triangle(&[0.4, 0.3, 0.2, 0.05, 0.05]));

        let mut properties = PropertyStore::new();
        properties.set_int(config::BONE_WEIGHT_LIMIT, 2);
        let mut stage = LimitBoneWeights::default();
        stage.setup_properties(&properties);
        stage.execute(&mut scene, &mut SharedPostProcessState::default()).unwrap();

        let mesh = &scene.meshes[0];
        // bones 2..4 lost their only weight and disappeared
        assert_eq!(mesh.bones.len(), 2);
        let total: f32 = mesh.bones.iter().flat_map(|bone| &bone.weights).map(|weight| weight.weight).sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!((mesh.bones[0].weights[0].weight - 0.4 / 0.7).abs() < 1e-6);
    }

    #[test]
    fn within_limit_is_untouched() {
        let mut scene = Scene::with_root("root");
        scene.meshes.push(skinned_triangle(&[0.6, 0.4]));
        LimitBoneWeights::default()
            .execute(&mut scene, &mut SharedPostProcessState::default())
            .unwrap();
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.bones.len(), 2);
        assert_eq!(mesh.bones[0].weights[0].weight, 0.6);
    }
}
