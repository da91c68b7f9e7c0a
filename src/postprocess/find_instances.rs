use std::hash::{Hash, Hasher};

use ahash::AHasher;
use log::debug;

use crate::{
    scene::{Mesh, Scene},
    Result,
};

use super::{PostProcessStage, PostProcessSteps, SharedPostProcessState};

/// Finds meshes that duplicate an earlier mesh and rewrites all node
/// references to point at the first occurrence, so instanced geometry is
/// stored once.
#[derive(Debug, Default)]
pub struct FindInstances;

impl PostProcessStage for FindInstances {
    fn name(&self) -> &'static str {
        "FindInstances"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::FIND_INSTANCES
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        shared.assert_no_spatial_sorts(self.name());
        if scene.meshes.len() < 2 {
            return Ok(());
        }

        let fingerprints = scene.meshes.iter().map(fingerprint).collect::<Vec<_>>();
        let mut canonical: Vec<usize> = (0..scene.meshes.len()).collect();
        for later in 1..scene.meshes.len() {
            for earlier in 0..later {
                if canonical[earlier] == earlier
                    && fingerprints[earlier] == fingerprints[later]
                    && meshes_equal(&scene.meshes[earlier], &scene.meshes[later])
                {
                    canonical[later] = earlier;
                    break;
                }
            }
        }

        // Compact the mesh array, dropping duplicates, and remap node
        // references onto the surviving indices.
        let mut remap = vec![u32::MAX; scene.meshes.len()];
        let mut kept = 0u32;
        let old_count = scene.meshes.len();
        let mut index = 0usize;
        scene.meshes.retain(|_| {
            let keep = canonical[index] == index;
            if keep {
                remap[index] = kept;
                kept += 1;
            }
            index += 1;
            keep
        });
        scene.visit_nodes_mut(|node| {
            for mesh_index in &mut node.meshes {
                *mesh_index = remap[canonical[*mesh_index as usize]];
            }
        });

        if (kept as usize) != old_count {
            debug!("Found {} instanced meshes of {}", old_count - kept as usize, old_count);
        }
        Ok(())
    }
}

fn fingerprint(mesh: &Mesh) -> u64 {
    let mut hasher = AHasher::default();
    mesh.vertex_count().hash(&mut hasher);
    mesh.face_count().hash(&mut hasher);
    mesh.material_index.hash(&mut hasher);
    for position in &mesh.positions {
        for component in position.iter() {
            component.to_bits().hash(&mut hasher);
        }
    }
    hasher.finish()
}

fn same_vectors(a: &[nalgebra::Vector3<f32>], b: &[nalgebra::Vector3<f32>]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(left, right)| left.iter().zip(right.iter()).all(|(l, r)| l.to_bits() == r.to_bits()))
}

fn same_optional_vectors(a: &Option<Vec<nalgebra::Vector3<f32>>>, b: &Option<Vec<nalgebra::Vector3<f32>>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => same_vectors(a, b),
        _ => false,
    }
}

fn meshes_equal(a: &Mesh, b: &Mesh) -> bool {
    a.material_index == b.material_index
        && a.faces == b.faces
        && same_vectors(&a.positions, &b.positions)
        && same_optional_vectors(&a.normals, &b.normals)
        && same_optional_vectors(&a.tangents, &b.tangents)
        && a.texture_coords
            .iter()
            .zip(&b.texture_coords)
            .all(|(a, b)| same_optional_vectors(a, b))
}
