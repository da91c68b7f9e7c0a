use log::debug;

use crate::{
    properties::{config, PropertyStore},
    scene::{Face, Scene},
    Result,
};

use super::{gather_faces, PostProcessStage, PostProcessSteps, SharedPostProcessState};

/// Default triangle count above which a mesh is split along the face axis.
pub const DEFAULT_TRIANGLE_LIMIT: usize = 1_000_000;
/// Default vertex count above which a mesh is split along the vertex axis.
pub const DEFAULT_VERTEX_LIMIT: usize = 1_000_000;

/// Splits meshes whose face count exceeds a configurable limit into several
/// meshes referencing the same node. Runs early enough that face-normal
/// generation never sees an oversized mesh.
#[derive(Debug)]
pub struct SplitLargeMeshesTriangle {
    limit: usize,
}

impl Default for SplitLargeMeshesTriangle {
    fn default() -> Self {
        Self {
            limit: DEFAULT_TRIANGLE_LIMIT,
        }
    }
}

impl PostProcessStage for SplitLargeMeshesTriangle {
    fn name(&self) -> &'static str {
        "SplitLargeMeshesTriangle"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::SPLIT_LARGE_MESHES
    }

    fn setup_properties(&mut self, properties: &PropertyStore) {
        self.limit = properties.int(config::SPLIT_MESH_TRIANGLE_LIMIT, DEFAULT_TRIANGLE_LIMIT as i32).max(1) as usize;
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        shared.assert_no_spatial_sorts(self.name());
        split(scene, |mesh| {
            if mesh.face_count() <= self.limit {
                return None;
            }
            Some(mesh.faces.chunks(self.limit).map(<[Face]>::to_vec).collect())
        })
    }
}

/// Splits meshes whose vertex count exceeds a configurable limit. Runs
/// after join-identical-vertices because joining is what shrinks the vertex
/// count; splitting earlier would be both wasted and wrong.
#[derive(Debug)]
pub struct SplitLargeMeshesVertex {
    limit: usize,
}

impl Default for SplitLargeMeshesVertex {
    fn default() -> Self {
        Self {
            limit: DEFAULT_VERTEX_LIMIT,
        }
    }
}

impl PostProcessStage for SplitLargeMeshesVertex {
    fn name(&self) -> &'static str {
        "SplitLargeMeshesVertex"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::SPLIT_LARGE_MESHES
    }

    fn setup_properties(&mut self, properties: &PropertyStore) {
        self.limit = properties.int(config::SPLIT_MESH_VERTEX_LIMIT, DEFAULT_VERTEX_LIMIT as i32).max(1) as usize;
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        shared.assert_no_spatial_sorts(self.name());
        split(scene, |mesh| {
            if mesh.vertex_count() <= self.limit {
                return None;
            }
            // Greedy: faces accumulate into a batch until the batch would
            // reference more vertices than the limit allows.
            let mut batches: Vec<Vec<Face>> = Vec::new();
            let mut batch: Vec<Face> = Vec::new();
            let mut batch_vertices = 0usize;
            for face in &mesh.faces {
                let corners = face.indices.len();
                if !batch.is_empty() && batch_vertices + corners > self.limit {
                    batches.push(std::mem::take(&mut batch));
                    batch_vertices = 0;
                }
                batch_vertices += corners;
                batch.push(face.clone());
            }
            if !batch.is_empty() {
                batches.push(batch);
            }
            Some(batches)
        })
    }
}

fn split(scene: &mut Scene, mut plan: impl FnMut(&crate::scene::Mesh) -> Option<Vec<Vec<Face>>>) -> Result<()> {
    let old_meshes = std::mem::take(&mut scene.meshes);
    let mut replacements: Vec<Vec<u32>> = Vec::with_capacity(old_meshes.len());
    for mesh in old_meshes {
        match plan(&mesh) {
            None => {
                replacements.push(vec![scene.meshes.len() as u32]);
                scene.meshes.push(mesh);
            }
            Some(batches) => {
                debug!("Splitting a mesh with {} faces into {} parts", mesh.face_count(), batches.len());
                let mut indices = Vec::with_capacity(batches.len());
                for batch in &batches {
                    indices.push(scene.meshes.len() as u32);
                    scene.meshes.push(gather_faces(&mesh, batch));
                }
                replacements.push(indices);
            }
        }
    }
    scene.visit_nodes_mut(|node| {
        let old = std::mem::take(&mut node.meshes);
        for mesh_index in old {
            node.meshes.extend(&replacements[mesh_index as usize]);
        }
    });
    Ok(())
}
