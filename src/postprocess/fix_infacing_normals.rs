use log::debug;
use nalgebra::Vector3;

use crate::{scene::Scene, Result};

use super::{PostProcessStage, PostProcessSteps, SharedPostProcessState};

/// Detects meshes whose normals point into the body and turns them outward.
///
/// The heuristic compares the bounding box of the vertices with the
/// bounding box of the vertices displaced along their normals: for a closed
/// surface with inward normals the displaced box shrinks. When a flip is
/// decided, the winding order of the faces is reversed as well so culling
/// stays consistent.
#[derive(Debug, Default)]
pub struct FixInfacingNormals;

impl PostProcessStage for FixInfacingNormals {
    fn name(&self) -> &'static str {
        "FixInfacingNormals"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::FIX_INFACING_NORMALS
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        shared.assert_no_spatial_sorts(self.name());
        for (mesh_index, mesh) in scene.meshes.iter_mut().enumerate() {
            let Some(normals) = &mesh.normals else {
                continue;
            };
            if mesh.positions.is_empty() {
                continue;
            }

            let plain = bounding_box(mesh.positions.iter().copied());
            let displaced = bounding_box(
                mesh.positions
                    .iter()
                    .zip(normals)
                    .map(|(position, normal)| position + normal),
            );
            if volume(&displaced) >= volume(&plain) {
                continue;
            }

            debug!("Normals of mesh {mesh_index} face inward; flipping");
            for normal in mesh.normals.as_mut().expect("checked above") {
                *normal = -*normal;
            }
            if let Some(bitangents) = &mut mesh.bitangents {
                for bitangent in bitangents {
                    *bitangent = -*bitangent;
                }
            }
            for face in &mut mesh.faces {
                face.indices.reverse();
            }
        }
        Ok(())
    }
}

fn bounding_box(positions: impl Iterator<Item = Vector3<f32>>) -> (Vector3<f32>, Vector3<f32>) {
    let mut min = Vector3::repeat(f32::INFINITY);
    let mut max = Vector3::repeat(f32::NEG_INFINITY);
    for position in positions {
        min = min.inf(&position);
        max = max.sup(&position);
    }
    (min, max)
}

fn volume((min, max): &(Vector3<f32>, Vector3<f32>)) -> f32 {
    let extent = max - min;
    extent.x.max(0.0) * extent.y.max(0.0) * extent.z.max(0.0)
}
