use log::debug;

use crate::{
    scene::{Face, PrimitiveTypes, Scene},
    Result,
};

use super::{PostProcessStage, PostProcessSteps, SharedPostProcessState};

/// Splits polygonal faces into triangle fans. Points and lines pass
/// through untouched; use the sort-by-primitive-type stage to separate or
/// drop them.
///
/// The fan decomposition is exact for convex polygons, which is what the
/// bundled importers emit. Corners a fan would reuse are duplicated so the
/// verbose vertex format survives triangulation; join-identical-vertices
/// merges them again when sharing is wanted.
#[derive(Debug, Default)]
pub struct Triangulate;

impl PostProcessStage for Triangulate {
    fn name(&self) -> &'static str {
        "Triangulate"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::TRIANGULATE
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        shared.assert_no_spatial_sorts(self.name());
        let mut split_faces = 0usize;
        for mesh in &mut scene.meshes {
            if !mesh.primitive_types.contains(PrimitiveTypes::POLYGON) {
                continue;
            }
            split_faces += mesh.faces.iter().filter(|face| face.indices.len() > 3).count();
            let old_faces = std::mem::take(&mut mesh.faces);
            let mut faces = Vec::with_capacity(old_faces.len());
            for face in old_faces {
                if face.indices.len() <= 3 {
                    faces.push(face);
                    continue;
                }
                let corners = face.indices;
                for j in 1..corners.len() - 1 {
                    // The anchor and the trailing corner of the previous
                    // triangle would be referenced twice; duplicate them to
                    // keep every vertex unique to one face.
                    let anchor = if j == 1 { corners[0] } else { mesh.duplicate_vertex(corners[0]) };
                    let second = if j == 1 { corners[j] } else { mesh.duplicate_vertex(corners[j]) };
                    faces.push(Face::new(vec![anchor, second, corners[j + 1]]));
                }
            }
            mesh.faces = faces;
            mesh.infer_primitive_types();
        }
        if split_faces > 0 {
            debug!("Triangulated {split_faces} polygons");
        }
        Ok(())
    }
}
