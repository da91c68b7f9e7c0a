use log::debug;
use nalgebra::Vector3;

use crate::{
    properties::{config, PropertyStore},
    scene::{Mesh, PrimitiveTypes, Scene},
    Error, Result,
};

use super::{PostProcessStage, PostProcessSteps, SharedPostProcessState};

/// Computes the area-plane normal of a face; zero for points and lines.
fn face_normal(mesh: &Mesh, face: &[u32]) -> Vector3<f32> {
    if face.len() < 3 {
        return Vector3::zeros();
    }
    let a = mesh.positions[face[0] as usize];
    let b = mesh.positions[face[1] as usize];
    let c = mesh.positions[face[2] as usize];
    let normal = (b - a).cross(&(c - a));
    if normal.norm_squared() > 0.0 {
        normal.normalize()
    } else {
        Vector3::zeros()
    }
}

/// Generates flat per-face normals for meshes that carry none: every corner
/// of a face receives the face plane normal.
#[derive(Debug, Default)]
pub struct GenFaceNormals;

impl PostProcessStage for GenFaceNormals {
    fn name(&self) -> &'static str {
        "GenFaceNormals"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::GEN_NORMALS
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        shared.assert_no_spatial_sorts(self.name());
        let mut generated = 0usize;
        for mesh in &mut scene.meshes {
            if mesh.has_normals() || !mesh.primitive_types.intersects(PrimitiveTypes::TRIANGLE | PrimitiveTypes::POLYGON) {
                continue;
            }
            let mut normals = vec![Vector3::zeros(); mesh.vertex_count()];
            for face in &mesh.faces {
                let normal = face_normal(mesh, &face.indices);
                for index in &face.indices {
                    normals[*index as usize] = normal;
                }
            }
            mesh.normals = Some(normals);
            generated += 1;
        }
        if generated > 0 {
            debug!("Generated flat normals for {generated} meshes");
        }
        Ok(())
    }
}

/// Default maximum angle in degrees across which vertex normals are still
/// smoothed.
pub const DEFAULT_MAX_SMOOTHING_ANGLE: f32 = 175.0;

/// Generates smoothed per-vertex normals for meshes that carry none.
///
/// Face normals are averaged over all vertices that share a position,
/// located through the spatial sort built by the compute-spatial-sort
/// marker. Faces meeting at an angle sharper than the configured maximum
/// keep their crease instead of being smoothed over.
#[derive(Debug)]
pub struct GenVertexNormals {
    max_angle_degrees: f32,
}

impl Default for GenVertexNormals {
    fn default() -> Self {
        Self {
            max_angle_degrees: DEFAULT_MAX_SMOOTHING_ANGLE,
        }
    }
}

impl PostProcessStage for GenVertexNormals {
    fn name(&self) -> &'static str {
        "GenVertexNormals"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::GEN_SMOOTH_NORMALS
    }

    fn setup_properties(&mut self, properties: &PropertyStore) {
        self.max_angle_degrees = properties
            .float(config::MAX_SMOOTHING_ANGLE, DEFAULT_MAX_SMOOTHING_ANGLE)
            .clamp(0.0, 175.0);
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        let min_cos = self.max_angle_degrees.to_radians().cos();
        let mut generated = 0usize;
        for (mesh_index, mesh) in scene.meshes.iter_mut().enumerate() {
            if mesh.has_normals() || !mesh.primitive_types.intersects(PrimitiveTypes::TRIANGLE | PrimitiveTypes::POLYGON) {
                continue;
            }
            let sort = shared
                .spatial_sorts()
                .and_then(|sorts| sorts.get(mesh_index))
                .ok_or(Error::StageFailed {
                    stage: "GenVertexNormals",
                    message: "spatial sort is not available; the pipeline ordering is broken".into(),
                })?;

            // one face normal per vertex first, smoothing second
            let mut flat = vec![Vector3::zeros(); mesh.vertex_count()];
            for face in &mesh.faces {
                let normal = face_normal(mesh, &face.indices);
                for index in &face.indices {
                    flat[*index as usize] = normal;
                }
            }

            let mut smoothed = vec![Vector3::zeros(); mesh.vertex_count()];
            let mut neighbors = Vec::new();
            for (vertex, position) in mesh.positions.iter().enumerate() {
                neighbors.clear();
                sort.find_identical_positions(position, &mut neighbors);
                let own = flat[vertex];
                let mut sum = Vector3::zeros();
                for neighbor in &neighbors {
                    let other = flat[*neighbor as usize];
                    if own.dot(&other) >= min_cos {
                        sum += other;
                    }
                }
                smoothed[vertex] = if sum.norm_squared() > 0.0 { sum.normalize() } else { own };
            }
            mesh.normals = Some(smoothed);
            generated += 1;
        }
        if generated > 0 {
            debug!("Generated smooth normals for {generated} meshes");
        }
        Ok(())
    }
}
