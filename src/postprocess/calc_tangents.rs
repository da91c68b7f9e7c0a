use log::{debug, warn};
use nalgebra::Vector3;

use crate::{
    properties::{config, PropertyStore},
    scene::{Mesh, PrimitiveTypes, Scene},
    Error, Result,
};

use super::{PostProcessStage, PostProcessSteps, SharedPostProcessState};

/// Default maximum angle in degrees across which tangents are still
/// smoothed. Tighter than the normal smoothing default since tangent seams
/// are much more visible.
pub const DEFAULT_MAX_SMOOTHING_ANGLE: f32 = 45.0;

/// Derives a tangent and bitangent per vertex from the first texture
/// coordinate set, then smooths them across vertices sharing a position
/// through the spatial sort.
///
/// Requires normals and texture coordinates; meshes lacking either are
/// skipped with a warning.
#[derive(Debug)]
pub struct CalcTangents {
    max_angle_degrees: f32,
}

impl Default for CalcTangents {
    fn default() -> Self {
        Self {
            max_angle_degrees: DEFAULT_MAX_SMOOTHING_ANGLE,
        }
    }
}

impl PostProcessStage for CalcTangents {
    fn name(&self) -> &'static str {
        "CalcTangents"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::CALC_TANGENT_SPACE
    }

    fn setup_properties(&mut self, properties: &PropertyStore) {
        self.max_angle_degrees = properties
            .float(config::MAX_SMOOTHING_ANGLE, DEFAULT_MAX_SMOOTHING_ANGLE)
            .clamp(0.0, 175.0);
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        let min_cos = self.max_angle_degrees.to_radians().cos();
        for (mesh_index, mesh) in scene.meshes.iter_mut().enumerate() {
            if mesh.has_tangents_and_bitangents() {
                continue;
            }
            if !mesh.primitive_types.intersects(PrimitiveTypes::TRIANGLE | PrimitiveTypes::POLYGON) {
                continue;
            }
            if !mesh.has_normals() || !mesh.has_texture_coords(0) {
                warn!("Mesh {mesh_index} lacks normals or texture coordinates; cannot compute tangents");
                continue;
            }
            let sort = shared
                .spatial_sorts()
                .and_then(|sorts| sorts.get(mesh_index))
                .ok_or(Error::StageFailed {
                    stage: "CalcTangents",
                    message: "spatial sort is not available; the pipeline ordering is broken".into(),
                })?;

            let (raw_tangents, raw_bitangents) = per_corner_tangents(mesh);

            // Smooth across coincident vertices whose tangents agree within
            // the configured angle.
            let mut tangents = vec![Vector3::zeros(); mesh.vertex_count()];
            let mut bitangents = vec![Vector3::zeros(); mesh.vertex_count()];
            let normals = mesh.normals.as_ref().expect("checked above");
            let mut neighbors = Vec::new();
            for (vertex, position) in mesh.positions.iter().enumerate() {
                neighbors.clear();
                sort.find_identical_positions(position, &mut neighbors);
                let own = raw_tangents[vertex];
                let mut tangent_sum = Vector3::zeros();
                let mut bitangent_sum = Vector3::zeros();
                for neighbor in &neighbors {
                    let other = raw_tangents[*neighbor as usize];
                    if own.dot(&other) >= min_cos {
                        tangent_sum += other;
                        bitangent_sum += raw_bitangents[*neighbor as usize];
                    }
                }

                // Gram-Schmidt against the vertex normal
                let normal = normals[vertex];
                let tangent = tangent_sum - normal * normal.dot(&tangent_sum);
                let tangent = if tangent.norm_squared() > 0.0 { tangent.normalize() } else { own };
                let bitangent = if bitangent_sum.norm_squared() > 0.0 {
                    bitangent_sum.normalize()
                } else {
                    normal.cross(&tangent)
                };
                tangents[vertex] = tangent;
                bitangents[vertex] = bitangent;
            }
            mesh.tangents = Some(tangents);
            mesh.bitangents = Some(bitangents);
            debug!("Computed tangent space for mesh {mesh_index}");
        }
        Ok(())
    }
}

/// Unsmoothed tangent frame per vertex, derived from the UV gradient of the
/// face that owns the vertex.
fn per_corner_tangents(mesh: &Mesh) -> (Vec<Vector3<f32>>, Vec<Vector3<f32>>) {
    let coords = mesh.texture_coords[0].as_ref().expect("caller checked");
    let mut tangents = vec![Vector3::zeros(); mesh.vertex_count()];
    let mut bitangents = vec![Vector3::zeros(); mesh.vertex_count()];
    for face in &mesh.faces {
        if face.indices.len() < 3 {
            continue;
        }
        let [i0, i1, i2] = [face.indices[0] as usize, face.indices[1] as usize, face.indices[2] as usize];
        let edge1 = mesh.positions[i1] - mesh.positions[i0];
        let edge2 = mesh.positions[i2] - mesh.positions[i0];
        let delta1 = coords[i1] - coords[i0];
        let delta2 = coords[i2] - coords[i0];
        let determinant = delta1.x * delta2.y - delta2.x * delta1.y;
        if determinant.abs() < 1e-12 {
            continue;
        }
        let inverse = 1.0 / determinant;
        let tangent = (edge1 * delta2.y - edge2 * delta1.y) * inverse;
        let bitangent = (edge2 * delta1.x - edge1 * delta2.x) * inverse;
        if !tangent.iter().all(|component| component.is_finite()) {
            continue;
        }
        for index in &face.indices {
            tangents[*index as usize] = tangent;
            bitangents[*index as usize] = bitangent;
        }
    }
    (tangents, bitangents)
}
