use log::warn;
use nalgebra::Vector3;

use crate::{
    scene::{Mesh, Scene},
    Error, Result,
};

use super::{PostProcessStage, PostProcessSteps, SharedPostProcessState};

/// Hunts for data that would poison later computations: non-finite vertex
/// positions are fatal, while broken optional attributes (non-finite or
/// all-zero normal sets, non-finite texture coordinates) are stripped with
/// a warning so the generation stages can rebuild them.
#[derive(Debug, Default)]
pub struct FindInvalidData;

impl PostProcessStage for FindInvalidData {
    fn name(&self) -> &'static str {
        "FindInvalidData"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::FIND_INVALID_DATA
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        shared.assert_no_spatial_sorts(self.name());
        for (mesh_index, mesh) in scene.meshes.iter_mut().enumerate() {
            scrub_mesh(mesh_index, mesh)?;
        }
        Ok(())
    }
}

fn all_finite(values: &[Vector3<f32>]) -> bool {
    values.iter().all(|value| value.iter().all(|component| component.is_finite()))
}

fn scrub_mesh(mesh_index: usize, mesh: &mut Mesh) -> Result<()> {
    if !all_finite(&mesh.positions) {
        return Err(Error::StageFailed {
            stage: "FindInvalidData",
            message: format!("mesh {mesh_index} has non-finite vertex positions"),
        });
    }

    let drop_direction_set = |values: &mut Option<Vec<Vector3<f32>>>, what: &str| {
        let invalid = values
            .as_ref()
            .is_some_and(|values| !all_finite(values) || values.iter().all(|value| value.norm_squared() == 0.0));
        if invalid {
            warn!("Dropping invalid {what} of mesh {mesh_index}");
            *values = None;
        }
    };
    drop_direction_set(&mut mesh.normals, "normals");
    drop_direction_set(&mut mesh.tangents, "tangents");
    drop_direction_set(&mut mesh.bitangents, "bitangents");
    // tangents without bitangents (or vice versa) are rebuilt as a pair
    if mesh.tangents.is_some() != mesh.bitangents.is_some() {
        mesh.tangents = None;
        mesh.bitangents = None;
    }

    for (set, coords) in mesh.texture_coords.iter_mut().enumerate() {
        if coords.as_ref().is_some_and(|coords| !all_finite(coords)) {
            warn!("Dropping invalid texture coordinate set {set} of mesh {mesh_index}");
            *coords = None;
            mesh.uv_components[set] = 0;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::scene::Face;

    use super::*;

    fn triangle() -> Mesh {
        Mesh {
            positions: vec![Vector3::zeros(), Vector3::x(), Vector3::y()],
            faces: vec![Face::new(vec![0, 1, 2])],
            ..Mesh::default()
        }
    }

    #[test]
    fn nan_positions_are_fatal() {
        let mut scene = Scene::with_root("root");
        let mut mesh = triangle();
        mesh.positions[1].x = f32::NAN;
        scene.meshes.push(mesh);
        let result = FindInvalidData.execute(&mut scene, &mut SharedPostProcessState::default());
        assert!(matches!(result, Err(Error::StageFailed { .. })));
    }

    #[test]
    fn zero_normals_are_stripped() {
        let mut scene = Scene::with_root("root");
        let mut mesh = triangle();
        mesh.normals = Some(vec![Vector3::zeros(); 3]);
        scene.meshes.push(mesh);
        FindInvalidData.execute(&mut scene, &mut SharedPostProcessState::default()).unwrap();
        assert!(scene.meshes[0].normals.is_none());
    }

    #[test]
    fn lone_tangents_are_stripped_with_their_pair() {
        let mut scene = Scene::with_root("root");
        let mut mesh = triangle();
        mesh.tangents = Some(vec![Vector3::x(); 3]);
        scene.meshes.push(mesh);
        FindInvalidData.execute(&mut scene, &mut SharedPostProcessState::default()).unwrap();
        assert!(scene.meshes[0].tangents.is_none());
    }

    #[test]
    fn healthy_attributes_survive() {
        let mut scene = Scene::with_root("root");
        let mut mesh = triangle();
        mesh.normals = Some(vec![Vector3::z(); 3]);
        mesh.texture_coords[0] = Some(vec![Vector3::zeros(); 3]);
        scene.meshes.push(mesh);
        FindInvalidData.execute(&mut scene, &mut SharedPostProcessState::default()).unwrap();
        assert!(scene.meshes[0].normals.is_some());
        assert!(scene.meshes[0].texture_coords[0].is_some());
    }

    #[test]
    fn nan_uvs_are_stripped() {
        let mut scene = Scene::with_root("root");
        let mut mesh = triangle();
        mesh.uv_components[0] = 2;
        mesh.texture_coords[0] = Some(vec![Vector3::new(f32::INFINITY, 0.0, 0.0); 3]);
        scene.meshes.push(mesh);
        FindInvalidData.execute(&mut scene, &mut SharedPostProcessState::default()).unwrap();
        assert!(scene.meshes[0].texture_coords[0].is_none());
        assert_eq!(scene.meshes[0].uv_components[0], 0);
    }
}
