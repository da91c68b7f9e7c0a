use std::collections::HashMap;

use log::{debug, warn};
use nalgebra::{Matrix3, Matrix4, Point3};

use crate::{
    scene::{Mesh, Node, Scene},
    Result,
};

use super::{PostProcessStage, PostProcessSteps, SharedPostProcessState};

/// Bakes the node transforms into the vertex data and collapses the
/// hierarchy to a single root referencing every mesh.
///
/// Meshes instanced under several nodes are duplicated per occurrence.
/// Skeletal data and animations are dropped: their node targets no longer
/// exist once the hierarchy is flat. Cameras and lights are moved into
/// world space so they stay meaningful.
#[derive(Debug, Default)]
pub struct PretransformVertices;

impl PostProcessStage for PretransformVertices {
    fn name(&self) -> &'static str {
        "PretransformVertices"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::PRE_TRANSFORM_VERTICES
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        shared.assert_no_spatial_sorts(self.name());

        let mut occurrences: Vec<(u32, Matrix4<f32>)> = Vec::new();
        let mut global_transforms: HashMap<String, Matrix4<f32>> = HashMap::new();
        collect(&scene.root_node, &Matrix4::identity(), &mut occurrences, &mut global_transforms);

        let old_meshes = std::mem::take(&mut scene.meshes);
        let mut used = vec![0usize; old_meshes.len()];
        for (mesh_index, transform) in &occurrences {
            let mesh_index = *mesh_index as usize;
            let mut mesh = old_meshes[mesh_index].clone();
            transform_mesh(&mut mesh, transform);
            scene.meshes.push(mesh);
            used[mesh_index] += 1;
        }
        for (mesh_index, count) in used.iter().enumerate() {
            if *count > 1 {
                debug!("Mesh {mesh_index} was instanced {count} times and has been duplicated");
            } else if *count == 0 {
                warn!("Mesh {mesh_index} is not referenced by any node and has been dropped");
            }
        }

        if !scene.animations.is_empty() || scene.meshes.iter().any(Mesh::has_bones) {
            debug!("Dropping animations and bones, their target nodes are collapsed");
        }
        scene.animations.clear();
        for mesh in &mut scene.meshes {
            mesh.bones.clear();
        }

        for camera in &mut scene.cameras {
            if let Some(transform) = global_transforms.get(&camera.name) {
                camera.position = transform.transform_point(&Point3::from(camera.position)).coords;
                camera.look_at = transform.transform_vector(&camera.look_at);
                camera.up = transform.transform_vector(&camera.up);
            }
        }
        for light in &mut scene.lights {
            if let Some(transform) = global_transforms.get(&light.name) {
                light.position = transform.transform_point(&Point3::from(light.position)).coords;
                light.direction = transform.transform_vector(&light.direction);
            }
        }

        let mut root = Node::new(std::mem::take(&mut scene.root_node.name));
        root.meshes = (0..scene.meshes.len() as u32).collect();
        scene.root_node = root;
        Ok(())
    }
}

fn collect(
    node: &Node,
    parent_transform: &Matrix4<f32>,
    occurrences: &mut Vec<(u32, Matrix4<f32>)>,
    global_transforms: &mut HashMap<String, Matrix4<f32>>,
) {
    let transform = parent_transform * node.transform;
    global_transforms.insert(node.name.clone(), transform);
    for mesh_index in &node.meshes {
        occurrences.push((*mesh_index, transform));
    }
    for child in &node.children {
        collect(child, &transform, occurrences, global_transforms);
    }
}

fn transform_mesh(mesh: &mut Mesh, transform: &Matrix4<f32>) {
    for position in &mut mesh.positions {
        *position = transform.transform_point(&Point3::from(*position)).coords;
    }

    let linear: Matrix3<f32> = transform.fixed_view::<3, 3>(0, 0).into();
    let normal_matrix = linear
        .try_inverse()
        .map(|inverse| inverse.transpose())
        .unwrap_or(linear);
    for directions in [&mut mesh.normals, &mut mesh.tangents, &mut mesh.bitangents].into_iter().flatten() {
        for direction in directions.iter_mut() {
            let transformed = normal_matrix * *direction;
            *direction = if transformed.norm_squared() > 0.0 {
                transformed.normalize()
            } else {
                transformed
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;

    use crate::scene::Face;

    use super::*;

    fn translation(x: f32, y: f32, z: f32) -> Matrix4<f32> {
        Matrix4::new_translation(&Vector3::new(x, y, z))
    }

    fn triangle() -> Mesh {
        Mesh {
            positions: vec![Vector3::zeros(), Vector3::x(), Vector3::y()],
            normals: Some(vec![Vector3::z(); 3]),
            faces: vec![Face::new(vec![0, 1, 2])],
            ..Mesh::default()
        }
    }

    #[test]
    fn node_transforms_are_baked_into_positions() {
        let mut scene = Scene::with_root("root");
        scene.meshes.push(triangle());
        let mut child = Node::new("child");
        child.transform = translation(10.0, 0.0, 0.0);
        let mut grandchild = Node::new("grandchild");
        grandchild.transform = translation(0.0, 5.0, 0.0);
        grandchild.meshes.push(0);
        child.children.push(grandchild);
        scene.root_node.children.push(child);

        PretransformVertices
            .execute(&mut scene, &mut SharedPostProcessState::default())
            .unwrap();

        assert_eq!(scene.meshes[0].positions[0], Vector3::new(10.0, 5.0, 0.0));
        assert!(scene.root_node.children.is_empty());
        assert_eq!(scene.root_node.meshes, vec![0]);
    }

    #[test]
    fn instanced_mesh_is_duplicated_per_occurrence() {
        let mut scene = Scene::with_root("root");
        scene.meshes.push(triangle());
        for x in [0.0, 100.0] {
            let mut node = Node::new(format!("at{x}"));
            node.transform = translation(x, 0.0, 0.0);
            node.meshes.push(0);
            scene.root_node.children.push(node);
        }

        PretransformVertices
            .execute(&mut scene, &mut SharedPostProcessState::default())
            .unwrap();

        assert_eq!(scene.meshes.len(), 2);
        assert_eq!(scene.meshes[0].positions[0].x, 0.0);
        assert_eq!(scene.meshes[1].positions[0].x, 100.0);
    }

    #[test]
    fn rotation_updates_normals() {
        let mut scene = Scene::with_root("root");
        scene.meshes.push(triangle());
        let mut node = Node::new("rotated");
        node.transform = Matrix4::from_axis_angle(&Vector3::x_axis(), std::f32::consts::FRAC_PI_2);
        node.meshes.push(0);
        scene.root_node.children.push(node);

        PretransformVertices
            .execute(&mut scene, &mut SharedPostProcessState::default())
            .unwrap();

        let normal = scene.meshes[0].normals.as_ref().unwrap()[0];
        assert!((normal - Vector3::y()).norm() < 1e-5);
    }

    #[test]
    fn animations_and_bones_are_dropped() {
        let mut scene = Scene::with_root("root");
        let mut mesh = triangle();
        mesh.bones.push(crate::scene::Bone {
            node_name: "root".into(),
            offset_matrix: Matrix4::identity(),
            weights: vec![],
        });
        scene.meshes.push(mesh);
        scene.root_node.meshes.push(0);
        scene.animations.push(crate::scene::Animation::new("walk"));

        PretransformVertices
            .execute(&mut scene, &mut SharedPostProcessState::default())
            .unwrap();

        assert!(scene.animations.is_empty());
        assert!(!scene.meshes[0].has_bones());
    }
}
