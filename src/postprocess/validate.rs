use std::collections::HashSet;

use itertools::Itertools;
use log::debug;

use crate::{
    scene::{Mesh, Scene, SceneFlags},
    Error, Result,
};

/// Checks the canonical scene invariants.
///
/// Not part of the ordered pipeline: the dispatcher invokes it out-of-band,
/// before the first stage when requested and between every pair of stages
/// in extra-verbose mode. On success the scene is marked
/// [`VALIDATED`](SceneFlags::VALIDATED); the first violation aborts with a
/// [`Validation`](Error::Validation) error.
#[derive(Debug, Default)]
pub struct ValidateDataStructure;

impl ValidateDataStructure {
    pub fn process(scene: &mut Scene) -> Result<()> {
        let mut node_names = HashSet::new();
        scene.visit_nodes(|node| {
            node_names.insert(node.name.clone());
        });

        let mut violation = None;
        scene.visit_nodes(|node| {
            if violation.is_some() {
                return;
            }
            for mesh_index in &node.meshes {
                if *mesh_index as usize >= scene.meshes.len() {
                    violation = Some(format!(
                        "node '{}' references mesh {} of {}",
                        node.name,
                        mesh_index,
                        scene.meshes.len()
                    ));
                }
            }
        });
        if let Some(violation) = violation {
            return Err(Error::Validation(violation));
        }

        if !scene.flags.contains(SceneFlags::INCOMPLETE) && scene.meshes.is_empty() {
            return Err(Error::Validation("scene has no meshes but is not flagged incomplete".into()));
        }

        for (mesh_index, mesh) in scene.meshes.iter().enumerate() {
            validate_mesh(scene, mesh_index, mesh, &node_names)?;
        }

        for animation in &scene.animations {
            for channel in &animation.channels {
                if channel.node_name.is_empty() {
                    return Err(Error::Validation(format!("animation '{}' has a channel without target node", animation.name)));
                }
                if !node_names.contains(&channel.node_name) {
                    return Err(Error::Validation(format!(
                        "animation '{}' targets unknown node '{}'",
                        animation.name, channel.node_name
                    )));
                }
                let position_sorted = channel.position_keys.iter().tuple_windows().all(|(a, b)| a.time <= b.time);
                let rotation_sorted = channel.rotation_keys.iter().tuple_windows().all(|(a, b)| a.time <= b.time);
                let scaling_sorted = channel.scaling_keys.iter().tuple_windows().all(|(a, b)| a.time <= b.time);
                if !(position_sorted && rotation_sorted && scaling_sorted) {
                    return Err(Error::Validation(format!(
                        "animation '{}', channel '{}': key times are not sorted",
                        animation.name, channel.node_name
                    )));
                }
            }
        }

        for (texture_index, texture) in scene.textures.iter().enumerate() {
            if texture.data.len() != texture.data_len() {
                return Err(Error::Validation(format!(
                    "texture {} carries {} bytes but declares {}",
                    texture_index,
                    texture.data.len(),
                    texture.data_len()
                )));
            }
        }

        debug!("Scene validated: {} meshes, {} nodes", scene.meshes.len(), scene.root_node.subtree_len());
        scene.flags |= SceneFlags::VALIDATED;
        Ok(())
    }
}

fn validate_mesh(scene: &Scene, mesh_index: usize, mesh: &Mesh, node_names: &HashSet<String>) -> Result<()> {
    let incomplete = scene.flags.contains(SceneFlags::INCOMPLETE);
    if !incomplete && (mesh.vertex_count() == 0 || mesh.face_count() == 0) {
        return Err(Error::Validation(format!("mesh {mesh_index} has no vertices or no faces")));
    }
    if !incomplete && !mesh.has_positions() {
        return Err(Error::Validation(format!("mesh {mesh_index} has no positions")));
    }

    let vertex_count = mesh.vertex_count();
    let attribute_lengths = [
        ("normals", mesh.normals.as_ref().map(Vec::len)),
        ("tangents", mesh.tangents.as_ref().map(Vec::len)),
        ("bitangents", mesh.bitangents.as_ref().map(Vec::len)),
    ];
    for (attribute, length) in attribute_lengths {
        if let Some(length) = length {
            if length != vertex_count {
                return Err(Error::Validation(format!(
                    "mesh {mesh_index}: {length} {attribute} for {vertex_count} vertices"
                )));
            }
        }
    }
    for (set, colors) in mesh.colors.iter().enumerate() {
        if let Some(colors) = colors {
            if colors.len() != vertex_count {
                return Err(Error::Validation(format!("mesh {mesh_index}: color set {set} length mismatch")));
            }
        }
    }
    for (set, coords) in mesh.texture_coords.iter().enumerate() {
        if let Some(coords) = coords {
            if coords.len() != vertex_count {
                return Err(Error::Validation(format!("mesh {mesh_index}: texture coord set {set} length mismatch")));
            }
        }
    }

    let verbose_expected = !scene.flags.contains(SceneFlags::NON_VERBOSE_FORMAT);
    let mut used = vec![false; vertex_count];
    for face in &mesh.faces {
        for index in &face.indices {
            let index = *index as usize;
            if index >= vertex_count {
                return Err(Error::Validation(format!("mesh {mesh_index}: face index {index} of {vertex_count}")));
            }
            if verbose_expected && used[index] {
                return Err(Error::Validation(format!(
                    "mesh {mesh_index}: vertex {index} is referenced twice but the scene is not flagged non-verbose"
                )));
            }
            used[index] = true;
        }
    }

    if scene.materials.is_empty() {
        if mesh.material_index != 0 {
            return Err(Error::Validation(format!(
                "mesh {mesh_index} references material {} but the scene has none",
                mesh.material_index
            )));
        }
    } else if mesh.material_index as usize >= scene.materials.len() {
        return Err(Error::Validation(format!(
            "mesh {mesh_index} references material {} of {}",
            mesh.material_index,
            scene.materials.len()
        )));
    }

    for bone in &mesh.bones {
        if !node_names.contains(&bone.node_name) {
            return Err(Error::Validation(format!(
                "mesh {mesh_index}: bone targets unknown node '{}'",
                bone.node_name
            )));
        }
        for weight in &bone.weights {
            if weight.vertex_id as usize >= vertex_count {
                return Err(Error::Validation(format!(
                    "mesh {mesh_index}: bone '{}' weights vertex {} of {vertex_count}",
                    bone.node_name, weight.vertex_id
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use nalgebra::{Matrix4, Vector3};

    use crate::scene::{Animation, Bone, Face, Node, NodeChannel, VectorKey, VertexWeight};

    use super::*;

    fn triangle_scene() -> Scene {
        let mut scene = Scene::with_root("root");
        let mut mesh = Mesh::default();
        mesh.positions = vec![Vector3::zeros(), Vector3::x(), Vector3::y()];
        mesh.faces = vec![Face::new(vec![0, 1, 2])];
        scene.meshes.push(mesh);
        scene.root_node.meshes.push(0);
        scene
    }

    #[test]
    fn valid_scene_is_marked_validated() {
        let mut scene = triangle_scene();
        ValidateDataStructure::process(&mut scene).unwrap();
        assert!(scene.flags.contains(SceneFlags::VALIDATED));
    }

    #[test]
    fn mesh_index_out_of_range() {
        let mut scene = triangle_scene();
        scene.root_node.children.push(Node {
            meshes: vec![9],
            ..Node::new("bad")
        });
        assert!(matches!(ValidateDataStructure::process(&mut scene), Err(Error::Validation(_))));
    }

    #[test]
    fn empty_scene_requires_incomplete_flag() {
        let mut scene = Scene::with_root("root");
        assert!(ValidateDataStructure::process(&mut scene).is_err());
        scene.flags |= SceneFlags::INCOMPLETE;
        assert!(ValidateDataStructure::process(&mut scene).is_ok());
    }

    #[test]
    fn verbose_invariant_is_enforced() {
        let mut scene = triangle_scene();
        scene.meshes[0].faces.push(Face::new(vec![0]));
        assert!(matches!(ValidateDataStructure::process(&mut scene), Err(Error::Validation(_))));

        // once flagged non-verbose, shared indices are fine
        let mut scene = triangle_scene();
        scene.meshes[0].faces.push(Face::new(vec![0]));
        scene.flags |= SceneFlags::NON_VERBOSE_FORMAT;
        assert!(ValidateDataStructure::process(&mut scene).is_ok());
    }

    #[test]
    fn attribute_length_mismatch() {
        let mut scene = triangle_scene();
        scene.meshes[0].normals = Some(vec![Vector3::y(); 2]);
        assert!(matches!(ValidateDataStructure::process(&mut scene), Err(Error::Validation(_))));
    }

    #[test]
    fn bone_must_target_existing_node() {
        let mut scene = triangle_scene();
        scene.meshes[0].bones.push(Bone {
            node_name: "missing".into(),
            offset_matrix: Matrix4::identity(),
            weights: vec![VertexWeight::new(0, 1.0)],
        });
        assert!(ValidateDataStructure::process(&mut scene).is_err());

        let mut scene = triangle_scene();
        scene.root_node.children.push(Node::new("hip"));
        scene.meshes[0].bones.push(Bone {
            node_name: "hip".into(),
            offset_matrix: Matrix4::identity(),
            weights: vec![VertexWeight::new(0, 1.0)],
        });
        assert!(ValidateDataStructure::process(&mut scene).is_ok());
    }

    #[test]
    fn unsorted_key_times() {
        let mut scene = triangle_scene();
        let mut animation = Animation::new("walk");
        let mut channel = NodeChannel::new("root");
        channel.position_keys.push(VectorKey::new(2.0, Vector3::zeros()));
        channel.position_keys.push(VectorKey::new(1.0, Vector3::zeros()));
        animation.channels.push(channel);
        scene.animations.push(animation);
        assert!(matches!(ValidateDataStructure::process(&mut scene), Err(Error::Validation(_))));
    }
}
