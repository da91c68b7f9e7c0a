use log::{debug, warn};

use crate::{
    properties::{config, PropertyStore},
    scene::{PrimitiveTypes, Scene, SceneFlags},
    Result,
};

use super::{gather_faces, PostProcessStage, PostProcessSteps, SharedPostProcessState};

/// Splits meshes that mix primitive types into one mesh per type, so every
/// output mesh is homogeneous. Types listed in the
/// [`config::SORT_BY_PTYPE_REMOVE`] bitmask are dropped instead of split
/// out, which is the usual way to get rid of stray points and lines.
#[derive(Debug, Default)]
pub struct SortByPrimitiveType {
    remove: PrimitiveTypes,
}

impl PostProcessStage for SortByPrimitiveType {
    fn name(&self) -> &'static str {
        "SortByPrimitiveType"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::SORT_BY_PRIMITIVE_TYPE
    }

    fn setup_properties(&mut self, properties: &PropertyStore) {
        self.remove = PrimitiveTypes::from_bits_truncate(properties.int(config::SORT_BY_PTYPE_REMOVE, 0) as u32);
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        shared.assert_no_spatial_sorts(self.name());

        let old_meshes = std::mem::take(&mut scene.meshes);
        // every old mesh index maps to the indices of its replacements
        let mut replacements: Vec<Vec<u32>> = Vec::with_capacity(old_meshes.len());
        for mut mesh in old_meshes {
            if mesh.primitive_types.is_empty() {
                mesh.infer_primitive_types();
            }
            let single_type = mesh.primitive_types.iter().count() == 1;
            if single_type && !mesh.primitive_types.intersects(self.remove) {
                replacements.push(vec![scene.meshes.len() as u32]);
                scene.meshes.push(mesh);
                continue;
            }

            let mut indices = Vec::new();
            for kind in mesh.primitive_types.iter() {
                if self.remove.contains(kind) {
                    continue;
                }
                let faces = mesh
                    .faces
                    .iter()
                    .filter(|face| PrimitiveTypes::of_face(face.indices.len()) == kind)
                    .cloned()
                    .collect::<Vec<_>>();
                if faces.is_empty() {
                    continue;
                }
                let mut submesh = gather_faces(&mesh, &faces);
                submesh.primitive_types = kind;
                indices.push(scene.meshes.len() as u32);
                scene.meshes.push(submesh);
            }
            replacements.push(indices);
        }

        scene.visit_nodes_mut(|node| {
            let old = std::mem::take(&mut node.meshes);
            for mesh_index in old {
                node.meshes.extend(&replacements[mesh_index as usize]);
            }
        });

        if scene.meshes.is_empty() {
            warn!("All meshes were removed by primitive type sorting; flagging the scene incomplete");
            scene.flags |= SceneFlags::INCOMPLETE;
        }
        debug!("Scene carries {} meshes after primitive type sorting", scene.meshes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;

    use crate::scene::{Face, Mesh, Node};

    use super::*;

    fn mixed_mesh() -> Mesh {
        let mut mesh = Mesh {
            positions: (0..6).map(|i| Vector3::new(i as f32, 0.0, 0.0)).collect(),
            faces: vec![Face::new(vec![0, 1, 2]), Face::new(vec![3, 4]), Face::new(vec![5])],
            ..Mesh::default()
        };
        mesh.infer_primitive_types();
        mesh
    }

    #[test]
    fn mixed_mesh_splits_per_type() {
        let mut scene = Scene::with_root("root");
        scene.meshes.push(mixed_mesh());
        scene.root_node.meshes.push(0);

        let mut stage = SortByPrimitiveType::default();
        stage.setup_properties(&PropertyStore::new());
        stage.execute(&mut scene, &mut SharedPostProcessState::default()).unwrap();

        assert_eq!(scene.meshes.len(), 3);
        assert_eq!(scene.root_node.meshes, vec![0, 1, 2]);
        for mesh in &scene.meshes {
            assert_eq!(mesh.primitive_types.iter().count(), 1);
        }
        let triangle_mesh = scene
            .meshes
            .iter()
            .find(|mesh| mesh.primitive_types == PrimitiveTypes::TRIANGLE)
            .unwrap();
        assert_eq!(triangle_mesh.vertex_count(), 3);
        assert_eq!(triangle_mesh.faces[0].indices, vec![0, 1, 2]);
    }

    #[test]
    fn removal_mask_drops_points_and_lines() {
        let mut scene = Scene::with_root("root");
        scene.meshes.push(mixed_mesh());
        scene.root_node.meshes.push(0);

        let mut properties = PropertyStore::new();
        properties.set_int(
            config::SORT_BY_PTYPE_REMOVE,
            (PrimitiveTypes::POINT | PrimitiveTypes::LINE).bits() as i32,
        );
        let mut stage = SortByPrimitiveType::default();
        stage.setup_properties(&properties);
        stage.execute(&mut scene, &mut SharedPostProcessState::default()).unwrap();

        assert_eq!(scene.meshes.len(), 1);
        assert_eq!(scene.meshes[0].primitive_types, PrimitiveTypes::TRIANGLE);
        assert_eq!(scene.root_node.meshes, vec![0]);
    }

    #[test]
    fn homogeneous_mesh_is_passed_through() {
        let mut scene = Scene::with_root("root");
        let mut mesh = Mesh {
            positions: vec![Vector3::zeros(), Vector3::x(), Vector3::y()],
            faces: vec![Face::new(vec![0, 1, 2])],
            ..Mesh::default()
        };
        mesh.infer_primitive_types();
        scene.meshes.push(mesh);
        let mut node = Node::new("n");
        node.meshes.push(0);
        scene.root_node.children.push(node);

        SortByPrimitiveType::default()
            .execute(&mut scene, &mut SharedPostProcessState::default())
            .unwrap();
        assert_eq!(scene.meshes.len(), 1);
        assert_eq!(scene.root_node.children[0].meshes, vec![0]);
    }
}
