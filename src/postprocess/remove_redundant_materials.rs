use std::collections::HashMap;

use log::debug;

use crate::{scene::Scene, Result};

use super::{PostProcessStage, PostProcessSteps, SharedPostProcessState};

/// Collapses materials with identical property bags into one and remaps the
/// mesh material indices. Unreferenced materials are dropped as well.
#[derive(Debug, Default)]
pub struct RemoveRedundantMaterials;

impl PostProcessStage for RemoveRedundantMaterials {
    fn name(&self) -> &'static str {
        "RemoveRedundantMaterials"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::REMOVE_REDUNDANT_MATERIALS
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        shared.assert_no_spatial_sorts(self.name());
        if scene.materials.len() < 2 {
            return Ok(());
        }

        // Duplicate detection deliberately ignores the name property; two
        // materials that differ only in name shade identically.
        let mut canonical: Vec<usize> = (0..scene.materials.len()).collect();
        for later in 1..scene.materials.len() {
            for earlier in 0..later {
                if canonical[earlier] != earlier {
                    continue;
                }
                if materials_equivalent(&scene.materials[earlier], &scene.materials[later]) {
                    canonical[later] = earlier;
                    break;
                }
            }
        }

        let referenced = scene
            .meshes
            .iter()
            .map(|mesh| canonical[mesh.material_index as usize])
            .collect::<std::collections::HashSet<_>>();

        let mut remap = HashMap::new();
        let mut kept = 0usize;
        let old_count = scene.materials.len();
        let mut index = 0usize;
        scene.materials.retain(|_| {
            let keep = canonical[index] == index && (referenced.contains(&index) || scene.meshes.is_empty());
            if keep {
                remap.insert(index, kept);
                kept += 1;
            }
            index += 1;
            keep
        });

        for mesh in &mut scene.meshes {
            let resolved = canonical[mesh.material_index as usize];
            mesh.material_index = remap[&resolved] as u32;
        }
        if kept != old_count {
            debug!("Reduced {} materials to {}", old_count, kept);
        }
        Ok(())
    }
}

fn materials_equivalent(a: &crate::scene::Material, b: &crate::scene::Material) -> bool {
    use crate::scene::material::keys;
    let significant = |material: &crate::scene::Material| {
        material
            .properties()
            .iter()
            .filter(|property| property.key != keys::NAME)
            .cloned()
            .collect::<Vec<_>>()
    };
    significant(a) == significant(b)
}

#[cfg(test)]
mod tests {
    use nalgebra::{Vector3, Vector4};

    use crate::scene::{material::keys, Face, Material, Mesh, PropertyValue};

    use super::*;

    fn material(name: &str, diffuse: Vector4<f32>) -> Material {
        let mut material = Material::new();
        material.set(keys::NAME, PropertyValue::String(name.into()));
        material.set(keys::COLOR_DIFFUSE, PropertyValue::Color(diffuse));
        material
    }

    fn mesh_with_material(index: u32) -> Mesh {
        Mesh {
            positions: vec![Vector3::zeros(), Vector3::x(), Vector3::y()],
            faces: vec![Face::new(vec![0, 1, 2])],
            material_index: index,
            ..Mesh::default()
        }
    }

    #[test]
    fn duplicates_collapse_onto_the_earlier_material() {
        let gray = Vector4::new(0.5, 0.5, 0.5, 1.0);
        let red = Vector4::new(1.0, 0.0, 0.0, 1.0);
        let mut scene = Scene::with_root("root");
        scene.materials.push(material("a", gray));
        scene.materials.push(material("b", red));
        // same bag as "a" apart from the name
        scene.materials.push(material("c", gray));
        scene.meshes.push(mesh_with_material(0));
        scene.meshes.push(mesh_with_material(1));
        scene.meshes.push(mesh_with_material(2));

        RemoveRedundantMaterials
            .execute(&mut scene, &mut SharedPostProcessState::default())
            .unwrap();

        assert_eq!(scene.materials.len(), 2);
        assert_eq!(scene.meshes[0].material_index, 0);
        assert_eq!(scene.meshes[1].material_index, 1);
        assert_eq!(scene.meshes[2].material_index, 0);
    }

    #[test]
    fn unreferenced_materials_are_dropped() {
        let mut scene = Scene::with_root("root");
        scene.materials.push(material("used", Vector4::x()));
        scene.materials.push(material("orphan", Vector4::y()));
        scene.meshes.push(mesh_with_material(0));

        RemoveRedundantMaterials
            .execute(&mut scene, &mut SharedPostProcessState::default())
            .unwrap();
        assert_eq!(scene.materials.len(), 1);
        assert_eq!(scene.materials[0].name(), Some("used"));
    }

    #[test]
    fn single_material_is_untouched() {
        let mut scene = Scene::with_root("root");
        scene.materials.push(material("only", Vector4::x()));
        RemoveRedundantMaterials
            .execute(&mut scene, &mut SharedPostProcessState::default())
            .unwrap();
        assert_eq!(scene.materials.len(), 1);
    }
}
