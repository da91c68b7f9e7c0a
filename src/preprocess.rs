use log::{debug, warn};
use nalgebra::Vector4;

use crate::scene::{material::keys, Material, PropertyValue, Scene};

/// Normalizations applied once to every freshly decoded scene, before any
/// post-processing stage runs.
///
/// Importers are allowed to leave a few fields in sentinel states; the
/// preprocessor resolves them so that the pipeline stages never have to:
/// a default material is synthesized when the scene has none, primitive
/// types are inferred from the face lists where unset and the `-1` duration
/// sentinel on animations is replaced by the longest channel time.
pub struct ScenePreprocessor;

pub const DEFAULT_MATERIAL_NAME: &str = "DefaultMaterial";

impl ScenePreprocessor {
    pub fn process(scene: &mut Scene) {
        Self::ensure_default_material(scene);
        Self::infer_primitive_types(scene);
        Self::derive_animation_durations(scene);
    }

    fn ensure_default_material(scene: &mut Scene) {
        if !scene.materials.is_empty() {
            // Clamp stray material references instead of leaving them
            // dangling; the validation stage reports them as violations but
            // it doesn't necessarily run.
            let count = scene.materials.len() as u32;
            for mesh in &mut scene.meshes {
                if mesh.material_index >= count {
                    warn!("Mesh references material {} of {count}; clamping", mesh.material_index);
                    mesh.material_index = count - 1;
                }
            }
            return;
        }
        debug!("Scene has no materials, generating '{DEFAULT_MATERIAL_NAME}'");
        let mut material = Material::new();
        material.set(keys::NAME, PropertyValue::String(DEFAULT_MATERIAL_NAME.to_owned()));
        material.set(keys::COLOR_DIFFUSE, PropertyValue::Color(Vector4::new(0.6, 0.6, 0.6, 1.0)));
        scene.materials.push(material);
        for mesh in &mut scene.meshes {
            mesh.material_index = 0;
        }
    }

    fn infer_primitive_types(scene: &mut Scene) {
        for mesh in &mut scene.meshes {
            if mesh.primitive_types.is_empty() {
                mesh.infer_primitive_types();
            }
        }
    }

    fn derive_animation_durations(scene: &mut Scene) {
        for animation in &mut scene.animations {
            if animation.duration != -1.0 {
                continue;
            }
            animation.duration = animation
                .channels
                .iter()
                .map(|channel| channel.max_key_time())
                .fold(0.0, f64::max);
            debug!("Derived duration {} for animation '{}'", animation.duration, animation.name);
        }
    }
}
