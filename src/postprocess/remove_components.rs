use log::{debug, warn};

use crate::{
    properties::{config, PropertyStore},
    scene::Scene,
    Result,
};

use super::{ComponentFlags, PostProcessStage, PostProcessSteps, SharedPostProcessState};

/// Strips the scene components selected through
/// [`config::REMOVE_COMPONENT_FLAGS`].
///
/// Runs first in the pipeline so that later stages never regenerate data
/// just to have it removed again.
#[derive(Debug, Default)]
pub struct RemoveComponents {
    flags: ComponentFlags,
}

impl PostProcessStage for RemoveComponents {
    fn name(&self) -> &'static str {
        "RemoveComponents"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::REMOVE_COMPONENT
    }

    fn setup_properties(&mut self, properties: &PropertyStore) {
        self.flags = ComponentFlags::from_bits_truncate(properties.int(config::REMOVE_COMPONENT_FLAGS, 0) as u32);
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        shared.assert_no_spatial_sorts(self.name());
        if self.flags.is_empty() {
            warn!("RemoveComponents is active but no components are configured for removal");
            return Ok(());
        }

        if self.flags.contains(ComponentFlags::ANIMATIONS) {
            scene.animations.clear();
        }
        if self.flags.contains(ComponentFlags::TEXTURES) {
            scene.textures.clear();
        }
        if self.flags.contains(ComponentFlags::LIGHTS) {
            scene.lights.clear();
        }
        if self.flags.contains(ComponentFlags::CAMERAS) {
            scene.cameras.clear();
        }

        for mesh in &mut scene.meshes {
            if self.flags.contains(ComponentFlags::NORMALS) {
                mesh.normals = None;
            }
            if self.flags.contains(ComponentFlags::TANGENTS_AND_BITANGENTS) {
                mesh.tangents = None;
                mesh.bitangents = None;
            }
            if self.flags.contains(ComponentFlags::COLORS) {
                mesh.colors = Default::default();
            }
            if self.flags.contains(ComponentFlags::TEXCOORDS) {
                mesh.texture_coords = Default::default();
                mesh.uv_components = Default::default();
            }
            if self.flags.contains(ComponentFlags::BONE_WEIGHTS) {
                mesh.bones.clear();
            }
        }
        debug!("Removed components {:?}", self.flags);
        Ok(())
    }
}
