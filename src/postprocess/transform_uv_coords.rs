use log::debug;
use nalgebra::Vector3;

use crate::{
    scene::{material::keys, PropertyValue, Scene},
    Result,
};

use super::{PostProcessStage, PostProcessSteps, SharedPostProcessState};

/// Bakes per-material UV transforms (offset, scale, rotation) into the
/// texture coordinates of the meshes using that material, so consumers
/// never have to evaluate them at render time.
///
/// The transform is read from the material's
/// [`UV_TRANSFORM`](keys::UV_TRANSFORM) property as `[tx, ty, sx, sy, rot]`
/// with the rotation in radians around the UV origin.
#[derive(Debug, Default)]
pub struct TransformUvCoords;

impl PostProcessStage for TransformUvCoords {
    fn name(&self) -> &'static str {
        "TransformUvCoords"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::TRANSFORM_UV_COORDS
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        shared.assert_no_spatial_sorts(self.name());
        let mut transforms = vec![None; scene.materials.len()];
        for (index, material) in scene.materials.iter().enumerate() {
            if let Some(PropertyValue::FloatArray(values)) = material.get(keys::UV_TRANSFORM) {
                if values.len() == 5 {
                    transforms[index] = Some([values[0], values[1], values[2], values[3], values[4]]);
                }
            }
        }
        if transforms.iter().all(Option::is_none) {
            return Ok(());
        }

        for mesh in &mut scene.meshes {
            let Some([tx, ty, sx, sy, rotation]) = transforms.get(mesh.material_index as usize).copied().flatten() else {
                continue;
            };
            let (sin, cos) = rotation.sin_cos();
            for coords in mesh.texture_coords.iter_mut().flatten() {
                for uv in coords.iter_mut() {
                    let scaled = Vector3::new(uv.x * sx, uv.y * sy, uv.z);
                    let rotated = Vector3::new(scaled.x * cos - scaled.y * sin, scaled.x * sin + scaled.y * cos, scaled.z);
                    *uv = Vector3::new(rotated.x + tx, rotated.y + ty, rotated.z);
                }
            }
            debug!("Applied UV transform of material {} to a mesh", mesh.material_index);
        }
        Ok(())
    }
}
