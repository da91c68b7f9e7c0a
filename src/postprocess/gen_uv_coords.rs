use log::debug;
use nalgebra::Vector3;

use crate::{scene::Scene, Result};

use super::{PostProcessStage, PostProcessSteps, SharedPostProcessState};

/// Generates a texture coordinate set for meshes that have none, using a
/// spherical projection around the mesh centroid.
///
/// Runs before [`TransformUvCoords`](super::transform_uv_coords::TransformUvCoords)
/// so that generated coordinates pass through the same material transforms
/// as imported ones.
#[derive(Debug, Default)]
pub struct GenUvCoords;

impl PostProcessStage for GenUvCoords {
    fn name(&self) -> &'static str {
        "GenUvCoords"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::GEN_UV_COORDS
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        shared.assert_no_spatial_sorts(self.name());
        let mut generated = 0usize;
        for mesh in &mut scene.meshes {
            if mesh.has_texture_coords(0) || !mesh.has_positions() {
                continue;
            }
            let centroid = mesh.positions.iter().fold(Vector3::zeros(), |sum, position| sum + position)
                / mesh.positions.len() as f32;
            let coords = mesh
                .positions
                .iter()
                .map(|position| {
                    let direction = position - centroid;
                    let direction = if direction.norm_squared() > 0.0 {
                        direction.normalize()
                    } else {
                        Vector3::z()
                    };
                    let u = 0.5 + direction.z.atan2(direction.x) / std::f32::consts::TAU;
                    let v = 0.5 - direction.y.asin() / std::f32::consts::PI;
                    Vector3::new(u, v, 0.0)
                })
                .collect();
            mesh.texture_coords[0] = Some(coords);
            mesh.uv_components[0] = 2;
            generated += 1;
        }
        if generated > 0 {
            debug!("Generated spherical UV coordinates for {generated} meshes");
        }
        Ok(())
    }
}
