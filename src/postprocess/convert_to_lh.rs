use log::debug;
use nalgebra::Matrix4;

use crate::{
    scene::{Node, Scene},
    Result,
};

use super::{PostProcessStage, PostProcessSteps, SharedPostProcessState};

/// Mirrors a transform along z: `F * M * F` with `F = diag(1, 1, -1, 1)`,
/// which negates the third column and third row except their shared
/// element.
fn mirror_transform(matrix: &mut Matrix4<f32>) {
    matrix[(0, 2)] = -matrix[(0, 2)];
    matrix[(1, 2)] = -matrix[(1, 2)];
    matrix[(3, 2)] = -matrix[(3, 2)];
    matrix[(2, 0)] = -matrix[(2, 0)];
    matrix[(2, 1)] = -matrix[(2, 1)];
    matrix[(2, 3)] = -matrix[(2, 3)];
}

/// Converts the right-handed canonical scene to a left-handed coordinate
/// system by mirroring along z: vertex positions and direction vectors
/// flip their z component, node and bone matrices are conjugated with the
/// mirror, and animation keys follow suit.
///
/// Winding order and UV origin are left alone; combine with
/// [`FlipWindingOrder`] and [`FlipUvs`] for the full DirectX-style
/// conversion.
#[derive(Debug, Default)]
pub struct MakeLeftHanded;

impl PostProcessStage for MakeLeftHanded {
    fn name(&self) -> &'static str {
        "MakeLeftHanded"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::MAKE_LEFT_HANDED
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        shared.assert_no_spatial_sorts(self.name());

        fn walk(node: &mut Node) {
            mirror_transform(&mut node.transform);
            for child in &mut node.children {
                walk(child);
            }
        }
        walk(&mut scene.root_node);

        for mesh in &mut scene.meshes {
            for position in &mut mesh.positions {
                position.z = -position.z;
            }
            for directions in [&mut mesh.normals, &mut mesh.tangents].into_iter().flatten() {
                for direction in directions.iter_mut() {
                    direction.z = -direction.z;
                }
            }
            // rederive instead of mirroring: the bitangent is defined as
            // normal × tangent and flips handedness with the basis
            if let (Some(normals), Some(tangents)) = (&mesh.normals, &mesh.tangents) {
                if mesh.bitangents.is_some() {
                    mesh.bitangents = Some(
                        normals
                            .iter()
                            .zip(tangents)
                            .map(|(normal, tangent)| normal.cross(tangent))
                            .collect(),
                    );
                }
            }
            for bone in &mut mesh.bones {
                mirror_transform(&mut bone.offset_matrix);
            }
        }

        for animation in &mut scene.animations {
            for channel in &mut animation.channels {
                for key in &mut channel.position_keys {
                    key.value.z = -key.value.z;
                }
                for key in &mut channel.rotation_keys {
                    let quaternion = key.value.quaternion();
                    key.value = nalgebra::UnitQuaternion::new_unchecked(nalgebra::Quaternion::new(
                        quaternion.w,
                        -quaternion.i,
                        -quaternion.j,
                        quaternion.k,
                    ));
                }
            }
        }

        for camera in &mut scene.cameras {
            camera.position.z = -camera.position.z;
            camera.look_at.z = -camera.look_at.z;
            camera.up.z = -camera.up.z;
        }
        for light in &mut scene.lights {
            light.position.z = -light.position.z;
            light.direction.z = -light.direction.z;
        }
        debug!("Converted the scene to a left-handed coordinate system");
        Ok(())
    }
}

/// Moves the texture coordinate origin to the other vertical edge:
/// `v -> 1 - v` in every set.
#[derive(Debug, Default)]
pub struct FlipUvs;

impl PostProcessStage for FlipUvs {
    fn name(&self) -> &'static str {
        "FlipUvs"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::FLIP_UVS
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        shared.assert_no_spatial_sorts(self.name());
        for mesh in &mut scene.meshes {
            for coords in mesh.texture_coords.iter_mut().flatten() {
                for uv in coords.iter_mut() {
                    uv.y = 1.0 - uv.y;
                }
            }
        }
        Ok(())
    }
}

/// Reverses the index order of every face, turning counter-clockwise
/// winding into clockwise and back.
#[derive(Debug, Default)]
pub struct FlipWindingOrder;

impl PostProcessStage for FlipWindingOrder {
    fn name(&self) -> &'static str {
        "FlipWindingOrder"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::FLIP_WINDING_ORDER
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        shared.assert_no_spatial_sorts(self.name());
        for mesh in &mut scene.meshes {
            for face in &mut mesh.faces {
                face.indices.reverse();
            }
        }
        Ok(())
    }
}
