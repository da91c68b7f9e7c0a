use log::debug;

use crate::{
    properties::{config, PropertyStore},
    scene::{Face, Scene},
    Result,
};

use super::{PostProcessStage, PostProcessSteps, SharedPostProcessState};

/// Detects faces whose corners collapse onto each other and reclassifies
/// them: a triangle with two coincident corners becomes a line, a face with
/// one distinct corner becomes a point.
///
/// With [`config::DEGENERATES_REMOVE`] set, degenerate faces are removed
/// entirely instead (their vertices stay; the join and sort stages clean
/// those up when requested).
#[derive(Debug, Default)]
pub struct FindDegenerates {
    remove: bool,
}

impl PostProcessStage for FindDegenerates {
    fn name(&self) -> &'static str {
        "FindDegenerates"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::FIND_DEGENERATES
    }

    fn setup_properties(&mut self, properties: &PropertyStore) {
        self.remove = properties.int(config::DEGENERATES_REMOVE, 0) != 0;
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        shared.assert_no_spatial_sorts(self.name());
        let mut degenerate_count = 0usize;
        for mesh in &mut scene.meshes {
            let positions = std::mem::take(&mut mesh.positions);
            for face in &mut mesh.faces {
                // Keep the first corner of every run of coincident corners.
                let mut distinct: Vec<u32> = Vec::with_capacity(face.indices.len());
                for index in &face.indices {
                    let position = positions[*index as usize];
                    if !distinct.iter().any(|kept| positions[*kept as usize] == position) {
                        distinct.push(*index);
                    }
                }
                if distinct.len() < face.indices.len() {
                    degenerate_count += 1;
                    face.indices = distinct;
                }
            }
            mesh.positions = positions;
            if self.remove {
                mesh.faces.retain(|face| face.indices.len() >= 3);
            }
            mesh.infer_primitive_types();
        }
        if degenerate_count > 0 {
            debug!("Found {degenerate_count} degenerate faces (remove={})", self.remove);
        }
        Ok(())
    }
}
