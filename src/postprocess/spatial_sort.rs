use log::trace;
use nalgebra::Vector3;

use crate::{
    scene::Scene,
    Result,
};

use super::{PostProcessStage, PostProcessSteps, SharedPostProcessState};

/// Position index answering "which vertices sit near this point" queries
/// without an O(n²) scan.
///
/// All positions are projected onto a fixed, deliberately skewed axis and
/// sorted by the projection. A radius query then binary-searches the
/// projection interval and verifies the few candidates by true distance.
#[derive(Debug, Default)]
pub struct SpatialSort {
    entries: Vec<Entry>,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    index: u32,
    position: Vector3<f32>,
    projection: f32,
}

/// Skewed so that the axis-aligned vertex grids common in real models don't
/// collapse onto a handful of projection values.
fn sort_axis() -> Vector3<f32> {
    Vector3::new(0.8523, 0.34321, 0.5736)
}

impl SpatialSort {
    pub fn from_positions(positions: &[Vector3<f32>]) -> Self {
        let axis = sort_axis();
        let mut entries = positions
            .iter()
            .enumerate()
            .map(|(index, position)| Entry {
                index: index as u32,
                position: *position,
                projection: position.dot(&axis),
            })
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| a.projection.total_cmp(&b.projection));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends the indices of all positions within `radius` of `position`
    /// to `out`. The query position itself is included when it is indexed.
    pub fn find_positions(&self, position: &Vector3<f32>, radius: f32, out: &mut Vec<u32>) {
        let projection = position.dot(&sort_axis());
        let radius_squared = radius * radius;

        let start = self
            .entries
            .partition_point(|entry| entry.projection < projection - radius);
        for entry in &self.entries[start..] {
            if entry.projection > projection + radius {
                break;
            }
            if (entry.position - position).norm_squared() <= radius_squared {
                out.push(entry.index);
            }
        }
    }

    /// Like [`find_positions`](Self::find_positions) with a zero radius up
    /// to floating-point tolerance.
    pub fn find_identical_positions(&self, position: &Vector3<f32>, out: &mut Vec<u32>) {
        self.find_positions(position, 1e-5, out);
    }
}

/// Marker stage opening the spatial-sort bracket: builds one [`SpatialSort`]
/// per mesh for the normal, tangent and join stages that follow.
#[derive(Debug, Default)]
pub struct ComputeSpatialSort;

impl PostProcessStage for ComputeSpatialSort {
    fn name(&self) -> &'static str {
        "ComputeSpatialSort"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::GEN_SMOOTH_NORMALS | PostProcessSteps::CALC_TANGENT_SPACE | PostProcessSteps::JOIN_IDENTICAL_VERTICES
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        let sorts = scene
            .meshes
            .iter()
            .map(|mesh| SpatialSort::from_positions(&mesh.positions))
            .collect::<Vec<_>>();
        trace!("Built spatial sorts for {} meshes", sorts.len());
        shared.set_spatial_sorts(sorts);
        Ok(())
    }
}

/// Marker stage closing the spatial-sort bracket.
#[derive(Debug, Default)]
pub struct DestroySpatialSort;

impl PostProcessStage for DestroySpatialSort {
    fn name(&self) -> &'static str {
        "DestroySpatialSort"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::GEN_SMOOTH_NORMALS | PostProcessSteps::CALC_TANGENT_SPACE | PostProcessSteps::JOIN_IDENTICAL_VERTICES
    }

    fn execute(&mut self, _scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        shared.destroy_spatial_sorts();
        Ok(())
    }
}
