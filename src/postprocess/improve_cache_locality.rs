use log::debug;

use crate::{
    properties::{config, PropertyStore},
    scene::{Face, PrimitiveTypes, Scene},
    Result,
};

use super::{PostProcessStage, PostProcessSteps, SharedPostProcessState};

/// Default size of the simulated post-transform vertex cache.
pub const DEFAULT_CACHE_SIZE: usize = 12;

/// Reorders triangle faces so that vertex references cluster in time,
/// raising the hit rate of the GPU post-transform vertex cache.
///
/// Greedy Forsyth-style scheme: every vertex carries a score from its
/// position in a simulated FIFO cache and its number of unprocessed
/// triangles; the triangle with the best vertex score sum is emitted next.
/// Only pure triangle meshes are touched, and only when their vertices are
/// actually shared (after join-identical-vertices); on verbose meshes every
/// order is equally cache-friendly and the stage backs off.
#[derive(Debug)]
pub struct ImproveCacheLocality {
    cache_size: usize,
}

impl Default for ImproveCacheLocality {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl PostProcessStage for ImproveCacheLocality {
    fn name(&self) -> &'static str {
        "ImproveCacheLocality"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::IMPROVE_CACHE_LOCALITY
    }

    fn setup_properties(&mut self, properties: &PropertyStore) {
        self.cache_size = properties.int(config::CACHE_SIZE, DEFAULT_CACHE_SIZE as i32).max(3) as usize;
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        shared.assert_no_spatial_sorts(self.name());
        for mesh in &mut scene.meshes {
            if mesh.primitive_types != PrimitiveTypes::TRIANGLE {
                continue;
            }
            let index_count: usize = mesh.faces.iter().map(|face| face.indices.len()).sum();
            if index_count == mesh.vertex_count() {
                // verbose mesh, nothing to gain
                continue;
            }
            mesh.faces = reorder(&mesh.faces, mesh.vertex_count(), self.cache_size);
            debug!("Reordered {} triangles for cache locality", mesh.face_count());
        }
        Ok(())
    }
}

const SCORE_IN_CACHE: f32 = 0.75;
const VALENCE_SCALE: f32 = 2.0;
const VALENCE_POWER: f32 = -0.5;

fn vertex_score(cache_position: Option<usize>, remaining_valence: usize, cache_size: usize) -> f32 {
    if remaining_valence == 0 {
        return -1.0;
    }
    let cache_score = match cache_position {
        None => 0.0,
        // the three most recent entries score flat so immediate fans don't
        // monopolize the order
        Some(position) if position < 3 => SCORE_IN_CACHE,
        Some(position) => {
            let scale = 1.0 / (cache_size - 3) as f32;
            let relative = 1.0 - (position - 3) as f32 * scale;
            SCORE_IN_CACHE * relative * relative
        }
    };
    cache_score + VALENCE_SCALE * (remaining_valence as f32).powf(VALENCE_POWER)
}

fn reorder(faces: &[Face], vertex_count: usize, cache_size: usize) -> Vec<Face> {
    let mut valence = vec![0usize; vertex_count];
    for face in faces {
        for index in &face.indices {
            valence[*index as usize] += 1;
        }
    }
    let mut triangles_of: Vec<Vec<usize>> = vec![Vec::new(); vertex_count];
    for (triangle, face) in faces.iter().enumerate() {
        for index in &face.indices {
            triangles_of[*index as usize].push(triangle);
        }
    }

    let mut cache: Vec<u32> = Vec::with_capacity(cache_size + 3);
    let mut emitted = vec![false; faces.len()];
    let mut order = Vec::with_capacity(faces.len());

    let score_of = |vertex: u32, cache: &[u32], valence: &[usize]| {
        let position = cache.iter().position(|entry| *entry == vertex);
        vertex_score(position, valence[vertex as usize], cache_size)
    };

    for _ in 0..faces.len() {
        // candidates: triangles touching the cache, else any remaining one
        let mut best: Option<(usize, f32)> = None;
        let consider = |triangle: usize, cache: &[u32], valence: &[usize], best: &mut Option<(usize, f32)>| {
            if emitted[triangle] {
                return;
            }
            let score: f32 = faces[triangle]
                .indices
                .iter()
                .map(|index| score_of(*index, cache, valence))
                .sum();
            if best.map_or(true, |(_, best_score)| score > best_score) {
                *best = Some((triangle, score));
            }
        };
        for vertex in &cache {
            for triangle in &triangles_of[*vertex as usize] {
                consider(*triangle, &cache, &valence, &mut best);
            }
        }
        if best.is_none() {
            if let Some(triangle) = emitted.iter().position(|done| !done) {
                best = Some((triangle, 0.0));
            }
        }
        let Some((triangle, _)) = best else {
            break;
        };

        emitted[triangle] = true;
        order.push(faces[triangle].clone());
        for index in &faces[triangle].indices {
            let vertex = *index;
            valence[vertex as usize] = valence[vertex as usize].saturating_sub(1);
            // move to the front of the FIFO
            cache.retain(|entry| *entry != vertex);
            cache.insert(0, vertex);
        }
        cache.truncate(cache_size);
    }
    order
}
