use log::debug;

use crate::{
    scene::{Mesh, Scene, SceneFlags, VertexWeight},
    Error, Result,
};

use super::{PostProcessStage, PostProcessSteps, SharedPostProcessState};

/// Collapses vertices whose full attribute tuple is bitwise identical onto
/// a single index, turning the verbose import format into a properly
/// indexed one. Marks the scene
/// [`NON_VERBOSE_FORMAT`](SceneFlags::NON_VERBOSE_FORMAT) so later
/// consumers know that faces share indices now.
#[derive(Debug, Default)]
pub struct JoinVertices;

impl PostProcessStage for JoinVertices {
    fn name(&self) -> &'static str {
        "JoinVertices"
    }

    fn steps(&self) -> PostProcessSteps {
        PostProcessSteps::JOIN_IDENTICAL_VERTICES
    }

    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()> {
        let mut old_total = 0usize;
        let mut new_total = 0usize;
        for (mesh_index, mesh) in scene.meshes.iter_mut().enumerate() {
            let sort = shared
                .spatial_sorts()
                .and_then(|sorts| sorts.get(mesh_index))
                .ok_or(Error::StageFailed {
                    stage: "JoinVertices",
                    message: "spatial sort is not available; the pipeline ordering is broken".into(),
                })?;
            old_total += mesh.vertex_count();
            join_mesh(mesh, sort);
            new_total += mesh.vertex_count();
        }
        scene.flags |= SceneFlags::NON_VERBOSE_FORMAT;
        debug!("Joined {old_total} vertices down to {new_total}");
        Ok(())
    }
}

fn join_mesh(mesh: &mut Mesh, sort: &super::SpatialSort) {
    let vertex_count = mesh.vertex_count();
    const NOT_KEPT: u32 = u32::MAX;
    // old index -> surviving new index
    let mut replace = vec![NOT_KEPT; vertex_count];
    // new index -> representative old index
    let mut kept: Vec<u32> = Vec::with_capacity(vertex_count);

    let mut neighbors = Vec::new();
    for old in 0..vertex_count {
        neighbors.clear();
        sort.find_identical_positions(&mesh.positions[old], &mut neighbors);
        let mut found = None;
        for neighbor in &neighbors {
            let neighbor = *neighbor as usize;
            if replace[neighbor] != NOT_KEPT && vertices_identical(mesh, old, neighbor) {
                found = Some(replace[neighbor]);
                break;
            }
        }
        replace[old] = found.unwrap_or_else(|| {
            kept.push(old as u32);
            (kept.len() - 1) as u32
        });
    }

    if kept.len() == vertex_count {
        return;
    }

    let gather = |values: &Option<Vec<nalgebra::Vector3<f32>>>| {
        values
            .as_ref()
            .map(|values| kept.iter().map(|old| values[*old as usize]).collect::<Vec<_>>())
    };
    mesh.positions = kept.iter().map(|old| mesh.positions[*old as usize]).collect();
    mesh.normals = gather(&mesh.normals);
    mesh.tangents = gather(&mesh.tangents);
    mesh.bitangents = gather(&mesh.bitangents);
    for colors in &mut mesh.colors {
        *colors = colors
            .as_ref()
            .map(|colors| kept.iter().map(|old| colors[*old as usize]).collect());
    }
    for coords in &mut mesh.texture_coords {
        *coords = coords
            .as_ref()
            .map(|coords| kept.iter().map(|old| coords[*old as usize]).collect());
    }
    for face in &mut mesh.faces {
        for index in &mut face.indices {
            *index = replace[*index as usize];
        }
    }
    let kept_set = kept.iter().copied().collect::<std::collections::HashSet<_>>();
    for bone in &mut mesh.bones {
        // only the representative's weight survives; merged duplicates
        // carried the same influence by definition of "identical"
        bone.weights = bone
            .weights
            .iter()
            .filter(|weight| kept_set.contains(&weight.vertex_id))
            .map(|weight| VertexWeight::new(replace[weight.vertex_id as usize], weight.weight))
            .collect();
    }
}

/// Bitwise comparison over the full attribute tuple of two vertices.
fn vertices_identical(mesh: &Mesh, a: usize, b: usize) -> bool {
    fn bits_equal(values: &Option<Vec<nalgebra::Vector3<f32>>>, a: usize, b: usize) -> bool {
        match values {
            None => true,
            Some(values) => values[a]
                .iter()
                .zip(values[b].iter())
                .all(|(left, right)| left.to_bits() == right.to_bits()),
        }
    }
    if mesh.positions[a]
        .iter()
        .zip(mesh.positions[b].iter())
        .any(|(left, right)| left.to_bits() != right.to_bits())
    {
        return false;
    }
    if !(bits_equal(&mesh.normals, a, b) && bits_equal(&mesh.tangents, a, b) && bits_equal(&mesh.bitangents, a, b)) {
        return false;
    }
    for colors in mesh.colors.iter().flatten() {
        let identical = colors[a]
            .iter()
            .zip(colors[b].iter())
            .all(|(left, right)| left.to_bits() == right.to_bits());
        if !identical {
            return false;
        }
    }
    for coords in mesh.texture_coords.iter().flatten() {
        let identical = coords[a]
            .iter()
            .zip(coords[b].iter())
            .all(|(left, right)| left.to_bits() == right.to_bits());
        if !identical {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;

    use crate::{
        postprocess::spatial_sort::ComputeSpatialSort,
        scene::Face,
    };

    use super::*;

    /// Two triangles sharing an edge, in verbose layout (6 vertices, the
    /// two edge vertices stored twice).
    fn verbose_quad() -> Mesh {
        Mesh {
            positions: vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(1.0, 1.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
            ],
            faces: vec![Face::new(vec![0, 1, 2]), Face::new(vec![3, 4, 5])],
            ..Mesh::default()
        }
    }

    fn run(mesh: Mesh) -> Scene {
        let mut scene = Scene::with_root("root");
        scene.meshes.push(mesh);
        let mut shared = SharedPostProcessState::default();
        ComputeSpatialSort::default().execute(&mut scene, &mut shared).unwrap();
        JoinVertices.execute(&mut scene, &mut shared).unwrap();
        scene
    }

    #[test]
    fn identical_vertices_collapse() {
        let scene = run(verbose_quad());
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.faces[0].indices, vec![0, 1, 2]);
        assert_eq!(mesh.faces[1].indices, vec![1, 3, 2]);
        assert!(scene.flags.contains(SceneFlags::NON_VERBOSE_FORMAT));
    }

    #[test]
    fn differing_normals_prevent_the_join() {
        let mut mesh = verbose_quad();
        let mut normals = vec![Vector3::z(); 6];
        normals[3] = Vector3::x();
        mesh.normals = Some(normals);
        let scene = run(mesh);
        // vertex 3 shares its position with vertex 1 but not its normal
        assert_eq!(scene.meshes[0].vertex_count(), 5);
    }

    #[test]
    fn already_indexed_mesh_is_unchanged() {
        let mesh = Mesh {
            positions: vec![Vector3::zeros(), Vector3::x(), Vector3::y()],
            faces: vec![Face::new(vec![0, 1, 2])],
            ..Mesh::default()
        };
        let scene = run(mesh);
        assert_eq!(scene.meshes[0].vertex_count(), 3);
    }
}
