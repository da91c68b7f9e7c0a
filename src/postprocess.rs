//! The post-processing pipeline.
//!
//! Every transform is a [`PostProcessStage`] identified by one or more bits
//! of [`PostProcessSteps`]. The dispatcher builds the [`standard_pipeline`]
//! once at construction and runs the stages whose bits intersect the
//! request, in the fixed canonical order. The ordering is a contract, not
//! an accident: cleanup stages run before anything generates vertex data,
//! pre-transformation precedes triangulation, and the spatial-sort bracket
//! (compute → consumers → destroy) feeds the normal/tangent/join stages
//! through [`SharedPostProcessState`].

pub mod calc_tangents;
pub mod convert_to_lh;
pub mod find_degenerates;
pub mod find_instances;
pub mod find_invalid_data;
pub mod fix_infacing_normals;
pub mod gen_normals;
pub mod gen_uv_coords;
pub mod improve_cache_locality;
pub mod join_vertices;
pub mod limit_bone_weights;
pub mod pretransform_vertices;
pub mod remove_components;
pub mod remove_redundant_materials;
pub mod sort_by_primitive_type;
pub mod spatial_sort;
pub mod split_large_meshes;
pub mod transform_uv_coords;
pub mod triangulate;
pub mod validate;

use std::collections::HashMap;

use bitflags::bitflags;

use crate::{
    properties::PropertyStore,
    scene::{Bone, Face, Mesh, Scene, VertexWeight},
    Result,
};

pub use spatial_sort::SpatialSort;
pub use validate::ValidateDataStructure;

bitflags! {
    /// Post-processing transforms a caller can request from
    /// [`read_file`](crate::AssetImporter::read_file).
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct PostProcessSteps: u32 {
        const CALC_TANGENT_SPACE = 1 << 0;
        const JOIN_IDENTICAL_VERTICES = 1 << 1;
        const MAKE_LEFT_HANDED = 1 << 2;
        const TRIANGULATE = 1 << 3;
        const REMOVE_COMPONENT = 1 << 4;
        /// Flat per-face normals. Mutually exclusive with
        /// [`GEN_SMOOTH_NORMALS`](Self::GEN_SMOOTH_NORMALS).
        const GEN_NORMALS = 1 << 5;
        /// Smoothed per-vertex normals. Mutually exclusive with
        /// [`GEN_NORMALS`](Self::GEN_NORMALS).
        const GEN_SMOOTH_NORMALS = 1 << 6;
        const SPLIT_LARGE_MESHES = 1 << 7;
        const PRE_TRANSFORM_VERTICES = 1 << 8;
        const LIMIT_BONE_WEIGHTS = 1 << 9;
        /// Handled out-of-band by the dispatcher, not by a pipeline stage.
        const VALIDATE_DATA_STRUCTURE = 1 << 10;
        const IMPROVE_CACHE_LOCALITY = 1 << 11;
        const REMOVE_REDUNDANT_MATERIALS = 1 << 12;
        const FIX_INFACING_NORMALS = 1 << 13;
        const SORT_BY_PRIMITIVE_TYPE = 1 << 14;
        const FIND_DEGENERATES = 1 << 15;
        const FIND_INVALID_DATA = 1 << 16;
        const GEN_UV_COORDS = 1 << 17;
        const TRANSFORM_UV_COORDS = 1 << 18;
        const FIND_INSTANCES = 1 << 19;
        const FLIP_UVS = 1 << 20;
        const FLIP_WINDING_ORDER = 1 << 21;
    }
}

bitflags! {
    /// Scene components the remove-vertex-components stage can strip,
    /// configured through
    /// [`config::REMOVE_COMPONENT_FLAGS`](crate::properties::config::REMOVE_COMPONENT_FLAGS).
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ComponentFlags: u32 {
        const NORMALS = 1 << 0;
        const TANGENTS_AND_BITANGENTS = 1 << 1;
        const COLORS = 1 << 2;
        const TEXCOORDS = 1 << 3;
        const BONE_WEIGHTS = 1 << 4;
        const ANIMATIONS = 1 << 5;
        const TEXTURES = 1 << 6;
        const LIGHTS = 1 << 7;
        const CAMERAS = 1 << 8;
    }
}

/// Transient data passed between pipeline stages of a single import.
///
/// The compute-spatial-sort marker stage fills in one [`SpatialSort`] per
/// mesh; the normal, tangent and join stages read them; the matching
/// destroy marker drops them again. Stages outside that bracket must not
/// see spatial data, which [`assert_no_spatial_sorts`](Self::assert_no_spatial_sorts)
/// turns into a loud failure during development.
#[derive(Debug, Default)]
pub struct SharedPostProcessState {
    spatial_sorts: Option<Vec<SpatialSort>>,
}

impl SharedPostProcessState {
    pub fn set_spatial_sorts(&mut self, sorts: Vec<SpatialSort>) {
        self.spatial_sorts = Some(sorts);
    }

    /// The per-mesh spatial sort indices, when inside the bracket window.
    pub fn spatial_sorts(&self) -> Option<&[SpatialSort]> {
        self.spatial_sorts.as_deref()
    }

    pub fn destroy_spatial_sorts(&mut self) {
        self.spatial_sorts = None;
    }

    /// Guard for stages that run outside the spatial-sort bracket; seeing
    /// spatial data there means the canonical ordering was broken.
    pub fn assert_no_spatial_sorts(&self, stage: &'static str) {
        debug_assert!(
            self.spatial_sorts.is_none(),
            "stage '{stage}' runs outside the spatial-sort bracket but found live spatial data"
        );
    }

    /// Drops everything. Called by the dispatcher after every import.
    pub fn clear(&mut self) {
        self.spatial_sorts = None;
    }
}

/// A single transform of the post-processing pipeline.
pub trait PostProcessStage {
    /// Stable name used in log and error messages.
    fn name(&self) -> &'static str;

    /// The request bits this stage services.
    fn steps(&self) -> PostProcessSteps;

    /// Whether the stage runs for the given request bitset.
    fn is_active(&self, requested: PostProcessSteps) -> bool {
        requested.intersects(self.steps())
    }

    /// Snapshot of the dispatcher configuration, taken before `execute`.
    fn setup_properties(&mut self, _properties: &PropertyStore) {}

    /// Transforms the scene in place. An `Err` is fatal: the dispatcher
    /// discards the scene and halts the pipeline.
    fn execute(&mut self, scene: &mut Scene, shared: &mut SharedPostProcessState) -> Result<()>;
}

/// Builds the pipeline in its canonical order.
///
/// Constraints encoded here: component removal and the other cleanup stages
/// come first; UV generation precedes vertex transforms; pre-transformation
/// precedes triangulation precedes primitive sorting; invalid-data and
/// infacing-normal repair run after sorting but before normal generation;
/// the triangle-axis split precedes face normals; the five stages from
/// compute-spatial-sort to destroy-spatial-sort form the shared-state
/// bracket and must not be reordered; the vertex-axis split follows
/// join-vertices; coordinate-system conversion, bone-weight limiting and
/// cache optimization run last.
pub fn standard_pipeline() -> Vec<Box<dyn PostProcessStage>> {
    vec![
        Box::new(remove_components::RemoveComponents::default()),
        Box::new(remove_redundant_materials::RemoveRedundantMaterials::default()),
        Box::new(find_instances::FindInstances::default()),
        Box::new(find_degenerates::FindDegenerates::default()),
        Box::new(gen_uv_coords::GenUvCoords::default()),
        Box::new(transform_uv_coords::TransformUvCoords::default()),
        Box::new(pretransform_vertices::PretransformVertices::default()),
        Box::new(triangulate::Triangulate::default()),
        Box::new(sort_by_primitive_type::SortByPrimitiveType::default()),
        Box::new(find_invalid_data::FindInvalidData::default()),
        Box::new(fix_infacing_normals::FixInfacingNormals::default()),
        Box::new(split_large_meshes::SplitLargeMeshesTriangle::default()),
        Box::new(gen_normals::GenFaceNormals::default()),
        Box::new(spatial_sort::ComputeSpatialSort::default()),
        Box::new(gen_normals::GenVertexNormals::default()),
        Box::new(calc_tangents::CalcTangents::default()),
        Box::new(join_vertices::JoinVertices::default()),
        Box::new(spatial_sort::DestroySpatialSort::default()),
        Box::new(split_large_meshes::SplitLargeMeshesVertex::default()),
        Box::new(convert_to_lh::MakeLeftHanded::default()),
        Box::new(convert_to_lh::FlipUvs::default()),
        Box::new(convert_to_lh::FlipWindingOrder::default()),
        Box::new(limit_bone_weights::LimitBoneWeights::default()),
        Box::new(improve_cache_locality::ImproveCacheLocality::default()),
    ]
}

/// Copies the vertices referenced by `faces` out of `mesh` into a fresh
/// mesh, remapping the face indices onto the compacted vertex arrays. Bones
/// keep only the weights whose vertices made it into the submesh. Works for
/// verbose and joined meshes alike.
pub(crate) fn gather_faces(mesh: &Mesh, faces: &[Face]) -> Mesh {
    let mut remap: HashMap<u32, u32> = HashMap::new();
    let mut order: Vec<u32> = Vec::new();
    let mut new_faces = Vec::with_capacity(faces.len());
    for face in faces {
        let indices = face
            .indices
            .iter()
            .map(|index| {
                *remap.entry(*index).or_insert_with(|| {
                    order.push(*index);
                    (order.len() - 1) as u32
                })
            })
            .collect();
        new_faces.push(Face::new(indices));
    }

    let gather = |values: &Option<Vec<nalgebra::Vector3<f32>>>| {
        values
            .as_ref()
            .map(|values| order.iter().map(|index| values[*index as usize]).collect::<Vec<_>>())
    };

    let mut submesh = Mesh {
        positions: order.iter().map(|index| mesh.positions[*index as usize]).collect(),
        normals: gather(&mesh.normals),
        tangents: gather(&mesh.tangents),
        bitangents: gather(&mesh.bitangents),
        uv_components: mesh.uv_components,
        faces: new_faces,
        material_index: mesh.material_index,
        ..Mesh::default()
    };
    for (set, colors) in mesh.colors.iter().enumerate() {
        submesh.colors[set] = colors
            .as_ref()
            .map(|colors| order.iter().map(|index| colors[*index as usize]).collect());
    }
    for (set, coords) in mesh.texture_coords.iter().enumerate() {
        submesh.texture_coords[set] = coords
            .as_ref()
            .map(|coords| order.iter().map(|index| coords[*index as usize]).collect());
    }
    for bone in &mesh.bones {
        let weights = bone
            .weights
            .iter()
            .filter_map(|weight| remap.get(&weight.vertex_id).map(|new_id| VertexWeight::new(*new_id, weight.weight)))
            .collect::<Vec<_>>();
        if !weights.is_empty() {
            submesh.bones.push(Bone {
                node_name: bone.node_name.clone(),
                offset_matrix: bone.offset_matrix,
                weights,
            });
        }
    }
    submesh.infer_primitive_types();
    submesh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position_of(pipeline: &[Box<dyn PostProcessStage>], name: &str) -> usize {
        pipeline
            .iter()
            .position(|stage| stage.name() == name)
            .unwrap_or_else(|| panic!("stage '{name}' missing from the pipeline"))
    }

    #[test]
    fn canonical_order_constraints_hold() {
        let pipeline = standard_pipeline();
        let position = |name: &str| position_of(&pipeline, name);

        // cleanup before any vertex data generation
        for cleanup in ["RemoveComponents", "RemoveRedundantMaterials", "FindInstances", "FindDegenerates"] {
            assert!(position(cleanup) < position("GenFaceNormals"));
            assert!(position(cleanup) < position("PretransformVertices"));
        }
        // UV work precedes vertex normalization
        assert!(position("GenUvCoords") < position("GenVertexNormals"));
        assert!(position("TransformUvCoords") < position("GenVertexNormals"));
        // pretransform → triangulate → sort-by-ptype
        assert!(position("PretransformVertices") < position("Triangulate"));
        assert!(position("Triangulate") < position("SortByPrimitiveType"));
        // repairs between sorting and normal generation
        assert!(position("SortByPrimitiveType") < position("FindInvalidData"));
        assert!(position("FindInvalidData") < position("GenFaceNormals"));
        assert!(position("SortByPrimitiveType") < position("FixInfacingNormals"));
        assert!(position("FixInfacingNormals") < position("GenFaceNormals"));
        // triangle-axis split before face normals
        assert!(position("SplitLargeMeshesTriangle") < position("GenFaceNormals"));
        // the spatial-sort bracket encloses exactly its three consumers
        let open = position("ComputeSpatialSort");
        let close = position("DestroySpatialSort");
        for consumer in ["GenVertexNormals", "CalcTangents", "JoinVertices"] {
            assert!(open < position(consumer) && position(consumer) < close);
        }
        assert_eq!(close - open, 4);
        // vertex-axis split after join
        assert!(position("JoinVertices") < position("SplitLargeMeshesVertex"));
        // coordinate conversion, bone limits and cache optimization last
        assert!(position("SplitLargeMeshesVertex") < position("MakeLeftHanded"));
        assert!(position("MakeLeftHanded") < position("FlipUvs"));
        assert!(position("FlipUvs") < position("FlipWindingOrder"));
        assert!(position("FlipWindingOrder") < position("LimitBoneWeights"));
        assert!(position("LimitBoneWeights") < position("ImproveCacheLocality"));
    }

    #[test]
    fn every_requestable_bit_has_a_stage() {
        let pipeline = standard_pipeline();
        for bit in PostProcessSteps::all().iter() {
            if bit == PostProcessSteps::VALIDATE_DATA_STRUCTURE {
                continue;
            }
            assert!(
                pipeline.iter().any(|stage| stage.is_active(bit)),
                "no stage services {bit:?}"
            );
        }
    }

    #[test]
    fn shared_state_bracket_lifecycle() {
        let mut shared = SharedPostProcessState::default();
        assert!(shared.spatial_sorts().is_none());
        shared.set_spatial_sorts(Vec::new());
        assert!(shared.spatial_sorts().is_some());
        shared.destroy_spatial_sorts();
        assert!(shared.spatial_sorts().is_none());
        shared.assert_no_spatial_sorts("Triangulate");
    }
}
