use std::collections::BTreeMap;

use log::trace;

/// Well-known configuration keys consumed by importers and pipeline stages.
pub mod config {
    /// Bitmask of [`ComponentFlags`](crate::postprocess::ComponentFlags) that
    /// the remove-vertex-components stage strips from every mesh.
    pub const REMOVE_COMPONENT_FLAGS: &str = "pp.remove_components.flags";
    /// Triangle count above which the split-large-meshes stage (triangle
    /// axis) divides a mesh.
    pub const SPLIT_MESH_TRIANGLE_LIMIT: &str = "pp.split_large_meshes.triangle_limit";
    /// Vertex count above which the split-large-meshes stage (vertex axis)
    /// divides a mesh.
    pub const SPLIT_MESH_VERTEX_LIMIT: &str = "pp.split_large_meshes.vertex_limit";
    /// Maximum number of bone influences per vertex kept by the
    /// limit-bone-weights stage.
    pub const BONE_WEIGHT_LIMIT: &str = "pp.limit_bone_weights.max_weights";
    /// Maximum angle in degrees between face normals that the smooth-normal
    /// and tangent stages still average across.
    pub const MAX_SMOOTHING_ANGLE: &str = "pp.gen_smooth_normals.max_angle";
    /// Bitmask of [`PrimitiveTypes`](crate::scene::PrimitiveTypes) that the
    /// sort-by-primitive-type stage drops instead of keeping.
    pub const SORT_BY_PTYPE_REMOVE: &str = "pp.sort_by_ptype.remove";
    /// When non-zero, the find-degenerates stage removes degenerate faces
    /// entirely instead of reclassifying them as lines and points.
    pub const DEGENERATES_REMOVE: &str = "pp.find_degenerates.remove";
    /// Size of the simulated post-transform vertex cache the
    /// improve-cache-locality stage optimizes for.
    pub const CACHE_SIZE: &str = "pp.improve_cache_locality.cache_size";
}

/// Typed string-keyed configuration shared between the dispatcher, the
/// importers and the pipeline stages.
///
/// The store holds three independent mappings, one per value type. Getters
/// return a caller-supplied default when the key is absent so that every
/// consumer states its fallback at the call site.
#[derive(Debug, Clone, Default)]
pub struct PropertyStore {
    ints: BTreeMap<String, i32>,
    floats: BTreeMap<String, f32>,
    strings: BTreeMap<String, String>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an integer property. Returns `true` when the key existed before.
    pub fn set_int(&mut self, key: impl Into<String>, value: i32) -> bool {
        let key = key.into();
        trace!("Setting integer property '{key}' to {value}");
        self.ints.insert(key, value).is_some()
    }

    /// Sets a float property. Returns `true` when the key existed before.
    pub fn set_float(&mut self, key: impl Into<String>, value: f32) -> bool {
        let key = key.into();
        trace!("Setting float property '{key}' to {value}");
        self.floats.insert(key, value).is_some()
    }

    /// Sets a string property. Returns `true` when the key existed before.
    pub fn set_string(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        self.strings.insert(key, value.into()).is_some()
    }

    pub fn int(&self, key: &str, default: i32) -> i32 {
        self.ints.get(key).copied().unwrap_or(default)
    }

    pub fn float(&self, key: &str, default: f32) -> f32 {
        self.floats.get(key).copied().unwrap_or(default)
    }

    pub fn string<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.strings.get(key).map(String::as_str).unwrap_or(default)
    }

    pub fn is_empty(&self) -> bool {
        self.ints.is_empty() && self.floats.is_empty() && self.strings.is_empty()
    }
}
