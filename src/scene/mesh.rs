use bitflags::bitflags;
use derive_new::new;
use nalgebra::{Matrix4, Vector3, Vector4};

/// Number of vertex color sets a mesh can carry.
pub const MAX_COLOR_SETS: usize = 4;
/// Number of texture coordinate sets a mesh can carry.
pub const MAX_TEXTURE_COORD_SETS: usize = 4;

bitflags! {
    /// Kinds of primitives present in a mesh.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct PrimitiveTypes: u32 {
        const POINT = 1 << 0;
        const LINE = 1 << 1;
        const TRIANGLE = 1 << 2;
        const POLYGON = 1 << 3;
    }
}

impl PrimitiveTypes {
    /// The primitive type of a face with the given number of corners.
    pub fn of_face(index_count: usize) -> Self {
        match index_count {
            0 => Self::empty(),
            1 => Self::POINT,
            2 => Self::LINE,
            3 => Self::TRIANGLE,
            _ => Self::POLYGON,
        }
    }
}

/// A single face referencing vertices of its mesh by index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Face {
    pub indices: Vec<u32>,
}

impl Face {
    pub fn new(indices: Vec<u32>) -> Self {
        Self { indices }
    }
}

/// Skeletal influence of one node on the vertices of a mesh.
#[derive(Debug, Clone)]
pub struct Bone {
    /// Name of the [`Node`](crate::scene::Node) this bone animates by.
    pub node_name: String,
    /// Transforms mesh space into bone space in the bind pose.
    pub offset_matrix: Matrix4<f32>,
    pub weights: Vec<VertexWeight>,
}

/// Influence of a [`Bone`] on a single vertex.
#[derive(Debug, Clone, Copy, PartialEq, new)]
pub struct VertexWeight {
    pub vertex_id: u32,
    pub weight: f32,
}

/// Array-of-structures vertex container.
///
/// Importers emit meshes in the verbose format: every vertex referenced by a
/// face is unique to that face, so `positions.len()` equals the summed index
/// counts of all faces until the join-identical-vertices stage runs.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Kinds of primitives in the face list. Left empty by importers that
    /// don't know; the preprocessor infers it from the faces then.
    pub primitive_types: PrimitiveTypes,
    pub positions: Vec<Vector3<f32>>,
    pub normals: Option<Vec<Vector3<f32>>>,
    pub tangents: Option<Vec<Vector3<f32>>>,
    /// May be absent while tangents and normals are given; derivable as
    /// `normal × tangent` then.
    pub bitangents: Option<Vec<Vector3<f32>>>,
    pub colors: [Option<Vec<Vector4<f32>>>; MAX_COLOR_SETS],
    pub texture_coords: [Option<Vec<Vector3<f32>>>; MAX_TEXTURE_COORD_SETS],
    /// Number of meaningful components (1, 2 or 3) per texture coordinate set.
    pub uv_components: [u32; MAX_TEXTURE_COORD_SETS],
    pub faces: Vec<Face>,
    pub bones: Vec<Bone>,
    /// Index into [`Scene::materials`](crate::scene::Scene::materials).
    pub material_index: u32,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn has_positions(&self) -> bool {
        !self.positions.is_empty()
    }

    pub fn has_normals(&self) -> bool {
        self.normals.as_ref().is_some_and(|normals| !normals.is_empty())
    }

    pub fn has_tangents_and_bitangents(&self) -> bool {
        self.tangents.as_ref().is_some_and(|tangents| !tangents.is_empty())
            && self.bitangents.as_ref().is_some_and(|bitangents| !bitangents.is_empty())
    }

    pub fn has_vertex_colors(&self, set: usize) -> bool {
        set < MAX_COLOR_SETS && self.colors[set].as_ref().is_some_and(|colors| !colors.is_empty())
    }

    pub fn has_texture_coords(&self, set: usize) -> bool {
        set < MAX_TEXTURE_COORD_SETS && self.texture_coords[set].as_ref().is_some_and(|coords| !coords.is_empty())
    }

    pub fn has_bones(&self) -> bool {
        !self.bones.is_empty()
    }

    /// Appends a copy of the vertex at `index` to every attribute array and
    /// returns the index of the copy. Bone weights targeting the vertex are
    /// duplicated as well, so the copy stays skinned identically.
    pub fn duplicate_vertex(&mut self, index: u32) -> u32 {
        let new_index = self.positions.len() as u32;
        let at = index as usize;
        self.positions.push(self.positions[at]);
        for attribute in [&mut self.normals, &mut self.tangents, &mut self.bitangents].into_iter().flatten() {
            attribute.push(attribute[at]);
        }
        for colors in self.colors.iter_mut().flatten() {
            colors.push(colors[at]);
        }
        for coords in self.texture_coords.iter_mut().flatten() {
            coords.push(coords[at]);
        }
        for bone in &mut self.bones {
            let duplicated = bone
                .weights
                .iter()
                .filter(|weight| weight.vertex_id == index)
                .map(|weight| VertexWeight::new(new_index, weight.weight))
                .collect::<Vec<_>>();
            bone.weights.extend(duplicated);
        }
        new_index
    }

    /// Recomputes `primitive_types` from the face list.
    pub fn infer_primitive_types(&mut self) {
        let mut types = PrimitiveTypes::empty();
        for face in &self.faces {
            types |= PrimitiveTypes::of_face(face.indices.len());
        }
        self.primitive_types = types;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_type_per_corner_count() {
        assert_eq!(PrimitiveTypes::of_face(1), PrimitiveTypes::POINT);
        assert_eq!(PrimitiveTypes::of_face(2), PrimitiveTypes::LINE);
        assert_eq!(PrimitiveTypes::of_face(3), PrimitiveTypes::TRIANGLE);
        assert_eq!(PrimitiveTypes::of_face(7), PrimitiveTypes::POLYGON);
    }

    #[test]
    fn infer_primitive_types_unions_all_faces() {
        let mut mesh = Mesh {
            faces: vec![Face::new(vec![0, 1, 2]), Face::new(vec![3, 4]), Face::new(vec![5, 6, 7, 8])],
            ..Mesh::default()
        };
        mesh.infer_primitive_types();
        assert_eq!(
            mesh.primitive_types,
            PrimitiveTypes::TRIANGLE | PrimitiveTypes::LINE | PrimitiveTypes::POLYGON
        );
    }

    #[test]
    fn attribute_presence() {
        let mut mesh = Mesh::default();
        assert!(!mesh.has_positions());
        mesh.positions.push(Vector3::zeros());
        assert!(mesh.has_positions());
        assert!(!mesh.has_normals());
        mesh.normals = Some(vec![Vector3::y()]);
        assert!(mesh.has_normals());
        assert!(!mesh.has_tangents_and_bitangents());
        assert!(!mesh.has_vertex_colors(0));
        assert!(!mesh.has_texture_coords(MAX_TEXTURE_COORD_SETS));
    }
}
