//! The canonical in-memory scene representation.
//!
//! Every importer decodes into this one model and every post-processing
//! stage may rely on its invariants: a root node is always present, node
//! mesh indices stay in range and freshly imported meshes use the verbose
//! (pseudo-indexed) vertex format in which no vertex index appears in two
//! faces of the same mesh.

pub mod animation;
pub mod camera;
pub mod light;
pub mod material;
pub mod mesh;
pub mod node;
pub mod texture;

pub use animation::{Animation, NodeChannel, QuatKey, VectorKey};
pub use camera::Camera;
pub use light::{Light, LightKind};
pub use material::{Material, MaterialProperty, PropertyValue};
pub use mesh::{Bone, Face, Mesh, PrimitiveTypes, VertexWeight, MAX_COLOR_SETS, MAX_TEXTURE_COORD_SETS};
pub use node::Node;
pub use texture::Texture;

use bitflags::bitflags;

bitflags! {
    /// State markers on a [`Scene`].
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct SceneFlags: u32 {
        /// The importer could not provide full geometry, e.g. an
        /// animation-only file. Permits an empty mesh array.
        const INCOMPLETE = 1 << 0;
        /// The validation stage has run on this scene without findings.
        const VALIDATED = 1 << 1;
        /// The join-identical-vertices stage has run; faces may share
        /// vertex indices from now on.
        const NON_VERBOSE_FORMAT = 1 << 2;
    }
}

/// Root of the canonical asset graph.
#[derive(Debug, Default)]
pub struct Scene {
    pub flags: SceneFlags,
    /// The hierarchy root. Always present, even if its only purpose is to
    /// reference a single mesh.
    pub root_node: Node,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub animations: Vec<Animation>,
    pub textures: Vec<Texture>,
    pub cameras: Vec<Camera>,
    pub lights: Vec<Light>,
}

impl Scene {
    /// Creates an empty scene whose root node carries the given name.
    pub fn with_root(name: impl Into<String>) -> Self {
        Self {
            root_node: Node::new(name),
            ..Self::default()
        }
    }

    /// Runs `f` on every node of the hierarchy, parents before children.
    pub fn visit_nodes(&self, mut f: impl FnMut(&Node)) {
        fn walk(node: &Node, f: &mut impl FnMut(&Node)) {
            f(node);
            for child in &node.children {
                walk(child, f);
            }
        }
        walk(&self.root_node, &mut f);
    }

    /// Runs `f` on every node of the hierarchy, parents before children.
    pub fn visit_nodes_mut(&mut self, mut f: impl FnMut(&mut Node)) {
        fn walk(node: &mut Node, f: &mut impl FnMut(&mut Node)) {
            f(node);
            for child in &mut node.children {
                walk(child, f);
            }
        }
        walk(&mut self.root_node, &mut f);
    }
}
