use nalgebra::Matrix4;

/// A named transform in the scene hierarchy.
///
/// Nodes own their children, so the hierarchy is a tree by construction:
/// no cycles, every node has exactly one parent except the root.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    /// Transform relative to the parent node.
    pub transform: Matrix4<f32>,
    /// Indices into [`Scene::meshes`](crate::scene::Scene::meshes).
    pub meshes: Vec<u32>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Matrix4::identity(),
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Number of nodes in the subtree rooted here, including this node.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Node::subtree_len).sum::<usize>()
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtree_len_counts_all_descendants() {
        let mut root = Node::new("root");
        root.children.push(Node::new("a"));
        let mut b = Node::new("b");
        b.children.push(Node::new("b0"));
        b.children.push(Node::new("b1"));
        root.children.push(b);
        assert_eq!(root.subtree_len(), 5);
    }
}
