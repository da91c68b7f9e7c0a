use derive_new::new;
use nalgebra::{UnitQuaternion, Vector3};

/// A keyframe holding a vector value.
#[derive(Debug, Clone, Copy, PartialEq, new)]
pub struct VectorKey {
    /// Key time in ticks.
    pub time: f64,
    pub value: Vector3<f32>,
}

/// A keyframe holding a rotation.
#[derive(Debug, Clone, Copy, PartialEq, new)]
pub struct QuatKey {
    /// Key time in ticks.
    pub time: f64,
    pub value: UnitQuaternion<f32>,
}

/// Animation track targeting a single node.
///
/// The three key arrays are independent; each is ordered by non-decreasing
/// time.
#[derive(Debug, Clone, Default)]
pub struct NodeChannel {
    /// Name of the [`Node`](crate::scene::Node) affected by this channel.
    pub node_name: String,
    pub position_keys: Vec<VectorKey>,
    pub rotation_keys: Vec<QuatKey>,
    pub scaling_keys: Vec<VectorKey>,
}

impl NodeChannel {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            ..Self::default()
        }
    }

    /// The largest key time in any of the three arrays, 0 when empty.
    pub fn max_key_time(&self) -> f64 {
        let position = self.position_keys.last().map_or(0.0, |key| key.time);
        let rotation = self.rotation_keys.last().map_or(0.0, |key| key.time);
        let scaling = self.scaling_keys.last().map_or(0.0, |key| key.time);
        position.max(rotation).max(scaling)
    }
}

/// A named animation built from per-node channels.
#[derive(Debug, Clone, Default)]
pub struct Animation {
    pub name: String,
    /// Duration in ticks. `-1.0` asks the preprocessor to derive it from
    /// the longest channel.
    pub duration: f64,
    /// Ticks per second. `0.0` means the consumer applies the default of 25.
    pub ticks_per_second: f64,
    pub channels: Vec<NodeChannel>,
}

impl Animation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration: -1.0,
            ..Self::default()
        }
    }
}
