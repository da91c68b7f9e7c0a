use nalgebra::Vector3;

/// A camera attached to the node of the same name.
#[derive(Debug, Clone)]
pub struct Camera {
    pub name: String,
    /// Position relative to the owning node.
    pub position: Vector3<f32>,
    pub up: Vector3<f32>,
    pub look_at: Vector3<f32>,
    /// Horizontal field of view in radians.
    pub horizontal_fov: f32,
    pub clip_plane_near: f32,
    pub clip_plane_far: f32,
    pub aspect: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            name: String::new(),
            position: Vector3::zeros(),
            up: Vector3::y(),
            look_at: -Vector3::z(),
            horizontal_fov: std::f32::consts::FRAC_PI_4,
            clip_plane_near: 0.1,
            clip_plane_far: 1000.0,
            aspect: 0.0,
        }
    }
}
