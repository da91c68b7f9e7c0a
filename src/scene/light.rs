use nalgebra::Vector3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LightKind {
    #[default]
    Directional,
    Point,
    Spot,
}

/// A light source attached to the node of the same name.
#[derive(Debug, Clone)]
pub struct Light {
    pub name: String,
    pub kind: LightKind,
    pub position: Vector3<f32>,
    pub direction: Vector3<f32>,
    pub color_diffuse: Vector3<f32>,
    pub color_specular: Vector3<f32>,
    pub color_ambient: Vector3<f32>,
    pub attenuation_constant: f32,
    pub attenuation_linear: f32,
    pub attenuation_quadratic: f32,
    /// Inner cone angle in radians; only meaningful for spot lights.
    pub angle_inner_cone: f32,
    pub angle_outer_cone: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: LightKind::default(),
            position: Vector3::zeros(),
            direction: -Vector3::z(),
            color_diffuse: Vector3::new(1.0, 1.0, 1.0),
            color_specular: Vector3::new(1.0, 1.0, 1.0),
            color_ambient: Vector3::zeros(),
            attenuation_constant: 1.0,
            attenuation_linear: 0.0,
            attenuation_quadratic: 0.0,
            angle_inner_cone: std::f32::consts::TAU,
            angle_outer_cone: std::f32::consts::TAU,
        }
    }
}
