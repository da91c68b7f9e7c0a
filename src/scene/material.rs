use nalgebra::Vector4;

/// Well-known material property keys.
pub mod keys {
    pub const NAME: &str = "mat.name";
    pub const COLOR_DIFFUSE: &str = "mat.color.diffuse";
    pub const COLOR_SPECULAR: &str = "mat.color.specular";
    pub const COLOR_AMBIENT: &str = "mat.color.ambient";
    pub const SHININESS: &str = "mat.shininess";
    pub const OPACITY: &str = "mat.opacity";
    pub const TWO_SIDED: &str = "mat.twosided";
    /// UV offset/scale/rotation applied by the transform-texture-coords
    /// stage, stored as `[tx, ty, sx, sy, rot]`.
    pub const UV_TRANSFORM: &str = "mat.uvtransform";
    /// Texture coordinate set index a texture reads from.
    pub const UV_SOURCE: &str = "mat.uvsource";
    pub const TEXTURE_DIFFUSE: &str = "mat.texture.diffuse";
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Integer(i32),
    Float(f32),
    FloatArray(Vec<f32>),
    String(String),
    Color(Vector4<f32>),
    Buffer(Vec<u8>),
}

impl PropertyValue {
    /// Payload size in bytes, as accounted by the memory walker.
    pub fn data_len(&self) -> usize {
        match self {
            PropertyValue::Integer(_) => std::mem::size_of::<i32>(),
            PropertyValue::Float(_) => std::mem::size_of::<f32>(),
            PropertyValue::FloatArray(values) => values.len() * std::mem::size_of::<f32>(),
            PropertyValue::String(value) => value.len(),
            PropertyValue::Color(_) => std::mem::size_of::<Vector4<f32>>(),
            PropertyValue::Buffer(value) => value.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialProperty {
    pub key: String,
    pub value: PropertyValue,
}

/// Opaque key→value property bag describing a surface.
///
/// The bag over-allocates in chunks the way the importers fill it, so the
/// allocation count is tracked separately from the live property count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Material {
    properties: Vec<MaterialProperty>,
    allocated: usize,
}

const ALLOCATION_CHUNK: usize = 5;

impl Material {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the property stored under `key`.
    pub fn set(&mut self, key: impl Into<String>, value: PropertyValue) {
        let key = key.into();
        if let Some(existing) = self.properties.iter_mut().find(|property| property.key == key) {
            existing.value = value;
            return;
        }
        if self.properties.len() == self.allocated {
            self.allocated += ALLOCATION_CHUNK;
        }
        self.properties.push(MaterialProperty { key, value });
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|property| property.key == key)
            .map(|property| &property.value)
    }

    pub fn name(&self) -> Option<&str> {
        match self.get(keys::NAME) {
            Some(PropertyValue::String(name)) => Some(name),
            _ => None,
        }
    }

    pub fn properties(&self) -> &[MaterialProperty] {
        &self.properties
    }

    /// Number of property slots allocated, distinct from the live count.
    pub fn allocated(&self) -> usize {
        self.allocated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_existing_key() {
        let mut material = Material::new();
        material.set(keys::NAME, PropertyValue::String("wood".into()));
        material.set(keys::NAME, PropertyValue::String("stone".into()));
        assert_eq!(material.name(), Some("stone"));
        assert_eq!(material.properties().len(), 1);
    }

    #[test]
    fn allocation_count_exceeds_live_count() {
        let mut material = Material::new();
        material.set(keys::SHININESS, PropertyValue::Float(8.0));
        assert_eq!(material.properties().len(), 1);
        assert_eq!(material.allocated(), ALLOCATION_CHUNK);
        for i in 0..ALLOCATION_CHUNK {
            material.set(format!("key{i}"), PropertyValue::Integer(i as i32));
        }
        assert_eq!(material.allocated(), 2 * ALLOCATION_CHUNK);
    }

    #[test]
    fn data_len_tracks_payload() {
        assert_eq!(PropertyValue::String("abcd".into()).data_len(), 4);
        assert_eq!(PropertyValue::Color(Vector4::zeros()).data_len(), 16);
        assert_eq!(PropertyValue::Buffer(vec![0; 9]).data_len(), 9);
    }
}
