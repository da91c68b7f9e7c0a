/// An embedded texture.
///
/// Two storage layouts share the struct: when `height` is non-zero the data
/// is raw RGBA of `width * height * 4` bytes; when `height` is zero the data
/// is a compressed blob (PNG, JPEG, …) of `width` bytes and `format_hint`
/// names the container.
#[derive(Debug, Clone, Default)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    /// Lowercase extension of the compressed container, e.g. `png`. Empty
    /// for raw textures.
    pub format_hint: String,
    pub data: Vec<u8>,
}

impl Texture {
    pub fn is_compressed(&self) -> bool {
        self.height == 0
    }

    /// Byte size of the pixel payload.
    pub fn data_len(&self) -> usize {
        if self.is_compressed() {
            self.width as usize
        } else {
            self.width as usize * self.height as usize * 4
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_texture_counts_bytes_in_width() {
        let texture = Texture {
            width: 128,
            height: 0,
            format_hint: "png".into(),
            data: vec![0; 128],
        };
        assert!(texture.is_compressed());
        assert_eq!(texture.data_len(), 128);
    }

    #[test]
    fn raw_texture_is_rgba() {
        let texture = Texture {
            width: 4,
            height: 2,
            ..Texture::default()
        };
        assert!(!texture.is_compressed());
        assert_eq!(texture.data_len(), 32);
    }
}
