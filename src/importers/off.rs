use std::{io::Read, path::Path};

use nalgebra::Vector3;

use crate::{
    importer::{check_magic_token, simple_extension_check, Importer},
    scene::{Face, Mesh, Scene},
    source::ImportSource,
    Error, Result,
};

/// Importer for Object File Format (OFF) meshes.
///
/// The format is a `OFF` magic line, a `vertices faces edges` count line and
/// the plain vertex and polygon lists. Comment lines start with `#`.
#[derive(Debug, Default)]
pub struct OffImporter;

impl Importer for OffImporter {
    fn can_read(&self, path: &Path, source: Option<&dyn ImportSource>, check_sig: bool) -> bool {
        if simple_extension_check(path, &["off"]) {
            return true;
        }
        match source {
            Some(source) if check_sig => check_magic_token(source, path, &[b"OFF\n", b"OFF\r", b"OFF "], 0),
            _ => false,
        }
    }

    fn extension_list(&self, append: &mut String) {
        append.push_str("*.off");
    }

    fn intern_read_file(&mut self, path: &Path, source: &dyn ImportSource) -> Result<Scene> {
        let mut stream = source.open(path)?;
        let mut content = String::new();
        stream
            .read_to_string(&mut content)
            .map_err(|error| decode_error(path, format!("not a text file: {error}")))?;

        let mut lines = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));

        if lines.next() != Some("OFF") {
            return Err(decode_error(path, "missing OFF magic".into()));
        }
        let counts = lines.next().ok_or_else(|| decode_error(path, "missing count line".into()))?;
        let mut counts = counts.split_whitespace().map(|word| word.parse::<usize>());
        let vertex_count = counts
            .next()
            .and_then(|count| count.ok())
            .ok_or_else(|| decode_error(path, "malformed count line".into()))?;
        let face_count = counts
            .next()
            .and_then(|count| count.ok())
            .ok_or_else(|| decode_error(path, "malformed count line".into()))?;
        if vertex_count == 0 || face_count == 0 {
            return Err(decode_error(path, "empty mesh".into()));
        }

        let mut vertices = Vec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            let line = lines.next().ok_or_else(|| decode_error(path, "unexpected end of vertex list".into()))?;
            let mut words = line.split_whitespace().map(|word| word.parse::<f32>());
            let mut component =
                || words.next().and_then(|value| value.ok()).ok_or_else(|| decode_error(path, "malformed vertex".into()));
            vertices.push(Vector3::new(component()?, component()?, component()?));
        }

        // Verbose output format: corners referencing shared vertices are
        // expanded into unique ones.
        let mut mesh = Mesh::default();
        for _ in 0..face_count {
            let line = lines.next().ok_or_else(|| decode_error(path, "unexpected end of face list".into()))?;
            let mut words = line.split_whitespace().map(|word| word.parse::<usize>());
            let corner_count = words
                .next()
                .and_then(|count| count.ok())
                .filter(|count| *count > 0)
                .ok_or_else(|| decode_error(path, "malformed face".into()))?;
            let mut face = Face::default();
            for _ in 0..corner_count {
                let vertex_index = words
                    .next()
                    .and_then(|index| index.ok())
                    .filter(|index| *index < vertices.len())
                    .ok_or_else(|| decode_error(path, "face index out of range".into()))?;
                face.indices.push(mesh.positions.len() as u32);
                mesh.positions.push(vertices[vertex_index]);
            }
            mesh.faces.push(face);
        }

        let name = path.file_stem().and_then(|stem| stem.to_str()).unwrap_or("off scene");
        let mut scene = Scene::with_root(name);
        scene.root_node.meshes.push(0);
        scene.meshes.push(mesh);
        Ok(scene)
    }
}

fn decode_error(path: &Path, message: String) -> Error {
    Error::Decode {
        path: path.to_owned(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use crate::source::MemorySource;

    use super::*;

    fn import(content: &str) -> Result<Scene> {
        let source = MemorySource::new().with_file("mesh.off", content.as_bytes().to_vec());
        OffImporter.intern_read_file(Path::new("mesh.off"), &source)
    }

    #[test]
    fn square_pyramid() {
        let scene = import(indoc! {"
            OFF
            # a comment
            4 2 0
            0 0 0
            1 0 0
            1 1 0
            0 1 0
            3 0 1 2
            3 0 2 3
        "})
        .unwrap();
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.face_count(), 2);
        // verbose format: 6 corners, 6 unique vertices
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.positions[4], Vector3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn missing_magic_is_a_decode_error() {
        assert!(matches!(import("3 1 0\n0 0 0\n"), Err(Error::Decode { .. })));
    }

    #[test]
    fn out_of_range_face_index() {
        let result = import(indoc! {"
            OFF
            3 1 0
            0 0 0
            1 0 0
            0 1 0
            3 0 1 9
        "});
        assert!(matches!(result, Err(Error::Decode { .. })));
    }

    #[test]
    fn magic_probe_reads_prefix_only() {
        let source = MemorySource::new().with_file("anon", b"OFF\n1 1 0\n".to_vec());
        let importer = OffImporter;
        assert!(!importer.can_read(Path::new("anon"), Some(&source), false));
        assert!(importer.can_read(Path::new("anon"), Some(&source), true));
    }
}
