use std::{
    io::Read,
    path::Path,
};

use byteorder::{LittleEndian, ReadBytesExt};
use log::trace;
use nalgebra::Vector3;

use crate::{
    importer::{search_file_header_for_token, simple_extension_check, Importer},
    scene::{Face, Mesh, Scene},
    source::ImportSource,
    Error, Result,
};

const BINARY_HEADER_LEN: usize = 80;
const FACET_RECORD_LEN: usize = 50;

/// Importer for stereolithography (STL) files, ASCII and binary.
///
/// An ASCII file starts with the `solid` keyword and spells out one
/// `facet … endfacet` block per triangle; the binary layout is an 80 byte
/// header, a little-endian triangle count and fixed 50 byte facet records.
/// Some binary writers still begin the header with `solid`, so the decoder
/// distinguishes the two by looking for the `facet` keyword.
#[derive(Debug, Default)]
pub struct StlImporter;

impl Importer for StlImporter {
    fn can_read(&self, path: &Path, source: Option<&dyn ImportSource>, check_sig: bool) -> bool {
        if simple_extension_check(path, &["stl"]) {
            return true;
        }
        match source {
            Some(source) if check_sig => search_file_header_for_token(source, path, &["solid", "endfacet"], 200),
            _ => false,
        }
    }

    fn extension_list(&self, append: &mut String) {
        append.push_str("*.stl");
    }

    fn intern_read_file(&mut self, path: &Path, source: &dyn ImportSource) -> Result<Scene> {
        let mut stream = source.open(path)?;
        let mut content = Vec::new();
        stream.read_to_end(&mut content)?;

        let looks_ascii = content.starts_with(b"solid")
            && content[..content.len().min(512)]
                .windows(5)
                .any(|window| window.eq_ignore_ascii_case(b"facet"));
        let mesh = if looks_ascii {
            trace!("'{}' is an ASCII STL file", path.display());
            read_ascii(path, &content)?
        } else {
            trace!("'{}' is a binary STL file", path.display());
            read_binary(path, &content)?
        };

        let name = path.file_stem().and_then(|stem| stem.to_str()).unwrap_or("stl scene");
        let mut scene = Scene::with_root(name);
        scene.root_node.meshes.push(0);
        scene.meshes.push(mesh);
        Ok(scene)
    }
}

fn read_ascii(path: &Path, content: &[u8]) -> Result<Mesh> {
    let text = std::str::from_utf8(content).map_err(|_| decode_error(path, "ASCII file contains invalid UTF-8".into()))?;
    let mut mesh = Mesh::default();
    let mut normals = Vec::new();
    let mut facet_normal = Vector3::zeros();
    let mut corners: Vec<Vector3<f32>> = Vec::new();

    for line in text.lines() {
        let mut words = line.split_whitespace();
        match words.next() {
            Some("facet") => {
                // "facet normal nx ny nz"
                words.next();
                facet_normal = read_vector3(path, &mut words).unwrap_or_else(|_| Vector3::zeros());
                corners.clear();
            }
            Some("vertex") => corners.push(read_vector3(path, &mut words)?),
            Some("endfacet") => {
                if corners.len() != 3 {
                    return Err(decode_error(path, format!("facet with {} vertices", corners.len())));
                }
                let base = mesh.positions.len() as u32;
                mesh.faces.push(Face::new(vec![base, base + 1, base + 2]));
                mesh.positions.extend(corners.drain(..));
                normals.extend([facet_normal; 3]);
            }
            _ => {}
        }
    }

    if mesh.faces.is_empty() {
        return Err(decode_error(path, "no facets found".into()));
    }
    if normals.iter().any(|normal: &Vector3<f32>| normal.norm_squared() != 0.0) {
        mesh.normals = Some(normals);
    }
    Ok(mesh)
}

fn read_binary(path: &Path, content: &[u8]) -> Result<Mesh> {
    if content.len() < BINARY_HEADER_LEN + 4 {
        return Err(decode_error(path, "file too short for a binary header".into()));
    }
    let mut cursor = &content[BINARY_HEADER_LEN..];
    let facet_count = cursor.read_u32::<LittleEndian>()? as usize;
    let expected = BINARY_HEADER_LEN + 4 + facet_count * FACET_RECORD_LEN;
    if content.len() < expected {
        return Err(decode_error(
            path,
            format!("truncated file: {} facets need {} bytes, have {}", facet_count, expected, content.len()),
        ));
    }
    if facet_count == 0 {
        return Err(decode_error(path, "no facets found".into()));
    }

    let mut mesh = Mesh::default();
    let mut normals = Vec::with_capacity(facet_count * 3);
    for _ in 0..facet_count {
        let normal = read_binary_vector3(&mut cursor)?;
        let base = mesh.positions.len() as u32;
        for _ in 0..3 {
            mesh.positions.push(read_binary_vector3(&mut cursor)?);
            normals.push(normal);
        }
        mesh.faces.push(Face::new(vec![base, base + 1, base + 2]));
        // attribute byte count, unused
        cursor.read_u16::<LittleEndian>()?;
    }
    mesh.normals = Some(normals);
    Ok(mesh)
}

fn read_binary_vector3(cursor: &mut &[u8]) -> Result<Vector3<f32>> {
    let x = cursor.read_f32::<LittleEndian>()?;
    let y = cursor.read_f32::<LittleEndian>()?;
    let z = cursor.read_f32::<LittleEndian>()?;
    Ok(Vector3::new(x, y, z))
}

fn read_vector3<'a>(path: &Path, words: &mut impl Iterator<Item = &'a str>) -> Result<Vector3<f32>> {
    let mut component = || {
        words
            .next()
            .and_then(|word| word.parse().ok())
            .ok_or_else(|| decode_error(path, "malformed coordinate triple".into()))
    };
    Ok(Vector3::new(component()?, component()?, component()?))
}

fn decode_error(path: &Path, message: String) -> Error {
    Error::Decode {
        path: path.to_owned(),
        message,
    }
}
