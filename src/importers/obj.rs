use std::{io::Read, path::Path};

use log::{trace, warn};
use nalgebra::{Vector3, Vector4};

use crate::{
    importer::{search_file_header_for_token, simple_extension_check, Importer},
    scene::{material::keys, Face, Material, Mesh, Node, PropertyValue, Scene},
    source::ImportSource,
    Error, Result,
};

/// Importer for Wavefront OBJ files.
///
/// Supports `v`/`vt`/`vn` records, polygonal `f` records with the
/// `pos/uv/normal` reference syntax including negative (relative) indices,
/// and `o`/`g` groups which become child nodes of the scene root. Material
/// definitions are not resolved from the `.mtl` library; `usemtl` names are
/// kept as stub materials so that material assignment survives the import.
#[derive(Debug, Default)]
pub struct ObjImporter;

impl Importer for ObjImporter {
    fn can_read(&self, path: &Path, source: Option<&dyn ImportSource>, check_sig: bool) -> bool {
        if simple_extension_check(path, &["obj"]) {
            return true;
        }
        match source {
            Some(source) if check_sig => {
                search_file_header_for_token(source, path, &["mtllib", "usemtl", "vn ", "vt "], 200)
            }
            _ => false,
        }
    }

    fn extension_list(&self, append: &mut String) {
        append.push_str("*.obj");
    }

    fn intern_read_file(&mut self, path: &Path, source: &dyn ImportSource) -> Result<Scene> {
        let mut stream = source.open(path)?;
        let mut content = String::new();
        stream
            .read_to_string(&mut content)
            .map_err(|error| decode_error(path, format!("not a text file: {error}")))?;

        let mut positions: Vec<Vector3<f32>> = Vec::new();
        let mut tex_coords: Vec<Vector3<f32>> = Vec::new();
        let mut normals: Vec<Vector3<f32>> = Vec::new();

        let mut scene = Scene::with_root(path.file_name().and_then(|name| name.to_str()).unwrap_or("obj scene"));
        let mut material_names: Vec<String> = Vec::new();
        let mut groups: Vec<(String, u32, Vec<Vec<RawCorner>>)> = Vec::new();
        let mut current_material = 0u32;

        for (line_number, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut words = line.split_whitespace();
            let keyword = words.next().unwrap_or_default();
            match keyword {
                "v" => positions.push(read_vector3(path, line_number, &mut words)?),
                "vt" => {
                    let u = read_float(path, line_number, words.next())?;
                    let v = words.next().and_then(|word| word.parse().ok()).unwrap_or(0.0);
                    tex_coords.push(Vector3::new(u, v, 0.0));
                }
                "vn" => normals.push(read_vector3(path, line_number, &mut words)?),
                "o" | "g" => {
                    let name = words.next().unwrap_or("default").to_owned();
                    groups.push((name, current_material, Vec::new()));
                }
                "usemtl" => {
                    let name = words.next().unwrap_or("default").to_owned();
                    current_material = intern_material(&mut material_names, name);
                    if let Some(group) = groups.last_mut() {
                        if group.2.is_empty() {
                            group.1 = current_material;
                        }
                    }
                }
                "mtllib" => trace!("Ignoring material library reference in '{}'", path.display()),
                "f" => {
                    let mut corners = Vec::new();
                    for word in words {
                        corners.push(parse_face_corner(path, line_number, word)?);
                    }
                    if corners.len() < 3 {
                        return Err(decode_error(path, format!("face with {} corners in line {}", corners.len(), line_number + 1)));
                    }
                    if groups.is_empty() {
                        groups.push(("default".to_owned(), current_material, Vec::new()));
                    }
                    let group = groups.last_mut().expect("a group exists");
                    group.2.push(corners);
                }
                "s" | "l" | "p" => {}
                other => trace!("Skipping unsupported OBJ record '{other}'"),
            }
        }

        if groups.iter().all(|(_, _, faces)| faces.is_empty()) {
            return Err(decode_error(path, "no faces found".to_owned()));
        }

        if material_names.is_empty() {
            material_names.push("default".to_owned());
        }
        for name in &material_names {
            let mut material = Material::new();
            material.set(keys::NAME, PropertyValue::String(name.clone()));
            material.set(keys::COLOR_DIFFUSE, PropertyValue::Color(Vector4::new(0.6, 0.6, 0.6, 1.0)));
            scene.materials.push(material);
        }

        for (name, material_index, faces) in groups {
            if faces.is_empty() {
                continue;
            }
            let mesh = build_mesh(path, material_index, &faces, &positions, &tex_coords, &normals)?;
            let mesh_index = scene.meshes.len() as u32;
            scene.meshes.push(mesh);
            let mut node = Node::new(name);
            node.meshes.push(mesh_index);
            scene.root_node.children.push(node);
        }
        Ok(scene)
    }
}

/// One face corner as written in the file: signed 1-based position index
/// plus optional texture/normal indices. Negative values count from the end.
type RawCorner = (i64, Option<i64>, Option<i64>);

fn intern_material(names: &mut Vec<String>, name: String) -> u32 {
    if let Some(index) = names.iter().position(|existing| *existing == name) {
        return index as u32;
    }
    names.push(name);
    (names.len() - 1) as u32
}

fn read_float(path: &Path, line_number: usize, word: Option<&str>) -> Result<f32> {
    word.and_then(|word| word.parse().ok())
        .ok_or_else(|| decode_error(path, format!("malformed number in line {}", line_number + 1)))
}

fn read_vector3<'a>(path: &Path, line_number: usize, words: &mut impl Iterator<Item = &'a str>) -> Result<Vector3<f32>> {
    let x = read_float(path, line_number, words.next())?;
    let y = read_float(path, line_number, words.next())?;
    let z = read_float(path, line_number, words.next())?;
    Ok(Vector3::new(x, y, z))
}

fn parse_face_corner(path: &Path, line_number: usize, word: &str) -> Result<RawCorner> {
    let mut parts = word.split('/');
    let position = parse_index(path, line_number, parts.next())?;
    let tex_coord = parts.next().filter(|part| !part.is_empty()).map(|part| parse_index(path, line_number, Some(part))).transpose()?;
    let normal = parts.next().filter(|part| !part.is_empty()).map(|part| parse_index(path, line_number, Some(part))).transpose()?;
    Ok((position, tex_coord, normal))
}

fn parse_index(path: &Path, line_number: usize, word: Option<&str>) -> Result<i64> {
    word.and_then(|word| word.parse::<i64>().ok())
        .filter(|index| *index != 0)
        .ok_or_else(|| decode_error(path, format!("malformed face index in line {}", line_number + 1)))
}

fn resolve(index: i64, len: usize) -> Option<usize> {
    let resolved = if index < 0 { len as i64 + index } else { index - 1 };
    (0..len as i64).contains(&resolved).then_some(resolved as usize)
}

fn build_mesh(
    path: &Path,
    material_index: u32,
    faces: &[Vec<RawCorner>],
    positions: &[Vector3<f32>],
    tex_coords: &[Vector3<f32>],
    normals: &[Vector3<f32>],
) -> Result<Mesh> {
    let has_tex_coords = faces.iter().flatten().any(|(_, uv, _)| uv.is_some());
    let has_normals = faces.iter().flatten().any(|(_, _, normal)| normal.is_some());

    let mut mesh = Mesh {
        material_index,
        ..Mesh::default()
    };
    let mut mesh_uvs = Vec::new();
    let mut mesh_normals = Vec::new();

    // Verbose output format: every face corner becomes its own vertex.
    for corners in faces {
        let mut face = Face::default();
        for (position_index, uv_index, normal_index) in corners {
            let position = resolve(*position_index, positions.len())
                .ok_or_else(|| decode_error(path, format!("vertex index {position_index} out of range")))?;
            face.indices.push(mesh.positions.len() as u32);
            mesh.positions.push(positions[position]);
            if has_tex_coords {
                let uv = uv_index
                    .and_then(|uv_index| resolve(uv_index, tex_coords.len()))
                    .map(|uv| tex_coords[uv])
                    .unwrap_or_else(Vector3::zeros);
                mesh_uvs.push(uv);
            }
            if has_normals {
                let normal = normal_index
                    .and_then(|normal_index| resolve(normal_index, normals.len()))
                    .map(|normal| normals[normal])
                    .unwrap_or_else(Vector3::zeros);
                mesh_normals.push(normal);
            }
        }
        mesh.faces.push(face);
    }

    if has_tex_coords {
        mesh.texture_coords[0] = Some(mesh_uvs);
        mesh.uv_components[0] = 2;
    }
    if has_normals {
        if mesh_normals.iter().any(|normal| normal.norm_squared() == 0.0) {
            warn!("'{}' references normals that are not defined; leaving zero entries", path.display());
        }
        mesh.normals = Some(mesh_normals);
    }
    Ok(mesh)
}

fn decode_error(path: &Path, message: String) -> Error {
    Error::Decode {
        path: path.to_owned(),
        message,
    }
}
