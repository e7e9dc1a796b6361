//! OBJ loading
//!
//! One object per file. `usemtl` switches the material slot of the faces
//! that follow; slots get their texture from `map_Kd` in the `mtllib` files.

use anyhow::{Context, Result, bail};
use glam::{Vec2, Vec3};
use hashbrown::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::Y_UP_TO_Z_UP;
use crate::scene::{MaterialDescriptor, MeshObject};

/// Load an OBJ file as a single mesh object
pub fn load_obj(input: &Path) -> Result<Vec<MeshObject>> {
    let file = File::open(input).with_context(|| format!("Failed to open OBJ: {:?}", input))?;
    let name = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("mesh")
        .to_string();
    let base_dir = input.parent().unwrap_or(Path::new("."));
    let mut obj = parse_obj(BufReader::new(file), name, |lib| {
        let path = base_dir.join(lib);
        match File::open(&path) {
            Ok(f) => parse_mtl(BufReader::new(f)),
            Err(err) => {
                tracing::warn!("Cannot open material library {:?}: {}", path, err);
                Ok(HashMap::new())
            }
        }
    })?;
    obj.world_matrix = Y_UP_TO_Z_UP;

    tracing::debug!(
        "Loaded OBJ {:?}: {} vertices, {} faces, {} materials",
        input,
        obj.positions.len(),
        obj.faces.len(),
        obj.materials.len()
    );
    Ok(vec![obj])
}

/// Parse OBJ text; `load_mtl` resolves `mtllib` names to material textures
fn parse_obj<R: BufRead>(
    reader: R,
    name: String,
    mut load_mtl: impl FnMut(&str) -> Result<HashMap<String, Option<String>>>,
) -> Result<MeshObject> {
    let mut positions: Vec<Vec3> = Vec::new();
    let mut tex_coords: Vec<Vec2> = Vec::new();
    let mut normals_raw: Vec<Vec3> = Vec::new();

    let mut library: HashMap<String, Option<String>> = HashMap::new();
    let mut slots: Vec<String> = Vec::new();
    let mut current_slot = 0;

    let mut loop_vertices: Vec<Vec<u32>> = Vec::new();
    let mut face_slots: Vec<usize> = Vec::new();
    let mut loop_uvs: Vec<Option<Vec2>> = Vec::new();
    let mut normal_sums: HashMap<usize, Vec3> = HashMap::new();
    let mut missing_normal = false;

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts[0] {
            "v" if parts.len() >= 4 => positions.push(parse_vec3(&parts[1..4])),
            "vt" if parts.len() >= 3 => {
                let u: f32 = parts[1].parse().unwrap_or(0.0);
                let v: f32 = parts[2].parse().unwrap_or(0.0);
                tex_coords.push(Vec2::new(u, v));
            }
            "vn" if parts.len() >= 4 => normals_raw.push(parse_vec3(&parts[1..4])),
            "mtllib" if parts.len() >= 2 => {
                for lib in &parts[1..] {
                    library.extend(load_mtl(lib)?);
                }
            }
            "usemtl" if parts.len() >= 2 => {
                let material = parts[1].to_string();
                current_slot = match slots.iter().position(|s| *s == material) {
                    Some(slot) => slot,
                    None => {
                        slots.push(material);
                        slots.len() - 1
                    }
                };
            }
            "f" if parts.len() >= 4 => {
                let corners: Vec<(usize, Option<usize>, Option<usize>)> = parts[1..]
                    .iter()
                    .filter_map(|v| parse_obj_vertex(v))
                    .collect();
                if corners.len() < 3 {
                    continue;
                }

                let mut face = Vec::with_capacity(corners.len());
                for (vi, vti, vni) in corners {
                    if vi >= positions.len() {
                        bail!("Face references missing vertex {}", vi + 1);
                    }
                    face.push(vi as u32);
                    loop_uvs.push(vti.and_then(|ti| tex_coords.get(ti).copied()));
                    match vni.and_then(|ni| normals_raw.get(ni)) {
                        Some(&n) => *normal_sums.entry(vi).or_insert(Vec3::ZERO) += n,
                        None => missing_normal = true,
                    }
                }
                loop_vertices.push(face);
                face_slots.push(current_slot);
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        bail!("No vertices found in OBJ file");
    }

    let mut obj = MeshObject::new(name, positions);
    for (face, slot) in loop_vertices.iter().zip(face_slots) {
        obj.add_face(face, slot);
    }

    if loop_uvs.iter().any(Option::is_some) {
        obj.uv_layers
            .push(loop_uvs.into_iter().map(|uv| uv.unwrap_or(Vec2::ZERO)).collect());
    }

    if !missing_normal && !normal_sums.is_empty() {
        obj.normals = Some(
            (0..obj.positions.len())
                .map(|i| {
                    normal_sums
                        .get(&i)
                        .map_or(Vec3::Z, |n| n.normalize_or(Vec3::Z))
                })
                .collect(),
        );
    }

    obj.materials = slots
        .iter()
        .map(|slot| MaterialDescriptor {
            primary_texture: library.get(slot).cloned().flatten(),
            secondary_texture: None,
        })
        .collect();

    Ok(obj)
}

/// Parse MTL text into material name -> diffuse texture file name
fn parse_mtl<R: BufRead>(reader: R) -> Result<HashMap<String, Option<String>>> {
    let mut materials = HashMap::new();
    let mut current: Option<String> = None;
    for line in reader.lines() {
        let line = line?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["newmtl", name, ..] => {
                materials.insert(name.to_string(), None);
                current = Some(name.to_string());
            }
            ["map_Kd", .., path] => {
                if let Some(material) = current.as_ref() {
                    // Only the file name is stored; the reader searches for it
                    let file_name = Path::new(*path)
                        .file_name()
                        .and_then(|f| f.to_str())
                        .unwrap_or(*path);
                    materials.insert(material.clone(), Some(file_name.to_string()));
                }
            }
            _ => {}
        }
    }
    Ok(materials)
}

fn parse_vec3(parts: &[&str]) -> Vec3 {
    let x: f32 = parts[0].parse().unwrap_or(0.0);
    let y: f32 = parts[1].parse().unwrap_or(0.0);
    let z: f32 = parts[2].parse().unwrap_or(0.0);
    Vec3::new(x, y, z)
}

/// Parse OBJ vertex reference: "v", "v/vt", "v/vt/vn", or "v//vn"
fn parse_obj_vertex(s: &str) -> Option<(usize, Option<usize>, Option<usize>)> {
    let parts: Vec<&str> = s.split('/').collect();

    let vi = parts.first()?.parse::<usize>().ok()?.checked_sub(1)?; // OBJ indices are 1-based

    let index = |at: usize| {
        parts
            .get(at)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<usize>().ok())
            .and_then(|i| i.checked_sub(1))
    };

    Some((vi, index(1), index(2)))
}
