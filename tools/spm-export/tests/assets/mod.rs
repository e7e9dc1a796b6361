//! Test asset generation
//!
//! Writes small OBJ and glTF files into a directory for the integration
//! tests.

#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};

/// Write `kart.obj`, `kart.mtl` and `kart.png`: a textured unit quad with a
/// second, untextured triangle.
pub fn generate_textured_obj(dir: &Path) -> io::Result<PathBuf> {
    std::fs::write(
        dir.join("kart.mtl"),
        "newmtl body\nmap_Kd kart.png\nnewmtl plain\nKd 1 1 1\n",
    )?;
    // Content is never decoded, only looked up by name
    std::fs::write(dir.join("kart.png"), b"\x89PNG")?;

    let path = dir.join("kart.obj");
    std::fs::write(
        &path,
        "\
mtllib kart.mtl
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
v 2 0 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
usemtl body
f 1/1/1 2/2/1 3/3/1 4/4/1
usemtl plain
f 2//1 5//1 3//1
",
    )?;
    Ok(path)
}

/// Write a minimal single-triangle OBJ
pub fn generate_triangle_obj(path: &Path) -> io::Result<()> {
    std::fs::write(path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n")
}

/// Joint count of the skinned glTF
pub const GLTF_BONES: usize = 2;
/// Keyframes of the skinned glTF animation (0 s and 1 s)
pub const GLTF_KEYFRAMES: usize = 2;

/// Write `strip.gltf` + `strip.bin`: a two-quad vertical strip skinned to a
/// Root -> Tip chain, with Tip rotating 90 degrees over one second.
pub fn generate_skinned_gltf(dir: &Path) -> io::Result<PathBuf> {
    let mut bin: Vec<u8> = Vec::new();
    let mut put = |values: &[f32]| {
        for v in values {
            bin.extend_from_slice(&v.to_le_bytes());
        }
    };

    // Positions: rows at y = 0, 1, 2 (offset 0, 72 bytes)
    for y in 0..3 {
        put(&[0.0, y as f32, 0.0]);
        put(&[1.0, y as f32, 0.0]);
    }
    // Weights (offset 72, 96 bytes)
    for row in [[1.0, 0.0], [0.5, 0.5], [0.0, 1.0]] {
        for _ in 0..2 {
            put(&[row[0], row[1], 0.0, 0.0]);
        }
    }
    // Inverse binds (offset 168, 128 bytes): Root at origin, Tip at y = 1
    put(&[
        1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
    ]);
    put(&[
        1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, -1.0, 0.0, 1.0,
    ]);
    // Key times (offset 296, 8 bytes)
    put(&[0.0, 1.0]);
    // Tip rotations about Z (offset 304, 32 bytes)
    let half = std::f32::consts::FRAC_PI_4;
    put(&[0.0, 0.0, 0.0, 1.0]);
    put(&[0.0, 0.0, half.sin(), half.cos()]);

    // Joints as u16 (offset 336, 48 bytes)
    for _ in 0..6 {
        for j in [0u16, 1, 0, 0] {
            bin.extend_from_slice(&j.to_le_bytes());
        }
    }
    // Indices as u16 (offset 384, 24 bytes)
    for i in [0u16, 1, 3, 0, 3, 2, 2, 3, 5, 2, 5, 4] {
        bin.extend_from_slice(&i.to_le_bytes());
    }
    assert_eq!(bin.len(), 408);
    std::fs::write(dir.join("strip.bin"), &bin)?;

    let json = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [{ "nodes": [0, 1] }],
  "nodes": [
    { "name": "Strip", "mesh": 0, "skin": 0 },
    { "name": "Root", "children": [2] },
    { "name": "Tip", "translation": [0, 1, 0] }
  ],
  "meshes": [{
    "name": "Strip",
    "primitives": [{
      "attributes": { "POSITION": 0, "WEIGHTS_0": 1, "JOINTS_0": 5 },
      "indices": 6
    }]
  }],
  "skins": [{ "name": "Rig", "joints": [1, 2], "inverseBindMatrices": 2 }],
  "animations": [{
    "name": "Bend",
    "channels": [{ "sampler": 0, "target": { "node": 2, "path": "rotation" } }],
    "samplers": [{ "input": 3, "output": 4, "interpolation": "LINEAR" }]
  }],
  "buffers": [{ "uri": "strip.bin", "byteLength": 408 }],
  "bufferViews": [
    { "buffer": 0, "byteOffset": 0, "byteLength": 72 },
    { "buffer": 0, "byteOffset": 72, "byteLength": 96 },
    { "buffer": 0, "byteOffset": 168, "byteLength": 128 },
    { "buffer": 0, "byteOffset": 296, "byteLength": 8 },
    { "buffer": 0, "byteOffset": 304, "byteLength": 32 },
    { "buffer": 0, "byteOffset": 336, "byteLength": 48 },
    { "buffer": 0, "byteOffset": 384, "byteLength": 24 }
  ],
  "accessors": [
    { "bufferView": 0, "componentType": 5126, "count": 6, "type": "VEC3",
      "min": [0, 0, 0], "max": [1, 2, 0] },
    { "bufferView": 1, "componentType": 5126, "count": 6, "type": "VEC4" },
    { "bufferView": 2, "componentType": 5126, "count": 2, "type": "MAT4" },
    { "bufferView": 3, "componentType": 5126, "count": 2, "type": "SCALAR",
      "min": [0], "max": [1] },
    { "bufferView": 4, "componentType": 5126, "count": 2, "type": "VEC4" },
    { "bufferView": 5, "componentType": 5123, "count": 6, "type": "VEC4" },
    { "bufferView": 6, "componentType": 5123, "count": 12, "type": "SCALAR" }
  ]
}"#;
    let path = dir.join("strip.gltf");
    std::fs::write(&path, json)?;
    Ok(path)
}
