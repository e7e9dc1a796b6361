//! Integration tests for spm-export
//!
//! Tests the full pipeline: generate test assets -> convert -> verify output

mod assets;

use std::path::Path;
use tempfile::tempdir;

use spm_common::{SPM_MAGIC, SpmHeader, SpmKind};
use spm_export::TextureSource;

/// Test OBJ -> SPM conversion through the CLI
#[test]
fn test_obj_to_spm() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = assets::generate_textured_obj(dir.path()).expect("Failed to generate OBJ");
    let spm_path = dir.path().join("kart.spm");

    spm_export_mesh(&obj_path, &spm_path, &[]);
    assert!(spm_path.exists(), "SPM file should exist");

    let data = std::fs::read(&spm_path).expect("Failed to read SPM file");
    let header = verify_spm_header(&data);
    assert_eq!(header.kind(), Some(SpmKind::Plain));
    assert!(header.has_normal());
    // The textured quad has UVs
    assert!(header.has_tangent());
}

/// Test that disabled attributes are left out of the header flags
#[test]
fn test_obj_without_optional_attributes() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = dir.path().join("triangle.obj");
    let spm_path = dir.path().join("triangle.spm");

    assets::generate_triangle_obj(&obj_path).expect("Failed to generate triangle OBJ");
    spm_export_mesh(&obj_path, &spm_path, &["--no-normals", "--no-tangents"]);

    let data = std::fs::read(&spm_path).expect("Failed to read SPM file");
    let header = verify_spm_header(&data);
    assert_eq!(header.flags, 0);
}

/// Test that the file written by the CLI decodes with its texture found
/// next to it
#[test]
fn test_decode_exported_obj() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = assets::generate_textured_obj(dir.path()).expect("Failed to generate OBJ");
    let spm_path = dir.path().join("kart.spm");
    spm_export_mesh(&obj_path, &spm_path, &[]);

    let scene = spm_export::decode_file(&spm_path, None).expect("Failed to decode");
    assert_eq!(scene.materials.len(), 2);
    assert_eq!(scene.meshes.len(), 2);
    assert!(scene.warnings.is_empty());

    let textured = scene
        .materials
        .iter()
        .find_map(|m| m.primary.as_ref())
        .expect("Textured material missing");
    assert_eq!(textured.name, "kart.png");
    assert_eq!(textured.source, TextureSource::File(dir.path().join("kart.png")));

    let quad = scene
        .meshes
        .iter()
        .find(|m| m.name == "kart.png__")
        .expect("Quad mesh missing");
    assert_eq!(quad.positions.len(), 4);
    assert_eq!(quad.faces.len(), 2);
    assert!(quad.uv0.is_some());
}

/// Test the inspect command on a converted file
#[test]
fn test_inspect_command() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = assets::generate_textured_obj(dir.path()).expect("Failed to generate OBJ");
    let spm_path = dir.path().join("kart.spm");
    spm_export_mesh(&obj_path, &spm_path, &[]);

    let status = std::process::Command::new(env!("CARGO_BIN_EXE_spm-export"))
        .args(["inspect", spm_path.to_str().unwrap()])
        .status()
        .expect("Failed to run spm-export");
    assert!(status.success(), "spm-export inspect command failed");
}

/// Test the inspect command rejects a file that is not SPM
#[test]
fn test_inspect_rejects_garbage() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("garbage.spm");
    std::fs::write(&path, b"not a mesh at all, just text").unwrap();

    let status = std::process::Command::new(env!("CARGO_BIN_EXE_spm-export"))
        .args(["inspect", path.to_str().unwrap()])
        .status()
        .expect("Failed to run spm-export");
    assert!(!status.success());
}

/// Test building every mesh of a manifest
#[test]
fn test_manifest_build() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = assets::generate_textured_obj(dir.path()).expect("Failed to generate OBJ");
    let gltf_path = assets::generate_skinned_gltf(dir.path()).expect("Failed to generate glTF");
    let out_dir = dir.path().join("out");

    let manifest_path = dir.path().join("assets.toml");
    std::fs::write(
        &manifest_path,
        format!(
            "[output]\ndir = {:?}\n\n[meshes]\nkart = {:?}\nstrip = {{ path = {:?}, local_space = true }}\n",
            out_dir.to_str().unwrap(),
            obj_path.to_str().unwrap(),
            gltf_path.to_str().unwrap()
        ),
    )
    .unwrap();

    let status = std::process::Command::new(env!("CARGO_BIN_EXE_spm-export"))
        .args(["check", manifest_path.to_str().unwrap()])
        .status()
        .expect("Failed to run spm-export");
    assert!(status.success(), "spm-export check command failed");

    let status = std::process::Command::new(env!("CARGO_BIN_EXE_spm-export"))
        .args(["build", manifest_path.to_str().unwrap()])
        .status()
        .expect("Failed to run spm-export");
    assert!(status.success(), "spm-export build command failed");

    let kart = std::fs::read(out_dir.join("kart.spm")).expect("kart.spm missing");
    assert_eq!(verify_spm_header(&kart).kind(), Some(SpmKind::Plain));
    let strip = std::fs::read(out_dir.join("strip.spm")).expect("strip.spm missing");
    assert_eq!(verify_spm_header(&strip).kind(), Some(SpmKind::Skinned));
}

// Helper to run spm-export mesh command
fn spm_export_mesh(input: &Path, output: &Path, extra: &[&str]) {
    let status = std::process::Command::new(env!("CARGO_BIN_EXE_spm-export"))
        .args([
            "mesh",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .args(extra)
        .status()
        .expect("Failed to run spm-export");
    assert!(status.success(), "spm-export mesh command failed");
}

// Verify SPM header structure
fn verify_spm_header(data: &[u8]) -> SpmHeader {
    assert!(data.len() >= SpmHeader::SIZE, "SPM data too small for header");
    let header = SpmHeader::from_bytes(data).expect("Failed to parse SPM header");
    assert_eq!(header.magic, SPM_MAGIC);
    assert_eq!(header.version, 1);
    // Material count follows the header
    let materials = u16::from_le_bytes([data[28], data[29]]);
    assert!(materials > 0, "Should have materials");
    header
}
