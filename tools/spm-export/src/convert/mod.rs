//! File adapters: OBJ and glTF/GLB into the encoder's scene model
//!
//! Both formats are Y-up; imported objects carry a world matrix that rotates
//! them into the editor's Z-up axes, the same way an editor import would.

mod gltf;
mod obj;

pub use gltf::load_gltf;
pub use obj::load_obj;

use anyhow::{Context, Result, bail};
use glam::{Mat4, Vec4};
use std::path::Path;

use crate::encoder::{EncodeOutput, encode_to_file};
use crate::params::ExportParams;
use crate::scene::MeshObject;

/// Y-up (x, y, z) to Z-up (x, -z, y)
pub const Y_UP_TO_Z_UP: Mat4 = Mat4::from_cols(Vec4::X, Vec4::Z, Vec4::NEG_Y, Vec4::W);

/// Load every mesh object from an OBJ or glTF/GLB file
pub fn load_objects(input: &Path) -> Result<Vec<MeshObject>> {
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "obj" => load_obj(input),
        "gltf" | "glb" => load_gltf(input),
        _ => bail!("Unsupported mesh format: {:?}", input),
    }
}

/// Convert a mesh file to SPM
pub fn convert_file(input: &Path, output: &Path, params: &ExportParams) -> Result<EncodeOutput> {
    let objects = load_objects(input)?;
    let result = encode_to_file(&objects, params, output)
        .with_context(|| format!("Failed to encode {:?}", input))?;

    tracing::info!(
        "Converted {:?} -> {:?}: {:?}, {} buffers, {} vertices, {} warnings",
        input,
        output,
        result.kind,
        result.buffer_count,
        result.vertex_count,
        result.warnings.len()
    );
    Ok(result)
}
