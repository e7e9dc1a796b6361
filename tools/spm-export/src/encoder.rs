//! SPM encoder
//!
//! Runs extraction, armature indexing, buffer building and serialization
//! to completion in memory; nothing is written to disk until the whole file
//! has been produced.

use glam::Vec3;
use spm_common::{
    FLAG_NORMAL, FLAG_TANGENT, FLAG_VERTEX_COLOR, IndexWidth, MeshBufferHeader, SpmHeader,
    SpmKind, write_len_string,
};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::armature::{ArmatureExport, BoneIdAllocator, Idle, LocalIdAssigned, unique_frames};
use crate::error::{CodecError, Warning, push_warning};
use crate::mesh::{
    ExtractOptions, MeshBuffer, TextureKey, Triangle, VertexLayout, build_buffers,
    extract_triangles,
};
use crate::params::ExportParams;
use crate::scene::{Armature, MeshObject};

/// Result of a successful encode
#[derive(Debug)]
pub struct EncodeOutput {
    pub bytes: Vec<u8>,
    pub warnings: Vec<Warning>,
    pub kind: SpmKind,
    pub buffer_count: usize,
    pub vertex_count: usize,
}

/// Encode mesh objects into an SPM byte stream
pub fn encode(objects: &[MeshObject], params: &ExportParams) -> Result<EncodeOutput, CodecError> {
    let mut warnings = Vec::new();
    tracing::debug!(
        "Encoding {} objects (scope {:?}, apply_modifiers {})",
        objects.len(),
        params.selection_scope,
        params.apply_modifiers
    );
    let static_frame = params.resolve_static_frame(&mut warnings);

    let pending = collect_armatures(objects, params, &mut warnings);
    let active: Vec<String> = pending.iter().map(|a| a.name().to_string()).collect();

    let options = ExtractOptions {
        local_space: params.local_space,
        export_tangent: params.export_tangent,
        armatures: &active,
    };
    let mut triangles: Vec<Triangle> = Vec::new();
    let mut has_vertex_color = false;
    let mut has_uv0 = false;
    for obj in objects {
        let extraction = extract_triangles(obj, &options, &mut warnings);
        if extraction.triangles.is_empty() {
            continue;
        }
        has_vertex_color |= extraction.has_vertex_color;
        has_uv0 |= extraction.has_uv0;
        triangles.extend(extraction.triangles);
    }
    if triangles.is_empty() {
        return Err(CodecError::EmptyGeometry);
    }

    let export_tangent = params.export_tangent && has_uv0;
    if params.export_tangent && !has_uv0 {
        push_warning(&mut warnings, Warning::TangentsDisabled);
    }

    let armatures = index_armatures(pending, &mut triangles)?;
    let mut weighted = false;
    for triangle in &mut triangles {
        weighted |= triangle.normalize_weights();
    }
    for arm in armatures.iter().filter(|a| !a.is_weighted()) {
        push_warning(
            &mut warnings,
            Warning::ArmatureUnweighted {
                armature: arm.name().to_string(),
            },
        );
    }
    let skinned = weighted && !armatures.is_empty();
    if skinned {
        let mut offset = 0u16;
        for arm in &armatures {
            arm.remap_joints(&mut triangles, offset);
            offset += arm.bones_in_use();
        }
    }

    let bounding_box = bounding_box(&triangles);
    let set = build_buffers(triangles, export_tangent)?;

    let mut flags = 0u8;
    if params.export_normal {
        flags |= FLAG_NORMAL;
    }
    if params.export_vertex_color && has_vertex_color {
        flags |= FLAG_VERTEX_COLOR;
    }
    if export_tangent {
        flags |= FLAG_TANGENT;
    }
    let kind = if skinned {
        SpmKind::Skinned
    } else {
        SpmKind::Plain
    };

    let mut out = Vec::new();
    out.write_all(&SpmHeader::new(kind, flags, bounding_box).to_bytes())?;
    out.write_all(&(set.materials.len() as u16).to_le_bytes())?;
    for key in &set.materials {
        write_len_string(&mut out, &key.primary)?;
        write_len_string(&mut out, &key.secondary)?;
    }
    // One sector, always
    out.write_all(&1u16.to_le_bytes())?;
    out.write_all(&(set.buffers.len() as u16).to_le_bytes())?;
    for buffer in &set.buffers {
        let key = &set.materials[buffer.material_id as usize];
        write_buffer(&mut out, buffer, key, flags, skinned)?;
    }

    if skinned {
        out.write_all(&[armatures.len() as u8])?;
        let stored_frame = u16::try_from(static_frame - 1).unwrap_or(u16::MAX);
        out.write_all(&stored_frame.to_le_bytes())?;
        for arm in armatures {
            arm.write(&mut out, params.local_space)?;
        }
    }

    let vertex_count = set.buffers.iter().map(|b| b.vertices.len()).sum();
    tracing::info!(
        "Encoded SPM: {:?}, {} materials, {} buffers, {} vertices, {} bytes",
        kind,
        set.materials.len(),
        set.buffers.len(),
        vertex_count,
        out.len()
    );
    Ok(EncodeOutput {
        bytes: out,
        warnings,
        kind,
        buffer_count: set.buffers.len(),
        vertex_count,
    })
}

/// Encode and write the file only once encoding fully succeeded
pub fn encode_to_file(
    objects: &[MeshObject],
    params: &ExportParams,
    path: &Path,
) -> Result<EncodeOutput, CodecError> {
    let output = encode(objects, params)?;
    std::fs::write(path, &output.bytes)?;
    Ok(output)
}

/// Unique armatures sorted by name; those without keyframes are dropped
fn collect_armatures(
    objects: &[MeshObject],
    params: &ExportParams,
    warnings: &mut Vec<Warning>,
) -> Vec<ArmatureExport<Idle>> {
    let mut by_name: BTreeMap<&str, &Arc<Armature>> = BTreeMap::new();
    for arm in objects.iter().filter_map(|o| o.armature.as_ref()) {
        by_name.entry(arm.name.as_str()).or_insert(arm);
    }

    let mut pending = Vec::new();
    for (name, arm) in by_name {
        let frames = unique_frames(arm, params.keyframes_only, params.frame_start);
        if frames.is_empty() {
            push_warning(
                warnings,
                Warning::ArmatureSkipped {
                    armature: name.to_string(),
                },
            );
            continue;
        }
        pending.push(ArmatureExport::new(Arc::clone(arm), frames));
    }
    pending
}

/// Run the index and local-id passes of every armature with one allocator
fn index_armatures(
    pending: Vec<ArmatureExport<Idle>>,
    triangles: &mut [Triangle],
) -> Result<Vec<ArmatureExport<LocalIdAssigned>>, CodecError> {
    if pending.len() > u8::MAX as usize {
        return Err(CodecError::TooManyArmatures {
            count: pending.len(),
        });
    }
    let total_bones: usize = pending.iter().map(|a| a.armature().bones.len()).sum();
    if total_bones > i16::MAX as usize {
        return Err(CodecError::TooManyBones { count: total_bones });
    }

    let mut allocator = BoneIdAllocator::new();
    let mut indexed = Vec::with_capacity(pending.len());
    for arm in pending {
        indexed.push(arm.build_index(triangles, &mut allocator)?.assign_local_ids());
    }
    Ok(indexed)
}

/// Min/max corner of all stored positions
fn bounding_box(triangles: &[Triangle]) -> [f32; 6] {
    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    for v in triangles.iter().flat_map(|t| &t.vertices) {
        min = min.min(v.position);
        max = max.max(v.position);
    }
    [min.x, min.y, min.z, max.x, max.y, max.z]
}

/// Write one mesh buffer: header, vertex stream, index stream
fn write_buffer<W: Write>(
    w: &mut W,
    buffer: &MeshBuffer,
    key: &TextureKey,
    flags: u8,
    skinned: bool,
) -> Result<(), CodecError> {
    let header = MeshBufferHeader::new(
        buffer.vertices.len() as u32,
        buffer.indices.len() as u32,
        buffer.material_id,
    );
    w.write_all(&header.to_bytes())?;

    let layout = VertexLayout::new(flags, key.has_primary(), key.has_secondary(), skinned);
    for vertex in &buffer.vertices {
        vertex.write(w, &layout)?;
    }

    let width = IndexWidth::for_vertex_count(buffer.vertices.len());
    for &index in &buffer.indices {
        width.write(w, index)?;
    }
    Ok(())
}
