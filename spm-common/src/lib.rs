//! Shared types and utilities for the SPM mesh format
//!
//! This crate provides the wire-level pieces shared between:
//! - the SPM encoder (export direction)
//! - the SPM decoder (import direction)
//!
//! # Modules
//!
//! - [`packing`] - Vertex attribute packing (f32 → f16, 10-10-10-2 vectors, colors)
//! - [`formats`] - SPM header, mesh buffer header, strings and bone transforms

pub mod formats;
pub mod packing;

// Re-export commonly used packing items
pub use packing::{
    COLOR_RGB_MARKER, COLOR_WHITE_MARKER, color_to_bytes, f16_to_f32, f32_to_f16,
    pack_2101010_rev, unpack_2101010_rev,
};

// Re-export commonly used format items
pub use formats::{
    BONE_TRANSFORM_SIZE,
    BinarySerializable,
    BoneTransform,
    FLAG_NORMAL,
    FLAG_TANGENT,
    FLAG_VERTEX_COLOR,
    IndexWidth,
    MAX_STRING_LEN,
    MeshBufferHeader,
    // Constants
    SPM_EXT,
    SPM_MAGIC,
    SPM_VERSION,
    SpmHeader,
    SpmKind,
    decode_bone_transform,
    encode_bone_transform,
    read_len_string,
    write_len_string,
};
