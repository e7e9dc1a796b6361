//! SPM binary format definitions
//!
//! Little-endian throughout. A file is laid out as:
//!
//! ```text
//! SpmHeader (28 bytes)
//! u16 material count, then per material two length-prefixed texture names
//! u16 sector count (always 1)
//! per sector: u16 mesh buffer count, then per buffer:
//!     MeshBufferHeader (10 bytes), vertex stream, index stream
//! skinned files only: armature block
//! ```
//!
//! All fixed-size headers implement the [`BinarySerializable`] trait for
//! consistent serialization/deserialization.

pub mod buffer;
pub mod header;
mod serialization;
pub mod strings;
pub mod transform;

pub use buffer::*;
pub use header::*;
pub use serialization::BinarySerializable;
pub use strings::*;
pub use transform::*;

/// File extension of SPM meshes
pub const SPM_EXT: &str = "spm";
