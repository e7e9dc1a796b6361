//! spm-export library
//!
//! Encoder and decoder for SPM, the binary mesh format of the kart racing
//! game: static and skinned meshes with per-vertex attributes, material
//! tables and skeletal animation.
//!
//! The encoder takes a flat [`scene`] model (what an editor or one of the
//! [`convert`] adapters produces) and returns the complete file in memory.
//! The decoder turns a file back into a [`decoder::SceneFragment`].

pub mod armature;
pub mod convert;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod manifest;
pub mod mesh;
pub mod params;
pub mod scene;
pub mod texture;

pub use decoder::{SceneFragment, decode, decode_file, decode_with};
pub use encoder::{EncodeOutput, encode, encode_to_file};
pub use error::{CodecError, SkipReason, Warning};
pub use params::{ExportParams, SelectionScope};
pub use scene::{Armature, Bone, MaterialDescriptor, MeshObject};
pub use texture::{TextureResolver, TextureSource};
