//! Binary serialization trait for format headers.
//!
//! All fixed-size SPM headers implement `BinarySerializable` for consistent
//! serialization/deserialization. Each header keeps its type-specific
//! `to_bytes()` returning a fixed-size array.

/// Trait for binary-serializable format headers.
///
/// The trait uses `Vec<u8>` for the return type because associated const
/// generics in return types (`[u8; Self::SIZE]`) are not yet stable in Rust.
///
/// # Example
///
/// ```
/// use spm_common::formats::{BinarySerializable, MeshBufferHeader};
///
/// let header = MeshBufferHeader::new(4, 6, 0);
///
/// // Using the trait (returns Vec<u8>)
/// let bytes = header.serialize();
/// let parsed = MeshBufferHeader::deserialize(&bytes).unwrap();
/// assert_eq!(parsed.index_count, 6);
/// ```
pub trait BinarySerializable: Sized {
    /// Size of the serialized header in bytes.
    const SIZE: usize;

    /// Serialize to bytes.
    fn serialize(&self) -> Vec<u8>;

    /// Deserialize from bytes.
    ///
    /// Returns `None` if the byte slice is too short.
    fn deserialize(bytes: &[u8]) -> Option<Self>;
}

impl BinarySerializable for super::SpmHeader {
    const SIZE: usize = Self::SIZE;

    fn serialize(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        Self::from_bytes(bytes)
    }
}

impl BinarySerializable for super::MeshBufferHeader {
    const SIZE: usize = Self::SIZE;

    fn serialize(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        Self::from_bytes(bytes)
    }
}

impl BinarySerializable for super::BoneTransform {
    const SIZE: usize = super::BONE_TRANSFORM_SIZE;

    fn serialize(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        Self::from_bytes(bytes)
    }
}
