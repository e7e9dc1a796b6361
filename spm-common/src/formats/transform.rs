//! Bone transform encoding (10 × f32, 40 bytes)
//!
//! Every transform in an armature block (inverse bind poses and per-frame
//! local poses) is stored as translation, rotation and scale converted to the
//! engine's axis convention (Y and Z swapped):
//!
//! ```text
//! [t.x, t.z, t.y, -q.x, -q.z, -q.y, q.w, s.x, s.z, s.y]
//! ```

use glam::{Mat4, Quat, Vec3};

/// Size of one encoded bone transform in bytes (10 floats × 4 bytes)
pub const BONE_TRANSFORM_SIZE: usize = 40;

/// Decomposed bone transform in editor axes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BoneTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Decompose an affine matrix; the rotation is normalized
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation: rotation.normalize(),
            scale,
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Write transform to bytes
    pub fn to_bytes(&self) -> [u8; BONE_TRANSFORM_SIZE] {
        let mut bytes = [0u8; BONE_TRANSFORM_SIZE];
        for (i, f) in encode_bone_transform(self).iter().enumerate() {
            bytes[i * 4..i * 4 + 4].copy_from_slice(&f.to_le_bytes());
        }
        bytes
    }

    /// Read transform from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < BONE_TRANSFORM_SIZE {
            return None;
        }
        let mut floats = [0.0f32; 10];
        for (i, f) in floats.iter_mut().enumerate() {
            let at = i * 4;
            *f = f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        }
        Some(decode_bone_transform(floats))
    }
}

/// Convert a transform to the 10-float wire layout
pub fn encode_bone_transform(t: &BoneTransform) -> [f32; 10] {
    let BoneTransform {
        translation: loc,
        rotation: rot,
        scale,
    } = *t;
    [
        loc.x, loc.z, loc.y, -rot.x, -rot.z, -rot.y, rot.w, scale.x, scale.z, scale.y,
    ]
}

/// Convert the 10-float wire layout back to editor axes
pub fn decode_bone_transform(v: [f32; 10]) -> BoneTransform {
    BoneTransform {
        translation: Vec3::new(v[0], v[2], v[1]),
        rotation: Quat::from_xyzw(-v[3], -v[5], -v[4], v[6]),
        scale: Vec3::new(v[7], v[9], v[8]),
    }
}
