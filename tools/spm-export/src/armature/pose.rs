//! Pose sampling
//!
//! Evaluates an armature's [`PoseTrack`] at an arbitrary frame. Samples are
//! decomposed to translation, rotation and scale, then interpolated
//! component-wise. Frames outside the track clamp to its ends.

use glam::Mat4;
use spm_common::BoneTransform;

use crate::scene::{Bone, PoseTrack};

/// Inverse that falls back to identity for singular matrices
pub fn safe_inverse(m: Mat4) -> Mat4 {
    if m.determinant().abs() > 1e-12 {
        m.inverse()
    } else {
        Mat4::IDENTITY
    }
}

/// Armature-space matrix of every bone at `frame`.
///
/// Bones missing from the track (or an empty track) use their rest matrix.
pub fn sample_pose(track: &PoseTrack, bones: &[Bone], frame: f32) -> Vec<Mat4> {
    let samples = &track.samples;
    if samples.is_empty() {
        return bones.iter().map(|b| b.rest_matrix).collect();
    }

    // Find the bracketing samples
    let mut i = 0;
    while i < samples.len() - 1 && samples[i + 1].frame < frame {
        i += 1;
    }
    let (s0, s1, factor) = if frame <= samples[0].frame || i >= samples.len() - 1 {
        let s = if frame <= samples[0].frame {
            &samples[0]
        } else {
            &samples[samples.len() - 1]
        };
        (s, s, 0.0)
    } else {
        let (a, b) = (&samples[i], &samples[i + 1]);
        let factor = if b.frame > a.frame {
            (frame - a.frame) / (b.frame - a.frame)
        } else {
            0.0
        };
        (a, b, factor.clamp(0.0, 1.0))
    };

    bones
        .iter()
        .enumerate()
        .map(|(b, bone)| {
            let m0 = s0.matrices.get(b).copied().unwrap_or(bone.rest_matrix);
            let m1 = s1.matrices.get(b).copied().unwrap_or(bone.rest_matrix);
            if factor == 0.0 {
                return m0;
            }
            let t0 = BoneTransform::from_matrix(m0);
            let t1 = BoneTransform::from_matrix(m1);
            BoneTransform {
                translation: t0.translation.lerp(t1.translation, factor),
                rotation: t0.rotation.slerp(t1.rotation, factor).normalize(),
                scale: t0.scale.lerp(t1.scale, factor),
            }
            .to_matrix()
        })
        .collect()
}
