//! Armature side of the codec: bone ids, keyframes, pose sampling and the
//! armature block writer

mod allocator;
mod export;
mod keyframes;
mod pose;

pub use allocator::BoneIdAllocator;
pub use export::{ArmatureExport, Idle, IndexBuilt, LocalIdAssigned, MAX_JOINTS, Serialized};
pub use keyframes::unique_frames;
pub use pose::{safe_inverse, sample_pose};
