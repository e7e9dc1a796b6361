//! Per-armature export state machine
//!
//! `Idle -> IndexBuilt -> LocalIdAssigned -> Serialized`, enforced by the
//! type parameter of [`ArmatureExport`]:
//!
//! 1. [`ArmatureExport::build_index`] assigns global bone ids to the bones
//!    referenced by triangle weights and fills the vertex joint slots.
//! 2. [`ArmatureExport::assign_local_ids`] numbers the bones, in-use bones
//!    first, parents before children.
//! 3. [`ArmatureExport::remap_joints`] rewrites vertex joints to
//!    `offset + local id`, then [`ArmatureExport::write`] emits the bone
//!    table, inverse binds, parents and keyframes.

use glam::Mat4;
use hashbrown::HashMap;
use spm_common::{BoneTransform, write_len_string};
use std::io::Write;
use std::sync::Arc;

use super::allocator::BoneIdAllocator;
use super::pose::{safe_inverse, sample_pose};
use crate::error::CodecError;
use crate::mesh::{NO_JOINT, Triangle};
use crate::scene::Armature;

/// Joint slots per vertex
pub const MAX_JOINTS: usize = 4;

pub struct Idle;
pub struct IndexBuilt;

pub struct LocalIdAssigned {
    /// Bone indices in local-id order
    order: Vec<usize>,
    /// Local id of every bone, indexed like `Armature::bones`
    local_ids: Vec<u16>,
    in_use: u16,
}

pub struct Serialized {
    pub bone_count: usize,
    pub keyframe_count: usize,
}

pub struct ArmatureExport<S> {
    armature: Arc<Armature>,
    frames: Vec<i32>,
    /// Global id of every bone referenced by a weight
    global_ids: Vec<Option<u32>>,
    state: S,
}

impl<S> ArmatureExport<S> {
    pub fn name(&self) -> &str {
        &self.armature.name
    }

    pub fn armature(&self) -> &Armature {
        &self.armature
    }

    /// Whether any weight references a bone of this armature
    pub fn is_weighted(&self) -> bool {
        self.global_ids.iter().any(Option::is_some)
    }

    fn owns(&self, triangle: &Triangle) -> bool {
        triangle.armature.as_deref() == Some(self.armature.name.as_str())
    }

    /// Parent index, ignoring out-of-range and self references
    fn parent_of(&self, bone: usize) -> Option<usize> {
        self.armature.bones[bone]
            .parent
            .filter(|&p| p < self.armature.bones.len() && p != bone)
    }

    fn depth_of(&self, bone: usize) -> usize {
        let mut depth = 0;
        let mut current = bone;
        while let Some(parent) = self.parent_of(current) {
            depth += 1;
            current = parent;
            if depth > self.armature.bones.len() {
                break;
            }
        }
        depth
    }
}

impl ArmatureExport<Idle> {
    /// Start exporting an armature with its discovered keyframes
    pub fn new(armature: Arc<Armature>, frames: Vec<i32>) -> Self {
        let bone_count = armature.bones.len();
        Self {
            armature,
            frames,
            global_ids: vec![None; bone_count],
            state: Idle,
        }
    }

    /// Fill joint slots of every triangle deformed by this armature.
    ///
    /// Influences are taken heaviest first; non-positive weights and names
    /// that are not bones of this armature are skipped. Slots hold global ids
    /// until [`ArmatureExport::remap_joints`].
    pub fn build_index(
        mut self,
        triangles: &mut [Triangle],
        allocator: &mut BoneIdAllocator,
    ) -> Result<ArmatureExport<IndexBuilt>, CodecError> {
        let lookup: HashMap<&str, usize> = self
            .armature
            .bones
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.as_str(), i))
            .collect();
        let name = self.armature.name.as_str();

        for triangle in triangles
            .iter_mut()
            .filter(|t| t.armature.as_deref() == Some(name))
        {
            for (vertex, influences) in triangle.vertices.iter_mut().zip(&triangle.influences) {
                let mut slot = 0;
                let mut seen = [usize::MAX; MAX_JOINTS];
                for influence in influences.iter().filter(|i| i.weight > 0.0) {
                    if slot == MAX_JOINTS {
                        break;
                    }
                    let Some(&bone) = lookup.get(influence.bone.as_str()) else {
                        continue;
                    };
                    if seen.contains(&bone) {
                        continue;
                    }
                    let id = *self.global_ids[bone].get_or_insert_with(|| allocator.allocate());
                    vertex.joints[slot] = i16::try_from(id).map_err(|_| CodecError::TooManyBones {
                        count: id as usize + 1,
                    })?;
                    vertex.weights[slot] = influence.weight;
                    seen[slot] = bone;
                    slot += 1;
                }
            }
        }
        drop(lookup);

        tracing::debug!(
            "Armature {}: {} of {} bones weighted",
            name,
            self.global_ids.iter().flatten().count(),
            self.global_ids.len()
        );
        Ok(ArmatureExport {
            armature: self.armature,
            frames: self.frames,
            global_ids: self.global_ids,
            state: IndexBuilt,
        })
    }
}

impl ArmatureExport<IndexBuilt> {
    /// Number the bones: in-use bones (weighted bones and their ancestors)
    /// first, then the rest, each group parents before children.
    pub fn assign_local_ids(self) -> ArmatureExport<LocalIdAssigned> {
        let bone_count = self.armature.bones.len();
        let mut in_use = vec![false; bone_count];
        for bone in (0..bone_count).filter(|&b| self.global_ids[b].is_some()) {
            let mut current = Some(bone);
            let mut steps = 0;
            while let Some(b) = current {
                if in_use[b] || steps > bone_count {
                    break;
                }
                in_use[b] = true;
                current = self.parent_of(b);
                steps += 1;
            }
        }

        let mut order: Vec<usize> = (0..bone_count).collect();
        order.sort_by_key(|&b| (!in_use[b], self.depth_of(b), b));

        let mut local_ids = vec![0u16; bone_count];
        for (local, &bone) in order.iter().enumerate() {
            local_ids[bone] = local as u16;
        }
        let in_use = in_use.iter().filter(|&&u| u).count() as u16;

        ArmatureExport {
            armature: self.armature,
            frames: self.frames,
            global_ids: self.global_ids,
            state: LocalIdAssigned {
                order,
                local_ids,
                in_use,
            },
        }
    }
}

impl ArmatureExport<LocalIdAssigned> {
    pub fn bones_in_use(&self) -> u16 {
        self.state.in_use
    }

    /// Bone names in local-id order
    pub fn bone_names(&self) -> impl Iterator<Item = &str> {
        self.state
            .order
            .iter()
            .map(|&b| self.armature.bones[b].name.as_str())
    }

    /// Local id of a bone's parent, `-1` for roots
    pub fn parent_local_id(&self, bone: usize) -> i16 {
        match self.parent_of(bone) {
            // A parent numbered after its child would break the ordering; treat as root
            Some(p) if self.state.local_ids[p] < self.state.local_ids[bone] => {
                self.state.local_ids[p] as i16
            }
            _ => -1,
        }
    }

    /// Rewrite joint slots from global ids to `offset + local id`
    pub fn remap_joints(&self, triangles: &mut [Triangle], offset: u16) {
        let global_to_local: HashMap<i16, i16> = self
            .global_ids
            .iter()
            .enumerate()
            .filter_map(|(bone, id)| id.map(|id| (bone, id)))
            .map(|(bone, id)| {
                (
                    id as i16,
                    (offset as i32 + self.state.local_ids[bone] as i32) as i16,
                )
            })
            .collect();

        for triangle in triangles.iter_mut().filter(|t| self.owns(t)) {
            for vertex in &mut triangle.vertices {
                for joint in vertex.joints.iter_mut().filter(|j| **j != NO_JOINT) {
                    if let Some(&local) = global_to_local.get(&*joint) {
                        *joint = local;
                    }
                }
            }
        }
    }

    /// Transform of a bone relative to its parent's pose, or to the
    /// armature's world transform for roots
    fn keyframe_matrix(&self, pose: &[Mat4], bone: usize, local_space: bool) -> Mat4 {
        match self.parent_of(bone) {
            Some(parent) => safe_inverse(pose[parent]) * pose[bone],
            None if local_space => pose[bone],
            None => self.armature.world_matrix * pose[bone],
        }
    }

    /// Write the armature block: counts, names, inverse binds, parents, keyframes
    pub fn write<W: Write>(
        self,
        w: &mut W,
        local_space: bool,
    ) -> Result<ArmatureExport<Serialized>, CodecError> {
        let bones = &self.armature.bones;
        let order = &self.state.order;

        w.write_all(&self.state.in_use.to_le_bytes())?;
        w.write_all(&(bones.len() as u16).to_le_bytes())?;
        for name in self.bone_names() {
            write_len_string(w, name)?;
        }
        for &b in order {
            let inverse_bind = BoneTransform::from_matrix(safe_inverse(bones[b].rest_matrix));
            w.write_all(&inverse_bind.to_bytes())?;
        }
        for &b in order {
            w.write_all(&self.parent_local_id(b).to_le_bytes())?;
        }

        let frames = &self.frames[..self.frames.len().min(u16::MAX as usize)];
        w.write_all(&(frames.len() as u16).to_le_bytes())?;
        for &frame in frames {
            let stored = u16::try_from(frame - 1).unwrap_or(u16::MAX);
            w.write_all(&stored.to_le_bytes())?;
            let pose = sample_pose(&self.armature.pose, bones, frame as f32);
            for &b in order {
                let transform = BoneTransform::from_matrix(self.keyframe_matrix(&pose, b, local_space));
                w.write_all(&transform.to_bytes())?;
            }
        }

        tracing::info!(
            "Armature {}: {} bones ({} in use), {} keyframes",
            self.armature.name,
            bones.len(),
            self.state.in_use,
            frames.len()
        );
        let serialized = Serialized {
            bone_count: bones.len(),
            keyframe_count: frames.len(),
        };
        Ok(ArmatureExport {
            armature: self.armature,
            frames: self.frames,
            global_ids: self.global_ids,
            state: serialized,
        })
    }
}

impl ArmatureExport<Serialized> {
    pub fn summary(&self) -> &Serialized {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Influence, TextureKey, Vertex};
    use crate::scene::Bone;
    use glam::Vec3;

    fn bone(name: &str, parent: Option<usize>) -> Bone {
        Bone {
            name: name.into(),
            parent,
            rest_matrix: Mat4::from_translation(Vec3::new(0.0, 0.0, 1.0)),
            constraints: Vec::new(),
        }
    }

    /// Child listed before its parent, plus an unused leaf
    fn rig() -> Arc<Armature> {
        Arc::new(Armature {
            name: "Rig".into(),
            world_matrix: Mat4::IDENTITY,
            bones: vec![
                bone("Hand", Some(2)),
                bone("Spare", None),
                bone("Arm", Some(3)),
                bone("Root", None),
            ],
            ..Default::default()
        })
    }

    fn weighted_triangle(influences: Vec<Influence>) -> Triangle {
        let mut tri = Triangle::new([Vertex::default(); 3], TextureKey::default());
        tri.armature = Some("Rig".into());
        tri.influences = [influences.clone(), influences.clone(), influences];
        tri
    }

    fn influence(bone: &str, weight: f32) -> Influence {
        Influence {
            bone: bone.into(),
            weight,
        }
    }

    #[test]
    fn test_slots_skip_unknown_and_zero_weights() {
        let mut tris = vec![weighted_triangle(vec![
            influence("Hand", 0.6),
            influence("NotABone", 0.3),
            influence("Arm", 0.0),
            influence("Root", 0.1),
        ])];
        let mut alloc = BoneIdAllocator::new();
        let export = ArmatureExport::new(rig(), vec![1])
            .build_index(&mut tris, &mut alloc)
            .unwrap();

        let v = tris[0].vertices[0];
        assert_eq!(v.joints, [0, 1, -1, -1]);
        assert_eq!(v.weights, [0.6, 0.1, 0.0, 0.0]);
        assert_eq!(alloc.allocated(), 2);
        assert!(export.is_weighted());
    }

    #[test]
    fn test_truncated_to_four_slots() {
        let mut tris = vec![weighted_triangle(vec![
            influence("Hand", 0.4),
            influence("Arm", 0.3),
            influence("Root", 0.2),
            influence("Spare", 0.05),
            influence("Hand", 0.05),
        ])];
        let mut alloc = BoneIdAllocator::new();
        ArmatureExport::new(rig(), vec![1])
            .build_index(&mut tris, &mut alloc)
            .unwrap();
        assert_eq!(tris[0].vertices[0].joints, [0, 1, 2, 3]);
    }

    #[test]
    fn test_other_armature_triangles_untouched() {
        let mut tri = weighted_triangle(vec![influence("Hand", 1.0)]);
        tri.armature = Some("Other".into());
        let mut tris = vec![tri];
        let mut alloc = BoneIdAllocator::new();
        let export = ArmatureExport::new(rig(), vec![1])
            .build_index(&mut tris, &mut alloc)
            .unwrap();
        assert_eq!(tris[0].vertices[0].joints, [NO_JOINT; 4]);
        assert!(!export.is_weighted());
    }

    #[test]
    fn test_local_ids_in_use_first_parents_first() {
        let mut tris = vec![weighted_triangle(vec![influence("Hand", 1.0)])];
        let mut alloc = BoneIdAllocator::new();
        let export = ArmatureExport::new(rig(), vec![1])
            .build_index(&mut tris, &mut alloc)
            .unwrap()
            .assign_local_ids();

        // Hand is weighted; Arm and Root are promoted as its ancestors
        assert_eq!(export.bones_in_use(), 3);
        let names: Vec<&str> = export.bone_names().collect();
        assert_eq!(names, vec!["Root", "Arm", "Hand", "Spare"]);
        assert_eq!(export.parent_local_id(3), -1);
        assert_eq!(export.parent_local_id(2), 0);
        assert_eq!(export.parent_local_id(0), 1);
        assert_eq!(export.parent_local_id(1), -1);
    }

    #[test]
    fn test_remap_joints_with_offset() {
        let mut tris = vec![weighted_triangle(vec![influence("Hand", 0.5), influence("Root", 0.5)])];
        let mut alloc = BoneIdAllocator::new();
        let export = ArmatureExport::new(rig(), vec![1])
            .build_index(&mut tris, &mut alloc)
            .unwrap()
            .assign_local_ids();
        export.remap_joints(&mut tris, 10);
        // Local ids: Root 0, Arm 1, Hand 2
        assert_eq!(tris[0].vertices[0].joints, [12, 10, -1, -1]);
    }

    #[test]
    fn test_write_layout() {
        let mut tris = vec![weighted_triangle(vec![influence("Root", 1.0)])];
        let mut alloc = BoneIdAllocator::new();
        let export = ArmatureExport::new(rig(), vec![1, 5])
            .build_index(&mut tris, &mut alloc)
            .unwrap()
            .assign_local_ids();

        let mut out = Vec::new();
        let done = export.write(&mut out, false).unwrap();
        assert_eq!(done.summary().keyframe_count, 2);
        assert_eq!(done.summary().bone_count, 4);

        assert_eq!(u16::from_le_bytes([out[0], out[1]]), 1);
        assert_eq!(u16::from_le_bytes([out[2], out[3]]), 4);
        // Names: Root, Spare, Arm, Hand
        let names_len = (1 + 4) + (1 + 5) + (1 + 3) + (1 + 4);
        let binds = 4 * 40;
        let parents = 4 * 2;
        let at = 4 + names_len + binds;
        let parent_ids: Vec<i16> = out[at..at + parents]
            .chunks(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(parent_ids, vec![-1, -1, 0, 2]);

        let at = at + parents;
        assert_eq!(u16::from_le_bytes([out[at], out[at + 1]]), 2);
        assert_eq!(u16::from_le_bytes([out[at + 2], out[at + 3]]), 0);
        let second = at + 2 + 2 + 4 * 40;
        assert_eq!(u16::from_le_bytes([out[second], out[second + 1]]), 4);
        assert_eq!(out.len(), second + 2 + 4 * 40);
    }
}
