//! Input scene model handed to the encoder
//!
//! The editor-side glue (or one of the file adapters in [`crate::convert`])
//! flattens its objects into these plain values. Geometry is in editor axes
//! (Z up); the encoder applies the axis conversion itself.

use glam::{Mat4, Vec2, Vec3};
use std::sync::Arc;

/// Pre-resolved textures of one material slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialDescriptor {
    pub primary_texture: Option<String>,
    /// Decal texture blended over the primary, sampled with the second UV map
    pub secondary_texture: Option<String>,
}

impl MaterialDescriptor {
    pub fn textured(primary: impl Into<String>) -> Self {
        Self {
            primary_texture: Some(primary.into()),
            secondary_texture: None,
        }
    }
}

/// One polygon: a run of `loop_count` corners starting at `loop_start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    pub loop_start: usize,
    pub loop_count: usize,
    /// Material slot; out-of-range indices fall back to the last slot
    pub material_index: usize,
}

/// A polygon mesh object with per-corner ("loop") attributes
#[derive(Debug, Clone)]
pub struct MeshObject {
    pub name: String,
    pub positions: Vec<Vec3>,
    /// Per-vertex normals; computed from faces when absent
    pub normals: Option<Vec<Vec3>>,
    /// Vertex index of every loop
    pub loop_vertices: Vec<u32>,
    pub faces: Vec<Face>,
    /// UV layers, each with one entry per loop
    pub uv_layers: Vec<Vec<Vec2>>,
    /// Linear RGB color layers, each with one entry per loop
    pub color_layers: Vec<Vec<[f32; 3]>>,
    /// Vertex group names; weights refer to them by index
    pub vertex_groups: Vec<String>,
    /// Per-vertex `(group index, weight)` pairs
    pub weights: Vec<Vec<(usize, f32)>>,
    pub world_matrix: Mat4,
    pub materials: Vec<MaterialDescriptor>,
    pub armature: Option<Arc<Armature>>,
}

impl MeshObject {
    pub fn new(name: impl Into<String>, positions: Vec<Vec3>) -> Self {
        Self {
            name: name.into(),
            positions,
            normals: None,
            loop_vertices: Vec::new(),
            faces: Vec::new(),
            uv_layers: Vec::new(),
            color_layers: Vec::new(),
            vertex_groups: Vec::new(),
            weights: Vec::new(),
            world_matrix: Mat4::IDENTITY,
            materials: Vec::new(),
            armature: None,
        }
    }

    /// Append a polygon and return the index of its first loop.
    ///
    /// Per-loop layers must be extended by the caller for the new loops.
    pub fn add_face(&mut self, vertices: &[u32], material_index: usize) -> usize {
        let loop_start = self.loop_vertices.len();
        self.loop_vertices.extend_from_slice(vertices);
        self.faces.push(Face {
            loop_start,
            loop_count: vertices.len(),
            material_index,
        });
        loop_start
    }

    pub fn loop_count(&self) -> usize {
        self.loop_vertices.len()
    }

    /// Material slot used by a face, following the last-slot fallback
    pub fn material_for(&self, face: &Face) -> Option<&MaterialDescriptor> {
        self.materials
            .get(face.material_index)
            .or_else(|| self.materials.last())
    }
}

// ============================================================================
// Armatures
// ============================================================================

#[derive(Debug, Clone)]
pub struct Bone {
    pub name: String,
    /// Index of the parent in [`Armature::bones`]
    pub parent: Option<usize>,
    /// Rest transform in armature space
    pub rest_matrix: Mat4,
    pub constraints: Vec<BoneConstraint>,
}

/// A bone constraint whose target may carry its own animation
#[derive(Debug, Clone, Default)]
pub struct BoneConstraint {
    pub name: String,
    pub target_action: Option<Action>,
}

#[derive(Debug, Clone, Default)]
pub struct Armature {
    pub name: String,
    pub world_matrix: Mat4,
    pub bones: Vec<Bone>,
    pub animation: AnimationData,
    /// Sampled armature-space pose of every bone
    pub pose: PoseTrack,
}

impl Armature {
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }
}

// ============================================================================
// Animation data
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct AnimationData {
    pub action: Option<Action>,
    pub nla_tracks: Vec<NlaTrack>,
}

#[derive(Debug, Clone, Default)]
pub struct Action {
    pub name: String,
    pub curves: Vec<FCurve>,
}

/// One animated channel: key times (in frames) plus time-remapping modifiers
#[derive(Debug, Clone, Default)]
pub struct FCurve {
    /// Property path, e.g. `pose.bones["Wheel"].rotation_quaternion`
    pub data_path: String,
    pub keyframes: Vec<f32>,
    pub modifiers: Vec<CurveModifier>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CurveModifier {
    pub frame_start: f32,
    pub frame_end: f32,
}

#[derive(Debug, Clone, Default)]
pub struct NlaTrack {
    pub strips: Vec<NlaStrip>,
}

#[derive(Debug, Clone, Default)]
pub struct NlaStrip {
    pub frame_start: f32,
    pub frame_end: f32,
    pub action: Option<Action>,
}

/// Armature-space bone matrices at one frame, indexed like [`Armature::bones`]
#[derive(Debug, Clone)]
pub struct PoseSample {
    pub frame: f32,
    pub matrices: Vec<Mat4>,
}

/// Pose samples sorted by frame
#[derive(Debug, Clone, Default)]
pub struct PoseTrack {
    pub samples: Vec<PoseSample>,
}
