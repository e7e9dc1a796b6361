//! Vertex value type, welding equality and vertex stream encoding

use glam::{Vec3, Vec4};
use spm_common::{
    COLOR_RGB_MARKER, COLOR_WHITE_MARKER, FLAG_NORMAL, FLAG_TANGENT, FLAG_VERTEX_COLOR,
    f32_to_f16, pack_2101010_rev,
};
use std::io::{self, Write};

/// Component tolerance for vertex equality
pub const WELD_EPSILON: f32 = 1e-4;

/// Edge of a weld grid cell. Two coordinates within [`WELD_EPSILON`] of each
/// other always fall in the same or adjacent cells.
const CELL_SIZE: f32 = 2.0 * WELD_EPSILON;

/// Joint slot value meaning "no bone"
pub const NO_JOINT: i16 = -1;

/// One triangle corner in target axes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub color: [u8; 3],
    /// `[u0, v0, u1, v1]`, V already flipped to `1 - v`
    pub uvs: [f32; 4],
    /// Tangent direction plus handedness sign in `w`
    pub tangent: Vec4,
    pub joints: [i16; 4],
    pub weights: [f32; 4],
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            normal: Vec3::ZERO,
            color: [255; 3],
            uvs: [0.0; 4],
            tangent: Vec4::new(0.0, 0.0, 0.0, 1.0),
            joints: [NO_JOINT; 4],
            weights: [0.0; 4],
        }
    }
}

#[inline]
fn near(a: f32, b: f32) -> bool {
    a + WELD_EPSILON >= b && a - WELD_EPSILON <= b
}

#[inline]
fn cell(value: f32) -> i64 {
    (value / CELL_SIZE).floor() as i64
}

/// Hash bucket key of a vertex: its position grid cell plus the fields that
/// must match exactly.
///
/// A welding partner lies in one of the 27 cells returned by
/// [`WeldKey::neighbours`], so lookups scan those buckets before comparing
/// with [`Vertex::welds_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeldKey {
    cell: [i64; 3],
    color: [u8; 3],
    joints: [i16; 4],
    handedness: bool,
}

impl WeldKey {
    /// This key and the keys of the 26 surrounding cells
    pub fn neighbours(self) -> impl Iterator<Item = WeldKey> {
        (-1..=1).flat_map(move |dx| {
            (-1..=1).flat_map(move |dy| {
                (-1..=1).map(move |dz| WeldKey {
                    cell: [self.cell[0] + dx, self.cell[1] + dy, self.cell[2] + dz],
                    ..self
                })
            })
        })
    }
}

impl Vertex {
    pub fn weld_key(&self) -> WeldKey {
        let p = self.position;
        WeldKey {
            cell: [cell(p.x), cell(p.y), cell(p.z)],
            color: self.color,
            joints: self.joints,
            handedness: self.tangent.w < 0.0,
        }
    }

    /// Welding equality: floats within [`WELD_EPSILON`], discrete fields exact.
    ///
    /// Only the tangent handedness takes part; welded tangents are averaged.
    pub fn welds_with(&self, other: &Vertex) -> bool {
        let p = self.position.to_array();
        let q = other.position.to_array();
        let n = self.normal.to_array();
        let m = other.normal.to_array();
        p.iter().zip(q).all(|(a, b)| near(*a, b))
            && n.iter().zip(m).all(|(a, b)| near(*a, b))
            && self.color == other.color
            && self.uvs.iter().zip(other.uvs).all(|(a, b)| near(*a, b))
            && self.joints == other.joints
            && self.weights.iter().zip(other.weights).all(|(a, b)| near(*a, b))
            && self.tangent.w == other.tangent.w
    }

    pub fn is_white(&self) -> bool {
        self.color == [255; 3]
    }

    /// Write this vertex with the given attribute layout
    pub fn write<W: Write>(&self, w: &mut W, layout: &VertexLayout) -> io::Result<()> {
        for f in self.position.to_array() {
            w.write_all(&f.to_le_bytes())?;
        }
        if layout.normal {
            w.write_all(&pack_2101010_rev(self.normal, None).to_le_bytes())?;
        }
        if layout.color {
            if self.is_white() {
                w.write_all(&[COLOR_WHITE_MARKER])?;
            } else {
                w.write_all(&[COLOR_RGB_MARKER])?;
                w.write_all(&self.color)?;
            }
        }
        if layout.uv0 {
            w.write_all(&f32_to_f16(self.uvs[0]).to_le_bytes())?;
            w.write_all(&f32_to_f16(self.uvs[1]).to_le_bytes())?;
            if layout.uv1 {
                w.write_all(&f32_to_f16(self.uvs[2]).to_le_bytes())?;
                w.write_all(&f32_to_f16(self.uvs[3]).to_le_bytes())?;
            }
            if layout.tangent {
                let packed = pack_2101010_rev(self.tangent.truncate(), Some(self.tangent.w));
                w.write_all(&packed.to_le_bytes())?;
            }
        }
        if layout.skinned {
            for joint in self.joints {
                w.write_all(&joint.to_le_bytes())?;
            }
            for weight in self.weights {
                w.write_all(&f32_to_f16(weight).to_le_bytes())?;
            }
        }
        Ok(())
    }
}

/// Attributes present in one mesh buffer's vertex stream.
///
/// UVs (and the tangent nested with them) depend on the buffer's material;
/// the rest comes from the file header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VertexLayout {
    pub normal: bool,
    pub color: bool,
    pub uv0: bool,
    pub uv1: bool,
    pub tangent: bool,
    pub skinned: bool,
}

impl VertexLayout {
    pub fn new(flags: u8, has_primary: bool, has_secondary: bool, skinned: bool) -> Self {
        Self {
            normal: flags & FLAG_NORMAL != 0,
            color: flags & FLAG_VERTEX_COLOR != 0,
            uv0: has_primary,
            uv1: has_primary && has_secondary,
            tangent: has_primary && flags & FLAG_TANGENT != 0,
            skinned,
        }
    }
}
