//! SPM decoder
//!
//! Parses a complete SPM byte stream into a [`SceneFragment`]: materials with
//! resolved textures, one mesh per buffer (faces rebuilt from the index
//! stream, coincident vertices welded back together) and any armatures.
//! Decoding either succeeds as a whole or returns an error.

use glam::{Vec2, Vec3};
use hashbrown::{HashMap, HashSet};
use spm_common::{
    BinarySerializable, BoneTransform, COLOR_WHITE_MARKER, MeshBufferHeader, SPM_MAGIC,
    SPM_VERSION, SpmHeader, SpmKind, f16_to_f32, read_len_string,
};
use std::path::Path;

use crate::error::{CodecError, Warning, push_warning};
use crate::mesh::{VertexLayout, WELD_EPSILON};
use crate::texture::{TextureResolver, TextureSource};

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTexture {
    pub name: String,
    pub source: TextureSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMaterial {
    pub primary: Option<DecodedTexture>,
    /// Decal over the primary texture, mapped with the second UV layer
    pub secondary: Option<DecodedTexture>,
}

impl DecodedMaterial {
    pub fn name(&self) -> &str {
        self.primary.as_ref().map_or("_", |t| t.name.as_str())
    }
}

/// One mesh buffer rebuilt as a triangle mesh in editor axes
#[derive(Debug, Clone, Default)]
pub struct DecodedMesh {
    pub name: String,
    pub material_id: u16,
    pub positions: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
    /// Per-face corner UVs, V back in editor convention
    pub uv0: Option<Vec<[Vec2; 3]>>,
    pub uv1: Option<Vec<[Vec2; 3]>>,
    /// Per-face corner colors
    pub colors: Option<Vec<[[f32; 3]; 3]>>,
    pub joints: Option<Vec<[i16; 4]>>,
    pub weights: Option<Vec<[f32; 4]>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBone {
    pub name: String,
    /// Local id of the parent bone
    pub parent: Option<u16>,
    pub inverse_bind: BoneTransform,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedKeyframe {
    /// 1-based frame number
    pub frame: u32,
    /// One transform per bone, relative to the parent
    pub transforms: Vec<BoneTransform>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedArmature {
    pub bones_in_use: u16,
    pub bones: Vec<DecodedBone>,
    pub keyframes: Vec<DecodedKeyframe>,
}

#[derive(Debug, Clone)]
pub struct SceneFragment {
    pub kind: SpmKind,
    pub flags: u8,
    pub bounding_box: [f32; 6],
    pub materials: Vec<DecodedMaterial>,
    pub meshes: Vec<DecodedMesh>,
    pub armatures: Vec<DecodedArmature>,
    /// 1-based static pose frame of skinned files
    pub static_frame: Option<u32>,
    pub warnings: Vec<Warning>,
}

/// Decode with only the extra texture search path
pub fn decode(bytes: &[u8], extra_texture_path: &Path) -> Result<SceneFragment, CodecError> {
    let resolver = TextureResolver::new().with_search_path(extra_texture_path);
    decode_with(bytes, &resolver)
}

/// Read and decode a file, resolving textures next to it first
pub fn decode_file(
    path: &Path,
    extra_texture_path: Option<&Path>,
) -> Result<SceneFragment, CodecError> {
    let bytes = std::fs::read(path)?;
    let mut resolver = TextureResolver::new();
    if let Some(dir) = path.parent() {
        resolver = resolver.with_working_dir(dir);
    }
    if let Some(extra) = extra_texture_path {
        resolver = resolver.with_search_path(extra);
    }
    decode_with(&bytes, &resolver)
}

/// Decode with a caller-configured texture resolver
pub fn decode_with(bytes: &[u8], resolver: &TextureResolver) -> Result<SceneFragment, CodecError> {
    let mut r = Reader::new(bytes);
    let header: SpmHeader = r.record()?;
    if header.magic != SPM_MAGIC {
        return Err(CodecError::InvalidMagic(header.magic));
    }
    if header.version != SPM_VERSION {
        return Err(CodecError::UnsupportedVersion(header.version));
    }
    let kind = match header.kind() {
        Some(SpmKind::SpacePartitioned) => return Err(CodecError::SpacePartitionedUnsupported),
        Some(kind) => kind,
        None => return Err(CodecError::UnknownKind(header.kind_bits)),
    };
    let skinned = kind == SpmKind::Skinned;

    let mut warnings = Vec::new();
    let mut missing = HashSet::new();
    let material_count = r.u16()? as usize;
    let mut names = Vec::with_capacity(material_count);
    let mut materials = Vec::with_capacity(material_count);
    for _ in 0..material_count {
        let primary = r.string()?;
        let secondary = r.string()?;
        let mut lookup = |name: &str| -> Option<DecodedTexture> {
            if name.is_empty() {
                return None;
            }
            let source = resolver.resolve(name);
            if source == TextureSource::Placeholder && missing.insert(name.to_string()) {
                push_warning(
                    &mut warnings,
                    Warning::TextureNotFound {
                        name: name.to_string(),
                    },
                );
            }
            Some(DecodedTexture {
                name: name.to_string(),
                source,
            })
        };
        materials.push(DecodedMaterial {
            primary: lookup(&primary),
            secondary: lookup(&secondary),
        });
        names.push((primary, secondary));
    }

    let mut meshes = Vec::new();
    let sector_count = r.u16()?;
    for _ in 0..sector_count {
        let buffer_count = r.u16()?;
        for _ in 0..buffer_count {
            let buffer: MeshBufferHeader = r.record()?;
            let Some((primary, secondary)) = names.get(buffer.material_id as usize) else {
                return Err(CodecError::InvalidMaterialId {
                    id: buffer.material_id,
                    count: material_count,
                });
            };
            let layout = VertexLayout::new(
                header.flags,
                !primary.is_empty(),
                !secondary.is_empty(),
                skinned,
            );
            let mut mesh = read_buffer(&mut r, &buffer, &layout)?;
            mesh.name = format!(
                "{}_{}",
                if primary.is_empty() { "_" } else { primary.as_str() },
                if secondary.is_empty() { "_" } else { secondary.as_str() }
            );
            meshes.push(mesh);
        }
    }

    let (static_frame, armatures) = if skinned {
        let count = r.u8()?;
        let static_frame = r.u16()? as u32 + 1;
        let armatures = (0..count)
            .map(|_| read_armature(&mut r))
            .collect::<Result<Vec<_>, _>>()?;
        (Some(static_frame), armatures)
    } else {
        (None, Vec::new())
    };

    tracing::info!(
        "Decoded SPM: {:?}, {} materials, {} meshes, {} armatures",
        kind,
        materials.len(),
        meshes.len(),
        armatures.len()
    );
    Ok(SceneFragment {
        kind,
        flags: header.flags,
        bounding_box: header.bounding_box,
        materials,
        meshes,
        armatures,
        static_frame,
        warnings,
    })
}

// ============================================================================
// Byte reader
// ============================================================================

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let slice = self
            .bytes
            .get(self.pos..self.pos + n)
            .ok_or(CodecError::UnexpectedEof {
                offset: self.pos,
                wanted: n,
            })?;
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn i16(&mut self) -> Result<i16, CodecError> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    fn f32(&mut self) -> Result<f32, CodecError> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f16(&mut self) -> Result<f32, CodecError> {
        Ok(f16_to_f32(self.u16()?))
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let eof = CodecError::UnexpectedEof {
            offset: self.pos,
            wanted: 1,
        };
        let (s, used) = read_len_string(&self.bytes[self.pos..]).ok_or(eof)?;
        self.pos += used;
        Ok(s)
    }

    /// Read one fixed-size record
    fn record<T: BinarySerializable>(&mut self) -> Result<T, CodecError> {
        let offset = self.pos;
        let bytes = self.take(T::SIZE)?;
        T::deserialize(bytes).ok_or(CodecError::UnexpectedEof {
            offset,
            wanted: T::SIZE,
        })
    }
}

// ============================================================================
// Mesh buffers
// ============================================================================

struct BufferVertex {
    position: Vec3,
    color: [f32; 3],
    uv0: Vec2,
    uv1: Vec2,
    joints: [i16; 4],
    weights: [f32; 4],
}

fn read_vertex(r: &mut Reader<'_>, layout: &VertexLayout) -> Result<BufferVertex, CodecError> {
    let (x, y, z) = (r.f32()?, r.f32()?, r.f32()?);
    let mut vertex = BufferVertex {
        // Stored axes back to editor axes
        position: Vec3::new(x, z, y),
        color: [1.0; 3],
        uv0: Vec2::ZERO,
        uv1: Vec2::ZERO,
        joints: [-1; 4],
        weights: [0.0; 4],
    };
    if layout.normal {
        // Recomputed by the host from faces
        r.take(4)?;
    }
    if layout.color && r.u8()? != COLOR_WHITE_MARKER {
        let rgb = r.take(3)?;
        vertex.color = [rgb[0], rgb[1], rgb[2]].map(|c| c as f32 / 255.0);
    }
    if layout.uv0 {
        vertex.uv0 = Vec2::new(r.f16()?, 1.0 - r.f16()?);
        if layout.uv1 {
            vertex.uv1 = Vec2::new(r.f16()?, 1.0 - r.f16()?);
        }
        if layout.tangent {
            r.take(4)?;
        }
    }
    if layout.skinned {
        for j in &mut vertex.joints {
            *j = r.i16()?;
        }
        for w in &mut vertex.weights {
            *w = r.f16()?;
        }
    }
    Ok(vertex)
}

fn read_buffer(
    r: &mut Reader<'_>,
    header: &MeshBufferHeader,
    layout: &VertexLayout,
) -> Result<DecodedMesh, CodecError> {
    let vertices = (0..header.vertex_count)
        .map(|_| read_vertex(r, layout))
        .collect::<Result<Vec<_>, _>>()?;

    let width = header.index_width();
    let index_bytes = r.take(header.index_count as usize * width.bytes())?;
    let indices = index_bytes
        .chunks_exact(width.bytes())
        .map(|chunk| {
            let index = width.read(chunk).unwrap_or(u32::MAX);
            if index < header.vertex_count {
                Ok(index)
            } else {
                Err(CodecError::IndexOutOfRange {
                    index,
                    vertex_count: header.vertex_count,
                })
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let positions: Vec<Vec3> = vertices.iter().map(|v| v.position).collect();
    let welded = weld_by_proximity(&positions);

    // Faces in editor winding; duplicates and triangles collapsed by the
    // weld are dropped along with their corner attributes
    let mut seen = HashSet::new();
    let mut corners = Vec::new();
    let mut faces = Vec::new();
    for face in indices.chunks_exact(3).map(|t| [t[2], t[1], t[0]]) {
        let remapped = face.map(|i| welded.remap[i as usize]);
        if is_degenerate(&remapped) || !seen.insert(sorted(remapped)) {
            continue;
        }
        faces.push(remapped);
        corners.push(face);
    }

    let corner_uvs = |get: fn(&BufferVertex) -> Vec2| -> Vec<[Vec2; 3]> {
        corners
            .iter()
            .map(|f| f.map(|i| get(&vertices[i as usize])))
            .collect()
    };
    let mesh = DecodedMesh {
        name: String::new(),
        material_id: header.material_id,
        positions: welded.representatives.iter().map(|&i| positions[i]).collect(),
        faces,
        uv0: layout.uv0.then(|| corner_uvs(|v| v.uv0)),
        uv1: layout.uv1.then(|| corner_uvs(|v| v.uv1)),
        colors: layout.color.then(|| {
            corners
                .iter()
                .map(|f| f.map(|i| vertices[i as usize].color))
                .collect()
        }),
        joints: layout.skinned.then(|| {
            welded
                .representatives
                .iter()
                .map(|&i| vertices[i].joints)
                .collect()
        }),
        weights: layout.skinned.then(|| {
            welded
                .representatives
                .iter()
                .map(|&i| vertices[i].weights)
                .collect()
        }),
    };

    tracing::debug!(
        "Buffer: {} vertices ({} after weld), {} faces",
        header.vertex_count,
        mesh.positions.len(),
        mesh.faces.len()
    );
    Ok(mesh)
}

fn is_degenerate(f: &[u32; 3]) -> bool {
    f[0] == f[1] || f[1] == f[2] || f[0] == f[2]
}

fn sorted(mut f: [u32; 3]) -> [u32; 3] {
    f.sort_unstable();
    f
}

struct Weld {
    /// Original index of every kept vertex
    representatives: Vec<usize>,
    /// New index of every original vertex
    remap: Vec<u32>,
}

/// Merge vertices closer than [`WELD_EPSILON`], first occurrence wins.
///
/// Uses a uniform grid with cell size equal to the merge distance, so only
/// the 27 surrounding cells need checking.
fn weld_by_proximity(positions: &[Vec3]) -> Weld {
    let cell_of = |p: Vec3| {
        let c = (p / WELD_EPSILON).floor();
        [c.x as i64, c.y as i64, c.z as i64]
    };
    let mut grid: HashMap<[i64; 3], Vec<u32>> = HashMap::new();
    let mut representatives: Vec<usize> = Vec::new();
    let mut remap = Vec::with_capacity(positions.len());

    for (i, &p) in positions.iter().enumerate() {
        let [cx, cy, cz] = cell_of(p);
        let mut found = None;
        'search: for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(bucket) = grid.get(&[cx + dx, cy + dy, cz + dz]) else {
                        continue;
                    };
                    for &rep in bucket {
                        if positions[representatives[rep as usize]].distance(p) <= WELD_EPSILON {
                            found = Some(rep);
                            break 'search;
                        }
                    }
                }
            }
        }
        let index = found.unwrap_or_else(|| {
            let index = representatives.len() as u32;
            representatives.push(i);
            grid.entry([cx, cy, cz]).or_default().push(index);
            index
        });
        remap.push(index);
    }

    Weld {
        representatives,
        remap,
    }
}

// ============================================================================
// Armatures
// ============================================================================

fn read_armature(r: &mut Reader<'_>) -> Result<DecodedArmature, CodecError> {
    let bones_in_use = r.u16()?;
    let bone_count = r.u16()? as usize;
    let names = (0..bone_count)
        .map(|_| r.string())
        .collect::<Result<Vec<_>, _>>()?;
    let binds = (0..bone_count)
        .map(|_| r.record::<BoneTransform>())
        .collect::<Result<Vec<_>, _>>()?;
    let parents = (0..bone_count)
        .map(|_| r.i16())
        .collect::<Result<Vec<_>, _>>()?;

    let bones = names
        .into_iter()
        .zip(binds)
        .zip(parents)
        .map(|((name, inverse_bind), parent)| DecodedBone {
            name,
            parent: u16::try_from(parent).ok(),
            inverse_bind,
        })
        .collect();

    let keyframe_count = r.u16()?;
    let mut keyframes = Vec::with_capacity(keyframe_count as usize);
    for _ in 0..keyframe_count {
        let frame = r.u16()? as u32 + 1;
        let transforms = (0..bone_count)
            .map(|_| r.record::<BoneTransform>())
            .collect::<Result<Vec<_>, _>>()?;
        keyframes.push(DecodedKeyframe { frame, transforms });
    }

    Ok(DecodedArmature {
        bones_in_use,
        bones,
        keyframes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(kind_byte: u8) -> Vec<u8> {
        let mut bytes = SpmHeader::new(SpmKind::Plain, 0, [0.0; 6]).to_bytes().to_vec();
        bytes[2] = kind_byte;
        bytes
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = header_bytes(0x0A);
        bytes[0] = b'X';
        assert!(matches!(
            decode_with(&bytes, &TextureResolver::new()),
            Err(CodecError::InvalidMagic([b'X', b'P']))
        ));
    }

    #[test]
    fn test_rejects_bad_version() {
        let bytes = header_bytes((2 << 3) | 2);
        assert!(matches!(
            decode_with(&bytes, &TextureResolver::new()),
            Err(CodecError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_rejects_space_partitioned() {
        let bytes = header_bytes(1 << 3);
        assert!(matches!(
            decode_with(&bytes, &TextureResolver::new()),
            Err(CodecError::SpacePartitionedUnsupported)
        ));
    }

    #[test]
    fn test_truncated_input() {
        assert!(matches!(
            decode_with(&[b'S', b'P'], &TextureResolver::new()),
            Err(CodecError::UnexpectedEof { .. })
        ));
        // Header only: material count missing
        assert!(matches!(
            decode_with(&header_bytes(0x0A), &TextureResolver::new()),
            Err(CodecError::UnexpectedEof { offset: 28, wanted: 2 })
        ));
    }

    /// Plain file, no materials' textures, given buffers
    fn file_with_buffer(material_id: u16, vertex_count: u32, indices: &[u8]) -> Vec<u8> {
        let mut bytes = header_bytes(0x0A);
        bytes.extend_from_slice(&1u16.to_le_bytes()); // materials
        bytes.extend_from_slice(&[0, 0]); // empty names
        bytes.extend_from_slice(&1u16.to_le_bytes()); // sectors
        bytes.extend_from_slice(&1u16.to_le_bytes()); // buffers
        bytes.extend_from_slice(
            &MeshBufferHeader::new(vertex_count, indices.len() as u32, material_id).to_bytes(),
        );
        for i in 0..vertex_count {
            for f in [i as f32, 0.0, (i % 2) as f32] {
                bytes.extend_from_slice(&f.to_le_bytes());
            }
        }
        bytes.extend_from_slice(indices);
        bytes
    }

    #[test]
    fn test_invalid_material_id() {
        let bytes = file_with_buffer(3, 3, &[0, 1, 2]);
        assert!(matches!(
            decode_with(&bytes, &TextureResolver::new()),
            Err(CodecError::InvalidMaterialId { id: 3, count: 1 })
        ));
    }

    #[test]
    fn test_index_out_of_range() {
        let bytes = file_with_buffer(0, 3, &[0, 1, 3]);
        assert!(matches!(
            decode_with(&bytes, &TextureResolver::new()),
            Err(CodecError::IndexOutOfRange { index: 3, vertex_count: 3 })
        ));
    }

    #[test]
    fn test_faces_reversed_and_deduplicated() {
        let bytes = file_with_buffer(0, 4, &[0, 1, 2, 2, 1, 0, 1, 1, 3, 1, 2, 3]);
        let scene = decode_with(&bytes, &TextureResolver::new()).unwrap();
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.name, "___");
        // Second triple is the same face, third is degenerate
        assert_eq!(mesh.faces, vec![[2, 1, 0], [3, 2, 1]]);
        assert!(mesh.uv0.is_none());
        // Stored (x, y, z) comes back as (x, z, y)
        assert_eq!(mesh.positions[1], Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_weld_by_proximity() {
        let positions = [
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.00005, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.00009),
        ];
        let weld = weld_by_proximity(&positions);
        assert_eq!(weld.representatives, vec![0, 1]);
        assert_eq!(weld.remap, vec![0, 1, 0, 1]);
    }
}
