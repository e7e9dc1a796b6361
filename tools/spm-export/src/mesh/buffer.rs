//! Mesh buffer builder
//!
//! Sorts triangles by texture key, welds their corners into per-buffer vertex
//! tables and starts a new buffer whenever the key changes or the vertex cap
//! would be exceeded.

use glam::Vec3;
use hashbrown::HashMap;

use super::triangle::{TextureKey, Triangle};
use super::vertex::{Vertex, WeldKey};
use crate::error::CodecError;

/// Most unique vertices a single buffer may hold
pub const MAX_BUFFER_VERTICES: usize = 65532;

/// One vertex array + index array + material unit
#[derive(Debug, Clone)]
pub struct MeshBuffer {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material_id: u16,
}

/// Material table plus the buffers referencing it
#[derive(Debug, Clone, Default)]
pub struct BufferSet {
    /// Texture pair of every material id, in id order
    pub materials: Vec<TextureKey>,
    pub buffers: Vec<MeshBuffer>,
}

/// Buffer under construction
struct OpenBuffer {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    buckets: HashMap<WeldKey, Vec<u32>>,
    /// Summed tangent direction of every welded vertex
    tangent_sums: Vec<Vec3>,
}

impl OpenBuffer {
    fn new() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            buckets: HashMap::new(),
            tangent_sums: Vec::new(),
        }
    }

    fn find(&self, vertex: &Vertex) -> Option<u32> {
        vertex
            .weld_key()
            .neighbours()
            .filter_map(|key| self.buckets.get(&key))
            .flat_map(|bucket| bucket.iter().copied())
            .find(|&i| self.vertices[i as usize].welds_with(vertex))
    }

    /// Upper bound of the vertices a triangle would add
    fn missing(&self, triangle: &Triangle) -> usize {
        triangle
            .vertices
            .iter()
            .filter(|v| self.find(v).is_none())
            .count()
    }

    fn weld(&mut self, vertex: &Vertex) {
        let index = match self.find(vertex) {
            Some(i) => {
                self.tangent_sums[i as usize] += vertex.tangent.truncate();
                i
            }
            None => {
                let i = self.vertices.len() as u32;
                self.vertices.push(*vertex);
                self.tangent_sums.push(vertex.tangent.truncate());
                self.buckets.entry(vertex.weld_key()).or_default().push(i);
                i
            }
        };
        self.indices.push(index);
    }

    fn close(mut self, material_id: u16, average_tangents: bool) -> Result<MeshBuffer, CodecError> {
        if self.vertices.len() > u16::MAX as usize {
            return Err(CodecError::TooManyVertices {
                count: self.vertices.len(),
            });
        }
        if average_tangents {
            // The first welded vertex keeps its handedness
            for (v, sum) in self.vertices.iter_mut().zip(&self.tangent_sums) {
                v.tangent = sum.normalize_or_zero().extend(v.tangent.w);
            }
        }
        Ok(MeshBuffer {
            vertices: self.vertices,
            indices: self.indices,
            material_id,
        })
    }
}

/// Group triangles into mesh buffers.
///
/// Consecutive texture keys get material ids 0, 1, 2...; a split caused by
/// the vertex cap keeps the current material id. Corners are emitted in
/// stored order.
pub fn build_buffers(
    mut triangles: Vec<Triangle>,
    average_tangents: bool,
) -> Result<BufferSet, CodecError> {
    if triangles.is_empty() {
        return Err(CodecError::EmptyGeometry);
    }
    triangles.sort_by(|a, b| a.key.cmp(&b.key));

    let mut set = BufferSet::default();
    let mut current = OpenBuffer::new();
    let mut current_key: Option<&TextureKey> = None;

    for triangle in &triangles {
        if current_key != Some(&triangle.key) {
            if current_key.is_some() {
                let id = material_id(set.materials.len() - 1)?;
                let finished = std::mem::replace(&mut current, OpenBuffer::new());
                set.buffers.push(finished.close(id, average_tangents)?);
            }
            set.materials.push(triangle.key.clone());
            current_key = Some(&triangle.key);
        } else if current.vertices.len() + current.missing(triangle) > MAX_BUFFER_VERTICES {
            let id = material_id(set.materials.len() - 1)?;
            let finished = std::mem::replace(&mut current, OpenBuffer::new());
            tracing::debug!("Splitting mesh buffer at {} vertices", finished.vertices.len());
            set.buffers.push(finished.close(id, average_tangents)?);
        }

        for vertex in &triangle.vertices {
            current.weld(vertex);
        }
    }

    let id = material_id(set.materials.len() - 1)?;
    set.buffers.push(current.close(id, average_tangents)?);

    // Material ids never exceed buffer indices, so this bounds both
    if set.buffers.len() > u16::MAX as usize {
        return Err(CodecError::TooManyBuffers {
            count: set.buffers.len(),
        });
    }
    Ok(set)
}

fn material_id(index: usize) -> Result<u16, CodecError> {
    u16::try_from(index).map_err(|_| CodecError::TooManyBuffers { count: index + 1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn vertex(x: f32, y: f32, z: f32) -> Vertex {
        Vertex {
            position: Vec3::new(x, y, z),
            normal: Vec3::Y,
            ..Default::default()
        }
    }

    fn tri(a: Vertex, b: Vertex, c: Vertex, texture: &str) -> Triangle {
        Triangle::new([a, b, c], TextureKey::new(texture, ""))
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(
            build_buffers(Vec::new(), false),
            Err(CodecError::EmptyGeometry)
        ));
    }

    #[test]
    fn test_quad_welds_to_four_vertices() {
        let (a, b, c, d) = (
            vertex(0.0, 0.0, 0.0),
            vertex(1.0, 0.0, 0.0),
            vertex(1.0, 0.0, 1.0),
            vertex(0.0, 0.0, 1.0),
        );
        let set = build_buffers(vec![tri(a, b, c, "t.png"), tri(a, c, d, "t.png")], false).unwrap();
        assert_eq!(set.buffers.len(), 1);
        assert_eq!(set.buffers[0].vertices.len(), 4);
        assert_eq!(set.buffers[0].indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_weld_across_cell_boundary() {
        let a = vertex(0.00059, 0.0, 0.0);
        let b = vertex(0.00061, 0.0, 0.0);
        let (c, d) = (vertex(1.0, 0.0, 0.0), vertex(0.0, 1.0, 0.0));
        assert!(a.welds_with(&b));

        let set = build_buffers(vec![tri(a, c, d, ""), tri(b, c, d, "")], false).unwrap();
        assert_eq!(set.buffers[0].vertices.len(), 3);
        assert_eq!(set.buffers[0].indices, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_reordered_duplicates_weld() {
        let (a, b, c) = (
            vertex(0.0, 0.0, 0.0),
            vertex(1.0, 0.0, 0.0),
            vertex(0.0, 1.0, 0.0),
        );
        let set = build_buffers(vec![tri(a, b, c, ""), tri(c, a, b, "")], false).unwrap();
        let buffer = &set.buffers[0];
        assert_eq!(buffer.vertices.len(), 3);
        assert_eq!(buffer.indices, vec![0, 1, 2, 2, 0, 1]);
    }

    #[test]
    fn test_materials_sorted_and_numbered() {
        let (a, b, c) = (
            vertex(0.0, 0.0, 0.0),
            vertex(1.0, 0.0, 0.0),
            vertex(0.0, 1.0, 0.0),
        );
        let set = build_buffers(
            vec![tri(a, b, c, "b.png"), tri(a, b, c, "a.png"), tri(a, c, b, "b.png")],
            false,
        )
        .unwrap();
        assert_eq!(
            set.materials,
            vec![TextureKey::new("a.png", ""), TextureKey::new("b.png", "")]
        );
        assert_eq!(set.buffers.len(), 2);
        assert_eq!(set.buffers[0].material_id, 0);
        assert_eq!(set.buffers[1].material_id, 1);
        assert_eq!(set.buffers[1].indices.len(), 6);
    }

    #[test]
    fn test_split_at_vertex_cap_reuses_material() {
        // Disjoint triangles: three new vertices each
        let count = MAX_BUFFER_VERTICES / 3 + 10;
        let triangles: Vec<Triangle> = (0..count)
            .map(|i| {
                let x = i as f32;
                tri(
                    vertex(x, 0.0, 0.0),
                    vertex(x, 1.0, 0.0),
                    vertex(x, 0.0, 1.0),
                    "track.png",
                )
            })
            .collect();
        let set = build_buffers(triangles, false).unwrap();

        assert_eq!(set.materials.len(), 1);
        assert_eq!(set.buffers.len(), 2);
        assert!(set.buffers.iter().all(|b| b.vertices.len() <= MAX_BUFFER_VERTICES));
        assert!(set.buffers.iter().all(|b| b.material_id == 0));
        assert_eq!(set.buffers[0].vertices.len(), MAX_BUFFER_VERTICES);
        let total: usize = set.buffers.iter().map(|b| b.vertices.len()).sum();
        assert_eq!(total, count * 3);
    }

    #[test]
    fn test_welded_tangents_averaged() {
        let mut a1 = vertex(0.0, 0.0, 0.0);
        a1.tangent = Vec4::new(1.0, 0.0, 0.0, 1.0);
        let mut a2 = a1;
        a2.tangent = Vec4::new(0.0, 0.0, 1.0, 1.0);
        let (b, c) = (vertex(1.0, 0.0, 0.0), vertex(0.0, 1.0, 0.0));

        let set = build_buffers(vec![tri(a1, b, c, ""), tri(a2, c, b, "")], true).unwrap();
        let t = set.buffers[0].vertices[0].tangent;
        let expected = Vec3::new(1.0, 0.0, 1.0).normalize();
        assert!((t.truncate() - expected).length() < 1e-6);
        assert_eq!(t.w, 1.0);
    }
}
