//! Triangles and their texture-pair material key

use super::vertex::Vertex;

/// Texture pair identifying a material. Empty names mean "no texture".
///
/// Ordering is lexicographic on `(primary, secondary)` so that triangles of
/// the same material sort next to each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureKey {
    pub primary: String,
    pub secondary: String,
}

impl TextureKey {
    pub fn new(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }

    pub fn has_primary(&self) -> bool {
        !self.primary.is_empty()
    }

    pub fn has_secondary(&self) -> bool {
        !self.secondary.is_empty()
    }
}

/// A bone name with its raw weight, before joint slots are assigned
#[derive(Debug, Clone, PartialEq)]
pub struct Influence {
    pub bone: String,
    pub weight: f32,
}

/// Three corners in stored (engine) winding order
#[derive(Debug, Clone)]
pub struct Triangle {
    pub vertices: [Vertex; 3],
    pub key: TextureKey,
    /// Name of the armature deforming this triangle
    pub armature: Option<String>,
    /// Per-corner influences, sorted by descending weight
    pub influences: [Vec<Influence>; 3],
}

impl Triangle {
    pub fn new(vertices: [Vertex; 3], key: TextureKey) -> Self {
        Self {
            vertices,
            key,
            armature: None,
            influences: Default::default(),
        }
    }

    /// Renormalize each corner's joint weights to sum to 1.
    ///
    /// Returns true when any corner carries a positive weight.
    pub fn normalize_weights(&mut self) -> bool {
        let mut weighted = false;
        for v in &mut self.vertices {
            let total: f32 = v.weights.iter().sum();
            if total > 0.0 {
                weighted = true;
                for w in &mut v.weights {
                    *w /= total;
                }
            }
        }
        weighted
    }
}
