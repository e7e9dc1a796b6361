//! Mesh side of the codec: vertices, triangles, extraction and buffers

mod buffer;
mod extract;
mod triangle;
mod vertex;

// Re-export public API
pub use buffer::{BufferSet, MAX_BUFFER_VERTICES, MeshBuffer, build_buffers};
pub use extract::{
    AXIS_CONVERSION, ExtractOptions, Extraction, bake_matrix, compute_vertex_normals,
    corner_tangents, extract_triangles, texture_key,
};
pub use triangle::{Influence, TextureKey, Triangle};
pub use vertex::{NO_JOINT, Vertex, VertexLayout, WELD_EPSILON, WeldKey};
