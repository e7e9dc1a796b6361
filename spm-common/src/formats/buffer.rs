//! Mesh buffer header and index width selection
//!
//! # Layout
//! ```text
//! 0x00: vertex_count u32
//! 0x04: index_count u32
//! 0x08: material_id u16
//! 0x0A: vertex_data (vertex_count * stride, stride depends on header flags)
//! var:  index_data (index_count * IndexWidth::for_vertex_count(vertex_count))
//! ```

use std::io::{self, Write};

/// Mesh buffer header (10 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshBufferHeader {
    pub vertex_count: u32,
    pub index_count: u32,
    pub material_id: u16,
}

impl MeshBufferHeader {
    pub const SIZE: usize = 10;

    pub fn new(vertex_count: u32, index_count: u32, material_id: u16) -> Self {
        Self {
            vertex_count,
            index_count,
            material_id,
        }
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.vertex_count.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.index_count.to_le_bytes());
        bytes[8..10].copy_from_slice(&self.material_id.to_le_bytes());
        bytes
    }

    /// Read header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            vertex_count: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            index_count: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            material_id: u16::from_le_bytes([bytes[8], bytes[9]]),
        })
    }

    /// Width of each index in this buffer's index stream
    pub fn index_width(&self) -> IndexWidth {
        IndexWidth::for_vertex_count(self.vertex_count as usize)
    }
}

/// Byte width of one index in a mesh buffer's index stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexWidth {
    U8,
    U16,
    U32,
}

impl IndexWidth {
    /// Select the narrowest width able to address `vertex_count` vertices.
    ///
    /// Up to 255 vertices use 1 byte, up to 65535 use 2 bytes, anything
    /// larger 4 bytes.
    pub fn for_vertex_count(vertex_count: usize) -> Self {
        if vertex_count > u16::MAX as usize {
            Self::U32
        } else if vertex_count > u8::MAX as usize {
            Self::U16
        } else {
            Self::U8
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    /// Write one index with this width
    pub fn write<W: Write>(self, w: &mut W, index: u32) -> io::Result<()> {
        match self {
            Self::U8 => w.write_all(&[index as u8]),
            Self::U16 => w.write_all(&(index as u16).to_le_bytes()),
            Self::U32 => w.write_all(&index.to_le_bytes()),
        }
    }

    /// Read one index with this width from the front of `bytes`
    pub fn read(self, bytes: &[u8]) -> Option<u32> {
        match self {
            Self::U8 => bytes.first().map(|&b| b as u32),
            Self::U16 => bytes
                .get(0..2)
                .map(|b| u16::from_le_bytes([b[0], b[1]]) as u32),
            Self::U32 => bytes
                .get(0..4)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        }
    }
}
