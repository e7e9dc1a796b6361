//! SPM file header
//!
//! # Layout
//! ```text
//! 0x00: magic "SP" (2 bytes)
//! 0x02: version:5 | kind:3 (u8)
//! 0x03: flags u8 (bit0 normal, bit1 vertex color, bit2 tangent)
//! 0x04: bounding box 6 × f32 (min xyz, max xyz in stored axis order)
//! ```

/// Magic bytes at the start of every SPM file
pub const SPM_MAGIC: [u8; 2] = *b"SP";
/// Format version written in the top 5 bits of the kind byte
pub const SPM_VERSION: u8 = 1;

/// Header flag: vertices carry a packed normal
pub const FLAG_NORMAL: u8 = 1;
/// Header flag: vertices carry a color marker (and optional RGB)
pub const FLAG_VERTEX_COLOR: u8 = 1 << 1;
/// Header flag: textured vertices carry a packed tangent
pub const FLAG_TANGENT: u8 = 1 << 2;

/// Mesh kind stored in the low 3 bits of the kind byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SpmKind {
    /// Space-partitioned split mesh (never produced, not decoded)
    SpacePartitioned = 0,
    /// Skinned mesh followed by an armature block
    Skinned = 1,
    /// Plain static mesh
    Plain = 2,
}

impl SpmKind {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::SpacePartitioned),
            1 => Some(Self::Skinned),
            2 => Some(Self::Plain),
            _ => None,
        }
    }
}

/// SPM file header (28 bytes)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpmHeader {
    pub magic: [u8; 2],
    pub version: u8,
    /// Raw 3-bit kind, see [`SpmHeader::kind`]
    pub kind_bits: u8,
    pub flags: u8,
    pub bounding_box: [f32; 6],
}

impl SpmHeader {
    pub const SIZE: usize = 28;

    pub fn new(kind: SpmKind, flags: u8, bounding_box: [f32; 6]) -> Self {
        Self {
            magic: SPM_MAGIC,
            version: SPM_VERSION,
            kind_bits: kind as u8,
            flags,
            bounding_box,
        }
    }

    pub fn kind(&self) -> Option<SpmKind> {
        SpmKind::from_bits(self.kind_bits)
    }

    pub fn has_normal(&self) -> bool {
        self.flags & FLAG_NORMAL != 0
    }

    pub fn has_vertex_color(&self) -> bool {
        self.flags & FLAG_VERTEX_COLOR != 0
    }

    pub fn has_tangent(&self) -> bool {
        self.flags & FLAG_TANGENT != 0
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..2].copy_from_slice(&self.magic);
        bytes[2] = (self.version << 3) | (self.kind_bits & 0x07);
        bytes[3] = self.flags;
        for (i, f) in self.bounding_box.iter().enumerate() {
            let at = 4 + i * 4;
            bytes[at..at + 4].copy_from_slice(&f.to_le_bytes());
        }
        bytes
    }

    /// Read header from bytes
    ///
    /// Magic and version are returned as found; callers validate them.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let mut bounding_box = [0.0f32; 6];
        for (i, f) in bounding_box.iter_mut().enumerate() {
            let at = 4 + i * 4;
            *f = f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        }
        Some(Self {
            magic: [bytes[0], bytes[1]],
            version: bytes[2] >> 3,
            kind_bits: bytes[2] & 0x07,
            flags: bytes[3],
            bounding_box,
        })
    }
}
