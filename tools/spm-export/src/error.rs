//! Codec error and warning types
//!
//! Fatal conditions abort the whole encode/decode call and are returned as
//! [`CodecError`]. Recoverable conditions let the call finish and are
//! collected into a `Vec<Warning>` returned next to the result.

/// Fatal codec error. No partial file or scene fragment is produced.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("No triangles to export")]
    EmptyGeometry,

    #[error("Mesh buffer has {count} vertices, exceeds what any index width can address")]
    TooManyVertices { count: usize },

    #[error("Armatures use {count} bones in total, maximum is {max}", max = i16::MAX)]
    TooManyBones { count: usize },

    #[error("{count} mesh buffers exceed the u16 buffer count")]
    TooManyBuffers { count: usize },

    #[error("{count} armatures exceed the u8 armature count")]
    TooManyArmatures { count: usize },

    #[error("Invalid magic {0:?}, not an SPM file")]
    InvalidMagic([u8; 2]),

    #[error("Unsupported SPM version: {0}")]
    UnsupportedVersion(u8),

    #[error("Unknown SPM mesh kind: {0}")]
    UnknownKind(u8),

    #[error("Space-partitioned SPM meshes are not supported")]
    SpacePartitionedUnsupported,

    #[error("Unexpected end of data at offset {offset} (wanted {wanted} bytes)")]
    UnexpectedEof { offset: usize, wanted: usize },

    #[error("Mesh buffer references material {id}, file has {count} materials")]
    InvalidMaterialId { id: u16, count: usize },

    #[error("Index {index} out of range for buffer with {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why an input object contributed no geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoVertices,
    NoFaces,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoVertices => f.write_str("no vertices"),
            SkipReason::NoFaces => f.write_str("no faces"),
        }
    }
}

/// Recoverable condition reported alongside a successful result
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Warning {
    #[error("Object '{object}' skipped: {reason}")]
    ObjectSkipped { object: String, reason: SkipReason },

    #[error("Object '{object}' has no UV map, its tangents are left empty")]
    MissingUvForTangents { object: String },

    #[error("No exported object has a UV map, tangent export disabled")]
    TangentsDisabled,

    #[error("No keyframes found for armature '{armature}', skinning data omitted")]
    ArmatureSkipped { armature: String },

    #[error("Armature '{armature}' has no weighted vertices")]
    ArmatureUnweighted { armature: String },

    #[error("Missing texture '{name}', placeholder used")]
    TextureNotFound { name: String },

    #[error("Parameter {parameter} was {given}, using {used}")]
    ParameterClamped {
        parameter: &'static str,
        given: i32,
        used: i32,
    },
}

/// Log a warning and add it to the list returned to the caller
pub(crate) fn push_warning(warnings: &mut Vec<Warning>, warning: Warning) {
    tracing::warn!("{}", warning);
    warnings.push(warning);
}
