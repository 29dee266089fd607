//! # Destruction Error Types
//!
//! Construction-time failures. Runtime conditions during a damage pass
//! (no contact, exhausted pools, repeated separation) are absorbed locally and
//! never surface as errors.

use thiserror::Error;

use crate::face::Face;

/// Malformed bake data. Fatal: the destructible cannot be instantiated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Bake data contains no voxels.
    #[error("bake data contains no voxels")]
    EmptyGrid,

    /// An adjacency index points outside the record list.
    #[error("voxel {voxel} has {face:?} neighbor index {index} but only {len} voxels exist")]
    AdjacencyOutOfRange {
        /// Voxel whose record is malformed.
        voxel: usize,
        /// Face carrying the bad index.
        face: Face,
        /// The offending index.
        index: i32,
        /// Number of records.
        len: usize,
    },

    /// A voxel lists itself as its own neighbor.
    #[error("voxel {voxel} lists itself as its {face:?} neighbor")]
    SelfAdjacency {
        /// Voxel whose record is malformed.
        voxel: usize,
        /// Face carrying the self reference.
        face: Face,
    },

    /// A -> B in `face` without B -> A in the opposite face.
    #[error("voxel {voxel} -> {neighbor} via {face:?} is not mirrored by the neighbor")]
    AsymmetricAdjacency {
        /// Voxel holding the link.
        voxel: usize,
        /// Neighbor that does not link back.
        neighbor: usize,
        /// Direction of the link.
        face: Face,
    },

    /// A face quad starts beyond the shared vertex buffer.
    #[error("voxel {voxel} {face:?} quad starts at vertex {start}, vertex buffer holds {vertex_count}")]
    FaceStartOutOfRange {
        /// Voxel whose record is malformed.
        voxel: usize,
        /// Face carrying the bad offset.
        face: Face,
        /// The offending start index.
        start: u32,
        /// Vertices in the shared buffer.
        vertex_count: usize,
    },

    /// Vertex attribute buffers disagree in length.
    #[error("mesh buffers disagree: {positions} positions, {normals} normals, {uvs} uvs")]
    MismatchedBuffers {
        /// Position count.
        positions: usize,
        /// Normal count.
        normals: usize,
        /// UV count.
        uvs: usize,
    },

    /// Bake data could not be decoded.
    #[error("malformed bake data: {0}")]
    Malformed(String),
}

/// Errors that can occur in the destruction engine.
#[derive(Error, Debug)]
pub enum DestructionError {
    /// Bake data rejected during grid construction.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Tuning values out of range.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Settings file could not be parsed.
    #[error("settings parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Settings or bake file could not be read.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// No destructible is registered under the id.
    #[error("unknown destructible: {0}")]
    UnknownDestructible(u32),
}

/// Result type for destruction operations.
pub type DestructionResult<T> = Result<T, DestructionError>;
