//! Error types for LNAS mesh operations.

use thiserror::Error;

/// Result type for LNAS operations.
pub type Result<T> = std::result::Result<T, LnasError>;

/// Errors that can occur while building, transforming or encoding meshes.
#[derive(Debug, Error)]
pub enum LnasError {
    /// Requested surface is not part of the mesh record.
    #[error("unable to find surface named {name}, available ones are {available:?}")]
    SurfaceNotFound {
        /// Name that was looked up.
        name: String,
        /// Surface names present in the record.
        available: Vec<String>,
    },

    /// An empty list of surface names was given.
    #[error("no surfaces to filter")]
    NoSurfaces,

    /// Triangle keep-mask does not match the triangle count.
    #[error("invalid number of triangles to filter: {got} != {expected}")]
    MaskLengthMismatch {
        /// Current triangle count.
        expected: usize,
        /// Mask length received.
        got: usize,
    },

    /// Batch of points or vectors is not 3D.
    #[error("array points must be 3D to be transformed, got {columns} columns")]
    InvalidDimension {
        /// Column count received.
        columns: usize,
    },

    /// Fewer surface suffixes than records to append.
    #[error("less surface suffixes than required: {suffixes} < {required}")]
    InsufficientSuffixes {
        /// Suffixes provided.
        suffixes: usize,
        /// Suffixes required.
        required: usize,
    },

    /// Nothing to combine.
    #[error("no LNAS to combine")]
    EmptyInput,

    /// Surface name already present after suffixing.
    #[error("surface {name} is already in the list of surfaces, provide a suffix for it")]
    SurfaceCollision {
        /// Colliding surface key.
        name: String,
    },

    /// Vertex or triangle count no longer fits in a `u32` index.
    #[error("mesh too large: {count} {what} exceed the u32 index range")]
    IndexOverflow {
        /// Element kind, `vertices` or `triangles`.
        what: &'static str,
        /// Element count reached.
        count: usize,
    },

    /// Triangle references a vertex that does not exist.
    #[error("triangle {triangle} references vertex {index}, but only {vertex_count} vertices exist")]
    VertexIndexOutOfRange {
        /// Triangle position in the triangle array.
        triangle: usize,
        /// Offending vertex index.
        index: u32,
        /// Vertex count of the geometry.
        vertex_count: usize,
    },

    /// Surface references a triangle that does not exist.
    #[error("surface {surface} references triangle {index}, but only {triangle_count} triangles exist")]
    TriangleIndexOutOfRange {
        /// Surface name.
        surface: String,
        /// Offending triangle index.
        index: u32,
        /// Triangle count of the geometry.
        triangle_count: usize,
    },

    /// STL normals do not pair up with triangles.
    #[error("got {normals} normals for {triangles} triangles")]
    NormalsLengthMismatch {
        /// Triangle count.
        triangles: usize,
        /// Normal count.
        normals: usize,
    },

    /// Transformation cannot be inverted.
    #[error("transformation with scale {scale:?} is not invertible")]
    NonInvertible {
        /// Scale components of the descriptor.
        scale: [f64; 3],
    },

    /// Major version is not readable by this implementation.
    #[error("LNAS version {version} is incompatible with reader versions {supported:?}")]
    VersionIncompatible {
        /// Version found in the container.
        version: String,
        /// Supported major versions.
        supported: Vec<String>,
    },

    /// Required container key is absent.
    #[error("malformed LNAS container: missing key `{key}`")]
    MissingKey {
        /// Missing key.
        key: &'static str,
    },

    /// Container structure could not be decoded.
    #[error("malformed LNAS container: {0}")]
    Json(#[from] serde_json::Error),

    /// Surface payload is not valid base64.
    #[error("surface {surface} is not valid base64: {source}")]
    Base64 {
        /// Surface name.
        surface: String,
        /// Underlying decode error.
        #[source]
        source: base64::DecodeError,
    },

    /// Surface payload is not a whole number of u32 values.
    #[error("surface {surface} has {len} bytes, not a multiple of 4")]
    SurfaceByteLength {
        /// Surface name.
        surface: String,
        /// Decoded byte length.
        len: usize,
    },

    /// STL stream could not be parsed.
    #[error("invalid STL content: {message}")]
    Stl {
        /// Description of what was invalid.
        message: String,
    },

    /// I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LnasError {
    /// Create an `Stl` error with the given message.
    #[must_use]
    pub fn stl(message: impl Into<String>) -> Self {
        Self::Stl {
            message: message.into(),
        }
    }

    /// Whether this error comes from the major-version gate.
    ///
    /// Callers may recover from it by picking a different reader or migration.
    #[must_use]
    pub fn is_version_error(&self) -> bool {
        matches!(self, Self::VersionIncompatible { .. })
    }
}
