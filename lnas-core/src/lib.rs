//! LNAS core library - triangulated surface meshes for Lagrangian simulations
//!
//! This library provides geometry with named surfaces, the transformation pipeline
//! applied to it, index-consistent filtering and combination of mesh records, and
//! the LNAS and binary STL codecs.

pub mod algebra;
pub mod codec;
pub mod error;
pub mod format;
pub mod geometry;
pub mod stl;
pub mod transform;

// Re-export commonly used types
pub use algebra::combine_lnas;
pub use codec::{CURRENT_VERSION, SUPPORTED_MAJOR_VERSIONS};
pub use error::{LnasError, Result};
pub use format::{LagrangianNormalization, LnasFormat, Surfaces};
pub use geometry::{Geometry, TriangleIndices};
pub use stl::{StlMesh, StlTriangle};
pub use transform::{TransformationMatrix, Transformations, VectorKind};
