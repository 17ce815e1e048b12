//! LNAS mesh record: geometry, named surfaces and normalization metadata.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{LnasError, Result};
use crate::geometry::Geometry;

/// Named surfaces in insertion order, each a list of triangle indices.
pub type Surfaces = IndexMap<String, Vec<u32>>;

/// Physical unit scale and axis carried with the geometry; never applied to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagrangianNormalization {
    pub size: f64,
    pub direction: String,
}

/// Versioned bundle of one geometry and its named surfaces.
///
/// Surfaces are triangle index arrays into the geometry. They are checked on
/// insertion, and the geometry is only reachable mutably through operations
/// that keep them consistent.
#[derive(Debug, Clone)]
pub struct LnasFormat {
    pub version: String,
    pub name: String,
    pub normalization: Option<LagrangianNormalization>,
    geometry: Geometry,
    surfaces: Surfaces,
}

impl LnasFormat {
    pub fn new(
        version: impl Into<String>,
        geometry: Geometry,
        surfaces: Surfaces,
    ) -> Result<Self> {
        for (name, indices) in &surfaces {
            validate_surface(name, indices, geometry.triangle_count())?;
        }
        Ok(Self {
            version: version.into(),
            name: String::new(),
            normalization: None,
            geometry,
            surfaces,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_normalization(mut self, normalization: LagrangianNormalization) -> Self {
        self.normalization = Some(normalization);
        self
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn surfaces(&self) -> &Surfaces {
        &self.surfaces
    }

    pub fn surface(&self, name: &str) -> Result<&[u32]> {
        self.surfaces
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| self.surface_not_found(name))
    }

    pub fn surface_names(&self) -> Vec<String> {
        self.surfaces.keys().cloned().collect()
    }

    /// Insert or replace a surface, returning the previous indices if any.
    pub fn insert_surface(&mut self, name: impl Into<String>, indices: Vec<u32>) -> Result<Option<Vec<u32>>> {
        let name = name.into();
        validate_surface(&name, &indices, self.geometry.triangle_count())?;
        Ok(self.surfaces.insert(name, indices))
    }

    /// Remove a surface, keeping the order of the others.
    pub fn remove_surface(&mut self, name: &str) -> Option<Vec<u32>> {
        self.surfaces.shift_remove(name)
    }

    pub fn into_parts(self) -> (Geometry, Surfaces) {
        (self.geometry, self.surfaces)
    }

    pub(crate) fn surface_not_found(&self, name: &str) -> LnasError {
        LnasError::SurfaceNotFound {
            name: name.to_string(),
            available: self.surface_names(),
        }
    }

    pub(crate) fn replace_contents(&mut self, geometry: Geometry, surfaces: Surfaces) {
        self.geometry = geometry;
        self.surfaces = surfaces;
    }
}

/// Structural equality: version, geometry arrays and per-surface index arrays.
///
/// Surface order is not compared.
impl PartialEq for LnasFormat {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.geometry == other.geometry
            && self.surfaces == other.surfaces
    }
}

pub(crate) fn validate_surface(name: &str, indices: &[u32], triangle_count: usize) -> Result<()> {
    match indices.iter().find(|&&i| i as usize >= triangle_count) {
        Some(&index) => Err(LnasError::TriangleIndexOutOfRange {
            surface: name.to_string(),
            index,
            triangle_count,
        }),
        None => Ok(()),
    }
}
