//! LNAS container codec.
//!
//! A record is exchanged as a dictionary (`serde_json::Value`) shaped as
//!
//! ```text
//! version: "v0.5.0"
//! name: "..."                         (optional)
//! normalization: {size, direction}    (optional, may be null)
//! geometry:
//!   vertices: [[x, y, z], ...]
//!   triangles: [[i, j, k], ...]
//! surfaces:
//!   <name>: base64(little-endian u32 triangle indices)
//! ```

use std::collections::HashMap;
use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{LnasError, Result};
use crate::format::{LagrangianNormalization, LnasFormat, Surfaces};
use crate::geometry::{index_count, Geometry};
use crate::stl;

/// Major versions this reader accepts.
pub const SUPPORTED_MAJOR_VERSIONS: &[&str] = &["v0.4", "v0.5"];

/// Version written by this implementation.
pub const CURRENT_VERSION: &str = "v0.5.0";

#[derive(Debug, Serialize, Deserialize)]
struct LnasDocument {
    version: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    normalization: Option<LagrangianNormalization>,
    geometry: GeometryDocument,
    surfaces: IndexMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeometryDocument {
    vertices: Vec<[f32; 3]>,
    triangles: Vec<[u32; 3]>,
}

/// Major part of a version string: everything but its last two characters.
pub fn major_version(version: &str) -> &str {
    match version.char_indices().rev().nth(1) {
        Some((idx, _)) => &version[..idx],
        None => "",
    }
}

/// Fails with [`LnasError::VersionIncompatible`] unless the major version is supported.
pub fn check_version(version: &str) -> Result<()> {
    if SUPPORTED_MAJOR_VERSIONS.contains(&major_version(version)) {
        Ok(())
    } else {
        Err(LnasError::VersionIncompatible {
            version: version.to_string(),
            supported: SUPPORTED_MAJOR_VERSIONS.iter().map(|v| v.to_string()).collect(),
        })
    }
}

/// Encode surface indices as base64 of packed little-endian u32.
pub fn encode_surface(indices: &[u32]) -> String {
    let bytes: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
    STANDARD.encode(bytes)
}

/// Decode a surface payload produced by [`encode_surface`].
pub fn decode_surface(name: &str, encoded: &str) -> Result<Vec<u32>> {
    let bytes = STANDARD.decode(encoded).map_err(|source| LnasError::Base64 {
        surface: name.to_string(),
        source,
    })?;
    if bytes.len() % 4 != 0 {
        return Err(LnasError::SurfaceByteLength {
            surface: name.to_string(),
            len: bytes.len(),
        });
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

impl LnasFormat {
    /// Load a record from its dictionary form.
    ///
    /// The version gate runs before anything else is decoded.
    pub fn from_dict(dict: &Value) -> Result<Self> {
        let version = dict
            .get("version")
            .ok_or(LnasError::MissingKey { key: "version" })?;
        if let Some(version) = version.as_str() {
            check_version(version)?;
        }
        for key in ["geometry", "surfaces"] {
            if dict.get(key).is_none() {
                return Err(LnasError::MissingKey { key });
            }
        }

        let doc = LnasDocument::deserialize(dict)?;
        let geometry = Geometry::from_arrays(&doc.geometry.vertices, &doc.geometry.triangles)?;
        let surfaces = doc
            .surfaces
            .iter()
            .map(|(name, encoded)| Ok((name.clone(), decode_surface(name, encoded)?)))
            .collect::<Result<Surfaces>>()?;

        debug!(
            version = %doc.version,
            vertices = geometry.vertex_count(),
            triangles = geometry.triangle_count(),
            surfaces = surfaces.len(),
            "Decoded LNAS record"
        );

        let mut fmt = LnasFormat::new(doc.version, geometry, surfaces)?.with_name(doc.name);
        fmt.normalization = doc.normalization;
        Ok(fmt)
    }

    /// Dictionary form of the record.
    pub fn to_dict(&self) -> Result<Value> {
        let geometry = self.geometry();
        let doc = LnasDocument {
            version: self.version.clone(),
            name: self.name.clone(),
            normalization: self.normalization.clone(),
            geometry: GeometryDocument {
                vertices: geometry.vertices().iter().map(|v| [v.x, v.y, v.z]).collect(),
                triangles: geometry.triangles().to_vec(),
            },
            surfaces: self
                .surfaces()
                .iter()
                .map(|(name, indices)| (name.clone(), encode_surface(indices)))
                .collect(),
        };
        Ok(serde_json::to_value(doc)?)
    }

    /// Read a record from a JSON text container.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let dict: Value = serde_json::from_reader(reader)?;
        let fmt = Self::from_dict(&dict)?;
        info!(name = %fmt.name, version = %fmt.version, "Loaded LNAS record");
        Ok(fmt)
    }

    /// Write the record as a JSON text container.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, &self.to_dict()?)?;
        info!(name = %self.name, version = %self.version, "Saved LNAS record");
        Ok(())
    }

    pub fn from_slice(data: &[u8]) -> Result<Self> {
        Self::from_reader(data)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.to_writer(&mut buffer)?;
        Ok(buffer)
    }

    /// Build a record from a binary STL stream.
    ///
    /// Bitwise identical positions share one vertex. Every triangle goes into a
    /// single surface named `name`.
    pub fn from_stl<R: Read>(reader: &mut R, name: &str) -> Result<Self> {
        let mesh = stl::read_stl(reader)?;

        let mut vertices = Vec::new();
        let mut lookup: HashMap<[u32; 3], u32> = HashMap::new();
        let mut triangles = Vec::with_capacity(mesh.triangles.len());
        for tri in &mesh.triangles {
            let mut indices = [0u32; 3];
            for (slot, p) in indices.iter_mut().zip(tri) {
                let key = p.map(f32::to_bits);
                *slot = match lookup.get(&key) {
                    Some(&index) => index,
                    None => {
                        let index = index_count("vertices", vertices.len())?;
                        vertices.push(*p);
                        lookup.insert(key, index);
                        index
                    }
                };
            }
            triangles.push(indices);
        }

        let geometry = Geometry::from_arrays(&vertices, &triangles)?;
        let all: Vec<u32> = (0..index_count("triangles", geometry.triangle_count())?).collect();
        let surfaces = Surfaces::from([(name.to_string(), all)]);
        Ok(LnasFormat::new(CURRENT_VERSION, geometry, surfaces)?.with_name(name))
    }

    /// Export the geometry as binary STL.
    pub fn export_stl<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.geometry().to_stl(writer)
    }
}
