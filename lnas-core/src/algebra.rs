//! Surface extraction, triangle filtering and record combination.
//!
//! All operations keep vertex, triangle and surface indices consistent. Operations
//! returning a new record deep-copy what they keep; in-place operations leave the
//! receiver untouched when they fail.

use tracing::debug;

use crate::error::{LnasError, Result};
use crate::format::{LnasFormat, Surfaces};
use crate::geometry::{check_mask, index_count, Geometry, TriangleIndices};
use crate::transform::TransformationMatrix;

impl LnasFormat {
    /// Geometry made of the triangles of one surface, in surface order.
    ///
    /// Vertices are copied whole, so triangle indices are not renumbered.
    pub fn geometry_from_surface(&self, name: &str) -> Result<Geometry> {
        let triangles = self.surface_triangles(name)?;
        Geometry::new(self.geometry().vertices().to_vec(), triangles)
    }

    /// Geometry of several surfaces concatenated in the given order, along with
    /// the source triangle index of each of its triangles.
    pub fn geometry_from_list_of_surfaces<S: AsRef<str>>(&self, names: &[S]) -> Result<(Geometry, Vec<u32>)> {
        if names.is_empty() {
            return Err(LnasError::NoSurfaces);
        }

        let mut triangles = Vec::new();
        let mut indices = Vec::new();
        for name in names {
            let name = name.as_ref();
            triangles.extend(self.surface_triangles(name)?);
            indices.extend_from_slice(self.surface(name)?);
        }

        let geometry = Geometry::new(self.geometry().vertices().to_vec(), triangles)?;
        Ok((geometry, indices))
    }

    fn surface_triangles(&self, name: &str) -> Result<Vec<TriangleIndices>> {
        let all = self.geometry().triangles();
        Ok(self.surface(name)?.iter().map(|&i| all[i as usize]).collect())
    }

    /// New record keeping only the triangles flagged in `keep`.
    ///
    /// Vertices are not pruned. Surface entries pointing at dropped triangles are
    /// removed and the others are shifted down by the number of dropped triangles
    /// before them, so each keeps addressing the same geometric triangle.
    pub fn filter_triangles(&self, keep: &[bool]) -> Result<LnasFormat> {
        check_mask(keep, self.geometry().triangle_count())?;

        let geometry = self.geometry().filter_triangles(keep)?;
        let surfaces = remap_surfaces(self.surfaces(), keep)?;

        debug!(
            before = keep.len(),
            after = geometry.triangle_count(),
            surfaces = surfaces.len(),
            "Filtered triangles"
        );

        let mut filtered = self.clone();
        filtered.replace_contents(geometry, surfaces);
        Ok(filtered)
    }

    /// Append other records in place.
    ///
    /// Each appended surface is inserted as `name + suffix`, offset by the triangle
    /// count the receiver had before that record. Fails on a key collision or when
    /// fewer suffixes than records are given; the receiver is unchanged on failure.
    pub fn join<S: AsRef<str>>(&mut self, others: &[LnasFormat], suffixes: Option<&[S]>) -> Result<()> {
        if let Some(suffixes) = suffixes {
            if suffixes.len() < others.len() {
                return Err(LnasError::InsufficientSuffixes {
                    suffixes: suffixes.len(),
                    required: others.len(),
                });
            }
        }

        let total = others.iter().map(|o| o.geometry().triangle_count()).sum::<usize>()
            + self.geometry().triangle_count();
        index_count("triangles", total)?;

        let mut geometry = self.geometry().clone();
        let mut surfaces = self.surfaces().clone();
        for (i, other) in others.iter().enumerate() {
            let suffix = suffixes.map_or("", |s| s[i].as_ref());
            let offset = index_count("triangles", geometry.triangle_count())?;
            for (name, indices) in other.surfaces() {
                let key = format!("{name}{suffix}");
                if surfaces.contains_key(&key) {
                    return Err(LnasError::SurfaceCollision { name: key });
                }
                surfaces.insert(key, indices.iter().map(|idx| idx + offset).collect());
            }
            geometry.join(std::slice::from_ref(other.geometry()))?;
        }

        debug!(
            appended = others.len(),
            triangles = geometry.triangle_count(),
            surfaces = surfaces.len(),
            "Joined records"
        );
        self.replace_contents(geometry, surfaces);
        Ok(())
    }

    /// Transform the geometry in place.
    ///
    /// Triangles dropped for invalid normals are also dropped from surfaces, with
    /// the same renumbering as [`Self::filter_triangles`]. The record is unchanged
    /// on failure.
    pub fn apply_transformation(
        &mut self,
        transformation: &TransformationMatrix,
        remove_invalid_normals: bool,
    ) -> Result<()> {
        let mut geometry = self.geometry().clone();
        let keep = geometry.apply_transformation(transformation, remove_invalid_normals);

        let surfaces = if keep.iter().all(|&k| k) {
            self.surfaces().clone()
        } else {
            remap_surfaces(self.surfaces(), &keep)?
        };
        self.replace_contents(geometry, surfaces);
        Ok(())
    }
}

/// Renumber surfaces after dropping the triangles not flagged in `keep`.
fn remap_surfaces(surfaces: &Surfaces, keep: &[bool]) -> Result<Surfaces> {
    index_count("triangles", keep.len())?;

    // New index of each source triangle, None when dropped
    let mut next = 0u32;
    let remap: Vec<Option<u32>> = keep
        .iter()
        .map(|&k| {
            k.then(|| {
                next += 1;
                next - 1
            })
        })
        .collect();

    Ok(surfaces
        .iter()
        .map(|(name, indices)| {
            let filtered = indices.iter().filter_map(|&i| remap[i as usize]).collect();
            (name.clone(), filtered)
        })
        .collect())
}

/// Combine records into a new one, indexing in list order.
///
/// The first record seeds version, name and normalization. Suffix `i` is appended
/// to the surface names of record `i`.
pub fn combine_lnas<S: AsRef<str>>(records: &[LnasFormat], suffixes: Option<&[S]>) -> Result<LnasFormat> {
    let (first, rest) = records.split_first().ok_or(LnasError::EmptyInput)?;
    if let Some(suffixes) = suffixes {
        if suffixes.len() < records.len() {
            return Err(LnasError::InsufficientSuffixes {
                suffixes: suffixes.len(),
                required: records.len(),
            });
        }
    }

    let mut combined = first.clone();
    if let Some(suffixes) = suffixes {
        let suffix = suffixes[0].as_ref();
        let renamed = first
            .surfaces()
            .iter()
            .map(|(name, indices)| (format!("{name}{suffix}"), indices.clone()))
            .collect();
        combined.replace_contents(first.geometry().clone(), renamed);
    }

    combined.join(rest, suffixes.map(|s| &s[1..]))?;
    Ok(combined)
}
