//! Vertex/triangle geometry and its derived quantities.

use std::io::Write;

use nalgebra::{Point3, Vector3};
use tracing::{debug, warn};

use crate::error::{LnasError, Result};
use crate::stl;
use crate::transform::TransformationMatrix;

/// Vertex index triple of a triangle
pub type TriangleIndices = [u32; 3];

/// Indexed triangle geometry.
///
/// Every triangle index is checked against the vertex count on construction and on
/// triangle replacement. Normals, areas and triangle vertices are derived on each
/// call and never cached.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Geometry {
    vertices: Vec<Point3<f32>>,
    triangles: Vec<TriangleIndices>,
}

impl Geometry {
    pub fn new(vertices: Vec<Point3<f32>>, triangles: Vec<TriangleIndices>) -> Result<Self> {
        validate_triangles(&triangles, vertices.len())?;
        Ok(Self { vertices, triangles })
    }

    pub fn from_arrays(vertices: &[[f32; 3]], triangles: &[TriangleIndices]) -> Result<Self> {
        let vertices = vertices.iter().map(|v| Point3::from(*v)).collect();
        Self::new(vertices, triangles.to_vec())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn vertices(&self) -> &[Point3<f32>] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[TriangleIndices] {
        &self.triangles
    }

    /// Mutable access to vertex positions. The vertex count cannot change here.
    pub fn vertices_mut(&mut self) -> &mut [Point3<f32>] {
        &mut self.vertices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Replace the triangle array, keeping vertices.
    pub fn set_triangles(&mut self, triangles: Vec<TriangleIndices>) -> Result<()> {
        validate_triangles(&triangles, self.vertices.len())?;
        self.triangles = triangles;
        Ok(())
    }

    /// Replace the vertex array, keeping triangles.
    pub fn set_vertices(&mut self, vertices: Vec<Point3<f32>>) -> Result<()> {
        validate_triangles(&self.triangles, vertices.len())?;
        self.vertices = vertices;
        Ok(())
    }

    /// Vertex positions of every triangle
    pub fn triangle_vertices(&self) -> Vec<[Point3<f32>; 3]> {
        self.triangles
            .iter()
            .map(|t| {
                [
                    self.vertices[t[0] as usize],
                    self.vertices[t[1] as usize],
                    self.vertices[t[2] as usize],
                ]
            })
            .collect()
    }

    /// Unit normal of every triangle following its winding order.
    ///
    /// Zero-area triangles get a NaN normal; the other triangles are unaffected.
    pub fn normals(&self) -> Vec<Vector3<f32>> {
        self.triangle_vertices()
            .iter()
            .map(|[a, b, c]| (b - a).cross(&(c - a)).normalize())
            .collect()
    }

    /// Area of every triangle
    pub fn areas(&self) -> Vec<f32> {
        self.triangle_vertices()
            .iter()
            .map(|[a, b, c]| 0.5 * (b - a).cross(&(c - a)).norm())
            .collect()
    }

    /// One flag per triangle, true when any of its vertices lies inside the closed
    /// box `[start, end]`.
    ///
    /// Triangles crossing the box without a vertex inside it are reported false.
    pub fn triangles_inside_volume(&self, start: &Point3<f32>, end: &Point3<f32>) -> Vec<bool> {
        let inside: Vec<bool> = self
            .vertices
            .iter()
            .map(|v| (0..3).all(|d| v[d] >= start[d] && v[d] <= end[d]))
            .collect();

        self.triangles
            .iter()
            .map(|t| t.iter().any(|&i| inside[i as usize]))
            .collect()
    }

    /// Transform the vertices in place.
    ///
    /// With `remove_invalid_normals`, triangles whose normal is no longer finite
    /// are dropped; vertices are left untouched. Returns the keep-mask over the
    /// triangles as they were before the call.
    pub fn apply_transformation(
        &mut self,
        transformation: &TransformationMatrix,
        remove_invalid_normals: bool,
    ) -> Vec<bool> {
        let m = transformation.transformation_matrix();
        for v in &mut self.vertices {
            let h = m * v.cast::<f64>().to_homogeneous();
            *v = Point3::new(h.x as f32, h.y as f32, h.z as f32);
        }

        let n_triangles = self.triangles.len();
        if !remove_invalid_normals {
            return vec![true; n_triangles];
        }

        let keep: Vec<bool> = self
            .normals()
            .iter()
            .map(|n| n.iter().all(|c| c.is_finite()))
            .collect();
        let kept = self.retain_triangles(&keep);
        if kept < n_triangles {
            warn!(
                removed = n_triangles - kept,
                "Dropped triangles with invalid normals after transformation"
            );
        }

        keep
    }

    /// Append other geometries, offsetting their triangles by the running vertex count.
    ///
    /// Fails without touching the receiver when the joined vertex count would not
    /// fit in a `u32` index.
    pub fn join(&mut self, others: &[Geometry]) -> Result<()> {
        let total = others.iter().map(|g| g.vertices.len()).sum::<usize>() + self.vertices.len();
        index_count("vertices", total)?;

        for other in others {
            let offset = index_count("vertices", self.vertices.len())?;
            self.vertices.extend_from_slice(&other.vertices);
            self.triangles.extend(
                other
                    .triangles
                    .iter()
                    .map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]),
            );
        }
        debug!(
            joined = others.len(),
            vertices = self.vertices.len(),
            triangles = self.triangles.len(),
            "Joined geometries"
        );
        Ok(())
    }

    /// Combine geometries into a new one, indexing in list order.
    pub fn combine(geometries: &[Geometry]) -> Result<Self> {
        let (first, rest) = geometries.split_first().ok_or(LnasError::EmptyInput)?;
        let mut combined = first.clone();
        combined.join(rest)?;
        Ok(combined)
    }

    /// New geometry holding only the triangles flagged in `keep`, vertices untouched.
    pub fn filter_triangles(&self, keep: &[bool]) -> Result<Self> {
        check_mask(keep, self.triangles.len())?;
        let mut filtered = self.clone();
        filtered.retain_triangles(keep);
        Ok(filtered)
    }

    /// Keeps triangles flagged in `keep`, `keep` must match the triangle count.
    fn retain_triangles(&mut self, keep: &[bool]) -> usize {
        let mut flags = keep.iter();
        self.triangles.retain(|_| flags.next().copied().unwrap_or(false));
        self.triangles.len()
    }

    /// Write the geometry as binary STL with computed normals.
    pub fn to_stl<W: Write>(&self, writer: &mut W) -> Result<()> {
        let triangles: Vec<stl::StlTriangle> = self
            .triangle_vertices()
            .iter()
            .map(|tri| tri.map(|p| [p.x, p.y, p.z]))
            .collect();
        stl::write_stl(writer, &triangles, None)
    }
}

/// Narrow an element count to the `u32` index domain.
pub(crate) fn index_count(what: &'static str, count: usize) -> Result<u32> {
    u32::try_from(count).map_err(|_| LnasError::IndexOverflow { what, count })
}

pub(crate) fn check_mask(keep: &[bool], triangle_count: usize) -> Result<()> {
    if keep.len() != triangle_count {
        return Err(LnasError::MaskLengthMismatch {
            expected: triangle_count,
            got: keep.len(),
        });
    }
    Ok(())
}

fn validate_triangles(triangles: &[TriangleIndices], vertex_count: usize) -> Result<()> {
    for (triangle, t) in triangles.iter().enumerate() {
        if let Some(&index) = t.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(LnasError::VertexIndexOutOfRange {
                triangle,
                index,
                vertex_count,
            });
        }
    }
    Ok(())
}
