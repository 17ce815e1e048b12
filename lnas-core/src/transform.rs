//! Homogeneous transformation matrices for mesh vertices and normals.

use nalgebra::{DMatrix, Matrix4, Point3, Vector3, Vector4};
use serde::{Deserialize, Serialize};

use crate::error::{LnasError, Result};

/// How a 3D row is lifted into homogeneous coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorKind {
    /// Position, w = 1, translation applies.
    Point,
    /// Direction, w = 0, translation does not apply.
    Vector,
}

impl VectorKind {
    fn homogeneous_w(self) -> f64 {
        match self {
            Self::Point => 1.0,
            Self::Vector => 0.0,
        }
    }
}

/// Builders for the partial 4x4 matrices of the pipeline
pub struct Transformations;

impl Transformations {
    /// Create a translation matrix
    pub fn translation(translation: &Vector3<f64>) -> Matrix4<f64> {
        Matrix4::new_translation(translation)
    }

    /// Rotation around X (radians, right hand rule)
    pub fn rotation_x(angle: f64) -> Matrix4<f64> {
        Matrix4::new_rotation(Vector3::new(angle, 0.0, 0.0))
    }

    /// Rotation around Y (radians, right hand rule)
    pub fn rotation_y(angle: f64) -> Matrix4<f64> {
        Matrix4::new_rotation(Vector3::new(0.0, angle, 0.0))
    }

    /// Rotation around Z (radians, right hand rule)
    pub fn rotation_z(angle: f64) -> Matrix4<f64> {
        Matrix4::new_rotation(Vector3::new(0.0, 0.0, angle))
    }

    /// Combined rotation, composed as Rx * Ry * Rz
    pub fn rotation(angle: &Vector3<f64>) -> Matrix4<f64> {
        let rx = Self::rotation_x(angle.x);
        let ry = Self::rotation_y(angle.y);
        let rz = Self::rotation_z(angle.z);

        rx * ry * rz
    }

    /// Create a per-axis scale matrix
    pub fn scale(scale: &Vector3<f64>) -> Matrix4<f64> {
        Matrix4::new_nonuniform_scaling(scale)
    }

    /// Matrices moving `fixed_point` to the origin and back
    pub fn centering(fixed_point: &Vector3<f64>) -> (Matrix4<f64>, Matrix4<f64>) {
        (
            Matrix4::new_translation(&-fixed_point),
            Matrix4::new_translation(fixed_point),
        )
    }

    /// Angles `(x, y, 0)` whose combined rotation maps the unit normal `n` onto +Z.
    ///
    /// The angles are solved for the `Rx·Ry·Rz` order used by [`Self::rotation`]:
    /// `y = atan2(-nx, nz)` then `x = atan2(ny, hypot(nx, nz))`. Angle sets
    /// computed as `x = atan2(ny, nz)`, `y = atan2(nx, hypot(ny, nz))` assume the
    /// opposite order and do not align `n` here, so such values must be recomputed
    /// rather than reused.
    pub fn rotation_angles_normal_to_z(n: &Vector3<f64>) -> Vector3<f64> {
        // Ry acts first and folds x into z, then Rx folds y into z
        let y_angle = (-n.x).atan2(n.z);
        let xz = (n.x * n.x + n.z * n.z).sqrt();
        let x_angle = n.y.atan2(xz);
        Vector3::new(x_angle, y_angle, 0.0)
    }
}

/// Transformation descriptor: rotation, translation and scale around a fixed point.
///
/// Only the parameters are stored. The 4x4 matrix is rebuilt on every read, so
/// mutating a field is always reflected by the next `apply`.
///
/// Deserializes from a configuration mapping where every key is optional and
/// `rotation` is accepted for `angle`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformationMatrix {
    /// Rotation angle around each axis in radians (right hand rule)
    #[serde(alias = "rotation")]
    pub angle: Vector3<f64>,
    pub translation: Vector3<f64>,
    pub scale: Vector3<f64>,
    /// Reference for rotation and scale, usually the geometry centroid
    pub fixed_point: Vector3<f64>,
}

impl TransformationMatrix {
    pub fn new() -> Self {
        Self {
            angle: Vector3::zeros(),
            translation: Vector3::zeros(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            fixed_point: Vector3::zeros(),
        }
    }

    pub fn with_angle(mut self, angle: [f64; 3]) -> Self {
        self.angle = Vector3::from(angle);
        self
    }

    pub fn with_translation(mut self, translation: [f64; 3]) -> Self {
        self.translation = Vector3::from(translation);
        self
    }

    pub fn with_scale(mut self, scale: [f64; 3]) -> Self {
        self.scale = Vector3::from(scale);
        self
    }

    pub fn with_fixed_point(mut self, fixed_point: [f64; 3]) -> Self {
        self.fixed_point = Vector3::from(fixed_point);
        self
    }

    /// Full transformation matrix.
    ///
    /// First centralize, then scale, rotate, translate and decentralize.
    pub fn transformation_matrix(&self) -> Matrix4<f64> {
        let (go_center, back_center) = Transformations::centering(&self.fixed_point);
        let order = [
            Transformations::scale(&self.scale),
            Transformations::rotation(&self.angle),
            Transformations::translation(&self.translation),
            back_center,
        ];

        order.iter().fold(go_center, |m, o| o * m)
    }

    /// Inverse of [`Self::transformation_matrix`], composed from the inverse of
    /// each partial matrix in reverse order.
    pub fn inverse_matrix(&self) -> Result<Matrix4<f64>> {
        if self.scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(LnasError::NonInvertible {
                scale: [self.scale.x, self.scale.y, self.scale.z],
            });
        }

        let (go_center, back_center) = Transformations::centering(&self.fixed_point);
        let inv_scale = Transformations::scale(&self.scale.map(|s| 1.0 / s));
        // Rotations are orthonormal
        let inv_rotation = Transformations::rotation(&self.angle).transpose();
        let inv_translation = Transformations::translation(&-self.translation);

        let order = [inv_translation, inv_rotation, inv_scale, back_center];
        Ok(order.iter().fold(go_center, |m, o| o * m))
    }

    fn matrix(&self, invert: bool) -> Result<Matrix4<f64>> {
        if invert {
            self.inverse_matrix()
        } else {
            Ok(self.transformation_matrix())
        }
    }

    /// Apply the transformation to an N x 3 batch.
    ///
    /// Fails with [`LnasError::InvalidDimension`] when the batch is not 3D.
    pub fn apply(&self, array: &DMatrix<f64>, kind: VectorKind, invert: bool) -> Result<DMatrix<f64>> {
        if array.ncols() != 3 {
            return Err(LnasError::InvalidDimension {
                columns: array.ncols(),
            });
        }

        let m = self.matrix(invert)?;
        let w = kind.homogeneous_w();
        let mut out = DMatrix::zeros(array.nrows(), 3);
        for (i, row) in array.row_iter().enumerate() {
            let h = m * Vector4::new(row[0], row[1], row[2], w);
            out[(i, 0)] = h.x;
            out[(i, 1)] = h.y;
            out[(i, 2)] = h.z;
        }

        Ok(out)
    }

    pub fn apply_points(&self, points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        let m = self.transformation_matrix();
        points
            .iter()
            .map(|p| Point3::from((m * p.to_homogeneous()).xyz()))
            .collect()
    }

    pub fn apply_vectors(&self, vectors: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
        let m = self.transformation_matrix();
        vectors.iter().map(|v| (m * v.to_homogeneous()).xyz()).collect()
    }
}

impl Default for TransformationMatrix {
    fn default() -> Self {
        Self::new()
    }
}
