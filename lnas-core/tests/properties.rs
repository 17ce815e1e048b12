//! Property-based tests for the transformation pipeline, mesh algebra and codecs.
//!
//! Run with: cargo test -p lnas-core --test properties

use std::io::Cursor;

use lnas_core::stl::{read_stl, stl_binary, StlTriangle};
use lnas_core::{combine_lnas, Geometry, LnasFormat, Surfaces, TransformationMatrix, VectorKind};
use nalgebra::DMatrix;
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

/// Transformation with non-degenerate scale on every axis.
fn arb_transformation() -> impl Strategy<Value = TransformationMatrix> {
    (
        prop::array::uniform3(-3.2..3.2f64),
        prop::array::uniform3(-50.0..50.0f64),
        prop::array::uniform3(0.1..10.0f64),
        prop::array::uniform3(-20.0..20.0f64),
    )
        .prop_map(|(angle, translation, scale, fixed_point)| {
            TransformationMatrix::new()
                .with_angle(angle)
                .with_translation(translation)
                .with_scale(scale)
                .with_fixed_point(fixed_point)
        })
}

/// Rotation and translation only.
fn arb_rigid() -> impl Strategy<Value = TransformationMatrix> {
    (
        prop::array::uniform3(-3.2..3.2f64),
        prop::array::uniform3(-50.0..50.0f64),
    )
        .prop_map(|(angle, translation)| {
            TransformationMatrix::new()
                .with_angle(angle)
                .with_translation(translation)
        })
}

fn arb_batch() -> impl Strategy<Value = DMatrix<f64>> {
    prop::collection::vec(prop::array::uniform3(-100.0..100.0f64), 1..30).prop_map(|rows| {
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        DMatrix::from_row_slice(rows.len(), 3, &flat)
    })
}

/// Coordinate on a 1/64 grid, exact through any decimal text encoding.
fn arb_coordinate() -> impl Strategy<Value = f32> {
    (-640i32..640).prop_map(|v| v as f32 / 64.0)
}

/// Record with random valid triangles and two random surfaces over them.
fn arb_record() -> impl Strategy<Value = LnasFormat> {
    (3u32..20)
        .prop_flat_map(|n_vertices| {
            let vertices = prop::collection::vec(prop::array::uniform3(arb_coordinate()), n_vertices as usize);
            let triangles = prop::collection::vec(prop::array::uniform3(0..n_vertices), 1..40);
            (vertices, triangles)
        })
        .prop_flat_map(|(vertices, triangles)| {
            let surface = prop::collection::vec(0..triangles.len() as u32, 0..20);
            (Just(vertices), Just(triangles), surface.clone(), surface)
        })
        .prop_map(|(vertices, triangles, a, b)| {
            let geometry = Geometry::from_arrays(&vertices, &triangles).unwrap();
            let surfaces = Surfaces::from([("a".to_string(), a), ("b".to_string(), b)]);
            LnasFormat::new("v0.5.0", geometry, surfaces).unwrap()
        })
}

fn arb_stl_batch() -> impl Strategy<Value = (Vec<StlTriangle>, Vec<[f32; 3]>)> {
    (1usize..30).prop_flat_map(|n| {
        let triangle = prop::array::uniform3(prop::array::uniform3(-1.0e3..1.0e3f32));
        let normal = prop::array::uniform3(-1.0..1.0f32);
        (prop::collection::vec(triangle, n), prop::collection::vec(normal, n))
    })
}

fn arb_record_with_mask() -> impl Strategy<Value = (LnasFormat, Vec<bool>)> {
    arb_record().prop_flat_map(|record| {
        let n = record.geometry().triangle_count();
        (Just(record), prop::collection::vec(any::<bool>(), n))
    })
}

// =============================================================================
// Property Tests: Transformations
// =============================================================================

proptest! {
    /// Applying the inverse after the forward transformation restores the input.
    #[test]
    fn inverse_undoes_transformation(t in arb_transformation(), batch in arb_batch()) {
        for kind in [VectorKind::Point, VectorKind::Vector] {
            let forward = t.apply(&batch, kind, false).unwrap();
            let back = t.apply(&forward, kind, true).unwrap();
            prop_assert!((back - &batch).amax() < 1e-6);
        }
    }

    /// Inverse matrix composed analytically agrees with numeric inversion.
    #[test]
    fn inverse_matrix_is_inverse(t in arb_transformation()) {
        let product = t.transformation_matrix() * t.inverse_matrix().unwrap();
        prop_assert!((product - nalgebra::Matrix4::identity()).amax() < 1e-9);
    }

    /// Rigid motions preserve triangle areas.
    #[test]
    fn rigid_transformation_preserves_areas(t in arb_rigid(), record in arb_record()) {
        let mut geometry = record.geometry().clone();
        let before = geometry.areas();
        geometry.apply_transformation(&t, false);
        for (a, b) in geometry.areas().iter().zip(&before) {
            prop_assert!((a - b).abs() < 1e-2, "area {} changed to {}", b, a);
        }
    }
}

// =============================================================================
// Property Tests: Mesh algebra
// =============================================================================

proptest! {
    /// Filtering keeps every surviving surface pointing at the same triangles.
    #[test]
    fn filtering_keeps_surface_triangles((record, keep) in arb_record_with_mask()) {
        let filtered = record.filter_triangles(&keep).unwrap();
        let kept = keep.iter().filter(|&&k| k).count();
        prop_assert_eq!(filtered.geometry().triangle_count(), kept);
        prop_assert_eq!(filtered.geometry().vertex_count(), record.geometry().vertex_count());

        let old_triangles = record.geometry().triangle_vertices();
        let new_triangles = filtered.geometry().triangle_vertices();
        for (name, indices) in record.surfaces() {
            let new_indices = filtered.surface(name).unwrap();
            prop_assert!(new_indices.iter().all(|&i| (i as usize) < kept));

            let expected: Vec<_> = indices
                .iter()
                .filter(|&&i| keep[i as usize])
                .map(|&i| old_triangles[i as usize])
                .collect();
            let actual: Vec<_> = new_indices.iter().map(|&i| new_triangles[i as usize]).collect();
            prop_assert_eq!(actual, expected);
        }
    }

    /// Combining shifts vertex indices and surface indices by the preceding counts.
    #[test]
    fn combine_offsets_by_prior_counts(records in prop::collection::vec(arb_record(), 1..4)) {
        let suffixes: Vec<String> = (0..records.len()).map(|i| format!("_{i}")).collect();
        let combined = combine_lnas(&records, Some(&suffixes[..])).unwrap();

        let total_vertices: usize = records.iter().map(|r| r.geometry().vertex_count()).sum();
        prop_assert_eq!(combined.geometry().vertex_count(), total_vertices);

        let mut vertex_offset = 0u32;
        let mut triangle_offset = 0u32;
        for (i, record) in records.iter().enumerate() {
            for (name, indices) in record.surfaces() {
                let shifted: Vec<u32> = indices.iter().map(|idx| idx + triangle_offset).collect();
                prop_assert_eq!(combined.surface(&format!("{name}_{i}")).unwrap(), &shifted[..]);
            }
            for (j, t) in record.geometry().triangles().iter().enumerate() {
                let joined = combined.geometry().triangles()[triangle_offset as usize + j];
                prop_assert_eq!(joined, t.map(|v| v + vertex_offset));
            }
            vertex_offset += record.geometry().vertex_count() as u32;
            triangle_offset += record.geometry().triangle_count() as u32;
        }
    }
}

// =============================================================================
// Property Tests: Codecs
// =============================================================================

proptest! {
    /// Dictionary encoding loses nothing, surface order included.
    #[test]
    fn lnas_dict_roundtrip(record in arb_record()) {
        let dict = record.to_dict().unwrap();
        let loaded = LnasFormat::from_dict(&dict).unwrap();
        prop_assert_eq!(&loaded, &record);
        prop_assert_eq!(loaded.surface_names(), record.surface_names());
        prop_assert_eq!(loaded.to_dict().unwrap(), dict);
    }

    /// Binary STL keeps triangles and normals bit for bit.
    #[test]
    fn stl_roundtrip((triangles, normals) in arb_stl_batch()) {
        let buffer = stl_binary(&triangles, Some(&normals)).unwrap();
        let mesh = read_stl(&mut Cursor::new(buffer)).unwrap();
        prop_assert_eq!(mesh.triangles, triangles);
        prop_assert_eq!(mesh.normals, normals);
    }

    /// Exporting a record to STL and reading it back keeps every triangle in place.
    #[test]
    fn stl_export_keeps_triangle_positions(record in arb_record()) {
        let mut buffer = Vec::new();
        record.export_stl(&mut buffer).unwrap();
        let reloaded = LnasFormat::from_stl(&mut Cursor::new(buffer), "mesh").unwrap();

        prop_assert!(reloaded.geometry().vertex_count() <= record.geometry().vertex_count());
        prop_assert_eq!(reloaded.geometry().triangle_vertices(), record.geometry().triangle_vertices());
        prop_assert_eq!(reloaded.surface("mesh").unwrap().len(), record.geometry().triangle_count());
    }
}
