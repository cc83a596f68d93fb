//! Transform tests
//!
//! Tests for:
//! - Reading transforms from blocks and compounds
//! - Composition, inverse and point application
//! - Matrix conversion for upload

use glam::{Mat3, Mat4, Vec3};
use nifview::assets::{Block, BlockGraph, BlockId, Compound, FileVersion, Value};
use nifview::scene::Transform;
use std::f32::consts::FRAC_PI_2;

// ============================================================================
// Helper
// ============================================================================

const EPSILON: f32 = 1e-5;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn vec3_approx(a: Vec3, b: Vec3) -> bool {
    a.abs_diff_eq(b, EPSILON)
}

fn sample() -> Transform {
    Transform::new(Mat3::from_rotation_z(FRAC_PI_2), Vec3::new(1.0, 2.0, 3.0), 2.0)
}

// ============================================================================
// Reading
// ============================================================================

#[test]
fn reads_node_fields() {
    let mut g = BlockGraph::new(FileVersion::new(0x1402_0007, 12, 83));
    let b = g.add(
        Block::new("NiNode")
            .with("Rotation", Value::Matrix33(Mat3::from_rotation_x(0.25)))
            .with("Translation", Value::Vector3(Vec3::new(4.0, 5.0, 6.0)))
            .with("Scale", Value::Float(0.5)),
    );

    let t = Transform::from_block(&g, b);
    assert!(t.rotation.abs_diff_eq(Mat3::from_rotation_x(0.25), EPSILON));
    assert!(vec3_approx(t.translation, Vec3::new(4.0, 5.0, 6.0)));
    assert!(approx_eq(t.scale, 0.5));
}

#[test]
fn missing_block_is_identity() {
    let g = BlockGraph::new(FileVersion::default());
    assert_eq!(Transform::from_block(&g, BlockId(42)), Transform::IDENTITY);
}

#[test]
fn missing_scale_reads_as_one() {
    let c = Compound::new().with("Translation", Value::Vector3(Vec3::ONE));
    let t = Transform::from_compound(&c);
    assert!(approx_eq(t.scale, 1.0));
    assert!(!Transform::can_construct(&c));

    let full = c
        .with("Rotation", Value::Matrix33(Mat3::IDENTITY))
        .with("Scale", Value::Float(3.0));
    assert!(Transform::can_construct(&full));
}

// ============================================================================
// Operations
// ============================================================================

#[test]
fn point_application_rotates_scales_then_translates() {
    let p = sample() * Vec3::X;
    assert!(vec3_approx(p, Vec3::new(1.0, 4.0, 3.0)));
    assert!(vec3_approx(sample().rotate(Vec3::X), Vec3::new(0.0, 2.0, 0.0)));
}

#[test]
fn identity_is_neutral() {
    let t = sample();
    assert_eq!(Transform::IDENTITY * t, t);
    assert_eq!(t * Transform::IDENTITY, t);
    assert_eq!(Transform::default(), Transform::IDENTITY);
}

#[test]
fn inverse_composes_to_identity() {
    let t = sample();
    let i = t * t.inverse();
    assert!(i.rotation.abs_diff_eq(Mat3::IDENTITY, EPSILON));
    assert!(vec3_approx(i.translation, Vec3::ZERO));
    assert!(approx_eq(i.scale, 1.0));
}

#[test]
fn zero_scale_inverse_stays_finite() {
    let t = Transform::new(Mat3::IDENTITY, Vec3::ONE, 0.0);
    let i = t.inverse();
    assert!(i.translation.is_finite());
    assert!(approx_eq(i.scale, 0.0));
}

#[test]
fn translation_helper() {
    let t = Transform::from_translation(Vec3::new(0.0, 0.0, -7.0));
    assert!(vec3_approx(t * Vec3::ZERO, Vec3::new(0.0, 0.0, -7.0)));
    assert_eq!(t.rotation, Mat3::IDENTITY);
}

// ============================================================================
// Matrices
// ============================================================================

#[test]
fn mat4_matches_point_application() {
    let t = sample();
    let m: Mat4 = t.to_mat4();
    for p in [Vec3::ZERO, Vec3::X, Vec3::new(-2.0, 0.5, 9.0)] {
        assert!(m.transform_point3(p).abs_diff_eq(t * p, 1e-4));
    }
}
