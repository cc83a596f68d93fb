use std::ops::Mul;

use glam::{Affine3A, Mat3, Mat4, Vec3};

use crate::assets::{AssetGraph, BlockId, Compound, Value};

/// Rigid transform with uniform scale.
///
/// This is the transform model of the asset format: a 3x3 rotation, a
/// translation and a single scale factor. Composition keeps the three parts
/// separate so bounds can be scaled by `|scale|` without decomposing a matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub rotation: Mat3,
    pub translation: Vec3,
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        rotation: Mat3::IDENTITY,
        translation: Vec3::ZERO,
        scale: 1.0,
    };

    #[must_use]
    pub const fn new(rotation: Mat3, translation: Vec3, scale: f32) -> Self {
        Self { rotation, translation, scale }
    }

    #[must_use]
    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Self::IDENTITY }
    }

    /// `true` if the compound carries the three transform fields.
    #[must_use]
    pub fn can_construct(fields: &Compound) -> bool {
        fields.contains("Rotation") && fields.contains("Translation") && fields.contains("Scale")
    }

    /// Reads `Rotation`, `Translation` and `Scale`.
    ///
    /// Newer files nest them inside a `Skin Transform` compound; both layouts
    /// are accepted. Missing rotation or scale read as identity.
    #[must_use]
    pub fn from_compound(fields: &Compound) -> Self {
        let fields = fields.get_compound("Skin Transform").unwrap_or(fields);
        Self {
            rotation: fields.get_mat3("Rotation").unwrap_or(Mat3::IDENTITY),
            translation: fields.get_vec3("Translation"),
            scale: fields.get("Scale").and_then(Value::as_float).unwrap_or(1.0),
        }
    }

    /// Local transform of a block, identity if the block is missing.
    #[must_use]
    pub fn from_block(graph: &dyn AssetGraph, block: BlockId) -> Self {
        graph.fields(block).map_or(Self::IDENTITY, Self::from_compound)
    }

    /// Applies rotation and scale only.
    #[inline]
    #[must_use]
    pub fn rotate(&self, v: Vec3) -> Vec3 {
        self.rotation * v * self.scale
    }

    /// Exact inverse for a rigid transform with non-zero scale.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.transpose();
        let scale = if self.scale == 0.0 { 0.0 } else { 1.0 / self.scale };
        Self {
            rotation,
            translation: -(rotation * self.translation) * scale,
            scale,
        }
    }

    #[must_use]
    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_mat3_translation(self.rotation * self.scale, self.translation)
    }

    /// Column-major matrix for upload.
    #[must_use]
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from(self.to_affine())
    }
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        Transform {
            rotation: self.rotation * rhs.rotation,
            translation: self.translation + self.rotation * rhs.translation * self.scale,
            scale: self.scale * rhs.scale,
        }
    }
}

impl Mul<Vec3> for Transform {
    type Output = Vec3;

    #[inline]
    fn mul(self, v: Vec3) -> Vec3 {
        self.rotation * v * self.scale + self.translation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::Value;

    #[test]
    fn composition_matches_point_application() {
        let a = Transform::new(Mat3::from_rotation_z(0.7), Vec3::new(1.0, 2.0, 3.0), 2.0);
        let b = Transform::new(Mat3::from_rotation_x(-0.3), Vec3::new(-4.0, 0.5, 1.0), 0.5);
        let p = Vec3::new(0.3, -1.2, 5.0);

        let lhs = (a * b) * p;
        let rhs = a * (b * p);
        assert!(lhs.abs_diff_eq(rhs, 1e-4));
    }

    #[test]
    fn inverse_round_trips() {
        let t = Transform::new(Mat3::from_rotation_y(1.1), Vec3::new(3.0, -2.0, 0.5), 4.0);
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert!((t.inverse() * (t * p)).abs_diff_eq(p, 1e-4));
        assert!(t.to_affine().transform_point3(p).abs_diff_eq(t * p, 1e-4));
    }

    #[test]
    fn nested_skin_transform_is_read() {
        let inner = Compound::new()
            .with("Translation", Value::Vector3(Vec3::X))
            .with("Scale", Value::Float(2.0));
        let outer = Compound::new().with("Skin Transform", Value::Compound(inner));

        let t = Transform::from_compound(&outer);
        assert_eq!(t.translation, Vec3::X);
        assert_eq!(t.scale, 2.0);
        assert_eq!(t.rotation, Mat3::IDENTITY);
    }
}
