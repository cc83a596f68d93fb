use std::ops::{BitOr, BitOrAssign, Mul};

use glam::Vec3;

use super::transform::Transform;
use crate::assets::Compound;

/// Bounding sphere. A negative radius marks an empty sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Default for BoundSphere {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl BoundSphere {
    pub const EMPTY: Self = Self { center: Vec3::ZERO, radius: -1.0 };

    #[must_use]
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Sphere around a point set: mean center, farthest-point radius.
    ///
    /// Not the minimal enclosing sphere. An empty set yields
    /// [`BoundSphere::EMPTY`].
    #[must_use]
    pub fn from_points(points: &[Vec3]) -> Self {
        if points.is_empty() {
            return Self::EMPTY;
        }

        let center = points.iter().copied().sum::<Vec3>() / points.len() as f32;
        let radius_sq = points
            .iter()
            .map(|p| center.distance_squared(*p))
            .fold(0.0_f32, f32::max);

        Self { center, radius: radius_sq.sqrt() }
    }

    /// Reads `Center` / `Radius`, from a nested `Bounding Sphere` if present.
    #[must_use]
    pub fn from_compound(fields: &Compound) -> Self {
        let fields = fields.get_compound("Bounding Sphere").unwrap_or(fields);
        Self {
            center: fields.get_vec3("Center"),
            radius: fields.get_f32("Radius"),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.radius < 0.0
    }

    /// Moves the sphere by `t`.
    pub fn apply(&mut self, t: &Transform) -> &mut Self {
        self.center = *t * self.center;
        self.radius *= t.scale.abs();
        self
    }

    /// Undoes [`apply`](Self::apply) for the same transform.
    pub fn apply_inv(&mut self, t: &Transform) -> &mut Self {
        self.center = t.rotation.transpose() * (self.center - t.translation) / t.scale;
        self.radius /= t.scale.abs();
        self
    }

    #[must_use]
    pub fn transformed(mut self, t: &Transform) -> Self {
        self.apply(t);
        self
    }
}

impl BitOrAssign for BoundSphere {
    fn bitor_assign(&mut self, o: Self) {
        if o.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = o;
            return;
        }

        let d = self.center.distance(o.center);

        if self.radius >= d + o.radius {
            return;
        }
        if o.radius >= d + self.radius {
            *self = o;
            return;
        }

        self.radius = self.radius.max(o.radius) + d / 2.0;
        self.center = (self.center + o.center) / 2.0;
    }
}

impl BitOr for BoundSphere {
    type Output = Self;

    fn bitor(mut self, rhs: Self) -> Self {
        self |= rhs;
        self
    }
}

impl Mul<BoundSphere> for Transform {
    type Output = BoundSphere;

    fn mul(self, rhs: BoundSphere) -> BoundSphere {
        rhs.transformed(&self)
    }
}
