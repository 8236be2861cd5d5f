use glam::{DMat3, DMat4, DVec3, DVec4};

use crate::so3::SO3;

/// The special Euclidean group SE(3), the group of 3D rigid transformations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE3 {
    rotation: SO3,
    translation: DVec3,
}

impl SE3 {
    /// The identity transformation.
    pub const IDENTITY: Self = Self {
        rotation: SO3::IDENTITY,
        translation: DVec3::ZERO,
    };

    /// Create a transformation from a rotation and a translation.
    pub fn new(rotation: SO3, translation: DVec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Create a transformation from an axis-angle rotation and a translation.
    pub fn from_axis_angle(axis: DVec3, angle: f64, translation: DVec3) -> Self {
        Self {
            rotation: SO3::from_axis_angle(axis, angle),
            translation,
        }
    }

    /// The rotation component.
    pub fn rotation(&self) -> SO3 {
        self.rotation
    }

    /// The translation component.
    pub fn translation(&self) -> DVec3 {
        self.translation
    }

    /// The inverse transformation.
    pub fn inverse(&self) -> Self {
        let inv_rot = self.rotation.inverse();
        let inv_trans = -(inv_rot * self.translation);
        Self {
            rotation: inv_rot,
            translation: inv_trans,
        }
    }

    /// Compose this transformation with another, `self * other`.
    pub fn compose(&self, other: &SE3) -> Self {
        let new_rotation = self.rotation * other.rotation;
        let new_translation = self.translation + (self.rotation * other.translation);
        Self {
            rotation: new_rotation,
            translation: new_translation,
        }
    }

    /// Apply the transformation to a point.
    pub fn transform_point(&self, p: DVec3) -> DVec3 {
        self.rotation * p + self.translation
    }

    /// Lie algebra -> Lie group: the exponential map of a twist.
    ///
    /// The twist is split into its linear part `v` and its angular part
    /// `omega`; the translation is coupled to the rotation through the
    /// closed-form left Jacobian of SO(3).
    pub fn exp(v: DVec3, omega: DVec3) -> Self {
        let rotation = SO3::exp(omega);
        let translation = left_jacobian(omega) * v;
        Self {
            rotation,
            translation,
        }
    }

    /// Lie group -> Lie algebra: the twist `(v, omega)` of the transformation.
    pub fn log(&self) -> (DVec3, DVec3) {
        let omega = self.rotation.log();
        let v = left_jacobian_inverse(omega) * self.translation;
        (v, omega)
    }

    /// The transformation as a 4x4 homogeneous matrix.
    pub fn as_matrix(&self) -> DMat4 {
        let mut matrix = DMat4::from_mat3(self.rotation.matrix());
        matrix.w_axis = DVec4::new(
            self.translation.x,
            self.translation.y,
            self.translation.z,
            1.0,
        );
        matrix
    }
}

/// The left Jacobian of SO(3), coupling translation and rotation in `exp`.
fn left_jacobian(omega: DVec3) -> DMat3 {
    let theta = omega.length();
    let skew = SO3::hat(omega);
    if theta < 1e-8 {
        return DMat3::IDENTITY + skew * 0.5 + (skew * skew) * (1.0 / 6.0);
    }
    let theta_sq = theta * theta;
    DMat3::IDENTITY
        + skew * ((1.0 - theta.cos()) / theta_sq)
        + (skew * skew) * ((theta - theta.sin()) / (theta_sq * theta))
}

fn left_jacobian_inverse(omega: DVec3) -> DMat3 {
    let theta = omega.length();
    let skew = SO3::hat(omega);
    if theta < 1e-8 {
        return DMat3::IDENTITY - skew * 0.5 + (skew * skew) * (1.0 / 12.0);
    }
    let half = 0.5 * theta;
    let cot = half.cos() / half.sin();
    DMat3::IDENTITY - skew * 0.5 + (skew * skew) * ((1.0 - half * cot) / (theta * theta))
}
