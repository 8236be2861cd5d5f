use glam::{DMat3, DQuat, DVec3};

/// The special orthogonal group SO(3), the group of 3D rotations.
///
/// Backed by a unit quaternion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SO3 {
    /// The unit quaternion representing the rotation.
    pub q: DQuat,
}

impl SO3 {
    /// The identity rotation.
    pub const IDENTITY: Self = Self { q: DQuat::IDENTITY };

    /// Create a rotation from a quaternion, normalizing it.
    pub fn from_quaternion(q: DQuat) -> Self {
        Self { q: q.normalize() }
    }

    /// Create a rotation from a rotation matrix.
    pub fn from_matrix(mat: &DMat3) -> Self {
        Self {
            q: DQuat::from_mat3(mat),
        }
    }

    /// Create a rotation of `angle` radians around `axis`.
    pub fn from_axis_angle(axis: DVec3, angle: f64) -> Self {
        Self {
            q: DQuat::from_axis_angle(axis.normalize(), angle),
        }
    }

    /// The rotation as a 3x3 matrix.
    pub fn matrix(&self) -> DMat3 {
        DMat3::from_quat(self.q)
    }

    /// The inverse rotation.
    pub fn inverse(&self) -> Self {
        Self {
            q: self.q.inverse(),
        }
    }

    /// Lie algebra -> Lie group: the exponential map of an axis-angle vector.
    pub fn exp(v: DVec3) -> Self {
        let theta = v.length();
        if theta < 1e-12 {
            // first order expansion of the quaternion exponential
            return Self {
                q: DQuat::from_xyzw(0.5 * v.x, 0.5 * v.y, 0.5 * v.z, 1.0).normalize(),
            };
        }
        let half = 0.5 * theta;
        let s = half.sin() / theta;
        Self {
            q: DQuat::from_xyzw(s * v.x, s * v.y, s * v.z, half.cos()),
        }
    }

    /// Lie group -> Lie algebra: the rotation as an axis-angle vector.
    pub fn log(&self) -> DVec3 {
        let q = if self.q.w < 0.0 { -self.q } else { self.q };
        let vec = DVec3::new(q.x, q.y, q.z);
        let norm = vec.length();
        if norm < 1e-12 {
            return vec * 2.0;
        }
        let angle = 2.0 * norm.atan2(q.w);
        vec * (angle / norm)
    }

    /// The rotation angle in radians.
    pub fn angle(&self) -> f64 {
        self.log().length()
    }

    /// Vector space -> Lie algebra: the skew-symmetric matrix of a vector.
    pub fn hat(v: DVec3) -> DMat3 {
        DMat3::from_cols(
            DVec3::new(0.0, v.z, -v.y),
            DVec3::new(-v.z, 0.0, v.x),
            DVec3::new(v.y, -v.x, 0.0),
        )
    }
}

impl std::ops::Mul for SO3 {
    type Output = SO3;

    fn mul(self, rhs: Self) -> Self::Output {
        Self { q: self.q * rhs.q }
    }
}

impl std::ops::Mul<DVec3> for SO3 {
    type Output = DVec3;

    fn mul(self, rhs: DVec3) -> Self::Output {
        self.q * rhs
    }
}
