//! Pinhole camera model for back-projection and re-projection.

use glam::DVec3;

/// Pinhole camera intrinsics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinholeIntrinsics {
    /// Focal length along x in pixels.
    pub fx: f64,
    /// Focal length along y in pixels.
    pub fy: f64,
    /// Principal point x coordinate in pixels.
    pub cx: f64,
    /// Principal point y coordinate in pixels.
    pub cy: f64,
}

impl PinholeIntrinsics {
    /// Create intrinsics from focal lengths and principal point.
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// The intrinsics of an image scaled by `factor`, e.g. `0.5` for the
    /// next-coarser pyramid octave. The homogeneous normalization of the
    /// camera matrix is unaffected.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            fx: self.fx * factor,
            fy: self.fy * factor,
            cx: self.cx * factor,
            cy: self.cy * factor,
        }
    }

    /// Project a camera-frame point to pixel coordinates.
    ///
    /// The caller must ensure `p.z` is positive.
    #[inline]
    pub fn project(&self, p: DVec3) -> (f64, f64) {
        let inv_z = 1.0 / p.z;
        (
            self.fx * p.x * inv_z + self.cx,
            self.fy * p.y * inv_z + self.cy,
        )
    }

    /// Back-project a pixel with measured depth to a camera-frame point.
    #[inline]
    pub fn backproject(&self, u: f64, v: f64, depth: f64) -> DVec3 {
        DVec3::new(
            (u - self.cx) / self.fx * depth,
            (v - self.cy) / self.fy * depth,
            depth,
        )
    }
}
