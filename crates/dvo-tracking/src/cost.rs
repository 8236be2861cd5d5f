//! The photometric cost consumed by the alignment optimizers.
//!
//! The optimizers only depend on the [`CostFunction`] contract: evaluate
//! residuals and Jacobians at the current pose model, compose incremental
//! updates onto it, and snapshot/restore it exactly for step rejection.

use dvo_image::interpolation::bilinear_sample;
use dvo_image::Image;
use dvo_lie::SE3;
use glam::DVec3;
use nalgebra::Vector6;

use crate::camera::PinholeIntrinsics;
use crate::error::TrackingError;
use crate::keyframe::RgbdKeyframe;

/// Points closer than this are considered behind the camera.
const MIN_DEPTH: f64 = 1e-6;

/// The cost model contract required by the alignment optimizers.
///
/// The pose update convention is the left-multiplicative retraction
/// `T ← exp(ξ̂)·T` with the twist ordered `[v, ω]` (translation first).
pub trait CostFunction {
    /// The pose model type; cloned for snapshot/restore.
    type Model: Clone;

    /// Evaluate the residuals and Jacobians of one pyramid octave at the
    /// current model.
    ///
    /// Samples that fail the visibility test are dropped, so the output
    /// length can shrink from call to call. Implementations must clear the
    /// output buffers before appending.
    fn evaluate(
        &self,
        residuals: &mut Vec<f64>,
        jacobians: &mut Vec<Vector6<f64>>,
        octave: usize,
    ) -> Result<(), TrackingError>;

    /// Compose a small parameter update onto the model via the retraction.
    fn update(&mut self, delta: &Vector6<f64>);

    /// Snapshot the current model.
    fn model(&self) -> Self::Model;

    /// Restore a previously snapshotted model exactly.
    fn set_model(&mut self, model: Self::Model);
}

/// The dense photometric cost between a keyframe and a live frame.
///
/// Each reference sample is warped by the current relative pose, projected
/// through the octave intrinsics and compared against the bilinearly sampled
/// live intensity.
pub struct PhotometricCost<'a> {
    keyframe: &'a RgbdKeyframe,
    live: &'a [Image<f32, 1>],
    model: SE3,
}

impl<'a> PhotometricCost<'a> {
    /// Create a cost function with an identity initial pose.
    ///
    /// # Arguments
    ///
    /// * `keyframe` - The reference keyframe.
    /// * `live` - The live intensity pyramid, one image per keyframe octave.
    ///
    /// # Errors
    ///
    /// Returns an error if the pyramid does not match the keyframe octave
    /// count.
    pub fn new(keyframe: &'a RgbdKeyframe, live: &'a [Image<f32, 1>]) -> Result<Self, TrackingError> {
        if live.len() != keyframe.num_octaves() {
            return Err(TrackingError::OctaveCountMismatch {
                expected: keyframe.num_octaves(),
                actual: live.len(),
            });
        }
        Ok(Self {
            keyframe,
            live,
            model: SE3::IDENTITY,
        })
    }
}

impl CostFunction for PhotometricCost<'_> {
    type Model = SE3;

    fn evaluate(
        &self,
        residuals: &mut Vec<f64>,
        jacobians: &mut Vec<Vector6<f64>>,
        octave: usize,
    ) -> Result<(), TrackingError> {
        residuals.clear();
        jacobians.clear();

        let refs = self
            .keyframe
            .reference_points(octave)
            .ok_or(TrackingError::OctaveOutOfRange {
                octave,
                octaves: self.keyframe.num_octaves(),
            })?;
        let img = &self.live[octave];
        let k = refs.intrinsics();
        let max_u = (img.width() - 1) as f64;
        let max_v = (img.height() - 1) as f64;

        for point in refs.points() {
            let warped = self.model.transform_point(point.position);
            if warped.z < MIN_DEPTH {
                continue;
            }
            let (u, v) = k.project(warped);
            if !(u >= 0.0 && v >= 0.0 && u <= max_u && v <= max_v) {
                continue;
            }
            let live_intensity = bilinear_sample(img, u as f32, v as f32);
            residuals.push((live_intensity - point.intensity) as f64);
            jacobians.push(photometric_jacobian(&k, warped, point.gradient));
        }

        Ok(())
    }

    fn update(&mut self, delta: &Vector6<f64>) {
        let v = DVec3::new(delta[0], delta[1], delta[2]);
        let omega = DVec3::new(delta[3], delta[4], delta[5]);
        self.model = SE3::exp(v, omega).compose(&self.model);
    }

    fn model(&self) -> SE3 {
        self.model
    }

    fn set_model(&mut self, model: SE3) {
        self.model = model;
    }
}

/// The photometric Jacobian row of one sample with respect to the twist
/// `[v, ω]` under the left-multiplicative perturbation.
///
/// Chains the stored image gradient through the pinhole projection Jacobian
/// at the warped point `p`: with `g = ∇I·∂π/∂p`, the row is `[g, p × g]`.
pub(crate) fn photometric_jacobian(
    k: &PinholeIntrinsics,
    p: DVec3,
    gradient: [f32; 2],
) -> Vector6<f64> {
    let inv_z = 1.0 / p.z;
    let a = gradient[0] as f64 * k.fx * inv_z;
    let b = gradient[1] as f64 * k.fy * inv_z;
    let c = -(a * p.x + b * p.y) * inv_z;
    let g = DVec3::new(a, b, c);
    let rot = p.cross(g);
    Vector6::new(g.x, g.y, g.z, rot.x, rot.y, rot.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyframe::DefaultReferenceFactory;
    use approx::assert_relative_eq;
    use dvo_image::ImageSize;

    fn ramp_scene() -> (RgbdKeyframe, Vec<Image<f32, 1>>) {
        let size = ImageSize {
            width: 32,
            height: 32,
        };
        let data: Vec<f32> = (0..size.height)
            .flat_map(|y| {
                (0..size.width).map(move |x| 0.01 * x as f32 + 0.005 * y as f32)
            })
            .collect();
        let img = Image::new(size, data).unwrap();
        let dep = Image::from_size_val(size, 1.0);

        let k = PinholeIntrinsics::new(50.0, 50.0, 16.0, 16.0);
        let mut keyframe = RgbdKeyframe::new(&DefaultReferenceFactory, k, 1, 0.5);
        keyframe.set_gradient_threshold(0.0);
        keyframe.update(&[img.clone()], &[dep]).unwrap();

        (keyframe, vec![img])
    }

    #[test]
    fn test_zero_residual_at_identity() -> Result<(), TrackingError> {
        let (keyframe, live) = ramp_scene();
        let cost = PhotometricCost::new(&keyframe, &live)?;

        let mut residuals = Vec::new();
        let mut jacobians = Vec::new();
        cost.evaluate(&mut residuals, &mut jacobians, 0)?;

        assert!(!residuals.is_empty());
        assert_eq!(residuals.len(), jacobians.len());
        for r in &residuals {
            assert_relative_eq!(*r, 0.0, epsilon = 1e-5);
        }

        Ok(())
    }

    #[test]
    fn test_samples_drop_outside_bounds() -> Result<(), TrackingError> {
        let (keyframe, live) = ramp_scene();
        let mut cost = PhotometricCost::new(&keyframe, &live)?;

        let mut residuals = Vec::new();
        let mut jacobians = Vec::new();
        cost.evaluate(&mut residuals, &mut jacobians, 0)?;
        let full = residuals.len();

        // a large lateral shift warps part of the reference out of view
        cost.update(&Vector6::new(0.2, 0.0, 0.0, 0.0, 0.0, 0.0));
        cost.evaluate(&mut residuals, &mut jacobians, 0)?;
        assert!(residuals.len() < full);

        Ok(())
    }

    #[test]
    fn test_model_snapshot_roundtrip() -> Result<(), TrackingError> {
        let (keyframe, live) = ramp_scene();
        let mut cost = PhotometricCost::new(&keyframe, &live)?;

        let saved = cost.model();
        cost.update(&Vector6::new(0.01, 0.02, -0.01, 0.001, 0.0, 0.002));
        assert!(cost.model() != saved);

        cost.set_model(saved);
        assert!(cost.model() == saved);

        Ok(())
    }

    #[test]
    fn test_jacobian_matches_finite_differences() -> Result<(), TrackingError> {
        // a single interior reference sample, so the sample survives every
        // perturbation and the residual indices stay aligned
        let size = ImageSize {
            width: 32,
            height: 32,
        };
        let data: Vec<f32> = (0..size.height)
            .flat_map(|y| (0..size.width).map(move |x| 0.01 * x as f32 + 0.005 * y as f32))
            .collect();
        let img = Image::new(size, data).unwrap();
        let mut dep = Image::from_size_val(size, 0.0);
        dep.as_slice_mut()[16 * 32 + 16] = 1.0;

        let k = PinholeIntrinsics::new(50.0, 50.0, 16.0, 16.0);
        let mut keyframe = RgbdKeyframe::new(&DefaultReferenceFactory, k, 1, 0.5);
        keyframe.set_gradient_threshold(0.0);
        keyframe.update(&[img.clone()], &[dep]).unwrap();
        let live = vec![img];

        let cost = PhotometricCost::new(&keyframe, &live)?;
        let mut residuals = Vec::new();
        let mut jacobians = Vec::new();
        cost.evaluate(&mut residuals, &mut jacobians, 0)?;
        assert_eq!(residuals.len(), 1);

        // perturb each twist coordinate and compare the residual change
        // against the analytic row
        let eps = 1e-4;
        let analytic = jacobians[0];
        for d in 0..6 {
            let mut plus = PhotometricCost::new(&keyframe, &live)?;
            let mut delta = Vector6::zeros();
            delta[d] = eps;
            plus.update(&delta);
            let mut r_plus = Vec::new();
            let mut j_plus = Vec::new();
            plus.evaluate(&mut r_plus, &mut j_plus, 0)?;

            let mut minus = PhotometricCost::new(&keyframe, &live)?;
            delta[d] = -eps;
            minus.update(&delta);
            let mut r_minus = Vec::new();
            let mut j_minus = Vec::new();
            minus.evaluate(&mut r_minus, &mut j_minus, 0)?;

            assert_eq!(r_plus.len(), 1);
            assert_eq!(r_minus.len(), 1);
            let numeric = (r_plus[0] - r_minus[0]) / (2.0 * eps);
            assert_relative_eq!(analytic[d], numeric, epsilon = 1e-3, max_relative = 1e-2);
        }

        Ok(())
    }
}
