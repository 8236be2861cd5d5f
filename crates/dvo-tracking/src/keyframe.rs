//! Keyframe reference data for direct alignment.
//!
//! A keyframe holds, per pyramid octave, the fixed set of salient samples the
//! optimizer re-projects on every iteration: back-projected 3D position,
//! reference intensity and the screen-space gradient factor of the
//! photometric Jacobian. The sets are rebuilt only when the keyframe image
//! changes; alignment itself never mutates them.

use dvo_image::gradient::spatial_gradient;
use dvo_image::{Image, ImageSize};
use dvo_lie::SE3;
use glam::DVec3;

use crate::camera::PinholeIntrinsics;
use crate::cost::photometric_jacobian;
use crate::error::TrackingError;
use crate::selection::{GradientThresholdSelection, InformationSelection};

/// One selected reference sample.
#[derive(Debug, Clone, Copy)]
pub struct ReferencePoint {
    /// Back-projected position in the keyframe camera frame.
    pub position: DVec3,
    /// Intensity of the keyframe image at the sample.
    pub intensity: f32,
    /// Intensity gradient `(gx, gy)` at the sample, the precomputed
    /// screen-space factor of the photometric Jacobian.
    pub gradient: [f32; 2],
}

/// The selected reference samples of one pyramid octave together with the
/// intrinsics used to build them.
#[derive(Debug, Clone)]
pub struct ReferencePoints {
    pub(crate) intrinsics: PinholeIntrinsics,
    pub(crate) points: Vec<ReferencePoint>,
}

impl ReferencePoints {
    /// Create an empty container with identity-like intrinsics; the owning
    /// keyframe assigns the per-octave intrinsics.
    pub fn empty() -> Self {
        Self {
            intrinsics: PinholeIntrinsics::new(1.0, 1.0, 0.0, 0.0),
            points: Vec::new(),
        }
    }

    /// The intrinsics of the octave this container was built for.
    pub fn intrinsics(&self) -> PinholeIntrinsics {
        self.intrinsics
    }

    /// The selected samples.
    pub fn points(&self) -> &[ReferencePoint] {
        &self.points
    }

    /// The number of selected samples.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the container holds no samples.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Supplies empty per-octave reference containers to a keyframe.
///
/// Ownership of the created container transfers to the keyframe.
pub trait ReferenceFactory {
    /// Allocate one empty, octave-scoped reference container.
    fn create(&self) -> ReferencePoints;
}

/// The plain factory used when no specialized container is needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultReferenceFactory;

impl ReferenceFactory for DefaultReferenceFactory {
    fn create(&self) -> ReferencePoints {
        ReferencePoints::empty()
    }
}

/// Default fraction of valid pixels kept by the saliency selection.
const DEFAULT_PIXEL_FRACTION: f32 = 0.25;

/// An RGB-D keyframe: world pose, selection configuration and one reference
/// container per pyramid octave.
///
/// Octave 0 is the finest (full) resolution; the intrinsics of octave `i+1`
/// are those of octave `i` scaled by the octave scale factor.
pub struct RgbdKeyframe {
    pose: SE3,
    octaves: Vec<ReferencePoints>,
    gradient_threshold: Option<f32>,
    pixel_fraction: f32,
    use_information_selection: bool,
}

impl RgbdKeyframe {
    /// Create a keyframe with empty reference containers.
    ///
    /// # Arguments
    ///
    /// * `factory` - Supplies one empty container per octave.
    /// * `intrinsics` - Intrinsics of the full-resolution image.
    /// * `num_octaves` - Number of pyramid octaves.
    /// * `octave_scale` - Per-octave intrinsic scale factor, e.g. `0.5`.
    pub fn new(
        factory: &dyn ReferenceFactory,
        intrinsics: PinholeIntrinsics,
        num_octaves: usize,
        octave_scale: f64,
    ) -> Self {
        let mut octaves = Vec::with_capacity(num_octaves);
        let mut k = intrinsics;
        for _ in 0..num_octaves {
            let mut container = factory.create();
            container.intrinsics = k;
            octaves.push(container);
            k = k.scaled(octave_scale);
        }
        Self {
            pose: SE3::IDENTITY,
            octaves,
            gradient_threshold: None,
            pixel_fraction: DEFAULT_PIXEL_FRACTION,
            use_information_selection: false,
        }
    }

    /// The keyframe world pose.
    pub fn pose(&self) -> SE3 {
        self.pose
    }

    /// Set the keyframe world pose.
    pub fn set_pose(&mut self, pose: SE3) {
        self.pose = pose;
    }

    /// The number of pyramid octaves.
    pub fn num_octaves(&self) -> usize {
        self.octaves.len()
    }

    /// The reference container of an octave, `None` if out of range.
    pub fn reference_points(&self, octave: usize) -> Option<&ReferencePoints> {
        self.octaves.get(octave)
    }

    /// Override the derived saliency threshold with a fixed value.
    pub fn set_gradient_threshold(&mut self, threshold: f32) {
        self.gradient_threshold = Some(threshold);
    }

    /// Set the fraction of valid pixels the selection targets, clamped to
    /// `[0, 1]`.
    pub fn set_selection_pixel_percentage(&mut self, fraction: f32) {
        self.pixel_fraction = fraction.clamp(0.0, 1.0);
    }

    /// Enable or disable the degree-of-freedom balanced refinement of the
    /// saliency selection.
    pub fn set_use_information_selection(&mut self, enable: bool) {
        self.use_information_selection = enable;
    }

    /// Rebuild the reference containers from new keyframe images.
    ///
    /// For each octave: compute the intensity gradients, derive the saliency
    /// threshold (fixed override or from the gradient histogram), keep the
    /// pixels with measured depth at or above the threshold, optionally
    /// rebalance them across the pose axes, and back-project the survivors.
    ///
    /// # Arguments
    ///
    /// * `intensity` - Intensity pyramid, one image per octave, octave 0
    ///   finest.
    /// * `depth` - Depth pyramid of matching sizes; non-positive samples are
    ///   treated as unmeasured.
    ///
    /// # Errors
    ///
    /// Returns an error if the pyramids do not match the octave count or
    /// their image sizes disagree.
    pub fn update(
        &mut self,
        intensity: &[Image<f32, 1>],
        depth: &[Image<f32, 1>],
    ) -> Result<(), TrackingError> {
        for pyramid in [intensity, depth] {
            if pyramid.len() != self.octaves.len() {
                return Err(TrackingError::OctaveCountMismatch {
                    expected: self.octaves.len(),
                    actual: pyramid.len(),
                });
            }
        }

        for octave in 0..self.octaves.len() {
            let img = &intensity[octave];
            let dep = &depth[octave];
            if img.size() != dep.size() {
                return Err(TrackingError::SizeMismatch(img.size(), dep.size()));
            }

            let points = self.build_octave(octave, img, dep)?;
            log::debug!(
                "keyframe octave {}: selected {} reference points",
                octave,
                points.len()
            );
            self.octaves[octave].points = points;
        }

        Ok(())
    }

    fn build_octave(
        &self,
        octave: usize,
        img: &Image<f32, 1>,
        dep: &Image<f32, 1>,
    ) -> Result<Vec<ReferencePoint>, TrackingError> {
        let size: ImageSize = img.size();
        let mut gx = Image::zeros(size);
        let mut gy = Image::zeros(size);
        spatial_gradient(img, &mut gx, &mut gy)?;

        let selection = GradientThresholdSelection::new(&gx, &gy, dep)?;
        let num_valid = selection.num_valid();
        if num_valid == 0 {
            return Ok(Vec::new());
        }

        let threshold = match self.gradient_threshold {
            Some(t) => t,
            None => selection.threshold(self.pixel_fraction)?,
        };

        let k = self.octaves[octave].intrinsics;
        let mut points = Vec::new();
        for y in 0..size.height {
            for x in 0..size.width {
                let d = dep.pixel(x, y, 0);
                if d <= 0.0 {
                    continue;
                }
                let gradient = [gx.pixel(x, y, 0), gy.pixel(x, y, 0)];
                if gradient[0].abs() + gradient[1].abs() < threshold {
                    continue;
                }
                points.push(ReferencePoint {
                    position: k.backproject(x as f64, y as f64, d as f64),
                    intensity: img.pixel(x, y, 0),
                    gradient,
                });
            }
        }

        if self.use_information_selection {
            let budget = (self.pixel_fraction as f64 * num_valid as f64) as usize;
            if budget > 0 && points.len() > budget {
                let rows: Vec<[f64; 6]> = points
                    .iter()
                    .map(|p| photometric_jacobian(&k, p.position, p.gradient).into())
                    .collect();
                let mut selector = InformationSelection::<6>::new();
                let mut picked = selector.select(&rows, budget)?;
                picked.sort_unstable();
                points = picked.into_iter().map(|i| points[i]).collect();
            }
        }

        Ok(points)
    }
}
