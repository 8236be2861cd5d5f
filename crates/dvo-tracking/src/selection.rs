//! Pixel selection for real-time direct alignment.
//!
//! A full sort of the per-frame candidate pixels is too slow, so the
//! saliency threshold is derived from a fixed-memory histogram, and the
//! degree-of-freedom balancing works on partial rankings only.

use dvo_image::Image;

use crate::error::TrackingError;
use crate::histogram::ApproxMedian;

/// Saliency range of `|gx| + |gy|` for intensities in `[0, 1]`.
const GRADIENT_RANGE: (f32, f32) = (0.0, 2.0);
/// Bin width of the saliency histogram.
const GRADIENT_RESOLUTION: f32 = 0.02;

/// Converts a sampling budget into a gradient-magnitude threshold.
///
/// Accumulates `|gx| + |gy|` of every pixel with measured depth into an
/// [`ApproxMedian`], then answers "keep the top X%" or "keep the N best"
/// queries without sorting the pixel population.
#[derive(Debug, Clone)]
pub struct GradientThresholdSelection {
    histogram: ApproxMedian,
}

impl GradientThresholdSelection {
    /// Build the saliency histogram from gradient and depth images.
    ///
    /// Pixels whose depth is not strictly positive (invalid or unmeasured)
    /// are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the images do not share the same size.
    pub fn new(
        grad_x: &Image<f32, 1>,
        grad_y: &Image<f32, 1>,
        depth: &Image<f32, 1>,
    ) -> Result<Self, TrackingError> {
        for img in [grad_y, depth] {
            if img.size() != grad_x.size() {
                return Err(TrackingError::SizeMismatch(grad_x.size(), img.size()));
            }
        }

        let mut histogram =
            ApproxMedian::new(GRADIENT_RANGE.0, GRADIENT_RANGE.1, GRADIENT_RESOLUTION)?;

        let gx = grad_x.as_slice();
        let gy = grad_y.as_slice();
        for (i, &d) in depth.as_slice().iter().enumerate() {
            if d > 0.0 {
                histogram.add(gx[i].abs() + gy[i].abs());
            }
        }

        Ok(Self { histogram })
    }

    /// The number of pixels with valid depth.
    pub fn num_valid(&self) -> usize {
        self.histogram.num_samples()
    }

    /// The gradient magnitude below which `1 - sample_fraction` of the valid
    /// pixels fall, so that the top `sample_fraction` of pixels by saliency
    /// are at or above the returned value.
    ///
    /// # Errors
    ///
    /// Returns an error if no valid pixels were accumulated.
    pub fn threshold(&self, sample_fraction: f32) -> Result<f32, TrackingError> {
        let n = self.histogram.num_samples();
        if n == 0 {
            return Err(TrackingError::RankOutOfBounds {
                nth: 0,
                num_samples: 0,
            });
        }
        let fraction = sample_fraction.clamp(0.0, 1.0);
        let nth = (((1.0 - fraction) * n as f32) as usize).min(n - 1);
        self.histogram.approximate_nth(nth)
    }

    /// The gradient magnitude that selects approximately the `n` most
    /// salient valid pixels. Returns zero (select everything) when `n`
    /// covers the whole population.
    ///
    /// # Errors
    ///
    /// Returns an error if the rank scan fails, which cannot happen for a
    /// non-empty histogram.
    pub fn select_biggest_n(&self, n: usize) -> Result<f32, TrackingError> {
        let total = self.histogram.num_samples();
        if n >= total {
            return Ok(0.0);
        }
        // the n largest sit above the (total - n)-th smallest
        self.histogram.approximate_nth((total - n).min(total - 1))
    }
}

/// Degree-of-freedom balanced sub-sampling of candidate pixels.
///
/// Selecting purely by saliency can concentrate all samples on edges of a
/// single orientation and leave some pose directions unconstrained. This
/// selector ranks candidates per pose axis by their Jacobian magnitude and
/// round-robins across the axes, so every degree of freedom keeps its most
/// informative samples in the budget.
///
/// The ranked-list buffers are reused across calls.
#[derive(Debug, Clone, Default)]
pub struct InformationSelection<const DOF: usize> {
    ranks: Vec<Vec<usize>>,
    selected: Vec<bool>,
}

impl<const DOF: usize> InformationSelection<DOF> {
    /// Create a selector with empty buffers.
    pub fn new() -> Self {
        Self {
            ranks: (0..DOF).map(|_| Vec::new()).collect(),
            selected: Vec::new(),
        }
    }

    /// Select `budget` candidate indices spread across all pose axes.
    ///
    /// For each axis the first `budget` ranks of a per-axis index array are
    /// partially sorted descending by `|jacobian[i][axis]|`; a round-robin
    /// walk across the axes then picks the next unused index per axis until
    /// the budget is filled. The result is a duplicate-free set of exactly
    /// `budget` indices in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if `budget` exceeds the number of candidates.
    pub fn select(
        &mut self,
        jacobians: &[[f64; DOF]],
        budget: usize,
    ) -> Result<Vec<usize>, TrackingError> {
        let n = jacobians.len();
        if budget > n {
            return Err(TrackingError::BudgetExceedsCandidates {
                budget,
                candidates: n,
            });
        }
        if budget == 0 {
            return Ok(Vec::new());
        }

        if self.ranks.len() != DOF {
            self.ranks = (0..DOF).map(|_| Vec::new()).collect();
        }
        for (axis, list) in self.ranks.iter_mut().enumerate() {
            list.clear();
            list.extend(0..n);
            let descending =
                |&a: &usize, &b: &usize| jacobians[b][axis].abs().total_cmp(&jacobians[a][axis].abs());
            if budget < n {
                list.select_nth_unstable_by(budget - 1, descending);
            }
            list[..budget].sort_unstable_by(descending);
        }

        self.selected.clear();
        self.selected.resize(n, false);

        let mut result = Vec::with_capacity(budget);
        let mut cursors = vec![0usize; DOF];
        let mut axis = 0;
        let mut exhausted_axes = 0;
        while result.len() < budget && exhausted_axes < DOF {
            let list = &self.ranks[axis];
            let cursor = &mut cursors[axis];
            while *cursor < budget && self.selected[list[*cursor]] {
                *cursor += 1;
            }
            if *cursor < budget {
                let index = list[*cursor];
                self.selected[index] = true;
                result.push(index);
                *cursor += 1;
                exhausted_axes = 0;
            } else {
                exhausted_axes += 1;
            }
            axis = (axis + 1) % DOF;
        }

        Ok(result)
    }
}
