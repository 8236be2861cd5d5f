//! Robust weighting functions for iteratively reweighted least squares.
//!
//! The kernels down-weight large residuals so that occlusions, dynamic
//! objects and specular highlights do not dominate the photometric error.

/// Lower bound on the residual scale, keeps the normalized residual finite
/// when the scale estimate collapses on noise-free data.
const MIN_SCALE: f64 = 1e-8;

/// Robust kernel type for M-estimator weighting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RobustKernel {
    /// No robust weighting, plain least squares.
    NoWeighting,

    /// Huber kernel: quadratic for small residuals, linear beyond the
    /// threshold. Weight: `1` for `t < c`, `c/t` otherwise, continuous at
    /// the kink.
    Huber {
        /// The kernel threshold `c`.
        threshold: f64,
    },

    /// Smooth approximation of the Huber kernel without the kink.
    /// Weight: `1 / sqrt(1 + (r / (sigma * c))^2)`.
    PseudoHuber {
        /// The kernel threshold `c`.
        threshold: f64,
    },

    /// Tukey biweight kernel with full rejection beyond the cutoff.
    /// Weight: `(1 - (t/c)^2)^2` for `t <= c`, `0` otherwise. Needs a
    /// reasonable initial pose or scale estimate, otherwise valid data is
    /// rejected.
    Tukey {
        /// The kernel cutoff `c`.
        threshold: f64,
    },

    /// Blake-Zisserman kernel with exponential soft rejection.
    /// Weight: `2 / (1 + c * exp(t^2))`.
    BlakeZisserman {
        /// The kernel constant `c`.
        threshold: f64,
    },
}

impl RobustKernel {
    /// The Huber kernel at its 95% asymptotic efficiency constant.
    pub fn huber() -> Self {
        Self::Huber { threshold: 1.345 }
    }

    /// The pseudo-Huber kernel at the Huber efficiency constant.
    pub fn pseudo_huber() -> Self {
        Self::PseudoHuber { threshold: 1.345 }
    }

    /// The Tukey biweight kernel at its 95% asymptotic efficiency constant.
    pub fn tukey() -> Self {
        Self::Tukey { threshold: 4.6851 }
    }

    /// The Blake-Zisserman kernel with a unit constant.
    pub fn blake_zisserman() -> Self {
        Self::BlakeZisserman { threshold: 1.0 }
    }
}

impl Default for RobustKernel {
    fn default() -> Self {
        Self::tukey()
    }
}

/// An M-estimator: a robust kernel together with the current residual scale.
///
/// The scale is refreshed once per optimization round from a robust spread
/// estimate of the current residuals (see [`mad_scale`]); `weight` is then
/// called once per residual on the hot path.
#[derive(Debug, Clone, Copy)]
pub struct RobustEstimator {
    kernel: RobustKernel,
    scale: f64,
}

impl RobustEstimator {
    /// Create an estimator with unit scale.
    pub fn new(kernel: RobustKernel) -> Self {
        Self { kernel, scale: 1.0 }
    }

    /// The kernel in use.
    pub fn kernel(&self) -> RobustKernel {
        self.kernel
    }

    /// The current residual scale.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Set the residual scale for the current optimization round.
    pub fn set_scale(&mut self, sigma: f64) {
        self.scale = sigma.max(MIN_SCALE);
    }

    /// Whether the kernel actually down-weights outliers.
    ///
    /// `false` degrades the optimizer to ordinary least squares and lets it
    /// skip the per-round scale estimation.
    pub fn is_robust(&self) -> bool {
        !matches!(self.kernel, RobustKernel::NoWeighting)
    }

    /// Compute the IRLS weight in `[0, 1]` for a residual.
    #[inline]
    pub fn weight(&self, residual: f64) -> f64 {
        let t = (residual / self.scale).abs();
        match self.kernel {
            RobustKernel::NoWeighting => 1.0,
            RobustKernel::Huber { threshold } => {
                if t < threshold {
                    1.0
                } else {
                    threshold / t
                }
            }
            RobustKernel::PseudoHuber { threshold } => {
                let u = t / threshold;
                1.0 / (1.0 + u * u).sqrt()
            }
            RobustKernel::Tukey { threshold } => {
                if t <= threshold {
                    let u = t / threshold;
                    let b = 1.0 - u * u;
                    b * b
                } else {
                    0.0
                }
            }
            RobustKernel::BlakeZisserman { threshold } => {
                2.0 / (1.0 + threshold * (t * t).exp())
            }
        }
    }
}

/// Robust residual scale from the median absolute deviation.
///
/// Returns `1.4826 * median(|r - median(r)|)`, the consistent sigma estimate
/// for normally distributed inliers. Returns zero for an empty slice.
pub fn mad_scale(residuals: &[f64]) -> f64 {
    if residuals.is_empty() {
        return 0.0;
    }
    let mut sorted = residuals.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    let median = sorted[sorted.len() / 2];

    let mut deviations: Vec<f64> = sorted.iter().map(|r| (r - median).abs()).collect();
    deviations.sort_unstable_by(f64::total_cmp);
    let mad = deviations[deviations.len() / 2];

    1.4826 * mad
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_no_weighting_always_one() {
        let est = RobustEstimator::new(RobustKernel::NoWeighting);
        assert_eq!(est.weight(0.0), 1.0);
        assert_eq!(est.weight(0.5), 1.0);
        assert_eq!(est.weight(-100.0), 1.0);
        assert!(!est.is_robust());
    }

    #[test]
    fn test_huber_boundaries() {
        let c = 1.345;
        let mut est = RobustEstimator::new(RobustKernel::Huber { threshold: c });
        est.set_scale(1.0);

        assert_eq!(est.weight(0.0), 1.0);
        // continuous at the kink
        assert_relative_eq!(est.weight(c), 1.0, epsilon = 1e-12);
        // bounded influence beyond it
        assert_relative_eq!(est.weight(2.0 * c), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_tukey_cutoff() {
        let c = 4.6851;
        let mut est = RobustEstimator::new(RobustKernel::Tukey { threshold: c });
        est.set_scale(1.0);

        assert_relative_eq!(est.weight(0.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(est.weight(c), 0.0, epsilon = 1e-12);
        assert_eq!(est.weight(c + 1e-6), 0.0);
        assert_eq!(est.weight(100.0), 0.0);
    }

    #[test]
    fn test_pseudo_huber_smooth() {
        let mut est = RobustEstimator::new(RobustKernel::pseudo_huber());
        est.set_scale(1.0);
        assert_relative_eq!(est.weight(0.0), 1.0, epsilon = 1e-12);
        assert!(est.weight(1.0) < 1.0);
        assert!(est.weight(1.0) > 0.0);
    }

    #[test]
    fn test_blake_zisserman_at_zero() {
        let mut est = RobustEstimator::new(RobustKernel::blake_zisserman());
        est.set_scale(1.0);
        assert_relative_eq!(est.weight(0.0), 1.0, epsilon = 1e-12);
        assert!(est.weight(3.0) < 1e-2);
    }

    #[test]
    fn test_weights_decrease_with_residual() {
        for kernel in [
            RobustKernel::huber(),
            RobustKernel::pseudo_huber(),
            RobustKernel::tukey(),
            RobustKernel::blake_zisserman(),
        ] {
            let mut est = RobustEstimator::new(kernel);
            est.set_scale(0.1);
            let w1 = est.weight(0.05);
            let w2 = est.weight(0.2);
            let w3 = est.weight(1.0);
            assert!(w1 >= w2, "{kernel:?}: w1={w1} should be >= w2={w2}");
            assert!(w2 >= w3, "{kernel:?}: w2={w2} should be >= w3={w3}");
        }
    }

    #[test]
    fn test_mad_scale() {
        let residuals = [1.0, 1.0, 1.0, 1.0, 10.0];
        // median 1, deviations [0, 0, 0, 0, 9], mad 0
        assert_relative_eq!(mad_scale(&residuals), 0.0, epsilon = 1e-12);

        let residuals = [-2.0, -1.0, 0.0, 1.0, 2.0];
        // median 0, sorted deviations [0, 1, 1, 2, 2], mad 1
        assert_relative_eq!(mad_scale(&residuals), 1.4826, epsilon = 1e-12);
    }
}
