//! Coarse-to-fine alignment optimizers.
//!
//! Both drivers share the weighted normal-equation reduction and the
//! multi-octave loop; they differ only in how a single octave is optimized:
//! plain Gauss-Newton steps, or Levenberg-Marquardt damping with explicit
//! step accept/reject.

use nalgebra::{Matrix6, Vector6};

use crate::cost::CostFunction;
use crate::error::TrackingError;
use crate::robust::RobustEstimator;

mod gauss_newton;
mod levenberg_marquardt;

pub use gauss_newton::GaussNewton;
pub use levenberg_marquardt::LevenbergMarquardt;

/// Termination parameters shared by the optimizers.
#[derive(Debug, Clone, Copy)]
pub struct OptimizerParams {
    /// Maximum number of iterations per octave.
    pub max_iterations: usize,
    /// Stop when the pose update norm falls below this value.
    pub min_update_norm: f64,
    /// Stop when the mean weighted squared residual falls below this value.
    pub cost_stop_threshold: f64,
}

impl Default for OptimizerParams {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            min_update_norm: 1e-6,
            cost_stop_threshold: 1e-8,
        }
    }
}

impl OptimizerParams {
    /// Create default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of iterations per octave.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the minimum pose update norm.
    pub fn with_min_update_norm(mut self, min_update_norm: f64) -> Self {
        self.min_update_norm = min_update_norm;
        self
    }

    /// Set the cost stop threshold.
    pub fn with_cost_stop_threshold(mut self, cost_stop_threshold: f64) -> Self {
        self.cost_stop_threshold = cost_stop_threshold;
        self
    }
}

/// Why an octave stopped iterating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The cost fell below the stop threshold.
    Converged,
    /// The pose update norm fell below the stop threshold.
    SmallUpdate,
    /// The iteration budget was spent.
    MaxIterations,
    /// No samples survived the visibility test; tracking is lost at this
    /// octave.
    NoPixels,
    /// The normal equations were singular; the last accepted pose is kept.
    NotRecoverable,
}

/// Per-octave alignment statistics.
#[derive(Debug, Clone)]
pub struct OctaveStats {
    /// The pyramid octave these statistics describe.
    pub octave: usize,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Number of samples that survived projection in the last evaluation.
    pub num_pixels: usize,
    /// The last evaluated mean weighted squared residual.
    pub final_cost: f64,
    /// Why the octave stopped.
    pub termination: Termination,
}

impl OctaveStats {
    fn start(octave: usize) -> Self {
        Self {
            octave,
            iterations: 0,
            num_pixels: 0,
            final_cost: f64::INFINITY,
            termination: Termination::MaxIterations,
        }
    }
}

/// The result of a full coarse-to-fine alignment.
#[derive(Debug, Clone)]
pub struct OptimizeReport {
    /// Statistics per octave, in processing order (coarsest first).
    pub octaves: Vec<OctaveStats>,
    /// The accumulated pose delta across all octaves.
    pub overall_delta: Vector6<f64>,
}

impl OptimizeReport {
    /// Total number of iterations across all octaves.
    pub fn total_iterations(&self) -> usize {
        self.octaves.iter().map(|o| o.iterations).sum()
    }

    /// Whether any octave lost all of its samples.
    pub fn lost_tracking(&self) -> bool {
        self.octaves
            .iter()
            .any(|o| o.termination == Termination::NoPixels)
    }
}

/// A coarse-to-fine direct alignment optimizer.
///
/// The provided `optimize` walks the pyramid from the coarsest octave to the
/// finest, delegating each octave to the implementation and accumulating the
/// overall pose delta and the per-octave statistics.
pub trait DirectOptimizer {
    /// The termination parameters in use.
    fn params(&self) -> &OptimizerParams;

    /// Optimize a single octave, returning its statistics and the pose delta
    /// accumulated over its accepted steps.
    fn optimize_octave<C: CostFunction>(
        &mut self,
        cost_fn: &mut C,
        octave: usize,
    ) -> Result<(OctaveStats, Vector6<f64>), TrackingError>;

    /// Align over all octaves, coarsest to finest.
    fn optimize<C: CostFunction>(
        &mut self,
        cost_fn: &mut C,
        num_octaves: usize,
    ) -> Result<OptimizeReport, TrackingError> {
        let mut overall_delta = Vector6::zeros();
        let mut octaves = Vec::with_capacity(num_octaves);
        for octave in (0..num_octaves).rev() {
            let (stats, delta) = self.optimize_octave(cost_fn, octave)?;
            log::debug!(
                "octave {}: {:?} after {} iterations, {} pixels, cost {:.3e}",
                octave,
                stats.termination,
                stats.iterations,
                stats.num_pixels,
                stats.final_cost
            );
            overall_delta += delta;
            octaves.push(stats);
        }
        Ok(OptimizeReport {
            octaves,
            overall_delta,
        })
    }
}

/// Build the weighted normal equations and return the mean weighted squared
/// residual.
///
/// Accumulates `H += w·JᵀJ` and `g += w·Jᵀr` with the IRLS weight of each
/// scale-normalized residual. The caller must pass at least one sample.
pub(crate) fn evaluate_system(
    robust: &RobustEstimator,
    residuals: &[f64],
    jacobians: &[Vector6<f64>],
    hessian: &mut Matrix6<f64>,
    gradient: &mut Vector6<f64>,
) -> f64 {
    hessian.fill(0.0);
    gradient.fill(0.0);
    let mut cost = 0.0;
    for (r, j) in residuals.iter().zip(jacobians.iter()) {
        let w = robust.weight(*r);
        *hessian += j * j.transpose() * w;
        *gradient += j * (w * r);
        cost += w * r * r;
    }
    cost / residuals.len() as f64
}

/// Solve `H·Δ = -g`, or `None` when the system is not positive definite.
pub(crate) fn solve_normal_equations(
    hessian: &Matrix6<f64>,
    gradient: &Vector6<f64>,
) -> Option<Vector6<f64>> {
    let neg_gradient = -gradient;
    hessian.cholesky().map(|chol| chol.solve(&neg_gradient))
}

/// Mean squared residual, unweighted.
pub(crate) fn mean_squared(residuals: &[f64]) -> f64 {
    residuals.iter().map(|r| r * r).sum::<f64>() / residuals.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robust::RobustKernel;
    use approx::assert_relative_eq;

    #[test]
    fn test_evaluate_system_unweighted() {
        let robust = RobustEstimator::new(RobustKernel::NoWeighting);
        let residuals = vec![1.0, -2.0];
        let jacobians = vec![
            Vector6::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            Vector6::new(0.0, 1.0, 0.0, 0.0, 0.0, 0.0),
        ];
        let mut hessian = Matrix6::zeros();
        let mut gradient = Vector6::zeros();

        let cost = evaluate_system(&robust, &residuals, &jacobians, &mut hessian, &mut gradient);

        assert_relative_eq!(cost, 2.5, epsilon = 1e-12);
        assert_relative_eq!(hessian[(0, 0)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(hessian[(1, 1)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(hessian[(0, 1)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(gradient[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(gradient[1], -2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_normal_equations_identity() {
        let hessian = Matrix6::identity() * 2.0;
        let gradient = Vector6::new(2.0, 4.0, 6.0, 8.0, 10.0, 12.0);

        let delta = solve_normal_equations(&hessian, &gradient).unwrap();
        for i in 0..6 {
            assert_relative_eq!(delta[i], -gradient[i] / 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_solve_normal_equations_singular() {
        let hessian = Matrix6::zeros();
        let gradient = Vector6::new(1.0, 1.0, 1.0, 1.0, 1.0, 1.0);
        assert!(solve_normal_equations(&hessian, &gradient).is_none());
    }
}
