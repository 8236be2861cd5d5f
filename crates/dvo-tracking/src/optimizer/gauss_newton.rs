use nalgebra::{Matrix6, Vector6};

use super::{
    evaluate_system, solve_normal_equations, DirectOptimizer, OctaveStats, OptimizerParams,
    Termination,
};
use crate::cost::CostFunction;
use crate::error::TrackingError;
use crate::robust::{mad_scale, RobustEstimator};

/// Gauss-Newton alignment.
///
/// Re-evaluates the cost at every iteration, solves the undamped normal
/// equations and applies the step unconditionally. Fast near the optimum, but
/// can diverge on poorly conditioned octaves; use [`super::LevenbergMarquardt`]
/// when the initial pose is far off.
pub struct GaussNewton {
    params: OptimizerParams,
    robust: RobustEstimator,
}

impl GaussNewton {
    /// Create an optimizer with default parameters.
    pub fn new(robust: RobustEstimator) -> Self {
        Self {
            params: OptimizerParams::default(),
            robust,
        }
    }

    /// Create an optimizer with the given parameters.
    pub fn with_params(robust: RobustEstimator, params: OptimizerParams) -> Self {
        Self { params, robust }
    }

    /// The robust estimator in use.
    pub fn robust(&self) -> &RobustEstimator {
        &self.robust
    }
}

impl DirectOptimizer for GaussNewton {
    fn params(&self) -> &OptimizerParams {
        &self.params
    }

    fn optimize_octave<C: CostFunction>(
        &mut self,
        cost_fn: &mut C,
        octave: usize,
    ) -> Result<(OctaveStats, Vector6<f64>), TrackingError> {
        let mut residuals = Vec::new();
        let mut jacobians = Vec::new();
        let mut hessian = Matrix6::zeros();
        let mut gradient = Vector6::zeros();
        let mut delta_sum = Vector6::zeros();
        let mut stats = OctaveStats::start(octave);

        while stats.iterations < self.params.max_iterations {
            cost_fn.evaluate(&mut residuals, &mut jacobians, octave)?;
            stats.num_pixels = residuals.len();
            if residuals.is_empty() {
                stats.termination = Termination::NoPixels;
                break;
            }

            if self.robust.is_robust() {
                self.robust.set_scale(mad_scale(&residuals));
            }
            let cost = evaluate_system(
                &self.robust,
                &residuals,
                &jacobians,
                &mut hessian,
                &mut gradient,
            );
            stats.final_cost = cost;
            log::debug!(
                "gn octave {} iteration {}: {} pixels, cost {:.3e}",
                octave,
                stats.iterations,
                stats.num_pixels,
                cost
            );
            if cost <= self.params.cost_stop_threshold {
                stats.termination = Termination::Converged;
                break;
            }

            let Some(delta) = solve_normal_equations(&hessian, &gradient) else {
                stats.termination = Termination::NotRecoverable;
                break;
            };
            if delta.norm() < self.params.min_update_norm {
                stats.termination = Termination::SmallUpdate;
                break;
            }

            cost_fn.update(&delta);
            delta_sum += delta;
            stats.iterations += 1;
        }

        Ok((stats, delta_sum))
    }
}
