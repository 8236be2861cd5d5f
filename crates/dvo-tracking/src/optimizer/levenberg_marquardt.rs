use nalgebra::{Matrix6, Vector6};

use super::{
    evaluate_system, mean_squared, solve_normal_equations, DirectOptimizer, OctaveStats,
    OptimizerParams, Termination,
};
use crate::cost::CostFunction;
use crate::error::TrackingError;
use crate::robust::{mad_scale, RobustEstimator};

/// Initial Marquardt damping factor.
const INITIAL_LAMBDA: f64 = 1e-5;
/// Damping shrink factor on an accepted step.
const LAMBDA_SHRINK: f64 = 0.1;
/// Damping growth factor on a rejected step.
const LAMBDA_GROW: f64 = 10.0;

/// Levenberg-Marquardt alignment.
///
/// Damped Gauss-Newton with explicit step accept/reject: the damping
/// interpolates between gradient descent (large lambda) and Gauss-Newton
/// (small lambda), trading convergence speed for robustness on the poorly
/// conditioned coarse octaves and large initial displacements where plain
/// Gauss-Newton can diverge or oscillate.
pub struct LevenbergMarquardt {
    params: OptimizerParams,
    robust: RobustEstimator,
    initial_lambda: f64,
}

impl LevenbergMarquardt {
    /// Create an optimizer with default parameters.
    pub fn new(robust: RobustEstimator) -> Self {
        Self {
            params: OptimizerParams::default(),
            robust,
            initial_lambda: INITIAL_LAMBDA,
        }
    }

    /// Create an optimizer with the given parameters.
    pub fn with_params(robust: RobustEstimator, params: OptimizerParams) -> Self {
        Self {
            params,
            robust,
            initial_lambda: INITIAL_LAMBDA,
        }
    }

    /// Set the initial damping factor.
    pub fn with_initial_lambda(mut self, lambda: f64) -> Self {
        self.initial_lambda = lambda;
        self
    }

    /// The robust estimator in use.
    pub fn robust(&self) -> &RobustEstimator {
        &self.robust
    }

    fn build_system(
        &mut self,
        residuals: &[f64],
        jacobians: &[Vector6<f64>],
        hessian: &mut Matrix6<f64>,
        gradient: &mut Vector6<f64>,
    ) -> f64 {
        if self.robust.is_robust() {
            self.robust.set_scale(mad_scale(residuals));
        }
        evaluate_system(&self.robust, residuals, jacobians, hessian, gradient)
    }
}

impl DirectOptimizer for LevenbergMarquardt {
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

        cost_fn.evaluate(&mut residuals, &mut jacobians, octave)?;
        stats.num_pixels = residuals.len();
        if residuals.is_empty() {
            stats.termination = Termination::NoPixels;
            return Ok((stats, delta_sum));
        }

        stats.final_cost = self.build_system(&residuals, &jacobians, &mut hessian, &mut gradient);
        // step acceptance compares unweighted costs, the weighted system is
        // only rebuilt once a step is accepted
        let mut current_cost = mean_squared(&residuals);
        let mut saved = cost_fn.model();
        let mut lambda = self.initial_lambda;

        while stats.iterations < self.params.max_iterations {
            let mut damped = hessian;
            for i in 0..6 {
                damped[(i, i)] += lambda * hessian[(i, i)];
            }
            let Some(delta) = solve_normal_equations(&damped, &gradient) else {
                stats.termination = Termination::NotRecoverable;
                break;
            };
            if delta.norm() < self.params.min_update_norm {
                stats.termination = Termination::SmallUpdate;
                break;
            }

            cost_fn.update(&delta);
            cost_fn.evaluate(&mut residuals, &mut jacobians, octave)?;
            let tentative_cost = if residuals.is_empty() {
                f64::INFINITY
            } else {
                mean_squared(&residuals)
            };

            if tentative_cost < current_cost {
                delta_sum += delta;
                stats.num_pixels = residuals.len();
                stats.final_cost =
                    self.build_system(&residuals, &jacobians, &mut hessian, &mut gradient);
                saved = cost_fn.model();
                lambda *= LAMBDA_SHRINK;
                current_cost = tentative_cost;
                stats.iterations += 1;
                log::debug!(
                    "lm octave {} iteration {}: accepted, cost {:.3e}, lambda {:.1e}",
                    octave,
                    stats.iterations,
                    tentative_cost,
                    lambda
                );
                if tentative_cost <= self.params.cost_stop_threshold {
                    stats.termination = Termination::Converged;
                    break;
                }
            } else {
                cost_fn.set_model(saved.clone());
                lambda *= LAMBDA_GROW;
                stats.iterations += 1;
                log::debug!(
                    "lm octave {} iteration {}: rejected, cost {:.3e}, lambda {:.1e}",
                    octave,
                    stats.iterations,
                    tentative_cost,
                    lambda
                );
            }
        }

        Ok((stats, delta_sum))
    }
}
