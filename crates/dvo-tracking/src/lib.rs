#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! Estimates the rigid motion between a reference RGB-D keyframe and a live
//! frame by minimizing the dense photometric error over a resolution
//! pyramid. The keyframe holds a per-octave set of salient, depth-valid
//! reference samples; the optimizers iterate coarse to fine with a robust
//! M-estimator weighting the residuals.

/// pinhole camera model.
pub mod camera;

/// the photometric cost function and its contract.
pub mod cost;

/// error types for the tracking module.
pub mod error;

/// approximate order statistics over bounded value streams.
pub mod histogram;

/// keyframe reference data model.
pub mod keyframe;

/// alignment optimizers.
pub mod optimizer;

/// robust M-estimator weighting.
pub mod robust;

/// saliency and information based pixel selection.
pub mod selection;

pub use crate::camera::PinholeIntrinsics;
pub use crate::cost::{CostFunction, PhotometricCost};
pub use crate::error::TrackingError;
pub use crate::histogram::ApproxMedian;
pub use crate::keyframe::{
    DefaultReferenceFactory, ReferenceFactory, ReferencePoint, ReferencePoints, RgbdKeyframe,
};
pub use crate::optimizer::{
    DirectOptimizer, GaussNewton, LevenbergMarquardt, OctaveStats, OptimizeReport,
    OptimizerParams, Termination,
};
pub use crate::robust::{mad_scale, RobustEstimator, RobustKernel};
pub use crate::selection::{GradientThresholdSelection, InformationSelection};
