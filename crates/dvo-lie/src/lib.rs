#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! Quaternion-backed SO(3) and SE(3) types with the exponential-map
//! retraction used to compose incremental pose updates during alignment.

/// Special Euclidean group SE(3) for 3D rigid transformations.
pub mod se3;

/// Special Orthogonal group SO(3) for 3D rotations.
pub mod so3;

pub use crate::se3::SE3;
pub use crate::so3::SO3;
