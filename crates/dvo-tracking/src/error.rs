use dvo_image::{ImageError, ImageSize};

/// An error type for the tracking module.
#[derive(thiserror::Error, Debug)]
pub enum TrackingError {
    /// Error when a rank request exceeds the accumulated sample count.
    #[error("Rank {nth} is out of bounds for {num_samples} accumulated samples")]
    RankOutOfBounds {
        /// The requested rank.
        nth: usize,
        /// The number of samples in the histogram.
        num_samples: usize,
    },

    /// Error when a histogram is constructed with an unusable bin layout.
    #[error("Invalid histogram layout: range [{min}, {max}] with resolution {resolution}")]
    InvalidHistogram {
        /// The lower bound of the histogram range.
        min: f32,
        /// The upper bound of the histogram range.
        max: f32,
        /// The requested bin width.
        resolution: f32,
    },

    /// Error when a selection budget exceeds the candidate count.
    #[error("Selection budget ({budget}) exceeds the number of candidates ({candidates})")]
    BudgetExceedsCandidates {
        /// The requested number of samples.
        budget: usize,
        /// The number of available candidates.
        candidates: usize,
    },

    /// Error when two images that must match in size do not.
    #[error("Image sizes do not match: {0} vs {1}")]
    SizeMismatch(ImageSize, ImageSize),

    /// Error when a pyramid octave index is out of range.
    #[error("Octave {octave} is out of range for {octaves} pyramid octaves")]
    OctaveOutOfRange {
        /// The requested octave.
        octave: usize,
        /// The number of octaves.
        octaves: usize,
    },

    /// Error when a pyramid does not have the expected number of octaves.
    #[error("Expected a pyramid with {expected} octaves, got {actual}")]
    OctaveCountMismatch {
        /// The expected number of octaves.
        expected: usize,
        /// The provided number of octaves.
        actual: usize,
    },

    /// Error from the underlying image operations.
    #[error(transparent)]
    Image(#[from] ImageError),
}
