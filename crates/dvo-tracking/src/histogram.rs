//! Approximate order statistics over a stream of bounded scalar values.

use crate::error::TrackingError;

/// A streaming rank estimator over a fixed-memory histogram.
///
/// Values are accumulated into `floor((max - min) / resolution)` equal-width
/// bins; arbitrary ranks are then answered by scanning the cumulative counts
/// and interpolating inside the containing bin. The estimate is monotone in
/// the rank and off by at most one bin width, which is the trade this makes
/// for O(1) memory and O(1) insertion over an unbounded stream.
#[derive(Debug, Clone)]
pub struct ApproxMedian {
    min: f32,
    resolution: f32,
    bins: Vec<usize>,
    num_samples: usize,
}

impl ApproxMedian {
    /// Create an estimator for values in `[min, max]` with the given bin
    /// width.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is empty or the resolution does not
    /// produce at least one bin.
    pub fn new(min: f32, max: f32, resolution: f32) -> Result<Self, TrackingError> {
        if !(max > min) || !(resolution > 0.0) {
            return Err(TrackingError::InvalidHistogram {
                min,
                max,
                resolution,
            });
        }
        let num_bins = ((max - min) / resolution).floor() as usize;
        if num_bins == 0 {
            return Err(TrackingError::InvalidHistogram {
                min,
                max,
                resolution,
            });
        }
        Ok(Self {
            min,
            resolution,
            bins: vec![0; num_bins],
            num_samples: 0,
        })
    }

    /// The number of bins.
    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }

    /// The number of accumulated samples.
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Insert a value, clamping it into the histogram range.
    ///
    /// Out-of-range values land in the first or last bin; exactness is
    /// traded for boundedness.
    #[inline]
    pub fn add(&mut self, value: f32) {
        let num_bins = self.bins.len();
        let normalized = (value - self.min) / self.resolution;
        let bin = (normalized.max(0.0) as usize).min(num_bins - 1);
        self.bins[bin] += 1;
        self.num_samples += 1;
    }

    /// Approximate the value of the sample with rank `nth` (zero-based,
    /// ascending).
    ///
    /// Scans the cumulative bin counts and linearly interpolates the rank's
    /// position inside the containing bin.
    ///
    /// # Errors
    ///
    /// Returns an error if `nth >= num_samples()`.
    pub fn approximate_nth(&self, nth: usize) -> Result<f32, TrackingError> {
        if nth >= self.num_samples {
            return Err(TrackingError::RankOutOfBounds {
                nth,
                num_samples: self.num_samples,
            });
        }

        let mut cumulative = 0usize;
        for (bin, &count) in self.bins.iter().enumerate() {
            if cumulative + count > nth {
                let frac = (nth - cumulative) as f32 / count as f32;
                return Ok(self.min + (bin as f32 + frac) * self.resolution);
            }
            cumulative += count;
        }

        // unreachable: the cumulative count over all bins equals num_samples
        Err(TrackingError::RankOutOfBounds {
            nth,
            num_samples: self.num_samples,
        })
    }

    /// Reset all counts, keeping the bin layout.
    pub fn clear_histogram(&mut self) {
        self.bins.fill(0);
        self.num_samples = 0;
    }
}
