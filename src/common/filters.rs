/// Represents an exponential low-pass filter for discrete time signals.
///
/// Each sensor channel owns one filter with its own smoothing constant:
/// `filtered = alpha * old + (1 - alpha) * new`. A larger `alpha` smooths
/// harder at the cost of lag.
///
/// # Examples
///
/// ```rust
/// use robopilot::common::filters::LowPassFilter;
///
/// let alpha = 0.5; // Smoothing constant
/// let mut lpf = LowPassFilter::new(alpha, 0.0);
///
/// let raw_sample = 10.0;
/// let filtered = lpf.apply(raw_sample);
/// assert_eq!(filtered, 5.0);
/// ```
#[derive(Clone, Debug)]
pub struct LowPassFilter {
    /// Smoothing constant in `[0, 1]`; weight of the previous output.
    alpha: f64,
    /// Last filtered output.
    state: f64,
}

impl LowPassFilter {
    /// Creates a new `LowPassFilter` instance.
    ///
    /// # Arguments
    ///
    /// * `alpha` - Smoothing constant in `[0, 1]`.
    /// * `state` - Initial filter state.
    ///
    /// # Returns
    ///
    /// A new `LowPassFilter` instance.
    pub fn new(alpha: f64, state: f64) -> Self {
        debug_assert!((0.0..=1.0).contains(&alpha));
        Self { alpha, state }
    }

    /// Applies the filter to one raw sample and returns the smoothed value.
    ///
    /// # Arguments
    ///
    /// * `x` - Raw input sample.
    ///
    /// # Returns
    ///
    /// The filtered output value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use robopilot::common::filters::LowPassFilter;
    ///
    /// let mut lpf = LowPassFilter::new(0.5, 0.0);
    /// assert_eq!(lpf.apply(10.0), 5.0);
    /// assert_eq!(lpf.apply(10.0), 7.5);
    /// ```
    pub fn apply(&mut self, x: f64) -> f64 {
        self.state = self.alpha * self.state + (1.0 - self.alpha) * x;

        // If previous or current is NaN, restart from the raw sample.
        if self.state.is_nan() {
            self.state = x;
        }

        self.state
    }

    /// Overwrites the filter state without blending.
    ///
    /// Used to preload a channel with its first raw reading so the filter
    /// does not have to converge from zero.
    pub fn seed(&mut self, x: f64) {
        self.state = x;
    }

    /// Returns the last filtered output.
    pub fn value(&self) -> f64 {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_filter_creation() {
        let lpf = LowPassFilter::new(0.95, 0.0);
        assert_eq!(lpf.value(), 0.0);
    }

    #[test]
    fn test_filter_application() {
        let mut lpf = LowPassFilter::new(0.9, 0.0);

        let out = lpf.apply(10.0);
        assert_abs_diff_eq!(out, 1.0, epsilon = 1e-12);

        // State persists between samples.
        let out2 = lpf.apply(10.0);
        assert_abs_diff_eq!(out2, 1.9, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_input_converges_to_input() {
        let mut lpf = LowPassFilter::new(0.9, 0.0);

        let mut out = 0.0;
        for _ in 0..500 {
            out = lpf.apply(42.0);
        }

        assert_abs_diff_eq!(out, 42.0, epsilon = 1e-6);
    }

    #[test]
    fn test_steady_state_is_fixpoint() {
        let mut lpf = LowPassFilter::new(0.8, 42.0);

        // Already at the input value: filtering is idempotent.
        assert_abs_diff_eq!(lpf.apply(42.0), 42.0, epsilon = 1e-12);
        assert_abs_diff_eq!(lpf.apply(42.0), 42.0, epsilon = 1e-12);
    }

    #[test]
    fn test_seed_overwrites_state() {
        let mut lpf = LowPassFilter::new(0.9, 0.0);
        lpf.seed(30.0);
        assert_eq!(lpf.value(), 30.0);

        // Next sample blends against the seeded state, not zero.
        let out = lpf.apply(30.0);
        assert_abs_diff_eq!(out, 30.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nan_restarts_from_raw_sample() {
        let mut lpf = LowPassFilter::new(0.9, f64::NAN);

        let out = lpf.apply(15.0);
        assert_eq!(out, 15.0);

        let out2 = lpf.apply(15.0);
        assert_abs_diff_eq!(out2, 15.0, epsilon = 1e-12);
    }
}
