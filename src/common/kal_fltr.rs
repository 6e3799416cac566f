/// Represents a one-dimensional Kalman estimator.
///
/// Maintains an exponentially-weighted belief about a scalar quantity. The
/// caller supplies a predicted estimate each tick (e.g. from a kinematic
/// model) together with an independent measurement; the filter blends the
/// two by their relative uncertainties.
///
/// The measurement noise level is fixed at construction and is not
/// re-estimated online. Process noise is injected by the owner adding to
/// [`s_est`](ScalarKalman::s_est) between updates.
#[derive(Clone, Debug)]
pub struct ScalarKalman {
    /// Last fused estimate.
    pub estimate: f64,
    /// Estimate uncertainty. Grows between updates (process noise), shrinks
    /// at each fused update.
    pub s_est: f64,
    /// Measurement uncertainty, fixed at construction.
    pub s_mea: f64,
}

impl ScalarKalman {
    /// Creates a new `ScalarKalman` instance.
    ///
    /// # Arguments
    ///
    /// * `initial_est` - Initial estimate of the tracked quantity.
    /// * `s_est` - Initial estimate uncertainty.
    /// * `s_mea` - Measurement uncertainty.
    ///
    /// # Returns
    ///
    /// A new `ScalarKalman` instance.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use robopilot::common::kal_fltr::ScalarKalman;
    ///
    /// let kf = ScalarKalman::new(0.0, 10.0, 2.0);
    /// assert_eq!(kf.estimate, 0.0);
    /// ```
    pub fn new(initial_est: f64, s_est: f64, s_mea: f64) -> Self {
        ScalarKalman {
            estimate: initial_est,
            s_est,
            s_mea,
        }
    }

    /// Fuses a predicted estimate with a measurement and returns the blend.
    ///
    /// The blending gain is `s_est / (s_est + s_mea)`; the updated
    /// uncertainty is `(1 - gain) * s_est`, so a single update never
    /// increases `s_est`. Both uncertainties being zero is a caller
    /// contract violation.
    ///
    /// # Arguments
    ///
    /// * `predicted` - Predicted estimate for this tick.
    /// * `measurement` - Independent measurement of the same quantity.
    ///
    /// # Returns
    ///
    /// The fused estimate, also stored in [`estimate`](ScalarKalman::estimate).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use robopilot::common::kal_fltr::ScalarKalman;
    ///
    /// let mut kf = ScalarKalman::new(0.0, 10.0, 2.0);
    /// let fused = kf.update(5.0, 7.0);
    /// assert!(fused > 6.6 && fused < 6.7);
    /// ```
    pub fn update(&mut self, predicted: f64, measurement: f64) -> f64 {
        debug_assert!(self.s_est + self.s_mea > 0.0);

        let gain = self.s_est / (self.s_est + self.s_mea);
        self.estimate = predicted + gain * (measurement - predicted);
        self.s_est = (1.0 - gain) * self.s_est;

        self.estimate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_scalar_kalman_creation() {
        let kf = ScalarKalman::new(1.5, 0.3, 0.7);

        assert_eq!(kf.estimate, 1.5);
        assert_eq!(kf.s_est, 0.3);
        assert_eq!(kf.s_mea, 0.7);
    }

    #[test]
    fn test_scalar_kalman_update() {
        let mut kf = ScalarKalman::new(0.0, 10.0, 2.0);

        let fused = kf.update(5.0, 7.0);

        // gain = 10/12, fused = 5 + gain * 2, s_est = (1 - gain) * 10
        assert_abs_diff_eq!(fused, 6.6667, epsilon = 1e-4);
        assert_abs_diff_eq!(kf.estimate, 6.6667, epsilon = 1e-4);
        assert_abs_diff_eq!(kf.s_est, 1.6667, epsilon = 1e-4);
    }

    #[test]
    fn test_update_never_increases_uncertainty() {
        let mut kf = ScalarKalman::new(0.0, 4.0, 1.0);

        for _ in 0..20 {
            let before = kf.s_est;
            kf.update(kf.estimate, 3.0);
            assert!(kf.s_est <= before);
        }
    }

    #[test]
    fn test_uncertain_prior_trusts_measurement() {
        let mut kf = ScalarKalman::new(0.0, 1e6, 1.0);

        let fused = kf.update(0.0, 50.0);
        assert_abs_diff_eq!(fused, 50.0, epsilon = 1e-3);
    }

    #[test]
    fn test_certain_prior_ignores_measurement() {
        let mut kf = ScalarKalman::new(0.0, 1e-9, 1.0);

        let fused = kf.update(10.0, 50.0);
        assert_abs_diff_eq!(fused, 10.0, epsilon = 1e-6);
    }
}
