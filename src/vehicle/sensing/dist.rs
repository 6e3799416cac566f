use crate::common::kal_fltr::ScalarKalman;

/// Process noise from accelerometer noise density, in (cm/ms²)².
pub const S_ACCEL: f64 = 9.80665e-6;
/// Measurement uncertainty of the motor odometry distance, in cm².
pub const S_MOTOR: f64 = 0.75;

/// Tracks traveled distance by dead reckoning fused with odometry.
///
/// Integrating acceleration alone drifts quadratically; fusing the
/// integrated distance with an independent odometry measurement each tick
/// bounds the drift. The noise model is two-stage: the velocity estimate
/// carries its own growing uncertainty (`s_v`), which in turn feeds the
/// Kalman estimate uncertainty, so position error reflects that velocity
/// itself is uncertain.
///
/// Distances are in centimetres, times in milliseconds.
///
/// # Examples
///
/// ```rust
/// use robopilot::vehicle::sensing::dist::DistanceTracker;
///
/// let mut tracker = DistanceTracker::new();
/// let dist_cm = tracker.track(10.0, 0.0, 12.5);
/// assert!(dist_cm >= 0.0);
/// ```
#[derive(Clone, Debug)]
pub struct DistanceTracker {
    /// Estimator fusing dead-reckoned distance with odometry.
    pub kf: ScalarKalman,
    /// Dead-reckoned distance in cm.
    pub dist: f64,
    /// Velocity in cm/ms.
    pub v: f64,
    /// Velocity uncertainty; grows with every prediction step.
    pub s_v: f64,
}

impl DistanceTracker {
    /// Creates a tracker at distance zero with zero initial velocity.
    pub fn new() -> Self {
        let mut tracker = DistanceTracker {
            kf: ScalarKalman::new(0.0, S_ACCEL, S_MOTOR),
            dist: 0.0,
            v: 0.0,
            s_v: 0.0,
        };
        tracker.reset(0.0);
        tracker
    }

    /// Resets the tracker to distance zero with the given initial velocity.
    ///
    /// # Arguments
    ///
    /// * `v0` - Initial velocity in cm/ms.
    pub fn reset(&mut self, v0: f64) {
        self.kf = ScalarKalman::new(0.0, S_ACCEL, S_MOTOR);
        self.dist = 0.0;
        self.v = v0;
        self.s_v = 0.0;
    }

    /// Advances the kinematic state and grows both uncertainty terms.
    fn predict(&mut self, ms_elapsed: f64, accel: f64) {
        self.dist += self.v * ms_elapsed;
        self.v += accel * ms_elapsed;

        // Kinematic drift feeds the estimator uncertainty.
        self.kf.s_est += ms_elapsed * ms_elapsed * self.s_v;
        self.s_v += ms_elapsed * ms_elapsed * S_ACCEL;
    }

    /// Returns the fused distance estimate for this tick.
    ///
    /// Predicts from the elapsed time and measured acceleration, then fuses
    /// the prediction with an independent odometry distance. The fused value
    /// becomes the new dead-reckoned distance.
    ///
    /// # Arguments
    ///
    /// * `ms_elapsed` - Time since the previous call, in ms.
    /// * `accel` - Longitudinal acceleration in cm/ms².
    /// * `measured_dist` - Odometry distance in cm.
    ///
    /// # Returns
    ///
    /// The corrected distance estimate in cm.
    pub fn track(&mut self, ms_elapsed: f64, accel: f64, measured_dist: f64) -> f64 {
        self.predict(ms_elapsed, accel);

        self.dist = self.kf.update(self.dist, measured_dist);
        self.dist
    }
}

impl Default for DistanceTracker {
    fn default() -> Self {
        Self::new()
    }
}
