/// Wraps an angle in degrees into `[-180, 180)`.
///
/// # Examples
///
/// ```rust
/// use robopilot::vehicle::sensing::heading::wrap_180;
///
/// assert_eq!(wrap_180(190.0), -170.0);
/// assert_eq!(wrap_180(-190.0), 170.0);
/// assert_eq!(wrap_180(45.0), 45.0);
/// ```
pub fn wrap_180(deg: f64) -> f64 {
    (deg + 180.0).rem_euclid(360.0) - 180.0
}

/// Returns the shortest signed difference `a - b` in degrees.
///
/// The result lies in `[-180, 180)`, so comparing headings across the
/// ±180° boundary never produces a full-turn jump.
///
/// # Examples
///
/// ```rust
/// use robopilot::vehicle::sensing::heading::angle_diff;
///
/// assert_eq!(angle_diff(179.0, -179.0), -2.0);
/// assert_eq!(angle_diff(-179.0, 179.0), 2.0);
/// ```
pub fn angle_diff(a: f64, b: f64) -> f64 {
    wrap_180(a - b)
}

/// Complementary filter fusing integrated gyro rate with magnetic heading.
///
/// The gyroscope is accurate over short horizons but integrates bias into
/// drift; the magnetometer is drift-free but noisy. The filter integrates
/// the gyro rate for the high-frequency response and pulls the result
/// toward the magnetic angle with weight `1 - alpha`:
///
/// ```text
/// predicted = wrap(angle + gyro_z * dt)
/// fused     = wrap(predicted + (1 - alpha) * diff(mag, predicted))
/// ```
///
/// Blending goes through the shortest angular difference, so the output is
/// continuous across the ±180° boundary.
#[derive(Clone, Debug)]
pub struct HeadingFilter {
    /// Gyro weight in `[0, 1]`; higher trusts the gyro more.
    alpha: f64,
    /// Current fused angle in degrees, wrapped to `[-180, 180)`.
    angle: f64,
}

impl HeadingFilter {
    /// Creates a filter seeded with an initial magnetic angle.
    ///
    /// # Arguments
    ///
    /// * `alpha` - Gyro weight in `[0, 1]`.
    /// * `initial_deg` - Starting angle, typically the first magnetometer
    ///   reading.
    pub fn new(alpha: f64, initial_deg: f64) -> Self {
        debug_assert!((0.0..=1.0).contains(&alpha));
        Self {
            alpha,
            angle: wrap_180(initial_deg),
        }
    }

    /// Returns the current fused angle in degrees.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Re-seeds the filter, discarding the fused state.
    pub fn seed(&mut self, deg: f64) {
        self.angle = wrap_180(deg);
    }

    /// Advances the filter by one tick and returns the fused angle.
    ///
    /// # Arguments
    ///
    /// * `ms_elapsed` - Time since the previous update, in ms.
    /// * `gyro_z` - Bias-corrected yaw rate in deg/ms.
    /// * `mag_deg` - Magnetic heading in degrees.
    ///
    /// # Returns
    ///
    /// The fused absolute angle in `[-180, 180)`.
    pub fn update(&mut self, ms_elapsed: f64, gyro_z: f64, mag_deg: f64) -> f64 {
        let predicted = wrap_180(self.angle + gyro_z * ms_elapsed);
        self.angle = wrap_180(predicted + (1.0 - self.alpha) * angle_diff(mag_deg, predicted));
        self.angle
    }
}
