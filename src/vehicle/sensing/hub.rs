use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use ndarray::{arr1, Array1};

use crate::common::filters::LowPassFilter;
use crate::vehicle::sensing::heading::{angle_diff, HeadingFilter};

/// Tuning constants for the sensor pipeline.
///
/// Changing these changes filter dynamics but not the algorithms. The
/// defaults are the values the pipeline was tuned with on the reference
/// vehicle.
#[derive(Clone, Copy, Debug)]
pub struct SensorConfig {
    /// IR channel smoothing constant.
    pub ir_alpha: f64,
    /// Ultrasonic channel smoothing constant.
    pub us_alpha: f64,
    /// Magnetometer per-axis smoothing constant.
    pub mag_alpha: f64,
    /// Gyro weight of the heading fusion filter.
    pub heading_alpha: f64,
    /// IR response scale `k` in `dist = k / ratio^p`.
    pub ir_scale: f64,
    /// IR response exponent `p`.
    pub ir_exponent: f64,
    /// Distance from the IR sensors to the front of the vehicle, in cm.
    pub ir_offset_cm: f64,
    /// Lower bound of the accurate IR range, in cm.
    pub ir_min_cm: f64,
    /// Upper bound of the accurate IR range, in cm.
    pub ir_max_cm: f64,
    /// Full-scale ADC code for the IR channels.
    pub adc_full_scale: f64,
    /// Speed of sound in cm/s.
    pub sound_speed_cm_s: f64,
    /// Accelerometer scale, g to cm/ms².
    pub gravity_cm_ms2: f64,
    /// Raw accelerometer Z reading at rest (one g).
    pub accel_z_rest_raw: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            ir_alpha: 0.95,
            us_alpha: 0.1,
            mag_alpha: 0.9,
            heading_alpha: 0.98,
            ir_scale: 6.3028,
            ir_exponent: 1.226,
            ir_offset_cm: 4.5,
            ir_min_cm: 6.0,
            ir_max_cm: 70.0,
            adc_full_scale: 4095.0,
            sound_speed_cm_s: 34300.0,
            gravity_cm_ms2: 9.80665e-4,
            accel_z_rest_raw: 1.0,
        }
    }
}

/// Synchronous access to raw sensor samples.
///
/// The hub never talks to hardware directly; the embedding supplies an
/// implementation backed by its ADC, I2C and timer drivers. Failure and
/// timeout handling belong to that driver layer; every method returns a
/// (possibly stale) numeric sample.
pub trait SensorBus {
    /// Returns the left and right IR ADC codes.
    fn read_ir_raw(&mut self) -> [u16; 2];

    /// Returns the gyroscope Z rate in deg/s.
    fn read_gyro_z_raw(&mut self) -> f64;

    /// Returns the accelerometer X/Y/Z readings in g.
    fn read_accel_raw(&mut self) -> [f64; 3];

    /// Returns the magnetometer X/Y readings.
    fn read_mag_xy_raw(&mut self) -> [f64; 2];

    /// Applies hard/soft-iron correction to a filtered magnetometer pair.
    ///
    /// The default is the identity; vehicles with a calibration matrix
    /// override this.
    fn mag_adjust(&self, mag: [f64; 2]) -> [f64; 2] {
        mag
    }
}

/// Empty-cell sentinel; not the bit pattern of any measured pulse.
const PULSE_EMPTY: u64 = u64::MAX;

/// Single-word cell carrying the ultrasonic echo pulse duration from
/// interrupt context to the control loop.
///
/// The timer-capture interrupt calls [`post`](PulseCell::post); the main
/// loop drains with [`take`](PulseCell::take). Both sides touch one atomic
/// word, so a reader never observes a torn value.
#[derive(Debug)]
pub struct PulseCell(AtomicU64);

impl PulseCell {
    /// Creates an empty cell.
    pub fn new() -> Self {
        PulseCell(AtomicU64::new(PULSE_EMPTY))
    }

    /// Publishes a pulse duration in seconds, replacing any unread value.
    pub fn post(&self, pulse_s: f64) {
        self.0.store(pulse_s.to_bits(), Ordering::Release);
    }

    /// Removes and returns the pending pulse duration, if any.
    pub fn take(&self) -> Option<f64> {
        let bits = self.0.swap(PULSE_EMPTY, Ordering::AcqRel);
        if bits == PULSE_EMPTY {
            None
        } else {
            Some(f64::from_bits(bits))
        }
    }
}

impl Default for PulseCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Filtered, bias-corrected sensor readings for one sampling tick.
///
/// Owned by the hub and handed to the control loop by reference; biases are
/// written once by [`SensorHub::calibrate_bias`] and by construction, and
/// are immutable afterwards.
#[derive(Clone, Debug)]
pub struct SensorSnapshot {
    /// Filtered IR distances `[left, right]`, in cm.
    pub ir_dist: [f64; 2],
    /// Filtered ultrasonic distance, in cm.
    pub us_dist: f64,
    /// Bias-corrected yaw rate, in deg/ms.
    pub gyro_z: f64,
    /// Bias-corrected acceleration X/Y/Z, in cm/ms².
    pub accel: Array1<f64>,
    /// Bias-corrected heading in `[-180, 180)` degrees.
    pub heading: f64,
    /// Gyroscope Z bias, raw deg/s.
    pub gyro_z_bias: f64,
    /// Accelerometer bias per axis, raw g.
    pub accel_bias: Array1<f64>,
    /// Magnetic angle captured at startup; headings are relative to it.
    pub heading_bias: f64,
}

/// Converts a raw IR ADC code to a distance in centimetres.
///
/// Applies the inverse power-law response `k / (code/full_scale)^p`,
/// saturates below-range codes to the far limit, corrects for the sensor
/// mounting offset and clamps to the accurate near range.
///
/// # Arguments
///
/// * `cfg` - Tuning constants for the IR response.
/// * `code` - Raw ADC code.
///
/// # Returns
///
/// A distance in cm; monotone non-increasing in `code`.
///
/// # Examples
///
/// ```rust
/// use robopilot::vehicle::sensing::hub::{ir_value_to_dist, SensorConfig};
///
/// let cfg = SensorConfig::default();
/// let far = ir_value_to_dist(&cfg, 100);
/// let near = ir_value_to_dist(&cfg, 3000);
/// assert!(far > near);
/// ```
pub fn ir_value_to_dist(cfg: &SensorConfig, code: u16) -> f64 {
    let ratio = (f64::from(code) / cfg.adc_full_scale).min(1.0);
    let div = ratio.powf(cfg.ir_exponent);

    let mut dist = if div < cfg.ir_scale / cfg.ir_max_cm {
        cfg.ir_max_cm
    } else {
        cfg.ir_scale / div
    };

    dist -= cfg.ir_offset_cm;
    if dist < cfg.ir_min_cm {
        dist = cfg.ir_min_cm;
    }
    dist
}

/// Reads, filters and bias-corrects all motion sensor channels.
///
/// One hub instance owns the [`SensorSnapshot`] and every per-channel
/// filter; it is constructed once at system initialization with the
/// hardware access object and passed into the control loop. Construction
/// preloads the magnetometer filters, seeds the heading fusion filter with
/// the initial magnetic angle and stores that angle as the heading bias, so
/// headings start near zero regardless of which way the vehicle faces.
///
/// [`calibrate_bias`](SensorHub::calibrate_bias) must run once, before
/// normal sensing, while the vehicle is motionless.
#[derive(Debug)]
pub struct SensorHub<B: SensorBus> {
    bus: B,
    cfg: SensorConfig,
    snap: SensorSnapshot,
    ir_lpf: [LowPassFilter; 2],
    us_lpf: LowPassFilter,
    mag_lpf: [LowPassFilter; 2],
    heading_filter: HeadingFilter,
    pulse: Arc<PulseCell>,
}

impl<B: SensorBus> SensorHub<B> {
    /// Creates a hub, preloading the magnetometer channels.
    ///
    /// # Arguments
    ///
    /// * `bus` - Hardware access object.
    /// * `cfg` - Tuning constants.
    pub fn new(mut bus: B, cfg: SensorConfig) -> Self {
        let mag0 = bus.read_mag_xy_raw();
        let mut mag_lpf = [
            LowPassFilter::new(cfg.mag_alpha, mag0[0]),
            LowPassFilter::new(cfg.mag_alpha, mag0[1]),
        ];

        let initial_angle = Self::mag_angle(&mut bus, &mut mag_lpf);

        SensorHub {
            bus,
            snap: SensorSnapshot {
                ir_dist: [0.0; 2],
                us_dist: 0.0,
                gyro_z: 0.0,
                accel: Array1::zeros(3),
                heading: 0.0,
                gyro_z_bias: 0.0,
                accel_bias: Array1::zeros(3),
                heading_bias: initial_angle,
            },
            ir_lpf: [
                LowPassFilter::new(cfg.ir_alpha, 0.0),
                LowPassFilter::new(cfg.ir_alpha, 0.0),
            ],
            us_lpf: LowPassFilter::new(cfg.us_alpha, 0.0),
            mag_lpf,
            heading_filter: HeadingFilter::new(cfg.heading_alpha, initial_angle),
            pulse: Arc::new(PulseCell::new()),
            cfg,
        }
    }

    /// Returns the current snapshot.
    pub fn snapshot(&self) -> &SensorSnapshot {
        &self.snap
    }

    /// Returns the cell the timer-capture interrupt posts pulse durations to.
    pub fn pulse_cell(&self) -> Arc<PulseCell> {
        Arc::clone(&self.pulse)
    }

    /// Reads the magnetic angle: per-axis LPF, iron correction, `atan2`.
    ///
    /// Sign-inverted so positive headings turn the vehicle clockwise.
    fn mag_angle(bus: &mut B, mag_lpf: &mut [LowPassFilter; 2]) -> f64 {
        let raw = bus.read_mag_xy_raw();
        let filtered = [mag_lpf[0].apply(raw[0]), mag_lpf[1].apply(raw[1])];
        let mag = bus.mag_adjust(filtered);
        -mag[1].atan2(mag[0]).to_degrees()
    }

    /// Samples both IR channels into the snapshot.
    pub fn read_ir(&mut self) {
        let codes = self.bus.read_ir_raw();
        for (i, code) in codes.into_iter().enumerate() {
            self.snap.ir_dist[i] = self.ir_lpf[i].apply(ir_value_to_dist(&self.cfg, code));
        }
    }

    /// Drains a pending ultrasonic pulse into the snapshot.
    ///
    /// # Returns
    ///
    /// The new filtered distance in cm, or `None` when no echo arrived
    /// since the last poll.
    pub fn poll_ultrasonic(&mut self) -> Option<f64> {
        let pulse_s = self.pulse.take()?;
        let dist = pulse_s * self.cfg.sound_speed_cm_s / 2.0;
        self.snap.us_dist = self.us_lpf.apply(dist);
        Some(self.snap.us_dist)
    }

    /// Samples the gyroscope Z rate into the snapshot, in deg/ms.
    pub fn read_gyro_z(&mut self) {
        let raw = self.bus.read_gyro_z_raw();
        self.snap.gyro_z = (raw - self.snap.gyro_z_bias) / 1000.0;
    }

    /// Samples the accelerometer into the snapshot, in cm/ms².
    pub fn read_accel(&mut self) {
        let raw = arr1(&self.bus.read_accel_raw());
        self.snap.accel = (raw - &self.snap.accel_bias) * self.cfg.gravity_cm_ms2;
    }

    /// Fuses gyro and magnetometer into the bias-corrected heading.
    ///
    /// Uses the yaw rate sampled by the last [`read_gyro_z`] call.
    ///
    /// # Arguments
    ///
    /// * `ms_elapsed` - Time since the previous heading update, in ms.
    pub fn update_heading(&mut self, ms_elapsed: f64) {
        let mag = Self::mag_angle(&mut self.bus, &mut self.mag_lpf);
        let fused = self.heading_filter.update(ms_elapsed, self.snap.gyro_z, mag);
        self.snap.heading = angle_diff(fused, self.snap.heading_bias);
    }

    /// Samples every channel for one control tick.
    ///
    /// # Arguments
    ///
    /// * `ms_elapsed` - Time since the previous tick, in ms.
    pub fn sample(&mut self, ms_elapsed: f64) {
        self.read_ir();
        let _ = self.poll_ultrasonic();
        self.read_gyro_z();
        self.read_accel();
        self.update_heading(ms_elapsed);
    }

    /// Measures the gyro and accelerometer zero offsets.
    ///
    /// Averages `count` samples taken while the vehicle is stationary and
    /// stores them as the bias terms; the accelerometer Z axis reads one g
    /// at rest, so that component is removed from its bias. Blocks for
    /// `count` bus reads and must not run concurrently with normal sensing.
    ///
    /// # Arguments
    ///
    /// * `count` - Number of samples to average; must be non-zero.
    pub fn calibrate_bias(&mut self, count: usize) {
        assert!(count > 0, "calibration needs at least one sample");

        let mut gyro_total = 0.0;
        let mut accel_total = Array1::<f64>::zeros(3);

        for _ in 0..count {
            gyro_total += self.bus.read_gyro_z_raw();
            accel_total += &arr1(&self.bus.read_accel_raw());
        }

        let n = count as f64;
        self.snap.gyro_z_bias = gyro_total / n;

        let mut accel_bias = accel_total / n;
        accel_bias[2] -= self.cfg.accel_z_rest_raw;
        self.snap.accel_bias = accel_bias;

        debug!(
            "bias calibration over {} samples: gyro_z={:.5} accel={:.5?}",
            count, self.snap.gyro_z_bias, self.snap.accel_bias
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Scripted bus returning fixed raw samples.
    struct MockBus {
        ir: [u16; 2],
        gyro_z: f64,
        accel: [f64; 3],
        mag: [f64; 2],
    }

    impl MockBus {
        fn stationary() -> Self {
            MockBus {
                ir: [2000, 2000],
                gyro_z: 0.0,
                accel: [0.0, 0.0, 1.0],
                mag: [1.0, 0.0],
            }
        }
    }

    impl SensorBus for MockBus {
        fn read_ir_raw(&mut self) -> [u16; 2] {
            self.ir
        }

        fn read_gyro_z_raw(&mut self) -> f64 {
            self.gyro_z
        }

        fn read_accel_raw(&mut self) -> [f64; 3] {
            self.accel
        }

        fn read_mag_xy_raw(&mut self) -> [f64; 2] {
            self.mag
        }
    }

    #[test]
    fn test_ir_conversion_monotone_and_in_range() {
        let cfg = SensorConfig::default();

        let mut prev = f64::INFINITY;
        for code in (0..=4095u16).step_by(3) {
            let dist = ir_value_to_dist(&cfg, code);
            assert!(dist >= cfg.ir_min_cm && dist <= cfg.ir_max_cm);
            assert!(dist <= prev, "not monotone at code {code}");
            prev = dist;
        }
    }

    #[test]
    fn test_ir_conversion_saturates_below_range() {
        let cfg = SensorConfig::default();

        // A code far below the sensor response saturates to the far limit.
        let far = ir_value_to_dist(&cfg, 0);
        assert_abs_diff_eq!(far, cfg.ir_max_cm - cfg.ir_offset_cm, epsilon = 1e-9);
    }

    #[test]
    fn test_ir_conversion_clamps_near_range() {
        let cfg = SensorConfig::default();
        let near = ir_value_to_dist(&cfg, 4095);
        assert_abs_diff_eq!(near, cfg.ir_min_cm, epsilon = 1e-9);
    }

    #[test]
    fn test_ir_conversion_overrange_code_clamps_ratio() {
        let mut cfg = SensorConfig::default();
        cfg.adc_full_scale = 1024.0;

        // Codes past full scale behave like full scale.
        let at_fs = ir_value_to_dist(&cfg, 1024);
        let past_fs = ir_value_to_dist(&cfg, 4095);
        assert_abs_diff_eq!(at_fs, past_fs, epsilon = 1e-12);
    }

    #[test]
    fn test_pulse_cell_roundtrip() {
        let cell = PulseCell::new();
        assert_eq!(cell.take(), None);

        cell.post(0.00125);
        assert_eq!(cell.take(), Some(0.00125));
        assert_eq!(cell.take(), None);
    }

    #[test]
    fn test_pulse_cell_keeps_latest_value() {
        let cell = PulseCell::new();
        cell.post(0.001);
        cell.post(0.002);
        assert_eq!(cell.take(), Some(0.002));
    }

    #[test]
    fn test_pulse_cell_cross_thread() {
        let cell = Arc::new(PulseCell::new());
        let producer = Arc::clone(&cell);

        let handle = std::thread::spawn(move || {
            producer.post(0.0007);
        });
        handle.join().unwrap();

        assert_eq!(cell.take(), Some(0.0007));
    }

    #[test]
    fn test_ultrasonic_conversion_and_filtering() {
        let mut hub = SensorHub::new(MockBus::stationary(), SensorConfig::default());

        // 1 ms echo = 17.15 cm; first filtered output is 0.9 of it.
        hub.pulse_cell().post(0.001);
        let dist = hub.poll_ultrasonic().unwrap();
        assert_abs_diff_eq!(dist, 0.9 * 17.15, epsilon = 1e-9);

        // No new echo, nothing to drain.
        assert_eq!(hub.poll_ultrasonic(), None);
        assert_abs_diff_eq!(hub.snapshot().us_dist, 0.9 * 17.15, epsilon = 1e-9);
    }

    #[test]
    fn test_gyro_scaling_and_bias() {
        let mut bus = MockBus::stationary();
        bus.gyro_z = 100.5;

        let mut hub = SensorHub::new(bus, SensorConfig::default());
        hub.snap.gyro_z_bias = 0.5;
        hub.read_gyro_z();

        // (100.5 - 0.5) dps over 1000 = 0.1 deg/ms.
        assert_abs_diff_eq!(hub.snapshot().gyro_z, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_accel_scaling_and_bias() {
        let mut bus = MockBus::stationary();
        bus.accel = [0.5, -0.25, 1.0];

        let mut hub = SensorHub::new(bus, SensorConfig::default());
        hub.snap.accel_bias = arr1(&[0.0, 0.0, 1.0]);
        hub.read_accel();

        let accel = &hub.snapshot().accel;
        assert_abs_diff_eq!(accel[0], 0.5 * 9.80665e-4, epsilon = 1e-12);
        assert_abs_diff_eq!(accel[1], -0.25 * 9.80665e-4, epsilon = 1e-12);
        assert_abs_diff_eq!(accel[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_calibration_reproduces_known_offsets() {
        let mut bus = MockBus::stationary();
        bus.gyro_z = 0.37;
        bus.accel = [0.01, -0.02, 1.02];

        let mut hub = SensorHub::new(bus, SensorConfig::default());
        hub.calibrate_bias(100);

        let snap = hub.snapshot();
        assert_abs_diff_eq!(snap.gyro_z_bias, 0.37, epsilon = 1e-9);
        assert_abs_diff_eq!(snap.accel_bias[0], 0.01, epsilon = 1e-9);
        assert_abs_diff_eq!(snap.accel_bias[1], -0.02, epsilon = 1e-9);
        // Z bias is the raw mean minus one g.
        assert_abs_diff_eq!(snap.accel_bias[2], 0.02, epsilon = 1e-9);
    }

    #[test]
    #[should_panic(expected = "at least one sample")]
    fn test_calibration_rejects_zero_count() {
        let mut hub = SensorHub::new(MockBus::stationary(), SensorConfig::default());
        hub.calibrate_bias(0);
    }

    #[test]
    fn test_heading_starts_near_zero_and_stays_in_range() {
        // Facing magnetic "-90 degrees": heading bias soaks it up.
        let mut bus = MockBus::stationary();
        bus.mag = [0.0, 1.0];

        let mut hub = SensorHub::new(bus, SensorConfig::default());
        for _ in 0..50 {
            hub.read_gyro_z();
            hub.update_heading(10.0);
            let heading = hub.snapshot().heading;
            assert!((-180.0..180.0).contains(&heading));
        }

        assert_abs_diff_eq!(hub.snapshot().heading, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_ir_filtering_tracks_constant_scene() {
        let mut hub = SensorHub::new(MockBus::stationary(), SensorConfig::default());

        let expected = ir_value_to_dist(&SensorConfig::default(), 2000);
        for _ in 0..600 {
            hub.read_ir();
        }

        assert_abs_diff_eq!(hub.snapshot().ir_dist[0], expected, epsilon = 1e-6);
        assert_abs_diff_eq!(hub.snapshot().ir_dist[1], expected, epsilon = 1e-6);
    }

    #[test]
    fn test_sample_updates_every_channel() {
        let mut bus = MockBus::stationary();
        bus.gyro_z = 10.0;
        let mut hub = SensorHub::new(bus, SensorConfig::default());

        hub.pulse_cell().post(0.002);
        hub.sample(10.0);

        let snap = hub.snapshot();
        assert!(snap.ir_dist[0] > 0.0);
        assert!(snap.us_dist > 0.0);
        assert_abs_diff_eq!(snap.gyro_z, 0.01, epsilon = 1e-12);
    }
}
