//! # robopilot
//!
//! `robopilot` is a Rust crate that provides the motion-sensing and command-sequencing core of a
//! small autonomous vehicle controller. It turns noisy raw sensor samples (infrared range,
//! ultrasonic echo timing, gyroscope, accelerometer, magnetometer) into filtered, bias-corrected
//! estimates of heading and traveled distance, and manages an ordered queue of motion directives
//! with completion tracking. Hardware I/O, byte-level command parsing and the motor control loop
//! are external collaborators behind narrow seams.
//!
//! ## Modules
//!
//! `robopilot` is organized into several modules, each serving a specific purpose:
//!
//! - [LowPassFilter](common/filters/struct.LowPassFilter.html): Exponential smoothing with a
//!   channel-specific time constant.
//!
//! - [ScalarKalman](common/kal_fltr/struct.ScalarKalman.html): One-dimensional Kalman estimator
//!   blending a prediction with a measurement by their uncertainties.
//!
//! - [DistanceTracker](vehicle/sensing/dist/struct.DistanceTracker.html): Dead-reckoned distance
//!   fused with odometry to bound accelerometer drift.
//!
//! - [HeadingFilter](vehicle/sensing/heading/struct.HeadingFilter.html): Complementary fusion of
//!   integrated gyro rate and magnetic heading, wrapped to `[-180, 180)` degrees.
//!
//! - [SensorHub](vehicle/sensing/hub/struct.SensorHub.html): Per-tick reading, filtering and bias
//!   calibration of every sensor channel behind the [SensorBus](vehicle/sensing/hub/trait.SensorBus.html)
//!   hardware seam.
//!
//! - [DirectiveQueue](vehicle/controls/directives/struct.DirectiveQueue.html): Fixed-pool FIFO of
//!   motion directives with lookahead and continuation matching.
//!
//! ## Usage
//!
//! To use the `robopilot` crate in your project, add the following line to your `Cargo.toml` file:
//!
//! ```toml
//! [dependencies]
//! robopilot = "0.1.0"
//! ```
//!
//! Then, you can import the necessary modules and use the provided functionalities in your code.
//!
//! ## Example
//!
//! ```rust
//! use robopilot::vehicle::sensing::dist::DistanceTracker;
//!
//! // Create a distance tracker
//! let mut tracker = DistanceTracker::new();
//!
//! // Each control tick: elapsed ms, measured acceleration, odometry distance
//! let dist_cm = tracker.track(10.0, 0.0, 12.5);
//!
//! // Use the corrected distance in the control loop
//! // ...
//! assert!(dist_cm > 0.0);
//! ```
//!
//! ## Contributing
//!
//! Contributions and feedback are welcome! If you'd like to contribute, report an issue, or
//! suggest an enhancement, please engage with the project on
//! [GitHub](https://github.com/robopilot-rs/robopilot). Your contributions help improve this
//! crate for the community.
//!
//! ## License
//!
//! This project is licensed under the [MIT License](LICENSE).

pub mod common;
pub mod vehicle;
