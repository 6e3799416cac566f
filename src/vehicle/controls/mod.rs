//! Command sequencing for the control loop.

pub mod directives;
