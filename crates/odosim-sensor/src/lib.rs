//! `odosim-sensor` – synthetic odometry measurement pipeline.
//!
//! Turns the perfect kinematic state supplied by a physics host into what a
//! real odometry source would report: delayed, subsampled, noisy and only
//! where the sensor can see.
//!
//! # Modules
//!
//! - [`transform`] – [`FrameTransform`][transform::FrameTransform]: pose and
//!   twist of the child body relative to a parent frame.
//! - [`noise`] – [`NoiseModel`][noise::NoiseModel]: per-axis Gaussian plus
//!   uniform perturbations, with small-angle attitude noise.
//! - [`covariance`] – [`CovarianceSet`][covariance::CovarianceSet]: the
//!   reported diagonal pose and twist covariances.
//! - [`availability`] – [`AvailabilityGate`][availability::AvailabilityGate]:
//!   greyscale mask deciding where measurements exist.
//! - [`delay`] – [`DelayQueue`][delay::DelayQueue]: fixed tick latency,
//!   one release per tick.
//! - [`odometry`] – [`OdometrySensor`][odometry::OdometrySensor]: ties the
//!   above together behind a single `on_tick` call.

pub mod availability;
pub mod covariance;
pub mod delay;
pub mod noise;
pub mod odometry;
pub mod transform;

pub use odometry::{OdometrySensor, OdometrySettings, TickInput};
