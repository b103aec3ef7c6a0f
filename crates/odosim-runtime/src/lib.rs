//! `odosim-runtime` – host wiring for odometry sensors.
//!
//! # Modules
//!
//! - [`plugin`] – [`OdometryPlugin`][plugin::OdometryPlugin]: resolves a
//!   sensor's links against the world at load time, then runs one sensor
//!   tick per simulation step and hands the result to the publisher.
//! - [`sim_loop`] – [`SimulationLoop`][sim_loop::SimulationLoop]: fixed-step
//!   clock over a [`SimWorld`][odosim_hal::SimWorld] and its plugins, with a
//!   cooperative shutdown flag.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export
//!   to Jaeger, Grafana Tempo, or any OTLP-compatible collector.

pub mod plugin;
pub mod sim_loop;
pub mod telemetry;

pub use plugin::{OdometryPlugin, OdometryPluginConfig, Release};
pub use sim_loop::{LoopStats, SimulationLoop};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
