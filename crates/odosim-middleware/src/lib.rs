//! `odosim-middleware` – the publish boundary.
//!
//! Routes released odometry measurements to whoever is listening without
//! caring about the data's meaning.
//!
//! # Modules
//!
//! - [`bus`] – Headless, channel-partitioned publish/subscribe event bus
//!   built on Tokio broadcast channels.
//! - [`sink`] – The [`MeasurementSink`] trait every transport implements, and
//!   the lossless [`QueueSink`].
//! - [`publisher`] – [`OdometryPublisher`]: builds the five projections of a
//!   measurement, skipping channels nobody listens to.

pub mod bus;
pub mod publisher;
pub mod sink;

pub use bus::{Channel, ChannelReceiver, EventBus};
pub use publisher::{OdometryPublisher, PublishReport, TopicNames};
pub use sink::{MeasurementSink, QueueSink};
