//! `odosim-hal` – host abstraction layer.
//!
//! Separates the odometry pipeline from whatever physics host supplies the
//! ground truth.
//!
//! # Modules
//!
//! - [`world`] – [`WorldModel`]: named link lookup, the only thing a sensor
//!   asks of its host.
//! - [`sim`] – [`SimWorld`]: scripted kinematic world used by the CLI and
//!   the test suites.

pub mod sim;
pub mod world;

pub use sim::{Motion, SimWorld, SimWorldBuilder};
pub use world::WorldModel;
