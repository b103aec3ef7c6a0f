//! In-process kinematic world for CI/CD testing without a physics engine.
//!
//! [`SimWorld`] holds a set of named links, each driven by a scripted
//! [`Motion`].  Stepping it advances every link by a fixed time step, which
//! is all an odometry sensor needs to see plausible ground truth.
//!
//! # Motions
//!
//! | Motion | Behaviour |
//! |---|---|
//! | [`Motion::Static`] | Fixed pose, zero velocity. |
//! | [`Motion::ConstantTwist`] | Constant body-frame linear and angular velocity, integrated each step. |
//! | [`Motion::Circle`] | Horizontal circle at constant speed, heading tangent to the path. |
//!
//! # Example
//!
//! ```rust
//! use odosim_hal::sim::{Motion, SimWorld};
//! use odosim_hal::world::WorldModel;
//! use odosim_types::{Pose, Vec3};
//!
//! let mut world = SimWorld::builder()
//!     .with_static_link("base", Pose::identity())
//!     .with_link("rover", Motion::ConstantTwist {
//!         pose: Pose::identity(),
//!         linear: Vec3::new(1.0, 0.0, 0.0),
//!         angular: Vec3::zero(),
//!     })
//!     .build();
//!
//! world.step(0.5);
//! let rover = world.link_state("rover").unwrap();
//! assert!((rover.pose.position.x - 0.5).abs() < 1e-12);
//! ```

use std::collections::BTreeMap;

use odosim_types::{LinkState, Pose, Quaternion, Vec3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::world::WorldModel;

// ────────────────────────────────────────────────────────────────────────────
// Motion scripts
// ────────────────────────────────────────────────────────────────────────────

/// Scripted trajectory of one link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Motion {
    Static {
        #[serde(default)]
        pose: Pose,
    },
    ConstantTwist {
        /// Initial pose.
        #[serde(default)]
        pose: Pose,
        /// Body-frame linear velocity (m/s).
        #[serde(default)]
        linear: Vec3,
        /// Body-frame angular velocity (rad/s).
        #[serde(default)]
        angular: Vec3,
    },
    Circle {
        #[serde(default)]
        center: Vec3,
        radius: f64,
        /// Rate of travel around the circle (rad/s); negative runs clockwise.
        angular_speed: f64,
    },
}

impl Motion {
    /// State at `t = 0`.
    fn initial_state(&self) -> LinkState {
        match self {
            Motion::Static { pose } => LinkState {
                pose: *pose,
                ..LinkState::default()
            },
            Motion::ConstantTwist {
                pose,
                linear,
                angular,
            } => LinkState {
                pose: *pose,
                linear_velocity: *linear,
                angular_velocity: *angular,
            },
            Motion::Circle {
                center,
                radius,
                angular_speed,
            } => circle_state(*center, *radius, *angular_speed, 0.0),
        }
    }

    /// Advance `state` from `elapsed - dt` to `elapsed`.
    fn advance(&self, state: &mut LinkState, dt: f64, elapsed: f64) {
        match self {
            Motion::Static { .. } => {}
            Motion::ConstantTwist { linear, angular, .. } => {
                let pose = &mut state.pose;
                pose.position = pose
                    .position
                    .add(pose.orientation.rotate(linear.scale(dt)));
                pose.orientation = pose
                    .orientation
                    .mul(Quaternion::from_rotation_vector(angular.scale(dt)));
            }
            Motion::Circle {
                center,
                radius,
                angular_speed,
            } => *state = circle_state(*center, *radius, *angular_speed, elapsed),
        }
    }
}

/// Closed-form state on a horizontal circle at time `t`.
fn circle_state(center: Vec3, radius: f64, angular_speed: f64, t: f64) -> LinkState {
    let angle = angular_speed * t;
    let (s, c) = angle.sin_cos();
    // Heading along the direction of travel.
    let heading = angle + angular_speed.signum() * std::f64::consts::FRAC_PI_2;
    LinkState {
        pose: Pose::new(
            center.add(Vec3::new(radius * c, radius * s, 0.0)),
            Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), heading),
        ),
        linear_velocity: Vec3::new(radius * angular_speed.abs(), 0.0, 0.0),
        angular_velocity: Vec3::new(0.0, 0.0, angular_speed),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimWorld
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct SimLink {
    motion: Motion,
    state: LinkState,
}

/// A kinematic world of scripted links.
#[derive(Debug, Clone, Default)]
pub struct SimWorld {
    links: BTreeMap<String, SimLink>,
    elapsed: f64,
}

impl SimWorld {
    /// Create a new builder with no links.
    pub fn builder() -> SimWorldBuilder {
        SimWorldBuilder::default()
    }

    /// Add or replace a link.
    pub fn insert_link(&mut self, name: impl Into<String>, motion: Motion) {
        let state = motion.initial_state();
        self.links.insert(name.into(), SimLink { motion, state });
    }

    /// Advance every link by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        self.elapsed += dt;
        for link in self.links.values_mut() {
            link.motion.advance(&mut link.state, dt, self.elapsed);
        }
        debug!(elapsed = self.elapsed, links = self.links.len(), "sim world stepped");
    }

    /// Seconds simulated so far.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl WorldModel for SimWorld {
    fn link_state(&self, name: &str) -> Option<LinkState> {
        self.links.get(name).map(|l| l.state)
    }

    fn contains(&self, name: &str) -> bool {
        self.links.contains_key(name)
    }

    fn link_names(&self) -> Vec<String> {
        self.links.keys().cloned().collect()
    }
}

/// Builder that constructs a [`SimWorld`].
#[derive(Default)]
pub struct SimWorldBuilder {
    links: Vec<(String, Motion)>,
}

impl SimWorldBuilder {
    /// Register a link that never moves.
    pub fn with_static_link(self, name: impl Into<String>, pose: Pose) -> Self {
        self.with_link(name, Motion::Static { pose })
    }

    /// Register a link driven by `motion`.
    pub fn with_link(mut self, name: impl Into<String>, motion: Motion) -> Self {
        self.links.push((name.into(), motion));
        self
    }

    pub fn build(self) -> SimWorld {
        let mut world = SimWorld::default();
        for (name, motion) in self.links {
            world.insert_link(name, motion);
        }
        world
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
