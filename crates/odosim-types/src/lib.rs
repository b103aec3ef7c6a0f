//! Shared data model for the odosim workspace.
//!
//! Geometry primitives live in [`geometry`]; this module holds the message
//! types that flow from the host simulation, through the sensor pipeline, to
//! the publish boundary, plus the workspace-wide [`OdomError`].

pub mod geometry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub use geometry::{Pose, Quaternion, Twist, Vec3};

const NANOS_PER_SEC: i64 = 1_000_000_000;

// ────────────────────────────────────────────────────────────────────────────
// Time
// ────────────────────────────────────────────────────────────────────────────

/// Simulation time as whole seconds plus nanoseconds (`0 <= nanosec < 1e9`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Stamp {
    pub sec: i64,
    pub nanosec: u32,
}

impl Stamp {
    pub fn new(sec: i64, nanosec: u32) -> Self {
        Self::from_nanos(sec.saturating_mul(NANOS_PER_SEC).saturating_add(i64::from(nanosec)))
    }

    pub fn from_nanos(total: i64) -> Self {
        Self {
            sec: total.div_euclid(NANOS_PER_SEC),
            nanosec: total.rem_euclid(NANOS_PER_SEC) as u32,
        }
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Self::from_nanos((secs * NANOS_PER_SEC as f64).round() as i64)
    }

    pub fn as_nanos(self) -> i64 {
        self.sec.saturating_mul(NANOS_PER_SEC).saturating_add(i64::from(self.nanosec))
    }

    pub fn as_secs_f64(self) -> f64 {
        self.sec as f64 + f64::from(self.nanosec) * 1e-9
    }

    /// Shift by a signed number of seconds, carrying into (or borrowing from)
    /// the seconds field.  Saturates at the representable range.
    pub fn offset_by(self, secs: f64) -> Self {
        let offset = (secs * NANOS_PER_SEC as f64).round() as i64;
        Self::from_nanos(self.as_nanos().saturating_add(offset))
    }
}

/// Message header shared by every stamped projection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Header {
    pub seq: u64,
    pub stamp: Stamp,
    /// Frame the pose is expressed in (the parent frame id).
    pub frame_id: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Covariance
// ────────────────────────────────────────────────────────────────────────────

/// A 6×6 covariance matrix stored row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Covariance6(pub [f64; 36]);

impl Covariance6 {
    pub const DIM: usize = 6;

    pub fn zeros() -> Self {
        Self([0.0; 36])
    }

    /// Diagonal matrix from the six diagonal entries.
    pub fn from_diagonal(diag: [f64; 6]) -> Self {
        let mut m = Self::zeros();
        for (i, v) in diag.into_iter().enumerate() {
            m.0[i * Self::DIM + i] = v;
        }
        m
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.0[row * Self::DIM + col]
    }

    pub fn diagonal(&self) -> [f64; 6] {
        std::array::from_fn(|i| self.get(i, i))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl Default for Covariance6 {
    fn default() -> Self {
        Self::zeros()
    }
}

// serde only derives arrays up to 32 elements; go through a slice.
impl Serialize for Covariance6 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.as_slice().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Covariance6 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<f64>::deserialize(deserializer)?;
        let len = values.len();
        let data: [f64; 36] = values.try_into().map_err(|_| {
            serde::de::Error::invalid_length(len, &"36 covariance entries")
        })?;
        Ok(Self(data))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Host inputs
// ────────────────────────────────────────────────────────────────────────────

/// Ground-truth kinematic state of one rigid body, as supplied by the
/// simulation host each step.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkState {
    /// Pose of the body in the world frame.
    pub pose: Pose,
    /// Linear velocity relative to the world, expressed in the body frame.
    pub linear_velocity: Vec3,
    /// Angular velocity relative to the world, expressed in the body frame.
    pub angular_velocity: Vec3,
}

// ────────────────────────────────────────────────────────────────────────────
// Measurement and its projections
// ────────────────────────────────────────────────────────────────────────────

/// One odometry measurement: pose and twist of the child frame relative to
/// the parent frame, with the reported uncertainty.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Measurement {
    pub header: Header,
    pub child_frame_id: String,
    pub pose: Pose,
    pub twist: Twist,
    pub pose_covariance: Covariance6,
    pub twist_covariance: Covariance6,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseWithCovarianceStamped {
    pub header: Header,
    pub pose: Pose,
    pub covariance: Covariance6,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionStamped {
    pub header: Header,
    pub position: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStamped {
    pub header: Header,
    pub child_frame_id: String,
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Measurement {
    pub fn pose_with_covariance_stamped(&self) -> PoseWithCovarianceStamped {
        PoseWithCovarianceStamped {
            header: self.header.clone(),
            pose: self.pose,
            covariance: self.pose_covariance,
        }
    }

    pub fn position_stamped(&self) -> PositionStamped {
        PositionStamped {
            header: self.header.clone(),
            position: self.pose.position,
        }
    }

    pub fn transform_stamped(&self) -> TransformStamped {
        TransformStamped {
            header: self.header.clone(),
            child_frame_id: self.child_frame_id.clone(),
            translation: self.pose.position,
            rotation: self.pose.orientation,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Bus events
// ────────────────────────────────────────────────────────────────────────────

/// Unified event wrapper carried on the odometry bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Full topic name the event was published on, e.g. `"quad/base_link/odometry"`.
    pub source: String,
    /// Wall-clock time of publication.
    pub wall_time: DateTime<Utc>,
    pub payload: EventPayload,
}

/// The five projections of a released measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Odometry(Measurement),
    PoseWithCovariance(PoseWithCovarianceStamped),
    Position(PositionStamped),
    Transform(TransformStamped),
    Pose(Pose),
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Global error type.  Everything except [`OdomError::Channel`] is a
/// configuration error raised while loading a sensor.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OdomError {
    #[error("No link name configured for the odometry sensor")]
    MissingLinkName,

    #[error("Couldn't find specified link \"{0}\"")]
    LinkNotFound(String),

    #[error("Couldn't find specified parent link \"{0}\"")]
    ParentFrameNotFound(String),

    #[error("Measurement divisor must be positive, got {0}")]
    InvalidDivisor(i64),

    #[error("Measurement delay must not be negative, got {0}")]
    InvalidDelay(i64),

    #[error("Noise parameter {field} must be finite and >= 0, got {value}")]
    InvalidNoise { field: String, value: f64 },

    #[error("Covariance image scale must be finite and > 0, got {0}")]
    InvalidMaskScale(f64),

    #[error("Invalid availability mask: {0}")]
    InvalidMask(String),

    #[error("Loading covariance image {path} failed: {details}")]
    MaskLoad { path: String, details: String },

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}
