//! Rigid-body geometry primitives.
//!
//! All quantities are `f64`.  Quaternions use the (w, x, y, z) convention and
//! every composition that produces a rotation re-normalises its result, so a
//! [`Pose`] built from unit inputs stays unit no matter how many operations
//! are chained.

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Vec3
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D vector (translation, linear or angular velocity).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Create a new vector.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn neg(self) -> Self {
        self.scale(-1.0)
    }

    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    pub fn norm_squared(self) -> f64 {
        self.dot(self)
    }

    pub fn norm(self) -> f64 {
        self.norm_squared().sqrt()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Quaternion
// ────────────────────────────────────────────────────────────────────────────

/// A rotation quaternion (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    /// Create a quaternion from raw components.  No normalisation is applied;
    /// call [`normalize`][Self::normalize] when the input is not known to be
    /// unit length.
    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation.
    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `angle` radians about `axis`.  A zero axis yields the
    /// identity.
    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Self {
        let n = axis.norm();
        if n == 0.0 {
            return Self::identity();
        }
        let (s, c) = (angle * 0.5).sin_cos();
        let a = axis.scale(s / n);
        Self::new(c, a.x, a.y, a.z).normalize()
    }

    /// Exact exponential map of a rotation vector (axis × angle).
    pub fn from_rotation_vector(v: Vec3) -> Self {
        Self::from_axis_angle(v, v.norm())
    }

    /// First-order small-angle rotation for the attitude error vector `theta`.
    ///
    /// The vector part is `theta / 2`.  While `|theta|² / 4 < 1` the scalar
    /// part is chosen so the result is already unit length; beyond that the
    /// quaternion is rescaled instead.  The result is always normalised.
    pub fn from_small_angle(theta: Vec3) -> Self {
        let q_squared = theta.norm_squared() / 4.0;
        let q = if q_squared < 1.0 {
            let half = theta.scale(0.5);
            Self::new((1.0 - q_squared).sqrt(), half.x, half.y, half.z)
        } else {
            let w = 1.0 / (1.0 + q_squared).sqrt();
            let v = theta.scale(w * 0.5);
            Self::new(w, v.x, v.y, v.z)
        };
        q.normalize()
    }

    pub fn norm(self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Scale to unit length.  A degenerate (zero) quaternion becomes the
    /// identity.
    pub fn normalize(self) -> Self {
        let n = self.norm();
        if n == 0.0 || !n.is_finite() {
            return Self::identity();
        }
        Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    /// Hamilton product `self * rhs`, re-normalised.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
        .normalize()
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Inverse rotation.
    pub fn inverse(self) -> Self {
        self.normalize().conjugate()
    }

    /// Rotate a vector by this quaternion: `p' = q * p * q*`.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        // t = 2 (q_v × v); v' = v + w t + q_v × t
        let q = self.normalize();
        let qv = Vec3::new(q.x, q.y, q.z);
        let t = qv.cross(v).scale(2.0);
        v.add(t.scale(q.w)).add(qv.cross(t))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pose / Twist
// ────────────────────────────────────────────────────────────────────────────

/// Placement of one frame relative to another: a point expressed in the
/// child frame maps into the reference frame by rotating it by `orientation`
/// then adding `position`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quaternion,
}

impl Pose {
    pub fn new(position: Vec3, orientation: Quaternion) -> Self {
        Self {
            position,
            orientation: orientation.normalize(),
        }
    }

    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// Compose two poses: if `self` = T_A_B and `other` = T_B_C the result is
    /// T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let position = self
            .position
            .add(self.orientation.rotate(other.position));
        Self::new(position, self.orientation.mul(other.orientation))
    }

    /// The inverse transform: T_B_A for `self` = T_A_B.
    pub fn inverse(self) -> Self {
        let inv = self.orientation.inverse();
        Self::new(inv.rotate(self.position).neg(), inv)
    }

    /// Pose of `self` relative to `reference`, where both are expressed in
    /// the same outer frame.  For `self` = T_W_C and `reference` = T_W_P this
    /// is T_P_C.
    pub fn relative_to(self, reference: Self) -> Self {
        reference.inverse().compose(self)
    }
}

/// Linear and angular velocity, both expressed in the body (child) frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vec3,
    pub angular: Vec3,
}

impl Twist {
    pub fn new(linear: Vec3, angular: Vec3) -> Self {
        Self { linear, angular }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
