//! Relative frame kinematics.
//!
//! Given the world-frame ground truth of a child body and, optionally, of a
//! parent body, computes the pose and twist of the child with respect to the
//! parent.  Notation: `W` world, `P` parent, `C` child; `C_v_W_C` is the
//! velocity of C relative to W expressed in C.
//!
//! ```text
//! T_P_C     = T_W_P⁻¹ ∘ T_W_C
//! C_v_P_C   = −R_CP · (P_ω_W_P × P_r_P_C) + C_v_W_C − R_CP · P_v_W_P
//! C_ω_P_C   = C_ω_W_C − R_CP · P_ω_W_P
//! ```
//!
//! With the world as parent the child state passes through unchanged.
//!
//! # Example
//!
//! ```rust
//! use odosim_sensor::transform::{FrameTransform, ParentFrame};
//! use odosim_types::{LinkState, Pose, Quaternion, Vec3};
//!
//! let parent = LinkState {
//!     pose: Pose::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity()),
//!     ..LinkState::default()
//! };
//! let child = LinkState {
//!     pose: Pose::new(Vec3::new(1.5, 0.0, 0.0), Quaternion::identity()),
//!     ..LinkState::default()
//! };
//!
//! let tf = FrameTransform::new(ParentFrame::from_id("base"));
//! let (pose, _twist) = tf.apply(&child, Some(&parent)).unwrap();
//! assert!((pose.position.x - 0.5).abs() < 1e-12);
//! ```

use odosim_types::{LinkState, Pose, Twist};

/// Name of the implicit world frame.
pub const WORLD_FRAME_ID: &str = "world";

/// The frame measurements are reported relative to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentFrame {
    World,
    Link(String),
}

impl ParentFrame {
    /// `"world"` maps to [`ParentFrame::World`], anything else names a link.
    pub fn from_id(id: &str) -> Self {
        if id == WORLD_FRAME_ID {
            Self::World
        } else {
            Self::Link(id.to_string())
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::World => WORLD_FRAME_ID,
            Self::Link(name) => name,
        }
    }
}

/// Computes child-relative-to-parent kinematics.
#[derive(Debug, Clone)]
pub struct FrameTransform {
    parent: ParentFrame,
}

impl FrameTransform {
    pub fn new(parent: ParentFrame) -> Self {
        Self { parent }
    }

    pub fn parent(&self) -> &ParentFrame {
        &self.parent
    }

    /// Pose and twist of `child` relative to the configured parent.
    ///
    /// `parent_state` is ignored for [`ParentFrame::World`].  A link parent
    /// without a state has no defined reference, so the result is `None`.
    pub fn apply(
        &self,
        child: &LinkState,
        parent_state: Option<&LinkState>,
    ) -> Option<(Pose, Twist)> {
        match (&self.parent, parent_state) {
            (ParentFrame::World, _) => Some((
                child.pose,
                Twist::new(child.linear_velocity, child.angular_velocity),
            )),
            (ParentFrame::Link(_), Some(parent)) => Some(relative_kinematics(child, parent)),
            (ParentFrame::Link(_), None) => None,
        }
    }
}

/// Pose and twist of `child` relative to `parent`, both given in world frame.
pub fn relative_kinematics(child: &LinkState, parent: &LinkState) -> (Pose, Twist) {
    let pose = child.pose.relative_to(parent.pose);
    let r_cp = pose.orientation.inverse();

    let linear = r_cp
        .rotate(parent.angular_velocity.cross(pose.position))
        .neg()
        .add(child.linear_velocity)
        .sub(r_cp.rotate(parent.linear_velocity));

    let angular = child
        .angular_velocity
        .sub(r_cp.rotate(parent.angular_velocity));

    (pose, Twist::new(linear, angular))
}

#[cfg(test)]
mod tests {
    use super::*;
    use odosim_types::{Quaternion, Vec3};
    use std::f64::consts::FRAC_PI_2;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn state(pos: Vec3, q: Quaternion, v: Vec3, w: Vec3) -> LinkState {
        LinkState {
            pose: Pose::new(pos, q),
            linear_velocity: v,
            angular_velocity: w,
        }
    }

    fn at_rest(pos: Vec3, q: Quaternion) -> LinkState {
        state(pos, q, Vec3::zero(), Vec3::zero())
    }

    fn moving(pos: Vec3, v: Vec3, w: Vec3) -> LinkState {
        state(pos, Quaternion::identity(), v, w)
    }

    #[test]
    fn parent_frame_from_id() {
        assert_eq!(ParentFrame::from_id("world"), ParentFrame::World);
        assert_eq!(ParentFrame::from_id("base"), ParentFrame::Link("base".into()));
        assert_eq!(ParentFrame::from_id("base").id(), "base");
    }

    #[test]
    fn world_parent_is_identity_passthrough() {
        let child = state(
            Vec3::new(1.0, 2.0, 3.0),
            Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.2),
            Vec3::new(0.3, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 0.7),
        );
        let (pose, twist) = FrameTransform::new(ParentFrame::World)
            .apply(&child, None)
            .unwrap();
        assert_eq!(pose, child.pose);
        assert_eq!(twist.linear, child.linear_velocity);
        assert_eq!(twist.angular, child.angular_velocity);
    }

    #[test]
    fn link_parent_without_state_yields_nothing() {
        let child = at_rest(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity());
        let tf = FrameTransform::new(ParentFrame::from_id("base"));
        assert!(tf.apply(&child, None).is_none());
        assert!(tf.apply(&child, Some(&child)).is_some());
    }

    #[test]
    fn identical_bodies_have_zero_relative_motion() {
        let s = state(
            Vec3::new(2.0, -1.0, 0.5),
            Quaternion::from_axis_angle(Vec3::new(1.0, 0.0, 1.0), 0.9),
            Vec3::new(1.0, 0.5, 0.0),
            Vec3::new(0.1, 0.2, 0.3),
        );
        let (pose, twist) = relative_kinematics(&s, &s);
        assert!(pose.position.norm() < 1e-9);
        assert!(close(pose.orientation.w.abs(), 1.0));
        assert!(twist.angular.norm() < 1e-9);
        // Same velocity at the same point: only the ω × r term could remain
        // and r is zero.
        assert!(twist.linear.norm() < 1e-9);
    }

    #[test]
    fn translating_parent_subtracts_velocity() {
        let parent = moving(Vec3::zero(), Vec3::new(1.0, 0.0, 0.0), Vec3::zero());
        let child = moving(Vec3::new(0.0, 2.0, 0.0), Vec3::new(3.0, 0.0, 0.0), Vec3::zero());
        let (pose, twist) = relative_kinematics(&child, &parent);
        assert!(close(pose.position.y, 2.0));
        assert!(close(twist.linear.x, 2.0));
        assert!(twist.angular.norm() < 1e-12);
    }

    #[test]
    fn spinning_parent_induces_tangential_velocity() {
        // Parent spins about +Z at 1 rad/s; a child fixed in the world 1 m
        // along +X appears to move backwards around the parent.
        let parent = moving(Vec3::zero(), Vec3::zero(), Vec3::new(0.0, 0.0, 1.0));
        let child = at_rest(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity());
        let (_, twist) = relative_kinematics(&child, &parent);
        // −(ω × r) = −((0,0,1) × (1,0,0)) = (0,−1,0)
        assert!(close(twist.linear.x, 0.0));
        assert!(close(twist.linear.y, -1.0), "vy={}", twist.linear.y);
        assert!(close(twist.angular.z, -1.0));
    }

    #[test]
    fn rotated_child_sees_parent_velocity_in_its_own_frame() {
        // Child yawed 90° relative to a parent translating along its +X.
        // In the child frame that motion is along −Y, so the relative
        // velocity of a world-static child is +Y.
        let parent = moving(Vec3::zero(), Vec3::new(1.0, 0.0, 0.0), Vec3::zero());
        let child = at_rest(
            Vec3::new(0.0, 0.0, 1.0),
            Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), FRAC_PI_2),
        );
        let (pose, twist) = relative_kinematics(&child, &parent);
        assert!(close(pose.position.z, 1.0));
        assert!(close(twist.linear.x, 0.0), "vx={}", twist.linear.x);
        assert!(close(twist.linear.y, 1.0), "vy={}", twist.linear.y);
    }

    #[test]
    fn relative_orientation_is_unit() {
        let parent = at_rest(
            Vec3::zero(),
            Quaternion::from_axis_angle(Vec3::new(0.2, 0.3, 1.0), 1.3),
        );
        let child = at_rest(
            Vec3::new(1.0, 1.0, 1.0),
            Quaternion::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), -0.4),
        );
        let (pose, _) = relative_kinematics(&child, &parent);
        assert!(close(pose.orientation.norm(), 1.0));
    }
}
