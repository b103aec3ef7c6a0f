//! [`WorldModel`] – what a sensor needs from the physics host.
//!
//! The host owns the stepping clock and the rigid bodies.  A sensor only ever
//! asks it for the ground-truth state of a named link; whether that state
//! comes from a physics engine, a recorded log or the scripted
//! [`SimWorld`][crate::sim::SimWorld] is invisible to it.

use odosim_types::LinkState;

/// Read-only view of the simulated world.
pub trait WorldModel {
    /// World-frame ground truth of the link called `name`, if it exists.
    fn link_state(&self, name: &str) -> Option<LinkState>;

    /// Whether a link called `name` exists.
    fn contains(&self, name: &str) -> bool {
        self.link_state(name).is_some()
    }

    /// Names of all links, in a stable order.
    fn link_names(&self) -> Vec<String>;
}

impl<W: WorldModel + ?Sized> WorldModel for &W {
    fn link_state(&self, name: &str) -> Option<LinkState> {
        (**self).link_state(name)
    }

    fn contains(&self, name: &str) -> bool {
        (**self).contains(name)
    }

    fn link_names(&self) -> Vec<String> {
        (**self).link_names()
    }
}
