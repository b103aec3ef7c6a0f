//! Headless, channel-partitioned publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Channels
//!
//! Each projection of a released odometry measurement travels on its own
//! [`Channel`] lane, so a consumer that only wants positions never pays for
//! full odometry messages:
//!
//! | Channel | Payload |
//! |---|---|
//! | [`Channel::Odometry`] | Pose, twist and both covariances |
//! | [`Channel::PoseWithCovariance`] | Pose plus pose covariance |
//! | [`Channel::Position`] | Bare position |
//! | [`Channel::Transform`] | Translation and rotation |
//! | [`Channel::Pose`] | Bare pose |

use odosim_types::{Event, OdomError};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// The five output lanes of an odometry sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Odometry,
    PoseWithCovariance,
    Position,
    Transform,
    Pose,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Odometry,
        Channel::PoseWithCovariance,
        Channel::Position,
        Channel::Transform,
        Channel::Pose,
    ];
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    odometry: broadcast::Sender<Event>,
    pose_with_covariance: broadcast::Sender<Event>,
    position: broadcast::Sender<Event>,
    transform: broadcast::Sender<Event>,
    pose: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every channel independently.
    pub fn new(capacity: usize) -> Self {
        let (odometry, _) = broadcast::channel(capacity);
        let (pose_with_covariance, _) = broadcast::channel(capacity);
        let (position, _) = broadcast::channel(capacity);
        let (transform, _) = broadcast::channel(capacity);
        let (pose, _) = broadcast::channel(capacity);
        Self {
            odometry,
            pose_with_covariance,
            position,
            transform,
            pose,
        }
    }

    /// Publish `event` to the given [`Channel`].
    ///
    /// Returns the number of active receivers that were handed the event, or
    /// [`OdomError::Channel`] when nobody is listening.
    pub fn publish_to(&self, channel: Channel, event: Event) -> Result<usize, OdomError> {
        self.sender(channel)
            .send(event)
            .map_err(|_| OdomError::Channel(format!("No subscribers for channel {channel:?}")))
    }

    /// Subscribe to a specific [`Channel`].
    pub fn subscribe_to(&self, channel: Channel) -> ChannelReceiver {
        ChannelReceiver {
            channel,
            receiver: self.sender(channel).subscribe(),
        }
    }

    /// Number of live receivers on `channel`.
    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.sender(channel).receiver_count()
    }

    pub fn has_subscribers(&self, channel: Channel) -> bool {
        self.subscriber_count(channel) > 0
    }

    fn sender(&self, channel: Channel) -> &broadcast::Sender<Event> {
        match channel {
            Channel::Odometry => &self.odometry,
            Channel::PoseWithCovariance => &self.pose_with_covariance,
            Channel::Position => &self.position,
            Channel::Transform => &self.transform,
            Channel::Pose => &self.pose,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Channel receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Channel`].
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct ChannelReceiver {
    channel: Channel,
    receiver: broadcast::Receiver<Event>,
}

impl ChannelReceiver {
    /// Wait for the next event on this channel.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Like [`recv`](Self::recv) but skips over lag and only returns `None`
    /// once the bus is closed.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(channel = ?self.channel, lagged_by = n, "ChannelReceiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive; `None` when nothing is buffered.
    pub fn try_next(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// The [`Channel`] this receiver is bound to.
    pub fn channel(&self) -> Channel {
        self.channel
    }
}
