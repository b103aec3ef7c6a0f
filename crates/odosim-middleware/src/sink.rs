//! The publish boundary.
//!
//! The sensor never speaks to a transport directly.  It hands events to a
//! [`MeasurementSink`], which knows whether anyone is listening on a channel
//! and how to deliver to them.  [`EventBus`] is the in-process fan-out sink
//! and may drop events for slow subscribers; [`QueueSink`] is a bounded queue
//! that never drops and blocks the producer instead.  Other transports
//! implement the same trait.

use std::sync::Arc;

use odosim_types::{Event, OdomError};
use tokio::sync::mpsc;

use crate::bus::{Channel, EventBus};

/// Every transport the odometry publisher can feed must implement this trait.
///
/// # Contract
///
/// * `has_consumer` – cheap check performed before a projection is built; a
///   `false` answer means the publisher skips that channel entirely.
/// * `deliver` – hand one event to the channel's consumers, returning how
///   many received it.
pub trait MeasurementSink: Send + Sync {
    fn has_consumer(&self, channel: Channel) -> bool;

    fn deliver(&self, channel: Channel, event: Event) -> Result<usize, OdomError>;
}

impl MeasurementSink for EventBus {
    fn has_consumer(&self, channel: Channel) -> bool {
        self.has_subscribers(channel)
    }

    fn deliver(&self, channel: Channel, event: Event) -> Result<usize, OdomError> {
        self.publish_to(channel, event)
    }
}

impl<S: MeasurementSink + ?Sized> MeasurementSink for Arc<S> {
    fn has_consumer(&self, channel: Channel) -> bool {
        (**self).has_consumer(channel)
    }

    fn deliver(&self, channel: Channel, event: Event) -> Result<usize, OdomError> {
        (**self).deliver(channel, event)
    }
}

// ---------------------------------------------------------------------------
// Queue sink
// ---------------------------------------------------------------------------

/// Lossless sink feeding one bounded queue.
///
/// `deliver` blocks while the queue is full, so the producer runs no faster
/// than the consumer drains.  It must be called outside the async runtime
/// (a plain thread or `spawn_blocking`); the receiver is drained with
/// `recv().await`.  Only the channels given at construction have a consumer.
#[derive(Clone, Debug)]
pub struct QueueSink {
    channels: Vec<Channel>,
    tx: mpsc::Sender<Event>,
}

impl QueueSink {
    /// A sink for `channels` plus the receiving end of its queue.
    pub fn new(capacity: usize, channels: &[Channel]) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let sink = Self {
            channels: channels.to_vec(),
            tx,
        };
        (sink, rx)
    }
}

impl MeasurementSink for QueueSink {
    fn has_consumer(&self, channel: Channel) -> bool {
        self.channels.contains(&channel) && !self.tx.is_closed()
    }

    fn deliver(&self, channel: Channel, event: Event) -> Result<usize, OdomError> {
        self.tx
            .blocking_send(event)
            .map(|()| 1)
            .map_err(|_| OdomError::Channel(format!("Queue for channel {channel:?} is closed")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use odosim_types::{EventPayload, Pose};

    fn event(i: u64) -> Event {
        Event {
            source: format!("quad/base_link/odometry/{i}"),
            wall_time: Utc::now(),
            payload: EventPayload::Pose(Pose::identity()),
        }
    }

    #[test]
    fn queue_sink_only_consumes_its_channels() {
        let (sink, rx) = QueueSink::new(4, &[Channel::Odometry]);
        assert!(sink.has_consumer(Channel::Odometry));
        assert!(!sink.has_consumer(Channel::Pose));
        drop(rx);
        assert!(!sink.has_consumer(Channel::Odometry));
        assert!(matches!(
            sink.deliver(Channel::Odometry, event(0)),
            Err(OdomError::Channel(_))
        ));
    }

    /// A producer far ahead of a capacity-1 queue is throttled, not lossy.
    #[test]
    fn queue_sink_applies_backpressure_without_loss() {
        const EVENTS: u64 = 500;
        let (sink, mut rx) = QueueSink::new(1, &[Channel::Odometry]);

        let producer = std::thread::spawn(move || {
            for i in 0..EVENTS {
                assert_eq!(sink.deliver(Channel::Odometry, event(i)), Ok(1));
            }
        });

        let mut received = Vec::new();
        while let Some(e) = rx.blocking_recv() {
            received.push(e.source);
        }
        producer.join().expect("producer thread");

        assert_eq!(received.len() as u64, EVENTS);
        assert_eq!(received[0], "quad/base_link/odometry/0");
        assert_eq!(received[EVENTS as usize - 1], "quad/base_link/odometry/499");
    }
}
