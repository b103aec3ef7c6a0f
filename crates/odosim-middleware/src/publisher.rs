//! Fans a released measurement out to its five projections.
//!
//! Each projection is built only when its channel has a consumer; with no
//! listeners at all, publishing a measurement costs a handful of
//! `has_consumer` calls and nothing else.

use chrono::Utc;
use odosim_types::{Event, EventPayload, Measurement};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::bus::Channel;
use crate::sink::MeasurementSink;

/// Per-channel topic names, relative to the sensor's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicNames {
    pub odometry: String,
    pub pose_with_covariance: String,
    pub position: String,
    pub transform: String,
    pub pose: String,
}

impl Default for TopicNames {
    fn default() -> Self {
        Self {
            odometry: "odometry".to_string(),
            pose_with_covariance: "pose_with_covariance".to_string(),
            position: "position".to_string(),
            transform: "transform".to_string(),
            pose: "pose".to_string(),
        }
    }
}

impl TopicNames {
    pub fn get(&self, channel: Channel) -> &str {
        match channel {
            Channel::Odometry => &self.odometry,
            Channel::PoseWithCovariance => &self.pose_with_covariance,
            Channel::Position => &self.position,
            Channel::Transform => &self.transform,
            Channel::Pose => &self.pose,
        }
    }
}

/// What happened to one measurement at the publish boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Channels whose projection was built and handed to the sink.
    pub built: Vec<Channel>,
    /// Channels whose delivery failed.
    pub failed: Vec<Channel>,
    /// Total receivers reached across all channels.
    pub receivers: usize,
}

impl PublishReport {
    pub fn built(&self, channel: Channel) -> bool {
        self.built.contains(&channel)
    }

    /// `true` when no projection was built at all.
    pub fn is_empty(&self) -> bool {
        self.built.is_empty()
    }
}

pub struct OdometryPublisher<S> {
    sink: S,
    prefix: String,
    topics: TopicNames,
}

impl<S: MeasurementSink> OdometryPublisher<S> {
    /// Topics are advertised as `"{namespace}/{link_name}/{topic}"`; an empty
    /// namespace is left out.
    pub fn new(sink: S, namespace: &str, link_name: &str, topics: TopicNames) -> Self {
        let prefix = [namespace, link_name]
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| format!("{s}/"))
            .collect::<String>();
        Self {
            sink,
            prefix,
            topics,
        }
    }

    /// Fully qualified topic name for `channel`.
    pub fn topic(&self, channel: Channel) -> String {
        format!("{}{}", self.prefix, self.topics.get(channel))
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Deliver every projection of `measurement` that has a consumer.
    ///
    /// Delivery failures are recorded in the report, never propagated: a
    /// listener disappearing mid-tick is not a sensor fault.
    pub fn publish(&self, measurement: &Measurement) -> PublishReport {
        let mut report = PublishReport::default();
        let wall_time = Utc::now();

        for channel in Channel::ALL {
            if !self.sink.has_consumer(channel) {
                trace!(?channel, "no consumer, skipping projection");
                continue;
            }
            let event = Event {
                source: self.topic(channel),
                wall_time,
                payload: project(channel, measurement),
            };
            report.built.push(channel);
            match self.sink.deliver(channel, event) {
                Ok(n) => report.receivers += n,
                Err(e) => {
                    debug!(?channel, error = %e, "delivery failed");
                    report.failed.push(channel);
                }
            }
        }
        report
    }
}

fn project(channel: Channel, m: &Measurement) -> EventPayload {
    match channel {
        Channel::Odometry => EventPayload::Odometry(m.clone()),
        Channel::PoseWithCovariance => {
            EventPayload::PoseWithCovariance(m.pose_with_covariance_stamped())
        }
        Channel::Position => EventPayload::Position(m.position_stamped()),
        Channel::Transform => EventPayload::Transform(m.transform_stamped()),
        Channel::Pose => EventPayload::Pose(m.pose),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use odosim_types::{Header, OdomError, Pose, Quaternion, Stamp, Vec3};
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Records deliveries; only the channels in `listening` have consumers.
    struct RecordingSink {
        listening: HashSet<Channel>,
        fail: HashSet<Channel>,
        delivered: Mutex<Vec<(Channel, Event)>>,
    }

    impl RecordingSink {
        fn listening(channels: &[Channel]) -> Self {
            Self {
                listening: channels.iter().copied().collect(),
                fail: HashSet::new(),
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    impl MeasurementSink for RecordingSink {
        fn has_consumer(&self, channel: Channel) -> bool {
            self.listening.contains(&channel)
        }

        fn deliver(&self, channel: Channel, event: Event) -> Result<usize, OdomError> {
            if self.fail.contains(&channel) {
                return Err(OdomError::Channel("gone".to_string()));
            }
            self.delivered.lock().unwrap().push((channel, event));
            Ok(1)
        }
    }

    fn measurement() -> Measurement {
        Measurement {
            header: Header {
                seq: 3,
                stamp: Stamp::new(2, 0),
                frame_id: "world".to_string(),
            },
            child_frame_id: "odometry_sensor".to_string(),
            pose: Pose::new(Vec3::new(1.0, 2.0, 3.0), Quaternion::identity()),
            ..Measurement::default()
        }
    }

    #[test]
    fn no_consumers_builds_nothing() {
        let publisher = OdometryPublisher::new(
            RecordingSink::listening(&[]),
            "quad",
            "base_link",
            TopicNames::default(),
        );
        let report = publisher.publish(&measurement());
        assert!(report.is_empty());
        assert!(publisher.sink().delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn only_listened_channels_are_built() {
        let publisher = OdometryPublisher::new(
            RecordingSink::listening(&[Channel::Position, Channel::Odometry]),
            "quad",
            "base_link",
            TopicNames::default(),
        );
        let report = publisher.publish(&measurement());
        assert_eq!(report.built, vec![Channel::Odometry, Channel::Position]);
        assert_eq!(report.receivers, 2);

        let delivered = publisher.sink().delivered.lock().unwrap();
        let (_, position) = &delivered[1];
        assert_eq!(position.source, "quad/base_link/position");
        match &position.payload {
            EventPayload::Position(p) => {
                assert_eq!(p.position, Vec3::new(1.0, 2.0, 3.0));
                assert_eq!(p.header.seq, 3);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn delivery_failure_is_reported_not_raised() {
        let mut sink = RecordingSink::listening(&Channel::ALL);
        sink.fail.insert(Channel::Transform);
        let publisher = OdometryPublisher::new(sink, "", "base_link", TopicNames::default());
        let report = publisher.publish(&measurement());
        assert_eq!(report.built.len(), 5);
        assert_eq!(report.failed, vec![Channel::Transform]);
        assert_eq!(report.receivers, 4);
    }

    #[test]
    fn topic_names_are_prefixed() {
        let topics = TopicNames {
            pose: "ground_truth/pose".to_string(),
            ..TopicNames::default()
        };
        let publisher = OdometryPublisher::new(RecordingSink::listening(&[]), "", "arm", topics);
        assert_eq!(publisher.topic(Channel::Pose), "arm/ground_truth/pose");
        assert_eq!(publisher.topic(Channel::Odometry), "arm/odometry");
    }

    #[tokio::test]
    async fn publishes_through_event_bus() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut tf_rx = bus.subscribe_to(Channel::Transform);
        let publisher =
            OdometryPublisher::new(bus.clone(), "quad", "base_link", TopicNames::default());

        let report = publisher.publish(&measurement());
        assert_eq!(report.built, vec![Channel::Transform]);

        let event = tf_rx.recv().await?;
        assert_eq!(event.source, "quad/base_link/transform");
        match event.payload {
            EventPayload::Transform(tf) => {
                assert_eq!(tf.child_frame_id, "odometry_sensor");
                assert_eq!(tf.translation, Vec3::new(1.0, 2.0, 3.0));
            }
            other => panic!("unexpected payload {other:?}"),
        }
        Ok(())
    }
}
