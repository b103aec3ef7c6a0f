//! [`OdometryPlugin`] – binds one odometry sensor to a host link.
//!
//! Loading resolves the configured link names against the [`WorldModel`],
//! validates every parameter and loads the availability mask.  Any problem
//! is fatal: the plugin refuses to start rather than run with undefined
//! geometry.  After that, [`OdometryPlugin::on_update`] is called once per
//! simulation step and forwards whatever the sensor releases to the
//! publisher.
//!
//! # Example
//!
//! ```rust
//! use odosim_hal::SimWorld;
//! use odosim_middleware::EventBus;
//! use odosim_runtime::plugin::{OdometryPlugin, OdometryPluginConfig};
//! use odosim_types::{Pose, Stamp};
//!
//! let world = SimWorld::builder().with_static_link("base_link", Pose::identity()).build();
//! let config = OdometryPluginConfig {
//!     link_name: "base_link".to_string(),
//!     random_engine_seed: Some(1),
//!     ..OdometryPluginConfig::default()
//! };
//! let mut plugin = OdometryPlugin::load(&config, &world, EventBus::default()).unwrap();
//! let released = plugin.on_update(&world, Stamp::default()).unwrap();
//! assert!(released.is_some());
//! ```

use std::path::PathBuf;

use odosim_hal::WorldModel;
use odosim_middleware::{MeasurementSink, OdometryPublisher, PublishReport, TopicNames};
use odosim_sensor::availability::AvailabilityMask;
use odosim_sensor::delay::ReleasePolicy;
use odosim_sensor::noise::NoiseParameters;
use odosim_sensor::transform::{ParentFrame, WORLD_FRAME_ID};
use odosim_sensor::{OdometrySensor, OdometrySettings, TickInput};
use odosim_types::{Measurement, OdomError, Stamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters of one odometry sensor instance.
///
/// Every field except `link_name` is optional in TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdometryPluginConfig {
    /// Namespace prepended to every topic.
    #[serde(default)]
    pub robot_namespace: String,
    /// The measured link.  Required.
    #[serde(default)]
    pub link_name: String,
    #[serde(default = "default_parent_frame_id")]
    pub parent_frame_id: String,
    #[serde(default = "default_child_frame_id")]
    pub child_frame_id: String,
    #[serde(default = "default_pose_topic")]
    pub pose_topic: String,
    #[serde(default = "default_pose_with_covariance_topic")]
    pub pose_with_covariance_topic: String,
    #[serde(default = "default_position_topic")]
    pub position_topic: String,
    #[serde(default = "default_transform_topic")]
    pub transform_topic: String,
    #[serde(default = "default_odometry_topic")]
    pub odometry_topic: String,
    #[serde(default)]
    pub noise: NoiseParameters,
    /// Ticks between sampling and release.
    #[serde(default)]
    pub measurement_delay: i64,
    /// Sample every N-th tick.
    #[serde(default = "default_measurement_divisor")]
    pub measurement_divisor: i64,
    /// Seconds added to the header stamp.
    #[serde(default)]
    pub unknown_delay: f64,
    /// Greyscale availability mask; zero pixels suppress measurements.
    #[serde(default)]
    pub covariance_image: Option<PathBuf>,
    /// World units per mask pixel.
    #[serde(default = "default_covariance_image_scale")]
    pub covariance_image_scale: f64,
    /// Fixed seed for reproducible noise; time-derived when absent.
    #[serde(default)]
    pub random_engine_seed: Option<u64>,
    #[serde(default)]
    pub release_policy: ReleasePolicy,
}

fn default_parent_frame_id() -> String {
    WORLD_FRAME_ID.to_string()
}
fn default_child_frame_id() -> String {
    "odometry_sensor".to_string()
}
fn default_pose_topic() -> String {
    "pose".to_string()
}
fn default_pose_with_covariance_topic() -> String {
    "pose_with_covariance".to_string()
}
fn default_position_topic() -> String {
    "position".to_string()
}
fn default_transform_topic() -> String {
    "transform".to_string()
}
fn default_odometry_topic() -> String {
    "odometry".to_string()
}
fn default_measurement_divisor() -> i64 {
    1
}
fn default_covariance_image_scale() -> f64 {
    1.0
}

impl Default for OdometryPluginConfig {
    fn default() -> Self {
        Self {
            robot_namespace: String::new(),
            link_name: String::new(),
            parent_frame_id: default_parent_frame_id(),
            child_frame_id: default_child_frame_id(),
            pose_topic: default_pose_topic(),
            pose_with_covariance_topic: default_pose_with_covariance_topic(),
            position_topic: default_position_topic(),
            transform_topic: default_transform_topic(),
            odometry_topic: default_odometry_topic(),
            noise: NoiseParameters::default(),
            measurement_delay: 0,
            measurement_divisor: default_measurement_divisor(),
            unknown_delay: 0.0,
            covariance_image: None,
            covariance_image_scale: default_covariance_image_scale(),
            random_engine_seed: None,
            release_policy: ReleasePolicy::default(),
        }
    }
}

impl OdometryPluginConfig {
    pub fn topic_names(&self) -> TopicNames {
        TopicNames {
            odometry: self.odometry_topic.clone(),
            pose_with_covariance: self.pose_with_covariance_topic.clone(),
            position: self.position_topic.clone(),
            transform: self.transform_topic.clone(),
            pose: self.pose_topic.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugin
// ─────────────────────────────────────────────────────────────────────────────

/// One released measurement and what the publisher did with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    pub measurement: Measurement,
    pub report: PublishReport,
}

pub struct OdometryPlugin<S> {
    link_name: String,
    parent_link: Option<String>,
    sensor: OdometrySensor,
    publisher: OdometryPublisher<S>,
}

impl<S: MeasurementSink> OdometryPlugin<S> {
    /// Validate `config` against `world` and build the plugin.
    ///
    /// # Errors
    ///
    /// * [`OdomError::MissingLinkName`] – `link_name` is empty.
    /// * [`OdomError::LinkNotFound`] – `link_name` is not in the world.
    /// * [`OdomError::ParentFrameNotFound`] – a non-world parent is not in
    ///   the world.
    /// * [`OdomError::InvalidMaskScale`] / [`OdomError::MaskLoad`] – the
    ///   covariance image cannot be used.
    /// * Any parameter error raised by [`OdometrySensor::new`].
    pub fn load(
        config: &OdometryPluginConfig,
        world: &dyn WorldModel,
        sink: S,
    ) -> Result<Self, OdomError> {
        if config.link_name.is_empty() {
            return Err(OdomError::MissingLinkName);
        }
        if !world.contains(&config.link_name) {
            return Err(OdomError::LinkNotFound(config.link_name.clone()));
        }

        let parent_link = match ParentFrame::from_id(&config.parent_frame_id) {
            ParentFrame::World => None,
            ParentFrame::Link(name) => {
                if !world.contains(&name) {
                    return Err(OdomError::ParentFrameNotFound(name));
                }
                Some(name)
            }
        };

        let mask = match &config.covariance_image {
            Some(path) => Some(AvailabilityMask::load(path, config.covariance_image_scale)?),
            None => None,
        };

        let sensor = OdometrySensor::new(OdometrySettings {
            parent_frame_id: config.parent_frame_id.clone(),
            child_frame_id: config.child_frame_id.clone(),
            noise: config.noise,
            measurement_delay: config.measurement_delay,
            measurement_divisor: config.measurement_divisor,
            unknown_delay: config.unknown_delay,
            mask,
            seed: config.random_engine_seed,
            release_policy: config.release_policy,
        })?;

        let publisher = OdometryPublisher::new(
            sink,
            &config.robot_namespace,
            &config.link_name,
            config.topic_names(),
        );

        info!(
            link = %config.link_name,
            parent = %config.parent_frame_id,
            namespace = %config.robot_namespace,
            "odometry plugin loaded"
        );

        Ok(Self {
            link_name: config.link_name.clone(),
            parent_link,
            sensor,
            publisher,
        })
    }

    /// Run one tick of the sensor against the current state of `world`.
    ///
    /// # Errors
    ///
    /// [`OdomError::LinkNotFound`] / [`OdomError::ParentFrameNotFound`] when
    /// a link resolved at load time has since left the world.
    pub fn on_update(
        &mut self,
        world: &dyn WorldModel,
        sim_time: Stamp,
    ) -> Result<Option<Release>, OdomError> {
        let child = world
            .link_state(&self.link_name)
            .ok_or_else(|| OdomError::LinkNotFound(self.link_name.clone()))?;
        let parent = match &self.parent_link {
            Some(name) => Some(
                world
                    .link_state(name)
                    .ok_or_else(|| OdomError::ParentFrameNotFound(name.clone()))?,
            ),
            None => None,
        };

        let input = TickInput {
            child,
            parent,
            sim_time,
        };
        let Some(measurement) = self.sensor.on_tick(&input) else {
            return Ok(None);
        };

        let report = self.publisher.publish(&measurement);
        debug!(
            link = %self.link_name,
            seq = measurement.header.seq,
            channels = report.built.len(),
            "published odometry"
        );
        Ok(Some(Release {
            measurement,
            report,
        }))
    }

    pub fn link_name(&self) -> &str {
        &self.link_name
    }

    pub fn sensor(&self) -> &OdometrySensor {
        &self.sensor
    }

    pub fn publisher(&self) -> &OdometryPublisher<S> {
        &self.publisher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odosim_hal::{Motion, SimWorld};
    use odosim_middleware::{Channel, EventBus};
    use odosim_types::{Pose, Vec3};

    fn world() -> SimWorld {
        SimWorld::builder()
            .with_static_link("base", Pose::new(Vec3::new(1.0, 0.0, 0.0), Default::default()))
            .with_link(
                "rover",
                Motion::ConstantTwist {
                    pose: Pose::identity(),
                    linear: Vec3::new(1.0, 0.0, 0.0),
                    angular: Vec3::zero(),
                },
            )
            .build()
    }

    fn config(link: &str) -> OdometryPluginConfig {
        OdometryPluginConfig {
            link_name: link.to_string(),
            random_engine_seed: Some(5),
            ..OdometryPluginConfig::default()
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let c = OdometryPluginConfig::default();
        assert_eq!(c.parent_frame_id, "world");
        assert_eq!(c.child_frame_id, "odometry_sensor");
        assert_eq!(c.measurement_divisor, 1);
        assert_eq!(c.measurement_delay, 0);
        assert_eq!(c.covariance_image_scale, 1.0);
        assert_eq!(c.topic_names(), TopicNames::default());
        assert_eq!(c.release_policy, ReleasePolicy::Exact);
    }

    #[test]
    fn missing_link_name_is_rejected() {
        let err = OdometryPlugin::load(&config(""), &world(), EventBus::default()).err();
        assert_eq!(err, Some(OdomError::MissingLinkName));
    }

    #[test]
    fn unknown_link_is_rejected() {
        let err = OdometryPlugin::load(&config("arm"), &world(), EventBus::default()).err();
        assert_eq!(err, Some(OdomError::LinkNotFound("arm".to_string())));
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let cfg = OdometryPluginConfig {
            parent_frame_id: "tower".to_string(),
            ..config("rover")
        };
        let err = OdometryPlugin::load(&cfg, &world(), EventBus::default()).err();
        assert_eq!(err, Some(OdomError::ParentFrameNotFound("tower".to_string())));
    }

    #[test]
    fn bad_divisor_is_rejected() {
        let cfg = OdometryPluginConfig {
            measurement_divisor: 0,
            ..config("rover")
        };
        let err = OdometryPlugin::load(&cfg, &world(), EventBus::default()).err();
        assert_eq!(err, Some(OdomError::InvalidDivisor(0)));
    }

    #[test]
    fn unreadable_mask_is_rejected() {
        let cfg = OdometryPluginConfig {
            covariance_image: Some(PathBuf::from("/no/such/mask.png")),
            ..config("rover")
        };
        let err = OdometryPlugin::load(&cfg, &world(), EventBus::default()).err();
        assert!(matches!(err, Some(OdomError::MaskLoad { .. })));
    }

    #[test]
    fn link_parent_is_resolved_each_update() {
        let cfg = OdometryPluginConfig {
            parent_frame_id: "base".to_string(),
            ..config("rover")
        };
        let w = world();
        let mut plugin = OdometryPlugin::load(&cfg, &w, EventBus::default()).unwrap();
        let release = plugin.on_update(&w, Stamp::default()).unwrap().unwrap();
        assert!((release.measurement.pose.position.x + 1.0).abs() < 1e-12);
        assert_eq!(release.measurement.header.frame_id, "base");
        // Nobody is subscribed.
        assert!(release.report.is_empty());
    }

    #[test]
    fn vanished_link_is_an_update_error() {
        let w = world();
        let mut plugin = OdometryPlugin::load(&config("rover"), &w, EventBus::default()).unwrap();
        let empty = SimWorld::default();
        assert_eq!(
            plugin.on_update(&empty, Stamp::default()).err(),
            Some(OdomError::LinkNotFound("rover".to_string()))
        );
    }

    #[test]
    fn publishes_to_subscribed_channels_only() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Channel::Odometry);
        let cfg = OdometryPluginConfig {
            robot_namespace: "quad".to_string(),
            ..config("rover")
        };
        let w = world();
        let mut plugin = OdometryPlugin::load(&cfg, &w, bus.clone()).unwrap();
        let release = plugin.on_update(&w, Stamp::new(1, 0)).unwrap().unwrap();
        assert_eq!(release.report.built, vec![Channel::Odometry]);

        let event = rx.try_next().expect("odometry event");
        assert_eq!(event.source, "quad/rover/odometry");
    }

    #[test]
    fn config_parses_from_toml_with_defaults() {
        let cfg: OdometryPluginConfig = toml::from_str(
            r#"
            link_name = "rover"
            measurement_delay = 4
            release_policy = "catch_up"

            [noise.normal_position]
            x = 0.01
            y = 0.01
            z = 0.02
            "#,
        )
        .unwrap();
        assert_eq!(cfg.link_name, "rover");
        assert_eq!(cfg.measurement_delay, 4);
        assert_eq!(cfg.measurement_divisor, 1);
        assert_eq!(cfg.release_policy, ReleasePolicy::CatchUp);
        assert_eq!(cfg.noise.normal_position.z, 0.02);
        assert_eq!(cfg.odometry_topic, "odometry");
    }
}
