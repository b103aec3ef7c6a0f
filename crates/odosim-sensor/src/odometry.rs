//! The per-tick odometry pipeline.
//!
//! [`OdometrySensor::on_tick`] runs once per simulation step:
//!
//! 1. on every `measurement_divisor`-th tick, transform the ground truth
//!    into the parent frame (skipped when a link parent has no state);
//! 2. stamp the raw measurement and attach the precomputed covariances;
//! 3. evaluate the availability gate at the measured position;
//! 4. if available, enqueue it due `measurement_delay` ticks later;
//! 5. release at most one due entry, perturbed by the noise model;
//! 6. advance the tick counter.
//!
//! The sensor owns its generator, queue and counters; nothing is shared
//! between instances.

use odosim_types::{Header, LinkState, Measurement, OdomError, Stamp};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, trace, warn};

use crate::availability::{AvailabilityGate, AvailabilityMask};
use crate::covariance::CovarianceSet;
use crate::delay::{DelayQueue, ReleasePolicy};
use crate::noise::{NoiseModel, NoiseParameters, seeded_rng};
use crate::transform::{FrameTransform, ParentFrame, WORLD_FRAME_ID};

/// Everything needed to build an [`OdometrySensor`].
#[derive(Debug, Clone)]
pub struct OdometrySettings {
    pub parent_frame_id: String,
    pub child_frame_id: String,
    pub noise: NoiseParameters,
    /// Ticks between sampling and release.
    pub measurement_delay: i64,
    /// Sample every N-th tick.
    pub measurement_divisor: i64,
    /// Seconds added to the simulation time in the header stamp.
    pub unknown_delay: f64,
    pub mask: Option<AvailabilityMask>,
    /// `None` derives a seed from the wall clock.
    pub seed: Option<u64>,
    pub release_policy: ReleasePolicy,
}

impl Default for OdometrySettings {
    fn default() -> Self {
        Self {
            parent_frame_id: WORLD_FRAME_ID.to_string(),
            child_frame_id: "odometry_sensor".to_string(),
            noise: NoiseParameters::default(),
            measurement_delay: 0,
            measurement_divisor: 1,
            unknown_delay: 0.0,
            mask: None,
            seed: None,
            release_policy: ReleasePolicy::default(),
        }
    }
}

/// Host-supplied inputs for one tick.
#[derive(Debug, Clone, Copy)]
pub struct TickInput {
    /// World-frame ground truth of the measured body.
    pub child: LinkState,
    /// World-frame ground truth of the parent body, when the parent is a link.
    pub parent: Option<LinkState>,
    pub sim_time: Stamp,
}

pub struct OdometrySensor {
    transform: FrameTransform,
    gate: AvailabilityGate,
    noise: NoiseModel,
    covariance: CovarianceSet,
    queue: DelayQueue,
    rng: ChaCha8Rng,
    seed: u64,
    child_frame_id: String,
    delay: u64,
    divisor: u64,
    unknown_delay: f64,
    release_policy: ReleasePolicy,
    tick: u64,
    seq: u64,
}

impl OdometrySensor {
    /// Validate `settings` and build the sensor.
    ///
    /// # Errors
    ///
    /// [`OdomError::InvalidDivisor`] for a divisor `<= 0`,
    /// [`OdomError::InvalidDelay`] for a negative delay,
    /// [`OdomError::InvalidNoise`] for a negative or non-finite noise
    /// parameter.
    pub fn new(settings: OdometrySettings) -> Result<Self, OdomError> {
        if settings.measurement_divisor <= 0 {
            return Err(OdomError::InvalidDivisor(settings.measurement_divisor));
        }
        if settings.measurement_delay < 0 {
            return Err(OdomError::InvalidDelay(settings.measurement_delay));
        }
        if !settings.unknown_delay.is_finite() {
            return Err(OdomError::Config(format!(
                "unknown_delay must be finite, got {}",
                settings.unknown_delay
            )));
        }

        let noise = NoiseModel::new(&settings.noise)?;
        let covariance = CovarianceSet::from_noise(&settings.noise);
        let (rng, seed) = seeded_rng(settings.seed);
        let gate = match settings.mask {
            Some(mask) => AvailabilityGate::with_mask(mask),
            None => AvailabilityGate::open(),
        };

        info!(
            parent = %settings.parent_frame_id,
            child = %settings.child_frame_id,
            delay = settings.measurement_delay,
            divisor = settings.measurement_divisor,
            seed,
            noiseless = settings.noise.is_noiseless(),
            "odometry sensor configured"
        );

        Ok(Self {
            transform: FrameTransform::new(ParentFrame::from_id(&settings.parent_frame_id)),
            gate,
            noise,
            covariance,
            queue: DelayQueue::new(),
            rng,
            seed,
            child_frame_id: settings.child_frame_id,
            delay: settings.measurement_delay as u64,
            divisor: settings.measurement_divisor as u64,
            unknown_delay: settings.unknown_delay,
            release_policy: settings.release_policy,
            tick: 0,
            seq: 0,
        })
    }

    /// Advance one simulation step.  Returns the measurement released this
    /// tick, already perturbed by noise.
    pub fn on_tick(&mut self, input: &TickInput) -> Option<Measurement> {
        let t = self.tick;

        if t % self.divisor == 0 {
            match self.transform.apply(&input.child, input.parent.as_ref()) {
                Some((pose, twist)) if self.gate.is_available(pose.position) => {
                    let raw = Measurement {
                        header: Header {
                            seq: self.seq,
                            stamp: input.sim_time.offset_by(self.unknown_delay),
                            frame_id: self.transform.parent().id().to_string(),
                        },
                        child_frame_id: self.child_frame_id.clone(),
                        pose,
                        twist,
                        pose_covariance: self.covariance.pose,
                        twist_covariance: self.covariance.twist,
                    };
                    self.seq += 1;
                    self.queue.push(t.saturating_add(self.delay), raw);
                }
                Some((pose, _)) => {
                    trace!(
                        tick = t,
                        x = pose.position.x,
                        y = pose.position.y,
                        "availability gate closed"
                    );
                }
                None => {
                    warn!(
                        tick = t,
                        parent = %self.transform.parent().id(),
                        "parent state missing; sample skipped"
                    );
                }
            }
        }

        let released = self.queue.pop_due(t, self.release_policy).map(|mut m| {
            self.noise.perturb(&mut self.rng, &mut m);
            debug!(tick = t, seq = m.header.seq, "released measurement");
            m
        });

        self.tick += 1;
        released
    }

    /// Number of ticks processed so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Stale entries discarded by [`ReleasePolicy::Exact`].
    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn covariance(&self) -> &CovarianceSet {
        &self.covariance
    }

    pub fn parent_frame(&self) -> &ParentFrame {
        self.transform.parent()
    }

    pub fn child_frame_id(&self) -> &str {
        &self.child_frame_id
    }
}
