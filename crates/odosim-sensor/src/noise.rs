//! Stochastic measurement noise.
//!
//! Every axis carries two independent zero-mean disturbances: a Gaussian with
//! a configured standard deviation and a uniform draw from
//! `[-half_width, half_width]`.  Their sum is added to the true value.
//!
//! Orientation noise is drawn as a small attitude-error vector θ with the same
//! per-axis law, turned into a unit quaternion with
//! [`Quaternion::from_small_angle`] and right-multiplied onto the true
//! orientation.
//!
//! An axis whose standard deviation and half-width are both zero is
//! noiseless: it contributes exactly `0.0` and draws nothing from the
//! generator.
//!
//! All sampling goes through a caller-owned RNG, so two models fed by
//! generators with the same seed produce identical perturbations.

use chrono::Utc;
use odosim_types::{Measurement, OdomError, Quaternion, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Parameters
// ────────────────────────────────────────────────────────────────────────────

/// Gaussian standard deviations (`normal_*`) and uniform half-widths
/// (`uniform_*`) for each measured quantity.  All default to zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseParameters {
    pub normal_position: Vec3,
    pub normal_quaternion: Vec3,
    pub normal_linear_velocity: Vec3,
    pub normal_angular_velocity: Vec3,
    pub uniform_position: Vec3,
    pub uniform_quaternion: Vec3,
    pub uniform_linear_velocity: Vec3,
    pub uniform_angular_velocity: Vec3,
}

impl NoiseParameters {
    /// Reject negative, NaN or infinite entries.
    pub fn validate(&self) -> Result<(), OdomError> {
        let fields = [
            ("normal_position", self.normal_position),
            ("normal_quaternion", self.normal_quaternion),
            ("normal_linear_velocity", self.normal_linear_velocity),
            ("normal_angular_velocity", self.normal_angular_velocity),
            ("uniform_position", self.uniform_position),
            ("uniform_quaternion", self.uniform_quaternion),
            ("uniform_linear_velocity", self.uniform_linear_velocity),
            ("uniform_angular_velocity", self.uniform_angular_velocity),
        ];
        for (name, v) in fields {
            for (axis, value) in [("x", v.x), ("y", v.y), ("z", v.z)] {
                if !value.is_finite() || value < 0.0 {
                    return Err(OdomError::InvalidNoise {
                        field: format!("{name}.{axis}"),
                        value,
                    });
                }
            }
        }
        Ok(())
    }

    /// `true` when every parameter is zero.
    pub fn is_noiseless(&self) -> bool {
        *self == Self::default()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Per-axis sampling
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct AxisNoise {
    normal: Option<Normal<f64>>,
    uniform: Option<Uniform<f64>>,
}

impl AxisNoise {
    fn new(std_dev: f64, half_width: f64) -> Result<Self, OdomError> {
        let normal = if std_dev > 0.0 {
            let dist = Normal::new(0.0, std_dev).map_err(|_| OdomError::InvalidNoise {
                field: "std_dev".to_string(),
                value: std_dev,
            })?;
            Some(dist)
        } else {
            None
        };
        let uniform = (half_width > 0.0).then(|| Uniform::new_inclusive(-half_width, half_width));
        Ok(Self { normal, uniform })
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let mut value = 0.0;
        if let Some(normal) = &self.normal {
            value += normal.sample(rng);
        }
        if let Some(uniform) = &self.uniform {
            value += uniform.sample(rng);
        }
        value
    }
}

/// Independent Gaussian + uniform noise on three axes.
#[derive(Debug, Clone, Copy)]
pub struct Vec3Noise {
    axes: [AxisNoise; 3],
}

impl Vec3Noise {
    /// Build from per-axis standard deviations and uniform half-widths.
    ///
    /// Parameters are expected to have passed
    /// [`NoiseParameters::validate`].
    pub fn new(std_dev: Vec3, half_width: Vec3) -> Result<Self, OdomError> {
        Ok(Self {
            axes: [
                AxisNoise::new(std_dev.x, half_width.x)?,
                AxisNoise::new(std_dev.y, half_width.y)?,
                AxisNoise::new(std_dev.z, half_width.z)?,
            ],
        })
    }

    /// Draw one noise vector.  Axes are sampled in x, y, z order, Gaussian
    /// before uniform.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec3 {
        let x = self.axes[0].sample(rng);
        let y = self.axes[1].sample(rng);
        let z = self.axes[2].sample(rng);
        Vec3::new(x, y, z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// NoiseModel
// ────────────────────────────────────────────────────────────────────────────

/// Perturbs a raw [`Measurement`] in place.
#[derive(Debug, Clone, Copy)]
pub struct NoiseModel {
    position: Vec3Noise,
    attitude: Vec3Noise,
    linear_velocity: Vec3Noise,
    angular_velocity: Vec3Noise,
}

impl NoiseModel {
    pub fn new(params: &NoiseParameters) -> Result<Self, OdomError> {
        params.validate()?;
        Ok(Self {
            position: Vec3Noise::new(params.normal_position, params.uniform_position)?,
            attitude: Vec3Noise::new(params.normal_quaternion, params.uniform_quaternion)?,
            linear_velocity: Vec3Noise::new(
                params.normal_linear_velocity,
                params.uniform_linear_velocity,
            )?,
            angular_velocity: Vec3Noise::new(
                params.normal_angular_velocity,
                params.uniform_angular_velocity,
            )?,
        })
    }

    /// Apply position, orientation, linear and angular velocity noise, in
    /// that order.  Covariances and header are left untouched.
    pub fn perturb<R: Rng + ?Sized>(&self, rng: &mut R, measurement: &mut Measurement) {
        let pose = &mut measurement.pose;
        pose.position = pose.position.add(self.position.sample(rng));

        let theta = self.attitude.sample(rng);
        if theta != Vec3::zero() {
            pose.orientation = pose.orientation.mul(Quaternion::from_small_angle(theta));
        }

        let twist = &mut measurement.twist;
        twist.linear = twist.linear.add(self.linear_velocity.sample(rng));
        twist.angular = twist.angular.add(self.angular_velocity.sample(rng));
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Random generator
// ────────────────────────────────────────────────────────────────────────────

/// Build the per-instance generator.  Without an explicit seed one is derived
/// from the current wall-clock time.  Returns the generator and the seed that
/// was used so it can be logged for reproduction.
pub fn seeded_rng(seed: Option<u64>) -> (ChaCha8Rng, u64) {
    let seed = seed.unwrap_or_else(time_derived_seed);
    (ChaCha8Rng::seed_from_u64(seed), seed)
}

fn time_derived_seed() -> u64 {
    let now = Utc::now();
    now.timestamp_nanos_opt()
        .map(|ns| ns as u64)
        .unwrap_or_else(|| now.timestamp_micros() as u64)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
