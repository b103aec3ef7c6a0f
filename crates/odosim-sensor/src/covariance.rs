//! Reported measurement uncertainty.
//!
//! Both matrices are diagonal and built only from the Gaussian standard
//! deviations.  Uniform noise is injected but never reported.

use odosim_types::{Covariance6, Vec3};

use crate::noise::NoiseParameters;

/// Pose and twist covariance, computed once when the sensor is configured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CovarianceSet {
    pub pose: Covariance6,
    pub twist: Covariance6,
}

impl CovarianceSet {
    /// `pose  = diag(σ_px², σ_py², σ_pz², σ_qx², σ_qy², σ_qz²)`
    /// `twist = diag(σ_vx², σ_vy², σ_vz², σ_ωx², σ_ωy², σ_ωz²)`
    pub fn from_noise(params: &NoiseParameters) -> Self {
        Self {
            pose: diagonal_of(params.normal_position, params.normal_quaternion),
            twist: diagonal_of(params.normal_linear_velocity, params.normal_angular_velocity),
        }
    }
}

fn diagonal_of(first: Vec3, second: Vec3) -> Covariance6 {
    Covariance6::from_diagonal([
        first.x * first.x,
        first.y * first.y,
        first.z * first.z,
        second.x * second.x,
        second.y * second.y,
        second.z * second.z,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonal_holds_squared_std_devs() {
        let params = NoiseParameters {
            normal_position: Vec3::new(0.1, 0.2, 0.3),
            normal_quaternion: Vec3::new(0.01, 0.02, 0.03),
            normal_linear_velocity: Vec3::new(1.0, 2.0, 3.0),
            normal_angular_velocity: Vec3::new(0.5, 0.25, 0.125),
            ..NoiseParameters::default()
        };
        let cov = CovarianceSet::from_noise(&params);
        let expected_pose = [
            0.1 * 0.1,
            0.2 * 0.2,
            0.3 * 0.3,
            0.01 * 0.01,
            0.02 * 0.02,
            0.03 * 0.03,
        ];
        assert_eq!(cov.pose.diagonal(), expected_pose);
        assert_eq!(cov.twist.diagonal(), [1.0, 4.0, 9.0, 0.25, 0.0625, 0.015625]);
    }

    #[test]
    fn off_diagonal_entries_are_zero() {
        let params = NoiseParameters {
            normal_position: Vec3::new(1.0, 1.0, 1.0),
            normal_angular_velocity: Vec3::new(1.0, 1.0, 1.0),
            ..NoiseParameters::default()
        };
        let cov = CovarianceSet::from_noise(&params);
        for row in 0..6 {
            for col in 0..6 {
                if row != col {
                    assert_eq!(cov.pose.get(row, col), 0.0);
                    assert_eq!(cov.twist.get(row, col), 0.0);
                }
            }
        }
    }

    #[test]
    fn uniform_noise_is_not_reported() {
        let params = NoiseParameters {
            uniform_position: Vec3::new(5.0, 5.0, 5.0),
            uniform_angular_velocity: Vec3::new(1.0, 1.0, 1.0),
            ..NoiseParameters::default()
        };
        let cov = CovarianceSet::from_noise(&params);
        assert_eq!(cov.pose, Covariance6::zeros());
        assert_eq!(cov.twist, Covariance6::zeros());
    }
}
