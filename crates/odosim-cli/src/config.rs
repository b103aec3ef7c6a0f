//! Configuration Vault – reads/writes the simulation description in TOML.
//!
//! Lookup order: explicit CLI path, `$ODOSIM_CONFIG`, `./odosim.toml`.  When
//! nothing is found the built-in [`SimConfig::demo`] is used.

use std::fs;
use std::path::{Path, PathBuf};

use odosim_hal::{Motion, SimWorld};
use odosim_runtime::OdometryPluginConfig;
use odosim_sensor::noise::NoiseParameters;
use odosim_types::{Pose, Vec3};
use serde::{Deserialize, Serialize};

/// File name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "odosim.toml";

/// One scripted link of the simulated world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub name: String,
    pub motion: Motion,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    #[serde(default)]
    pub links: Vec<LinkConfig>,
}

/// Full simulation description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Seconds per simulation step.
    #[serde(default = "default_step_size")]
    pub step_size: f64,
    /// Number of steps to run.
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    #[serde(default)]
    pub world: WorldConfig,
    /// One table per odometry sensor.
    #[serde(default)]
    pub odometry: Vec<OdometryPluginConfig>,
}

fn default_step_size() -> f64 {
    0.01
}
fn default_iterations() -> u64 {
    1000
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            step_size: default_step_size(),
            iterations: default_iterations(),
            world: WorldConfig::default(),
            odometry: Vec::new(),
        }
    }
}

impl SimConfig {
    /// A quadrotor circling above a static dock, observed by one noisy,
    /// delayed odometry sensor.
    pub fn demo() -> Self {
        Self {
            world: WorldConfig {
                links: vec![
                    LinkConfig {
                        name: "dock".to_string(),
                        motion: Motion::Static {
                            pose: Pose::identity(),
                        },
                    },
                    LinkConfig {
                        name: "base_link".to_string(),
                        motion: Motion::Circle {
                            center: Vec3::new(0.0, 0.0, 1.5),
                            radius: 2.0,
                            angular_speed: 0.5,
                        },
                    },
                ],
            },
            odometry: vec![OdometryPluginConfig {
                robot_namespace: "demo".to_string(),
                link_name: "base_link".to_string(),
                noise: NoiseParameters {
                    normal_position: Vec3::new(0.01, 0.01, 0.01),
                    normal_quaternion: Vec3::new(0.02, 0.02, 0.02),
                    normal_linear_velocity: Vec3::new(0.05, 0.05, 0.05),
                    normal_angular_velocity: Vec3::new(0.01, 0.01, 0.01),
                    ..NoiseParameters::default()
                },
                measurement_delay: 5,
                measurement_divisor: 2,
                ..OdometryPluginConfig::default()
            }],
            ..Self::default()
        }
    }

    /// Instantiate the scripted world.
    pub fn build_world(&self) -> SimWorld {
        self.world
            .links
            .iter()
            .fold(SimWorld::builder(), |b, link| {
                b.with_link(link.name.clone(), link.motion.clone())
            })
            .build()
    }
}

/// Pick the config file: `explicit`, then `$ODOSIM_CONFIG`, then
/// `./odosim.toml`.
pub fn resolve_path(explicit: Option<&str>) -> PathBuf {
    explicit
        .map(PathBuf::from)
        .or_else(|| std::env::var("ODOSIM_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load the config from a specific path.  Returns `None` if the file does not
/// exist.
pub fn load_from(path: &Path) -> Result<Option<SimConfig>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: SimConfig =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `ODOSIM_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `ODOSIM_ITERATIONS` | `iterations` |
/// | `ODOSIM_STEP_SIZE` | `step_size` (ignored unless > 0) |
/// | `ODOSIM_SEED` | `random_engine_seed` of every odometry sensor |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut SimConfig) {
    if let Ok(v) = std::env::var("ODOSIM_ITERATIONS")
        && let Ok(n) = v.trim().parse::<u64>()
    {
        cfg.iterations = n;
    }
    if let Ok(v) = std::env::var("ODOSIM_STEP_SIZE")
        && let Ok(dt) = v.trim().parse::<f64>()
        && dt.is_finite()
        && dt > 0.0
    {
        cfg.step_size = dt;
    }
    if let Ok(v) = std::env::var("ODOSIM_SEED")
        && let Ok(seed) = v.trim().parse::<u64>()
    {
        for sensor in &mut cfg.odometry {
            sensor.random_engine_seed = Some(seed);
        }
    }
}

/// Save the config to a specific path, creating parent directories.
pub fn save_to(cfg: &SimConfig, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
