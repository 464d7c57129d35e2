//! Configuration management for jam-sync
//!
//! Handles loading, parsing, and hot-reloading of YAML configuration files.
//! Every section has defaults, so an empty file is a valid configuration.

pub mod watcher;

use anyhow::{Context, Result};
use nalgebra::{Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::fs;

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub bridge: BridgeConfig,
    pub gesture: GestureConfig,
    pub pose: PoseConfig,
    pub rig: RigConfig,
}

/// Local participant and tick settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub local_id: u32,
    pub display_name: String,
    pub tick_hz: u32,
}

/// Control-event bridge listener
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub enabled: bool,
    pub listen: String,
}

/// Note-to-gesture derivation parameters
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Channel carrying keyboard notes (1-16)
    pub keyboard_channel: u8,
    /// Notes below this drive the left hand, at/above it the right hand
    pub middle_note: u8,
    /// Channel carrying drum pads (1-16)
    pub drum_channel: u8,
    /// Channel of the tracked guitar string (1-16)
    pub guitar_string_channel: u8,
    /// Note at the top of the neck
    pub guitar_base_note: u8,
    /// Number of notes spanned by the neck
    pub guitar_span: u8,
}

/// Remote pose smoothing and hand rest poses
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PoseConfig {
    /// Exponential smoothing rate (per second) for remote body position
    pub smoothing_rate: f32,
    pub left_rest: RestPose,
    pub right_rest: RestPose,
}

/// Canonical IK rest pose, relative to the avatar
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct RestPose {
    pub position: [f32; 3],
    /// Euler angles in degrees (roll, pitch, yaw)
    #[serde(default)]
    pub euler_deg: [f32; 3],
}

impl RestPose {
    pub fn point(&self) -> Point3<f32> {
        Point3::from(self.position)
    }

    pub fn rotation(&self) -> UnitQuaternion<f32> {
        let [r, p, y] = self.euler_deg;
        UnitQuaternion::from_euler_angles(r.to_radians(), p.to_radians(), y.to_radians())
    }
}

/// Geometry of the instrument rig handlers
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RigConfig {
    pub keyboard: KeyboardRigConfig,
    pub drum: DrumRigConfig,
    pub guitar: GuitarRigConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct KeyboardRigConfig {
    pub left_start: [f32; 3],
    pub right_start: [f32; 3],
    /// How far each hand travels along the keyboard at position 1.0
    pub spread: f32,
    /// Smoothing time of hand travel in seconds
    pub movement_time: f32,
    /// Wrist roll on key press, degrees
    pub press_angle: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DrumRigConfig {
    pub left_start: [f32; 3],
    pub right_start: [f32; 3],
    /// Distance a hand drops on a hit
    pub hit_depth: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GuitarRigConfig {
    pub neck_start: [f32; 3],
    pub neck_end: [f32; 3],
    pub strum_hand: [f32; 3],
    pub movement_time: f32,
    /// Strumming wrist yaw, degrees
    pub strum_angle: f32,
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_yaml_str(&contents).with_context(|| format!("Invalid config file: {}", path))
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = if contents.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.session.display_name.trim().is_empty() {
            anyhow::bail!("session.display_name cannot be empty");
        }
        if self.session.tick_hz == 0 || self.session.tick_hz > 240 {
            anyhow::bail!(
                "session.tick_hz {} is invalid (must be 1-240)",
                self.session.tick_hz
            );
        }

        if self.bridge.enabled {
            self.bridge
                .listen
                .parse::<SocketAddr>()
                .with_context(|| format!("bridge.listen '{}' is not a socket address", self.bridge.listen))?;
        }

        self.gesture.validate().context("Invalid gesture section")?;

        if !(self.pose.smoothing_rate > 0.0) {
            anyhow::bail!("pose.smoothing_rate must be positive");
        }

        if !(self.rig.keyboard.movement_time > 0.0) || !(self.rig.guitar.movement_time > 0.0) {
            anyhow::bail!("rig movement_time values must be positive");
        }

        Ok(())
    }
}

impl GestureConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, channel) in [
            ("keyboard_channel", self.keyboard_channel),
            ("drum_channel", self.drum_channel),
            ("guitar_string_channel", self.guitar_string_channel),
        ] {
            if channel == 0 || channel > 16 {
                anyhow::bail!("{} {} is invalid (must be 1-16)", name, channel);
            }
        }
        if self.middle_note == 0 || self.middle_note > 127 {
            anyhow::bail!("middle_note {} is invalid (must be 1-127)", self.middle_note);
        }
        if self.guitar_span == 0 {
            anyhow::bail!("guitar_span must be at least 1");
        }
        if self.guitar_base_note > 127 {
            anyhow::bail!("guitar_base_note {} is invalid (must be 0-127)", self.guitar_base_note);
        }
        Ok(())
    }
}

impl KeyboardRigConfig {
    /// Unit vector from the left start position to the right one
    pub fn axis(&self) -> Vector3<f32> {
        let d = Vector3::from(self.right_start) - Vector3::from(self.left_start);
        d.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::x)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            local_id: 1,
            display_name: default_display_name(),
            tick_hz: 60,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_bridge_listen(),
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            keyboard_channel: 1,
            middle_note: 44,
            drum_channel: 1,
            guitar_string_channel: 7,
            guitar_base_note: 40,
            guitar_span: 10,
        }
    }
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            smoothing_rate: 80.0,
            left_rest: RestPose {
                position: [-0.2, -0.35, 0.25],
                euler_deg: [0.0, 0.0, 90.0],
            },
            right_rest: RestPose {
                position: [0.2, -0.35, 0.25],
                euler_deg: [0.0, 0.0, -90.0],
            },
        }
    }
}

impl Default for KeyboardRigConfig {
    fn default() -> Self {
        Self {
            left_start: [-0.1, -0.4, 0.35],
            right_start: [0.1, -0.4, 0.35],
            spread: 0.3,
            movement_time: 0.5,
            press_angle: 15.0,
        }
    }
}

impl Default for DrumRigConfig {
    fn default() -> Self {
        Self {
            left_start: [-0.15, -0.35, 0.3],
            right_start: [0.15, -0.35, 0.3],
            hit_depth: 0.08,
        }
    }
}

impl Default for GuitarRigConfig {
    fn default() -> Self {
        Self {
            neck_start: [-0.25, -0.3, 0.3],
            neck_end: [-0.55, -0.2, 0.3],
            strum_hand: [0.1, -0.45, 0.25],
            movement_time: 0.5,
            strum_angle: 30.0,
        }
    }
}

// Default value functions
fn default_display_name() -> String { "player".to_string() }
fn default_bridge_listen() -> String { "127.0.0.1:5555".to_string() }
