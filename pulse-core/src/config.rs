//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config and
//! `EngineConfig::default()` is what the apps ship with.

use std::env;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::exercise::ExerciseType;
use crate::session::SessionError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    /// Joint angle above which a hinge exercise is extended.
    pub up_angle: f32,
    /// Joint angle below which an extended hinge exercise counts a rep.
    pub down_angle: f32,
    /// Joint angle below which form feedback becomes a warning.
    pub warn_angle: f32,
    /// Ankle distance below which a jumping jack is closed.
    pub closed_feet: f32,
    /// Ankle distance above which a jumping jack is open.
    pub open_feet: f32,
    /// How far above hip height both wrists must be for an open jumping jack.
    pub arm_margin: f32,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            up_angle: 160.0,
            down_angle: 90.0,
            warn_angle: 70.0,
            closed_feet: 0.15,
            open_feet: 0.25,
            arm_margin: 0.10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub capture_sample_rate: u32,
    pub playback_sample_rate: u32,
    /// Samples per outbound microphone frame.
    pub frame_samples: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            capture_sample_rate: 16_000,
            playback_sample_rate: 24_000,
            frame_samples: 4096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub countdown_ticks: u32,
    pub thresholds: ClassifierThresholds,
    pub audio: AudioConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            countdown_ticks: 3,
            thresholds: ClassifierThresholds::default(),
            audio: AudioConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).context("Failed to parse engine config")?;
        config.check()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    /// Loads `PULSE_CONFIG` if set, then applies the individual `PULSE_*` overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var("PULSE_CONFIG") {
            Ok(path) => {
                info!("Loading engine config from {}", path);
                Self::from_file(path)?
            }
            Err(_) => Self::default(),
        };

        if let Ok(raw) = env::var("PULSE_COUNTDOWN_TICKS") {
            config.countdown_ticks = raw
                .parse()
                .with_context(|| format!("PULSE_COUNTDOWN_TICKS is not a number: {}", raw))?;
        }
        if let Ok(raw) = env::var("PULSE_FRAME_SAMPLES") {
            config.audio.frame_samples = raw
                .parse()
                .with_context(|| format!("PULSE_FRAME_SAMPLES is not a number: {}", raw))?;
        }

        config.check()?;
        debug!("Engine config: {:?}", config);
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        let t = &self.thresholds;
        if !(t.warn_angle <= t.down_angle && t.down_angle < t.up_angle) {
            return Err(anyhow!(
                "Angle thresholds must satisfy warn <= down < up, got {} / {} / {}",
                t.warn_angle,
                t.down_angle,
                t.up_angle
            ));
        }
        if t.closed_feet >= t.open_feet {
            return Err(anyhow!(
                "closed_feet ({}) must be below open_feet ({})",
                t.closed_feet,
                t.open_feet
            ));
        }
        if self.audio.frame_samples == 0 {
            return Err(anyhow!("frame_samples must be positive"));
        }
        if self.audio.capture_sample_rate == 0 || self.audio.playback_sample_rate == 0 {
            return Err(anyhow!("sample rates must be positive"));
        }
        Ok(())
    }
}

/// What the UI asks for when a workout starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutConfig {
    pub exercise: ExerciseType,
    /// Zero means the session only ends on the timer.
    pub target_reps: u32,
    pub target_duration_seconds: u32,
}

impl WorkoutConfig {
    pub fn new(exercise: ExerciseType, target_reps: u32, target_duration_seconds: u32) -> Self {
        Self {
            exercise,
            target_reps,
            target_duration_seconds,
        }
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.target_duration_seconds == 0 {
            return Err(SessionError::InvalidConfig(
                "target_duration_seconds must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_default() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.audio.frame_samples, 4096);
        assert_eq!(config.countdown_ticks, 3);
    }

    #[test]
    fn partial_json_overrides_only_given_fields() {
        let config =
            EngineConfig::from_json_str(r#"{"countdown_ticks":5,"thresholds":{"up_angle":150}}"#)
                .unwrap();
        assert_eq!(config.countdown_ticks, 5);
        assert_eq!(config.thresholds.up_angle, 150.0);
        assert_eq!(config.thresholds.down_angle, 90.0);
    }

    #[test]
    fn inconsistent_thresholds_are_rejected() {
        assert!(EngineConfig::from_json_str(r#"{"thresholds":{"down_angle":170}}"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{"thresholds":{"open_feet":0.1}}"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{"audio":{"frame_samples":0}}"#).is_err());
    }

    #[test]
    fn zero_duration_is_invalid() {
        assert!(WorkoutConfig::new(ExerciseType::Squat, 10, 0).validate().is_err());
        assert!(WorkoutConfig::new(ExerciseType::Squat, 0, 30).validate().is_ok());
    }
}
