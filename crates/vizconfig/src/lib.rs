use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Scene-rotation policy selected by the user.
///
/// `OccurrenceFair` keeps per-scene selection counts and always picks among
/// the least-shown scenes at random; `TimeSliced` cycles deterministically
/// through the registry in fixed slots of `switch_interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotationPolicy {
    OccurrenceFair,
    TimeSliced,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::OccurrenceFair
    }
}

impl fmt::Display for RotationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationPolicy::OccurrenceFair => f.write_str("occurrence-fair"),
            RotationPolicy::TimeSliced => f.write_str("time-sliced"),
        }
    }
}

impl FromStr for RotationPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "occurrence-fair" | "fair" => Ok(Self::OccurrenceFair),
            "time-sliced" | "sliced" => Ok(Self::TimeSliced),
            other => Err(format!("invalid rotation policy '{other}'")),
        }
    }
}

/// Configuration surface for the visualizer.
///
/// Every field has a default matching the built-in behaviour, so an empty
/// TOML document (or no file at all) yields a usable configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VizConfig {
    /// Wall-clock time each scene stays active before the scheduler rotates.
    #[serde(
        default = "default_switch_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub switch_interval: Duration,
    /// Offscreen feedback buffers are sized to `floor(surface * render_scale)`.
    #[serde(default = "default_render_scale")]
    pub render_scale: f32,
    /// Preferred redraw cadence; `None` (or 0) renders on every callback.
    #[serde(default = "default_target_fps")]
    pub target_fps: Option<f32>,
    /// Name prefixes that qualify a fragment program as a rotating scene.
    #[serde(default = "default_scene_prefixes")]
    pub scene_prefixes: Vec<String>,
    #[serde(default)]
    pub policy: RotationPolicy,
    /// RGBA colour the feedback buffers are cleared to on (re)allocation.
    #[serde(default = "default_clear_color")]
    pub clear_color: [f64; 4],
    /// Optional RNG seed for reproducible occurrence-fair rotation.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for VizConfig {
    fn default() -> Self {
        Self {
            switch_interval: default_switch_interval(),
            render_scale: default_render_scale(),
            target_fps: default_target_fps(),
            scene_prefixes: default_scene_prefixes(),
            policy: RotationPolicy::default(),
            clear_color: default_clear_color(),
            seed: None,
        }
    }
}

impl VizConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: VizConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// FPS caps of zero (or below) mean "uncapped".
    pub fn effective_fps(&self) -> Option<f32> {
        self.target_fps.and_then(|fps| (fps > 0.0).then_some(fps))
    }

    /// Re-checked by the binary after CLI overrides are applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.switch_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "switch_interval must be greater than zero".into(),
            ));
        }
        if let Some(fps) = self.target_fps {
            if !fps.is_finite() || fps < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "target_fps must be zero (uncapped) or positive, got {fps}"
                )));
            }
        }
        if !(self.render_scale > 0.0 && self.render_scale <= 4.0) {
            return Err(ConfigError::Invalid(format!(
                "render_scale must be in (0, 4], got {}",
                self.render_scale
            )));
        }
        for component in self.clear_color {
            if !(0.0..=1.0).contains(&component) {
                return Err(ConfigError::Invalid(format!(
                    "clear_color components must be in [0, 1], got {component}"
                )));
            }
        }
        Ok(())
    }
}

fn default_switch_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_render_scale() -> f32 {
    0.7
}

fn default_target_fps() -> Option<f32> {
    Some(120.0)
}

fn default_scene_prefixes() -> Vec<String> {
    vec!["scene_".into(), "feedback_".into()]
}

fn default_clear_color() -> [f64; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = VizConfig::from_toml_str("").unwrap();
        assert_eq!(config.switch_interval, Duration::from_secs(15));
        assert_eq!(config.render_scale, 0.7);
        assert_eq!(config.target_fps, Some(120.0));
        assert_eq!(config.scene_prefixes, vec!["scene_", "feedback_"]);
        assert_eq!(config.policy, RotationPolicy::OccurrenceFair);
        assert_eq!(config.clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn parses_humantime_and_numeric_intervals() {
        let config = VizConfig::from_toml_str(r#"switch_interval = "90s""#).unwrap();
        assert_eq!(config.switch_interval, Duration::from_secs(90));

        let config = VizConfig::from_toml_str("switch_interval = 7.5").unwrap();
        assert_eq!(config.switch_interval, Duration::from_secs_f64(7.5));
    }

    #[test]
    fn rejects_zero_interval() {
        let err = VizConfig::from_toml_str("switch_interval = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_out_of_range_scale() {
        let err = VizConfig::from_toml_str("render_scale = -0.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = VizConfig::from_toml_str("render_scale = 8.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_fps_treated_as_uncapped() {
        let config = VizConfig::from_toml_str("target_fps = 0").unwrap();
        assert_eq!(config.effective_fps(), None, "fps=0 should map to uncapped");
    }

    #[test]
    fn rejects_negative_fps() {
        let err = VizConfig::from_toml_str("target_fps = -60").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn parses_policy_names() {
        let config = VizConfig::from_toml_str(r#"policy = "time-sliced""#).unwrap();
        assert_eq!(config.policy, RotationPolicy::TimeSliced);
        assert_eq!("fair".parse::<RotationPolicy>().unwrap(), RotationPolicy::OccurrenceFair);
        assert!("sometimes".parse::<RotationPolicy>().is_err());
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(VizConfig::from_toml_str("playlists = 3").is_err());
    }
}
