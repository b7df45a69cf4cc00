// config.rs — 调参配置 + 启动参数
//
// Tuning lives in an optional JSON file (`--config <path>`); every field has a
// default so partial files are fine. Launch options follow the same pattern
// as the language switch:
// - CLI: --tour <file> --config <file> --lang <code> --motion <granted|denied|pending|none>
// - Env: TOUR_LANG
// - Default: en

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TourError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Drag dominance ratio that triggers axis locking.
    pub axis_lock_ratio: f32,
    /// Factor applied to the minor axis of a locked drag.
    pub off_axis_damping: f32,
    /// Maximum fling speed, degrees per second.
    pub max_velocity: f32,
    /// Total travel below which a press/release is a click.
    pub click_slop_px: f32,
    pub rest_before_release_secs: f32,
    /// Inertia decay rate (1/s) for `velocity *= exp(-friction * dt)`.
    pub friction: f32,
    /// Speeds below this snap to zero.
    pub rest_speed: f32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            axis_lock_ratio: 1.6,
            off_axis_damping: 0.15,
            max_velocity: 540.0,
            click_slop_px: 6.0,
            rest_before_release_secs: 0.08,
            friction: 4.0,
            rest_speed: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub fov: f32,
    pub min_fov: f32,
    pub max_fov: f32,
    pub sensitivity: f32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            fov: 75.0,
            min_fov: 30.0,
            max_fov: 100.0,
            sensitivity: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotspotConfig {
    /// Distance of hotspot markers from the camera.
    pub radius: f32,
    pub size: f32,
    pub fallback_size: f32,
    /// Activation sphere radius per unit of size.
    pub activation_scale: f32,
    /// Drawn marker radius per unit of size. Kept below the activation scale.
    pub visual_scale: f32,
    /// Gaze dwell needed to select in gyro/vr modes.
    pub fuse_secs: f32,
}

impl Default for HotspotConfig {
    fn default() -> Self {
        Self {
            radius: 450.0,
            size: 0.7,
            fallback_size: 0.6,
            activation_scale: 15.0,
            visual_scale: 10.0,
            fuse_secs: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// Fade-out plus fade-in time, seconds.
    pub duration: f32,
    /// Longest hold at black waiting for the next panorama.
    pub load_timeout: f32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            duration: 1.0,
            load_timeout: 6.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoTourConfig {
    /// Yaw swept per scene, degrees (negative turns left).
    pub sweep: f32,
    pub sweep_secs: f32,
}

impl Default for AutoTourConfig {
    fn default() -> Self {
        Self {
            sweep: -360.0,
            sweep_secs: 11.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub input: InputConfig,
    pub view: ViewConfig,
    pub hotspots: HotspotConfig,
    pub transition: TransitionConfig,
    pub auto_tour: AutoTourConfig,
}

impl ViewerConfig {
    pub fn from_json_str(text: &str) -> Result<Self, TourError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, TourError> {
        let text = std::fs::read_to_string(path).map_err(|source| TourError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}

/// How the desktop motion sensor answers permission requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionPolicy {
    #[default]
    Granted,
    Denied,
    /// Ask through an in-window prompt answered later.
    Pending,
    /// No sensor at all.
    None,
}

impl MotionPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "granted" | "emulated" => Some(Self::Granted),
            "denied" => Some(Self::Denied),
            "pending" => Some(Self::Pending),
            "none" | "off" => Some(Self::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaunchOptions {
    pub tour: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub lang: String,
    pub motion: MotionPolicy,
}

impl LaunchOptions {
    pub fn from_env() -> Self {
        Self::parse(std::env::args().skip(1), std::env::var("TOUR_LANG").ok())
    }

    pub fn parse<I>(args: I, env_lang: Option<String>) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut opts = LaunchOptions {
            tour: None,
            config: None,
            lang: String::new(),
            motion: MotionPolicy::default(),
        };

        let mut it = args.into_iter();
        while let Some(a) = it.next() {
            match a.as_str() {
                "--tour" => opts.tour = it.next().map(PathBuf::from),
                "--config" => opts.config = it.next().map(PathBuf::from),
                "--lang" => {
                    if let Some(v) = it.next() {
                        opts.lang = v;
                    }
                }
                "--motion" => match it.next().as_deref().and_then(MotionPolicy::parse) {
                    Some(p) => opts.motion = p,
                    None => log::warn!("ignoring unknown --motion value"),
                },
                // bare path: treat as the tour file
                other if !other.starts_with("--") && opts.tour.is_none() => {
                    opts.tour = Some(PathBuf::from(other));
                }
                other => log::warn!("ignoring unknown argument {other}"),
            }
        }

        if opts.lang.is_empty() {
            opts.lang = env_lang
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "en".to_string());
        }
        opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg = ViewerConfig::from_json_str(r#"{"transition": {"duration": 2.5}}"#).unwrap();
        assert_eq!(cfg.transition.duration, 2.5);
        assert_eq!(cfg.transition.load_timeout, 6.0);
        assert_eq!(cfg.input, InputConfig::default());
    }

    #[test]
    fn activation_not_smaller_than_marker() {
        let h = HotspotConfig::default();
        assert!(h.activation_scale >= h.visual_scale);
    }

    #[test]
    fn parses_cli_flags() {
        let o = LaunchOptions::parse(
            args(&["--tour", "t.json", "--lang", "zh-Hans", "--motion", "denied"]),
            Some("fr".into()),
        );
        assert_eq!(o.tour, Some(PathBuf::from("t.json")));
        assert_eq!(o.lang, "zh-Hans");
        assert_eq!(o.motion, MotionPolicy::Denied);
    }

    #[test]
    fn env_and_default_language() {
        assert_eq!(LaunchOptions::parse(args(&[]), Some("ja".into())).lang, "ja");
        assert_eq!(LaunchOptions::parse(args(&[]), Some("  ".into())).lang, "en");
        assert_eq!(
            LaunchOptions::parse(args(&["my.json"]), None).tour,
            Some(PathBuf::from("my.json"))
        );
    }
}
