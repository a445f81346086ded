//! Configuration – reads/writes `~/.roamsense/config.toml`.
//!
//! Every field has a default, so a missing file or a partial file both
//! produce a usable [`Config`].  A handful of `ROAMSENSE_*` environment
//! variables override the file after it is parsed.

use std::fs;
use std::path::{Path, PathBuf};

use roamsense_middleware::{OdomProviderConfig, RobotVariant};
use roamsense_perception::scan_log::DEFAULT_MAX_FILE_SIZE_BYTES;
use roamsense_perception::{BodyStateModel, LidarConfig};
use roamsense_types::RoamError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub transport: TransportConfig,
    pub odometry: OdometryConfig,
    pub lidar: LidarSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// rosbridge WebSocket URL.
    pub rosbridge_url: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            rosbridge_url: "ws://localhost:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdometryConfig {
    pub enabled: bool,
    pub robot: RobotVariant,
    /// URID, ethernet channel or topic, depending on `robot`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Overrides the robot's calibrated standing threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standing_above_cm: Option<i64>,
    /// Overrides the robot's calibrated sitting threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sitting_above_cm: Option<i64>,
}

impl Default for OdometryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            robot: RobotVariant::TurtleBot4,
            channel: None,
            standing_above_cm: None,
            sitting_above_cm: None,
        }
    }
}

impl OdometryConfig {
    /// Provider configuration with any threshold overrides applied.
    ///
    /// Overrides only affect robots with a height-threshold body model.
    pub fn provider_config(&self) -> OdomProviderConfig {
        let cfg = OdomProviderConfig::for_variant(self.robot, self.channel.clone());
        match cfg.body_model {
            BodyStateModel::HeightThreshold {
                standing_above_cm,
                sitting_above_cm,
            } => {
                let model = BodyStateModel::HeightThreshold {
                    standing_above_cm: self.standing_above_cm.unwrap_or(standing_above_cm),
                    sitting_above_cm: self.sitting_above_cm.unwrap_or(sitting_above_cm),
                };
                cfg.with_body_model(model)
            }
            _ => {
                if self.standing_above_cm.is_some() || self.sitting_above_cm.is_some() {
                    warn!(robot = %self.robot, "height thresholds ignored for this robot");
                }
                cfg
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LidarSection {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urid: Option<String>,
    #[serde(flatten)]
    pub classifier: LidarConfig,
    /// Append raw sweeps to a rotating JSON-lines file.
    pub log_file: bool,
    pub log_dir: PathBuf,
    pub max_file_size_bytes: u64,
}

impl Default for LidarSection {
    fn default() -> Self {
        Self {
            enabled: false,
            urid: None,
            classifier: LidarConfig::default(),
            log_file: false,
            log_dir: PathBuf::from("dump"),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
        }
    }
}

impl Config {
    /// Reject values the classifiers cannot work with.
    pub fn validate(&self) -> Result<(), RoamError> {
        let l = &self.lidar.classifier;
        if !(l.half_width_robot > 0.0) {
            return Err(RoamError::Config(format!(
                "lidar.half_width_robot must be positive, got {}",
                l.half_width_robot
            )));
        }
        if !(l.relevant_distance_min < l.relevant_distance_max) {
            return Err(RoamError::Config(format!(
                "lidar.relevant_distance_min ({}) must be below relevant_distance_max ({})",
                l.relevant_distance_min, l.relevant_distance_max
            )));
        }
        if let Some([lo, hi]) = l.angles_blanked.iter().find(|[lo, hi]| lo > hi) {
            return Err(RoamError::Config(format!(
                "lidar.angles_blanked range [{lo}, {hi}] is inverted"
            )));
        }
        if self.lidar.max_file_size_bytes == 0 {
            return Err(RoamError::Config(
                "lidar.max_file_size_bytes must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Return the path to `~/.roamsense/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".roamsense").join("config.toml")
}

/// Load and validate a specific file.  Returns `None` if it does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, RoamError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| RoamError::Io(format!("failed to read config at {}: {e}", path.display())))?;
    let mut cfg: Config = toml::from_str(&raw)
        .map_err(|e| RoamError::Config(format!("failed to parse {}: {e}", path.display())))?;
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    info!(path = %path.display(), "configuration loaded");
    Ok(Some(cfg))
}

/// Apply `ROAMSENSE_*` environment overrides.
///
/// | Variable | Config field |
/// |---|---|
/// | `ROAMSENSE_ROSBRIDGE_URL` | `transport.rosbridge_url` |
/// | `ROAMSENSE_ROBOT` | `odometry.robot` |
/// | `ROAMSENSE_CHANNEL` | `odometry.channel` |
/// | `ROAMSENSE_LIDAR_URID` | `lidar.urid` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("ROAMSENSE_ROSBRIDGE_URL") {
        cfg.transport.rosbridge_url = v;
    }
    if let Some(v) = lookup("ROAMSENSE_ROBOT") {
        match v.parse::<RobotVariant>() {
            Ok(robot) => cfg.odometry.robot = robot,
            Err(e) => warn!(error = %e, "ignoring ROAMSENSE_ROBOT"),
        }
    }
    if let Some(v) = lookup("ROAMSENSE_CHANNEL") {
        cfg.odometry.channel = Some(v);
    }
    if let Some(v) = lookup("ROAMSENSE_LIDAR_URID") {
        cfg.lidar.urid = Some(v);
    }
}

/// Write `cfg` as TOML, creating the parent directory if needed.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), RoamError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| RoamError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| RoamError::Io(format!("failed to write config at {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documentation() {
        let cfg = Config::default();
        assert_eq!(cfg.transport.rosbridge_url, "ws://localhost:9090");
        assert!(cfg.odometry.enabled);
        assert_eq!(cfg.odometry.robot, RobotVariant::TurtleBot4);
        assert!(!cfg.lidar.enabled);
        assert_eq!(cfg.lidar.log_dir, PathBuf::from("dump"));
        assert_eq!(cfg.lidar.max_file_size_bytes, 1024 * 1024);
        assert_eq!(cfg.lidar.classifier, LidarConfig::default());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        let cfg = Config::default();
        save_to(&cfg, &path).expect("save");
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.lidar, cfg.lidar);
        assert_eq!(loaded.odometry, cfg.odometry);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let raw = r#"
            [odometry]
            robot = "unitree_go2"
            channel = "eth0"
            standing_above_cm = 30

            [lidar]
            enabled = true
            urid = "tb4_01"
            half_width_robot = 0.25
            angles_blanked = [[-180.0, -160.0], [160.0, 180.0]]
        "#;
        let cfg: Config = toml::from_str(raw).expect("parse");
        assert_eq!(cfg.odometry.robot, RobotVariant::UnitreeGo2);
        assert_eq!(cfg.lidar.classifier.half_width_robot, 0.25);
        assert_eq!(cfg.lidar.classifier.angles_blanked.len(), 2);
        assert_eq!(cfg.lidar.classifier.relevant_distance_max, 1.1);
        assert_eq!(cfg.transport.rosbridge_url, "ws://localhost:9090");

        let provider = cfg.odometry.provider_config();
        assert_eq!(
            provider.body_model,
            BodyStateModel::HeightThreshold {
                standing_above_cm: 30,
                sitting_above_cm: 3
            }
        );
    }

    #[test]
    fn threshold_overrides_ignored_for_unmeasured_robot() {
        let odom = OdometryConfig {
            robot: RobotVariant::TurtleBot4,
            channel: Some("tb".into()),
            standing_above_cm: Some(50),
            ..OdometryConfig::default()
        };
        assert_eq!(odom.provider_config().body_model, BodyStateModel::Unmeasured);
    }

    #[test]
    fn config_path_points_to_roamsense_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".roamsense"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[odometry]\nrobot = \"roomba\"\n").unwrap();
        assert!(matches!(load_from(&path), Err(RoamError::Config(_))));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let mut cfg = Config::default();
        cfg.lidar.classifier.relevant_distance_min = 2.0;
        assert!(matches!(cfg.validate(), Err(RoamError::Config(_))));

        let mut cfg = Config::default();
        cfg.lidar.classifier.angles_blanked = vec![[10.0, -10.0]];
        assert!(matches!(cfg.validate(), Err(RoamError::Config(_))));

        let mut cfg = Config::default();
        cfg.lidar.classifier.half_width_robot = 0.0;
        assert!(matches!(cfg.validate(), Err(RoamError::Config(_))));
    }

    #[test]
    fn overrides_apply() {
        let mut cfg = Config::default();
        apply_overrides(
            &mut cfg,
            lookup_from(&[
                ("ROAMSENSE_ROSBRIDGE_URL", "ws://robot:9090"),
                ("ROAMSENSE_ROBOT", "tron"),
                ("ROAMSENSE_CHANNEL", "tron/odom"),
                ("ROAMSENSE_LIDAR_URID", "tb4_07"),
            ]),
        );
        assert_eq!(cfg.transport.rosbridge_url, "ws://robot:9090");
        assert_eq!(cfg.odometry.robot, RobotVariant::Tron);
        assert_eq!(cfg.odometry.channel.as_deref(), Some("tron/odom"));
        assert_eq!(cfg.lidar.urid.as_deref(), Some("tb4_07"));
    }

    #[test]
    fn invalid_robot_override_is_ignored() {
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, lookup_from(&[("ROAMSENSE_ROBOT", "roomba")]));
        assert_eq!(cfg.odometry.robot, RobotVariant::TurtleBot4);
    }
}
