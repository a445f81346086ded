//! `roamsense-types` – shared vocabulary of the perception layer.
//!
//! Wire messages live in [`msgs`]; this module holds the canonical pose
//! sample, the snapshot handed to downstream consumers, and the global error
//! type.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod msgs;

pub use msgs::{
    Header, ImuState, LaserScan, MessageKind, Odometry, Point, Pose, PoseMessage, PoseStamped,
    PoseWithCovariance, PoseWithCovarianceStamped, Quaternion, SportModeState, Time,
};

/// How a pose sample expresses heading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Orientation {
    /// Full attitude as a unit quaternion.
    Quaternion(Quaternion),
    /// Yaw already resolved by an IMU (radians, CCW-positive).
    Yaw(f64),
}

/// One canonical pose reading, produced per incoming message and consumed
/// exactly once by the motion classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseSample {
    pub position: Point,
    pub orientation: Orientation,
    /// Publisher-side timestamp (unix seconds, may be skewed).
    pub publisher_ts: f64,
    /// Local receipt timestamp (unix seconds).
    pub subscriber_ts: f64,
}

/// Coarse body posture of a legged robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyAttitude {
    Standing,
    Sitting,
}

impl BodyAttitude {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyAttitude::Standing => "standing",
            BodyAttitude::Sitting => "sitting",
        }
    }
}

impl std::fmt::Display for BodyAttitude {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable copy of the motion/attitude state, keyed the way downstream
/// text formatters expect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OdomSnapshot {
    pub odom_x: f64,
    pub odom_y: f64,
    pub moving: bool,
    /// Heading in degrees, `[0, 360)`, increasing clockwise.
    pub odom_yaw_0_360: f64,
    /// Heading in degrees, `[-180, 180]`, increasing counter-clockwise.
    pub odom_yaw_m180_p180: f64,
    pub body_height_cm: i64,
    pub body_attitude: Option<BodyAttitude>,
    /// Publisher clock of the last consumed sample.
    pub odom_rockchip_ts: f64,
    /// Local clock of the last consumed sample.
    pub odom_subscriber_ts: f64,
}

/// Current wall-clock time as unix seconds.
pub fn unix_now() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) * 1e-9
}

/// Global error type spanning configuration, transport, decoding and
/// diagnostic-file failures.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoamError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Transport Error on {endpoint}: {details}")]
    Transport { endpoint: String, details: String },

    #[error("Decode Error: {0}")]
    Decode(String),

    #[error("I/O Error: {0}")]
    Io(String),

    #[error("Invalid Payload: {0}")]
    InvalidPayload(String),

    #[error("Runtime Error: {0}")]
    Runtime(String),
}

impl From<std::io::Error> for RoamError {
    fn from(e: std::io::Error) -> Self {
        RoamError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_with_consumer_keys() {
        let snap = OdomSnapshot {
            odom_x: 1.5,
            moving: true,
            body_attitude: Some(BodyAttitude::Sitting),
            ..OdomSnapshot::default()
        };
        let json = serde_json::to_value(snap).unwrap();
        for key in [
            "odom_x",
            "odom_y",
            "moving",
            "odom_yaw_0_360",
            "odom_yaw_m180_p180",
            "body_height_cm",
            "body_attitude",
            "odom_rockchip_ts",
            "odom_subscriber_ts",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(json["body_attitude"], "sitting");
        assert_eq!(json["moving"], true);
    }

    #[test]
    fn default_snapshot_has_no_attitude() {
        let json = serde_json::to_value(OdomSnapshot::default()).unwrap();
        assert!(json["body_attitude"].is_null());
    }

    #[test]
    fn body_attitude_display() {
        assert_eq!(BodyAttitude::Standing.to_string(), "standing");
        assert_eq!(BodyAttitude::Sitting.to_string(), "sitting");
    }

    #[test]
    fn roam_error_display() {
        let err = RoamError::Config("channel missing".to_string());
        assert!(err.to_string().contains("Configuration Error"));

        let err = RoamError::Transport {
            endpoint: "ws://robot:9090".to_string(),
            details: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("ws://robot:9090"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: RoamError = io.into();
        assert!(matches!(err, RoamError::Io(_)));
    }

    #[test]
    fn unix_now_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(unix_now() > 1_577_836_800.0);
    }
}
