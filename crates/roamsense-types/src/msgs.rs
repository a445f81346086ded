//! ROS-style wire messages received from the robot transports.
//!
//! Only the fields the perception layer reads are modelled.  Unknown fields in
//! incoming JSON (twist, covariance details, foot forces, …) are ignored by
//! serde, so the same structs decode both full ROS 2 messages relayed by
//! rosbridge and trimmed vendor payloads.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{Orientation, PoseSample, RoamError};

// ────────────────────────────────────────────────────────────────────────────
// builtin_interfaces / std_msgs
// ────────────────────────────────────────────────────────────────────────────

/// Publisher-side timestamp (`builtin_interfaces/Time`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Time {
    #[serde(default)]
    pub sec: i32,
    #[serde(default)]
    pub nanosec: u32,
}

impl Time {
    pub fn new(sec: i32, nanosec: u32) -> Self {
        Self { sec, nanosec }
    }

    /// Seconds since the publisher's epoch, as a float.
    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.nanosec as f64 * 1e-9
    }
}

/// `std_msgs/Header`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub stamp: Time,
    #[serde(default)]
    pub frame_id: String,
}

// ────────────────────────────────────────────────────────────────────────────
// geometry_msgs
// ────────────────────────────────────────────────────────────────────────────

/// The position of a point in free space (metres).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// An orientation in quaternion form (x, y, z, w convention, as on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// The identity rotation.
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    /// A pure rotation of `yaw_rad` about the vertical axis.
    pub fn from_yaw(yaw_rad: f64) -> Self {
        let half = yaw_rad * 0.5;
        Self::new(0.0, 0.0, half.sin(), half.cos())
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

/// Position and orientation in free space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point,
    pub orientation: Quaternion,
}

/// A pose with its (ignored) 6×6 covariance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseWithCovariance {
    pub pose: Pose,
    #[serde(default)]
    pub covariance: Vec<f64>,
}

/// `geometry_msgs/PoseWithCovarianceStamped`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseWithCovarianceStamped {
    #[serde(default)]
    pub header: Header,
    pub pose: PoseWithCovariance,
}

/// `geometry_msgs/PoseStamped`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseStamped {
    #[serde(default)]
    pub header: Header,
    pub pose: Pose,
}

// ────────────────────────────────────────────────────────────────────────────
// nav_msgs / sensor_msgs
// ────────────────────────────────────────────────────────────────────────────

/// `nav_msgs/Odometry`, without the twist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Odometry {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub child_frame_id: String,
    pub pose: PoseWithCovariance,
}

impl From<Odometry> for PoseWithCovarianceStamped {
    fn from(odom: Odometry) -> Self {
        Self {
            header: odom.header,
            pose: odom.pose,
        }
    }
}

/// A single planar laser sweep (`sensor_msgs/LaserScan`).
///
/// rosbridge encodes non-finite ranges as JSON `null`; those are decoded as
/// `f64::INFINITY` so they fall outside any relevance window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaserScan {
    #[serde(default)]
    pub header: Header,
    pub angle_min: f64,
    pub angle_max: f64,
    pub angle_increment: f64,
    #[serde(default)]
    pub range_min: f64,
    #[serde(default)]
    pub range_max: f64,
    #[serde(deserialize_with = "ranges_with_nulls")]
    pub ranges: Vec<f64>,
}

fn ranges_with_nulls<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Option<f64>>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|r| r.unwrap_or(f64::INFINITY)).collect())
}

// ────────────────────────────────────────────────────────────────────────────
// Unitree state records
// ────────────────────────────────────────────────────────────────────────────

/// IMU block of a Unitree state record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImuState {
    /// Roll, pitch, yaw in radians (yaw CCW-positive).
    pub rpy: [f64; 3],
}

/// Combined odometry/IMU state published by Unitree humanoids on
/// `rt/odommodestate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SportModeState {
    #[serde(default)]
    pub stamp: Time,
    pub position: [f64; 3],
    pub imu_state: ImuState,
}

// ────────────────────────────────────────────────────────────────────────────
// Tagged union resolved at the transport boundary
// ────────────────────────────────────────────────────────────────────────────

/// Every pose/state record family an odometry transport can deliver.
///
/// The acquisition side decodes the wire payload into one of these variants
/// once; the processing side only ever calls [`PoseMessage::into_sample`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "msg")]
pub enum PoseMessage {
    WithCovariance(PoseWithCovarianceStamped),
    Stamped(PoseStamped),
    SportMode(SportModeState),
}

impl PoseMessage {
    /// Publisher-side timestamp carried by the record.
    pub fn stamp(&self) -> Time {
        match self {
            PoseMessage::WithCovariance(m) => m.header.stamp,
            PoseMessage::Stamped(m) => m.header.stamp,
            PoseMessage::SportMode(m) => m.stamp,
        }
    }

    /// Normalise into the canonical [`PoseSample`], stamping it with the local
    /// receipt time `received_at` (unix seconds).
    pub fn into_sample(self, received_at: f64) -> PoseSample {
        let publisher_ts = self.stamp().as_secs_f64();
        let (position, orientation) = match self {
            PoseMessage::WithCovariance(m) => (
                m.pose.pose.position,
                Orientation::Quaternion(m.pose.pose.orientation),
            ),
            PoseMessage::Stamped(m) => (m.pose.position, Orientation::Quaternion(m.pose.orientation)),
            PoseMessage::SportMode(m) => (
                Point::new(m.position[0], m.position[1], m.position[2]),
                Orientation::Yaw(m.imu_state.rpy[2]),
            ),
        };
        PoseSample {
            position,
            orientation,
            publisher_ts,
            subscriber_ts: received_at,
        }
    }
}

/// The wire schema a subscription delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// `nav_msgs/Odometry`, forwarded as a pose-with-covariance.
    Odometry,
    /// `geometry_msgs/PoseStamped`.
    PoseStamped,
    /// Unitree `SportModeState`.
    SportModeState,
}

impl MessageKind {
    /// ROS type name announced in a rosbridge `subscribe` request.
    pub fn ros_type(&self) -> &'static str {
        match self {
            MessageKind::Odometry => "nav_msgs/msg/Odometry",
            MessageKind::PoseStamped => "geometry_msgs/msg/PoseStamped",
            MessageKind::SportModeState => "unitree_go/msg/SportModeState",
        }
    }

    /// Decode a JSON message body into the matching [`PoseMessage`] variant.
    ///
    /// # Errors
    ///
    /// Returns [`RoamError::Decode`] when the body does not match the schema.
    pub fn decode(&self, body: Value) -> Result<PoseMessage, RoamError> {
        let decoded = match self {
            MessageKind::Odometry => serde_json::from_value::<Odometry>(body)
                .map(|odom| PoseMessage::WithCovariance(odom.into())),
            MessageKind::PoseStamped => {
                serde_json::from_value::<PoseStamped>(body).map(PoseMessage::Stamped)
            }
            MessageKind::SportModeState => {
                serde_json::from_value::<SportModeState>(body).map(PoseMessage::SportMode)
            }
        };
        decoded.map_err(|e| RoamError::Decode(format!("{}: {e}", self.ros_type())))
    }
}
