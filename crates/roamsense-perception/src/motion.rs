//! Motion/Attitude Classifier.
//!
//! Turns a stream of [`PoseSample`]s into a rolling [`OdomSnapshot`]:
//! rounded position, heading in two conventions, a jitter-resistant
//! "moving" flag and (per robot) body height and posture.
//!
//! # Motion detection
//!
//! Each sample contributes its 3-D Euclidean step `delta` to a decayed
//! accumulator:
//!
//! ```text
//! move_history = 0.7 · delta + 0.3 · move_history
//! moving       = delta > 0.01 m  ||  move_history > 0.01 m
//! ```
//!
//! A momentary stop still reads "moving" while the accumulator drains, and
//! a single large jump is caught even if the following steps are tiny.
//!
//! # Concurrency
//!
//! Exactly one thread (the odometry processing unit) calls
//! [`MotionClassifier::ingest`]; any number of readers may call
//! [`MotionClassifier::snapshot`] concurrently.  Every field is an
//! independent atomic, so readers never block the writer.  Atomicity is per
//! field only: a snapshot taken mid-ingest may mix values from two samples.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, AtomicU64, Ordering};

use roamsense_types::{BodyAttitude, OdomSnapshot, Orientation, Point, PoseSample};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::{euler_from_quaternion, round_to, yaw_to_clockwise_0_360};

/// Weight of the newest step in the decayed movement accumulator.
pub const MOVE_DECAY_NEW: f64 = 0.7;
/// Weight of the previous accumulator value.
pub const MOVE_DECAY_PREV: f64 = 0.3;
/// Step (metres) above which the robot is considered moving.
pub const MOVE_THRESHOLD_M: f64 = 0.01;

// ────────────────────────────────────────────────────────────────────────────
// Body-state model
// ────────────────────────────────────────────────────────────────────────────

/// Per-robot strategy for deriving body height and posture from a pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum BodyStateModel {
    /// The platform does not report a meaningful body height.
    #[default]
    Unmeasured,
    /// `body_height_cm = round(z · 100)`; above `standing_above_cm` is
    /// standing, above `sitting_above_cm` is sitting, otherwise unset.
    HeightThreshold {
        standing_above_cm: i64,
        sitting_above_cm: i64,
    },
    /// Height is not measured; the robot always reports standing.
    AlwaysStanding,
}

impl BodyStateModel {
    /// Returns `(body_height_cm, body_attitude)` for `position`, or `None`
    /// when this model leaves the body state untouched.
    pub fn classify(&self, position: Point) -> Option<(Option<i64>, Option<BodyAttitude>)> {
        match *self {
            BodyStateModel::Unmeasured => None,
            BodyStateModel::HeightThreshold {
                standing_above_cm,
                sitting_above_cm,
            } => {
                let height_cm = (position.z * 100.0).round() as i64;
                let attitude = if height_cm > standing_above_cm {
                    Some(BodyAttitude::Standing)
                } else if height_cm > sitting_above_cm {
                    Some(BodyAttitude::Sitting)
                } else {
                    None
                };
                Some((Some(height_cm), attitude))
            }
            BodyStateModel::AlwaysStanding => Some((None, Some(BodyAttitude::Standing))),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Lock-free field storage
// ────────────────────────────────────────────────────────────────────────────

/// An `f64` stored as its bit pattern in an [`AtomicU64`].
#[derive(Debug, Default)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

const ATTITUDE_UNSET: u8 = 0;
const ATTITUDE_STANDING: u8 = 1;
const ATTITUDE_SITTING: u8 = 2;

fn encode_attitude(attitude: Option<BodyAttitude>) -> u8 {
    match attitude {
        None => ATTITUDE_UNSET,
        Some(BodyAttitude::Standing) => ATTITUDE_STANDING,
        Some(BodyAttitude::Sitting) => ATTITUDE_SITTING,
    }
}

fn decode_attitude(raw: u8) -> Option<BodyAttitude> {
    match raw {
        ATTITUDE_STANDING => Some(BodyAttitude::Standing),
        ATTITUDE_SITTING => Some(BodyAttitude::Sitting),
        _ => None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MotionClassifier
// ────────────────────────────────────────────────────────────────────────────

/// Rolling pose/motion/attitude state for one robot.
///
/// Construct with [`MotionClassifier::new`], feed samples through
/// [`MotionClassifier::ingest`] and read with
/// [`MotionClassifier::snapshot`].
#[derive(Debug, Default)]
pub struct MotionClassifier {
    body_model: BodyStateModel,

    x: AtomicF64,
    y: AtomicF64,
    z: AtomicF64,
    previous_x: AtomicF64,
    previous_y: AtomicF64,
    previous_z: AtomicF64,
    move_history: AtomicF64,
    moving: AtomicBool,

    yaw_0_360: AtomicF64,
    yaw_m180_p180: AtomicF64,

    body_height_cm: AtomicI64,
    body_attitude: AtomicU8,

    publisher_ts: AtomicF64,
    subscriber_ts: AtomicF64,
}

impl MotionClassifier {
    /// Create a classifier in the all-zero initial state.
    pub fn new(body_model: BodyStateModel) -> Self {
        Self {
            body_model,
            ..Self::default()
        }
    }

    pub fn body_model(&self) -> BodyStateModel {
        self.body_model
    }

    /// Fold one pose sample into the state.
    ///
    /// Must only be called from a single writer thread.
    pub fn ingest(&self, sample: &PoseSample) {
        let p = sample.position;

        // ── Motion ─────────────────────────────────────────────────────────
        let dx = p.x - self.previous_x.load();
        let dy = p.y - self.previous_y.load();
        let dz = p.z - self.previous_z.load();
        self.previous_x.store(p.x);
        self.previous_y.store(p.y);
        self.previous_z.store(p.z);

        let delta = (dx * dx + dy * dy + dz * dz).sqrt();
        let move_history = MOVE_DECAY_NEW * delta + MOVE_DECAY_PREV * self.move_history.load();
        self.move_history.store(move_history);

        let moving = delta > MOVE_THRESHOLD_M || move_history > MOVE_THRESHOLD_M;
        self.moving.store(moving, Ordering::Release);
        if moving {
            debug!(
                delta_m = round_to(delta, 3),
                move_history_m = round_to(move_history, 3),
                "robot moving"
            );
        }

        // ── Heading ────────────────────────────────────────────────────────
        let yaw_rad = match sample.orientation {
            Orientation::Quaternion(q) => euler_from_quaternion(q).yaw,
            Orientation::Yaw(yaw) => yaw,
        };
        let yaw_m180_p180 = round_to(yaw_rad.to_degrees(), 4);
        self.yaw_m180_p180.store(yaw_m180_p180);
        self.yaw_0_360.store(yaw_to_clockwise_0_360(yaw_m180_p180));

        // ── Position & clocks ──────────────────────────────────────────────
        self.x.store(round_to(p.x, 4));
        self.y.store(round_to(p.y, 4));
        self.z.store(round_to(p.z, 4));
        self.publisher_ts.store(sample.publisher_ts);
        self.subscriber_ts.store(sample.subscriber_ts);

        // ── Body ───────────────────────────────────────────────────────────
        if let Some((height_cm, attitude)) = self.body_model.classify(p) {
            if let Some(h) = height_cm {
                self.body_height_cm.store(h, Ordering::Release);
            }
            self.body_attitude
                .store(encode_attitude(attitude), Ordering::Release);
        }

        debug!(
            x = self.x.load(),
            y = self.y.load(),
            yaw_m180_p180,
            yaw_0_360 = self.yaw_0_360.load(),
            publisher_ts = sample.publisher_ts,
            "odom"
        );
    }

    /// Copy out the current state.
    pub fn snapshot(&self) -> OdomSnapshot {
        OdomSnapshot {
            odom_x: self.x.load(),
            odom_y: self.y.load(),
            moving: self.moving.load(Ordering::Acquire),
            odom_yaw_0_360: self.yaw_0_360.load(),
            odom_yaw_m180_p180: self.yaw_m180_p180.load(),
            body_height_cm: self.body_height_cm.load(Ordering::Acquire),
            body_attitude: decode_attitude(self.body_attitude.load(Ordering::Acquire)),
            odom_rockchip_ts: self.publisher_ts.load(),
            odom_subscriber_ts: self.subscriber_ts.load(),
        }
    }

    /// Latest rounded height coordinate (metres).
    pub fn z(&self) -> f64 {
        self.z.load()
    }

    /// Current value of the decayed movement accumulator (metres).
    pub fn move_history(&self) -> f64 {
        self.move_history.load()
    }
}
