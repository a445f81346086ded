//! `roamsense-perception` – pose and path-safety classification.
//!
//! Pure algorithms with no transport dependency.  Providers in
//! `roamsense-middleware` feed these types from live sensor streams.
//!
//! # Modules
//!
//! - [`geometry`] – quaternion → Euler conversion, point-to-segment
//!   distance, heading conventions.
//! - [`motion`] – [`MotionClassifier`][motion::MotionClassifier]: rolling
//!   pose state with decayed-delta motion detection and per-robot
//!   [`BodyStateModel`][motion::BodyStateModel].
//! - [`lidar`] – [`PathSafetyClassifier`][lidar::PathSafetyClassifier]:
//!   filters a sweep and tests ten fixed candidate paths for obstruction.
//! - [`scan_log`] – [`ScanLogWriter`][scan_log::ScanLogWriter]: rotating
//!   JSON-lines log of raw sweeps.

pub mod geometry;
pub mod lidar;
pub mod motion;
pub mod scan_log;

pub use lidar::{
    LidarConfig, MovementOptions, ObstacleBuffer, ObstaclePoint, ObstacleSource,
    PathSafetyClassifier, ScanAssessment, ScanReading,
};
pub use motion::{BodyStateModel, MotionClassifier};
pub use scan_log::ScanLogWriter;
