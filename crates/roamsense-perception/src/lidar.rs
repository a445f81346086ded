//! LIDAR Path-Safety Classifier.
//!
//! Converts one LIDAR sweep into the subset of ten fixed straight-line
//! candidate paths that remain free of obstacles, grouped into
//! turn-left / advance / turn-right / retreat buckets, plus a short
//! natural-language summary for a planning layer.
//!
//! # Robot frame
//!
//! Obstacle points and candidate paths share one planar frame: `x` points
//! forward, `y` points to the robot's right.  A bearing `θ` (degrees,
//! `[-180, 180]`, positive to the right) maps to
//! `(d · cos θ, d · sin θ)`.
//!
//! # Degraded default
//!
//! Until a sweep arrives, [`PathSafetyClassifier::process`] with `None`
//! reports no viable path and a "DO NOT MOVE" summary.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use roamsense_types::LaserScan;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::geometry::{Point2, distance_point_to_segment, round_to, wrap_degrees_0_360};
use crate::scan_log::ScanLogWriter;

/// Candidate bearings in degrees, index-aligned with path identifiers.
pub const PATH_BEARINGS: [f64; 10] = [-60.0, -45.0, -30.0, -15.0, 0.0, 15.0, 30.0, 45.0, 60.0, 180.0];
/// Length of every candidate path segment (metres).
pub const PATH_LENGTH_M: f64 = 1.0;
/// Identifier of the straight-backwards path.
pub const RETREAT_PATH: usize = 9;
/// The secondary source must supply strictly more points than this.
pub const SECONDARY_MIN_POINTS: usize = 50;
/// Upper bound on the beams one `LaserScan` may describe.
pub const MAX_SWEEP_BEAMS: usize = 4096;

pub const NO_SCAN_SUMMARY: &str =
    "You might be surrounded by objects and cannot safely move in any direction. DO NOT MOVE.";
pub const NO_PATH_SUMMARY: &str =
    "You are surrounded by objects and cannot safely move in any direction. DO NOT MOVE.";

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Construction parameters for [`PathSafetyClassifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LidarConfig {
    /// Half the robot's footprint width; obstruction threshold (metres).
    pub half_width_robot: f64,
    /// Inclusive `[lo, hi]` bearing ranges (degrees, `[-180, 180]`) that
    /// reflect off the robot's own chassis.
    pub angles_blanked: Vec<[f64; 2]>,
    /// Readings farther than this are ignored (metres).
    pub relevant_distance_max: f64,
    /// Readings closer than this are treated as noise (metres).
    pub relevant_distance_min: f64,
    /// Rotation from sensor zero to robot forward (degrees).
    pub sensor_mounting_angle: f64,
}

impl Default for LidarConfig {
    fn default() -> Self {
        Self {
            half_width_robot: 0.20,
            angles_blanked: Vec::new(),
            relevant_distance_max: 1.1,
            relevant_distance_min: 0.08,
            sensor_mounting_angle: 180.0,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scan / obstacle data
// ────────────────────────────────────────────────────────────────────────────

/// One sensor-frame return: bearing in degrees `[0, 360)` and range in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanReading {
    pub angle_deg: f64,
    pub distance_m: f64,
}

impl ScanReading {
    pub fn new(angle_deg: f64, distance_m: f64) -> Self {
        Self {
            angle_deg,
            distance_m,
        }
    }
}

/// A robot-frame obstacle point that survived filtering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObstaclePoint {
    /// Forward coordinate (metres).
    pub x: f64,
    /// Lateral coordinate, positive to the right (metres).
    pub y: f64,
    /// Robot-frame bearing in degrees, `[-180, 180]`.
    pub angle: f64,
    pub distance: f64,
}

impl ObstaclePoint {
    /// Build a point from a robot-frame bearing and range.
    pub fn from_polar(angle_deg: f64, distance_m: f64) -> Self {
        let rad = angle_deg.to_radians();
        Self {
            x: distance_m * rad.cos(),
            y: distance_m * rad.sin(),
            angle: angle_deg,
            distance: distance_m,
        }
    }

    fn position(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

/// Convert a `LaserScan` into sensor-frame readings.
///
/// Beam angles run from `angle_min` (inclusive) to `angle_max` (exclusive)
/// in steps of `angle_increment`; each is mapped to `360·(a+π)/(2π)`
/// degrees, the angle order is reversed, and the result is zipped with
/// `ranges`.
pub fn sweep_from_laser_scan(scan: &LaserScan) -> Vec<ScanReading> {
    let span = scan.angle_max - scan.angle_min;
    if !(scan.angle_increment > 0.0) || !span.is_finite() || span <= 0.0 {
        debug!(
            angle_min = scan.angle_min,
            angle_max = scan.angle_max,
            angle_increment = scan.angle_increment,
            "laser scan has no usable beam geometry"
        );
        return Vec::new();
    }

    let beams = (span / scan.angle_increment).ceil();
    if !(beams <= MAX_SWEEP_BEAMS as f64) {
        warn!(
            beams,
            ranges = scan.ranges.len(),
            limit = MAX_SWEEP_BEAMS,
            "laser scan beam geometry exceeds limit; dropping sweep"
        );
        return Vec::new();
    }
    let beams = beams as usize;
    let mut angles: Vec<f64> = (0..beams)
        .map(|i| scan.angle_min + i as f64 * scan.angle_increment)
        .map(|a| 360.0 * (a + std::f64::consts::PI) / std::f64::consts::TAU)
        .collect();
    angles.reverse();

    angles
        .into_iter()
        .zip(scan.ranges.iter().copied())
        .map(|(angle_deg, distance_m)| ScanReading::new(angle_deg, distance_m))
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Secondary obstacle source
// ────────────────────────────────────────────────────────────────────────────

/// An auxiliary obstacle feed (e.g. a depth camera) already in robot frame.
pub trait ObstacleSource: Send + Sync {
    fn is_running(&self) -> bool;
    fn obstacles(&self) -> Vec<ObstaclePoint>;
}

/// Shared buffer an external adapter fills with the latest obstacle set.
#[derive(Debug, Default)]
pub struct ObstacleBuffer {
    running: AtomicBool,
    points: RwLock<Vec<ObstaclePoint>>,
}

impl ObstacleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// Replace the whole obstacle set.
    pub fn replace(&self, points: Vec<ObstaclePoint>) {
        *self.points.write() = points;
    }
}

impl ObstacleSource for ObstacleBuffer {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn obstacles(&self) -> Vec<ObstaclePoint> {
        self.points.read().clone()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Candidate paths & results
// ────────────────────────────────────────────────────────────────────────────

/// One fixed straight-line path from the robot origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidatePath {
    pub id: usize,
    pub bearing_deg: f64,
    pub start: Point2,
    pub end: Point2,
}

impl CandidatePath {
    fn new(id: usize, bearing_deg: f64) -> Self {
        let rad = bearing_deg.to_radians();
        Self {
            id,
            bearing_deg,
            start: Point2::new(0.0, 0.0),
            end: Point2::new(PATH_LENGTH_M * rad.cos(), PATH_LENGTH_M * rad.sin()),
        }
    }

    /// The ten candidate paths, in identifier order.
    pub fn bank() -> [CandidatePath; 10] {
        std::array::from_fn(|id| CandidatePath::new(id, PATH_BEARINGS[id]))
    }

    pub fn is_retreat(&self) -> bool {
        self.id == RETREAT_PATH
    }

    /// Whether `point` lies closer than `half_width` to this path.
    ///
    /// The retreat path only considers points strictly behind the robot.
    pub fn is_blocked_by(&self, point: &ObstaclePoint, half_width: f64) -> bool {
        if self.is_retreat() && point.x >= 0.0 {
            return false;
        }
        distance_point_to_segment(point.position(), self.start, self.end) < half_width
    }
}

/// Viable paths partitioned by manoeuvre.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementOptions {
    pub turn_left: Vec<usize>,
    pub advance: Vec<usize>,
    pub turn_right: Vec<usize>,
    pub retreat: bool,
}

impl MovementOptions {
    pub fn from_paths(valid_paths: &[usize]) -> Self {
        let mut options = Self::default();
        for &p in valid_paths {
            match p {
                0..=2 => options.turn_left.push(p),
                3..=5 => options.advance.push(p),
                6..=8 => options.turn_right.push(p),
                RETREAT_PATH => options.retreat = true,
                _ => {}
            }
        }
        options
    }
}

/// Fixed-vocabulary description of the viable paths.
pub fn movement_summary(valid_paths: &[usize], options: &MovementOptions) -> String {
    if valid_paths.is_empty() {
        return NO_PATH_SUMMARY.to_string();
    }
    let mut s = String::from("The safe movement directions are: {");
    s.push_str("'turn left', 'turn right', ");
    if !options.advance.is_empty() {
        s.push_str("'move forwards', ");
    }
    s.push_str("'stand still'}. ");
    s
}

/// One line of the scan log.
#[derive(Serialize)]
struct ScanFrame<'a> {
    frame: &'a [[f64; 2]],
}

/// Result of one sweep; replaced wholesale on every call to `process`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanAssessment {
    /// Every reading after the mounting rotation, as `[angle, distance]`;
    /// `None` when no sweep was available.
    pub raw_scan: Option<Vec<[f64; 2]>>,
    /// Points that took part in the obstruction test, sorted by bearing.
    pub obstacles: Vec<ObstaclePoint>,
    pub valid_paths: Vec<usize>,
    pub movement_options: MovementOptions,
    pub lidar_string: String,
}

impl ScanAssessment {
    fn no_scan() -> Self {
        Self {
            raw_scan: None,
            obstacles: Vec::new(),
            valid_paths: Vec::new(),
            movement_options: MovementOptions::default(),
            lidar_string: NO_SCAN_SUMMARY.to_string(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PathSafetyClassifier
// ────────────────────────────────────────────────────────────────────────────

pub struct PathSafetyClassifier {
    config: LidarConfig,
    paths: [CandidatePath; 10],
    secondary: Option<Arc<dyn ObstacleSource>>,
    scan_log: Mutex<Option<ScanLogWriter>>,
    latest: RwLock<Option<Arc<ScanAssessment>>>,
}

impl std::fmt::Debug for PathSafetyClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathSafetyClassifier")
            .field("config", &self.config)
            .field("secondary", &self.secondary.is_some())
            .field("scan_log", &self.scan_log.lock().is_some())
            .finish()
    }
}

impl PathSafetyClassifier {
    pub fn new(config: LidarConfig) -> Self {
        info!(
            half_width_robot = config.half_width_robot,
            blanked_ranges = config.angles_blanked.len(),
            sensor_mounting_angle = config.sensor_mounting_angle,
            "path-safety classifier ready"
        );
        Self {
            config,
            paths: CandidatePath::bank(),
            secondary: None,
            scan_log: Mutex::new(None),
            latest: RwLock::new(None),
        }
    }

    /// Merge points from `source` when it is running and well populated.
    pub fn with_secondary(mut self, source: Arc<dyn ObstacleSource>) -> Self {
        self.secondary = Some(source);
        self
    }

    /// Append each sweep's raw readings to `writer`.
    pub fn with_scan_log(self, writer: ScanLogWriter) -> Self {
        *self.scan_log.lock() = Some(writer);
        self
    }

    pub fn config(&self) -> &LidarConfig {
        &self.config
    }

    pub fn paths(&self) -> &[CandidatePath; 10] {
        &self.paths
    }

    /// Evaluate one sweep and cache the result.
    pub fn process(&self, scan: Option<&[ScanReading]>) -> Arc<ScanAssessment> {
        let assessment = match scan {
            None => {
                info!("waiting for laser scan data");
                ScanAssessment::no_scan()
            }
            Some(readings) => self.assess(readings),
        };
        let assessment = Arc::new(assessment);
        *self.latest.write() = Some(assessment.clone());
        assessment
    }

    fn assess(&self, readings: &[ScanReading]) -> ScanAssessment {
        let mut raw = Vec::with_capacity(readings.len());
        let mut obstacles = Vec::new();

        for reading in readings {
            let angle = wrap_degrees_0_360(reading.angle_deg + self.config.sensor_mounting_angle);
            let d = reading.distance_m;
            raw.push([round_to(angle, 2), d]);

            if !d.is_finite()
                || d > self.config.relevant_distance_max
                || d < self.config.relevant_distance_min
            {
                continue;
            }

            let bearing = angle - 180.0;
            if self.is_blanked(bearing) {
                continue;
            }
            obstacles.push(ObstaclePoint::from_polar(bearing, d));
        }

        if let Some(source) = &self.secondary {
            if source.is_running() {
                let extra = source.obstacles();
                if extra.len() > SECONDARY_MIN_POINTS {
                    debug!(points = extra.len(), "merging secondary obstacle points");
                    obstacles.extend(extra);
                }
            }
        }

        self.log_raw(&raw);

        obstacles.sort_by(|a, b| a.angle.total_cmp(&b.angle));

        let half_width = self.config.half_width_robot;
        let valid_paths: Vec<usize> = self
            .paths
            .iter()
            .filter(|path| !obstacles.iter().any(|o| path.is_blocked_by(o, half_width)))
            .map(|path| path.id)
            .collect();

        let movement_options = MovementOptions::from_paths(&valid_paths);
        let lidar_string = movement_summary(&valid_paths, &movement_options);
        debug!(?valid_paths, obstacles = obstacles.len(), "sweep assessed");

        ScanAssessment {
            raw_scan: Some(raw),
            obstacles,
            valid_paths,
            movement_options,
            lidar_string,
        }
    }

    fn is_blanked(&self, bearing: f64) -> bool {
        self.config
            .angles_blanked
            .iter()
            .any(|&[lo, hi]| bearing >= lo && bearing <= hi)
    }

    fn log_raw(&self, raw: &[[f64; 2]]) {
        let mut guard = self.scan_log.lock();
        let Some(writer) = guard.as_mut() else {
            return;
        };
        let result = serde_json::to_string(&ScanFrame { frame: raw })
            .map_err(|e| roamsense_types::RoamError::InvalidPayload(e.to_string()))
            .and_then(|line| writer.write_line(&line));
        if let Err(e) = result {
            error!(error = %e, "failed to write scan log");
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    /// Most recent assessment, or `None` before the first `process` call.
    pub fn latest(&self) -> Option<Arc<ScanAssessment>> {
        self.latest.read().clone()
    }

    pub fn valid_paths(&self) -> Option<Vec<usize>> {
        self.latest().map(|a| a.valid_paths.clone())
    }

    pub fn raw_scan(&self) -> Option<Vec<[f64; 2]>> {
        self.latest().and_then(|a| a.raw_scan.clone())
    }

    pub fn lidar_string(&self) -> Option<String> {
        self.latest().map(|a| a.lidar_string.clone())
    }

    /// Current four-bucket partition; empty before the first sweep.
    pub fn movement_options(&self) -> MovementOptions {
        self.latest()
            .map(|a| a.movement_options.clone())
            .unwrap_or_default()
    }
}
