//! Geometry helpers shared by the motion and path-safety classifiers.
//!
//! Pure functions only: quaternion → Euler conversion, planar
//! point-to-segment distance, and the angle/rounding utilities used to
//! normalise headings.
//!
//! # Example
//!
//! ```rust
//! use roamsense_perception::geometry::{euler_from_quaternion, Point2, distance_point_to_segment};
//! use roamsense_types::Quaternion;
//!
//! let e = euler_from_quaternion(Quaternion::from_yaw(0.5));
//! assert!((e.yaw - 0.5).abs() < 1e-9);
//!
//! let d = distance_point_to_segment(
//!     Point2::new(0.5, 0.2),
//!     Point2::new(0.0, 0.0),
//!     Point2::new(1.0, 0.0),
//! );
//! assert!((d - 0.2).abs() < 1e-9);
//! ```

use roamsense_types::Quaternion;

// ────────────────────────────────────────────────────────────────────────────
// Euler angles
// ────────────────────────────────────────────────────────────────────────────

/// Roll, pitch, yaw in radians, each counter-clockwise about its axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Convert a unit quaternion into roll/pitch/yaw using the aerospace
/// (Z-Y-X) sequence.
///
/// The `asin` argument for pitch is clamped to `[-1, 1]` so that
/// floating-point overshoot at the poles yields ±π/2 instead of NaN.
pub fn euler_from_quaternion(q: Quaternion) -> EulerAngles {
    let Quaternion { x, y, z, w } = q;

    let t0 = 2.0 * (w * x + y * z);
    let t1 = 1.0 - 2.0 * (x * x + y * y);
    let roll = t0.atan2(t1);

    let t2 = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0);
    let pitch = t2.asin();

    let t3 = 2.0 * (w * z + x * y);
    let t4 = 1.0 - 2.0 * (y * y + z * z);
    let yaw = t3.atan2(t4);

    EulerAngles { roll, pitch, yaw }
}

// ────────────────────────────────────────────────────────────────────────────
// Planar geometry
// ────────────────────────────────────────────────────────────────────────────

/// A point in the robot's horizontal plane (metres).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Shortest distance from `p` to the segment `a`–`b`.
///
/// A zero-length segment degrades to the distance to `a`.
pub fn distance_point_to_segment(p: Point2, a: Point2, b: Point2) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;

    if dx == 0.0 && dy == 0.0 {
        return p.distance(a);
    }

    // Projection of p onto the infinite line, clamped to the segment.
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / (dx * dx + dy * dy)).clamp(0.0, 1.0);
    p.distance(Point2::new(a.x + t * dx, a.y + t * dy))
}

// ────────────────────────────────────────────────────────────────────────────
// Angles and rounding
// ────────────────────────────────────────────────────────────────────────────

/// Round `value` to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Wrap an angle in degrees into `[0, 360)`.
pub fn wrap_degrees_0_360(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can return exactly 360.0 for tiny negative inputs.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Convert a signed CCW-positive heading into the clockwise `[0, 360)`
/// convention, rounded to 4 decimals.
pub fn yaw_to_clockwise_0_360(yaw_m180_p180: f64) -> f64 {
    let mut flip = -yaw_m180_p180;
    if flip < 0.0 {
        flip += 360.0;
    }
    round_to(flip, 4)
}
