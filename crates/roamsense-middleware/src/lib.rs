//! `roamsense-middleware` – sensor acquisition and providers.
//!
//! Moves messages from the robot's transport into the perception
//! classifiers and exposes their results to the rest of the process.
//!
//! # Modules
//!
//! - [`source`] – transport seams ([`OdomSource`], [`ScanSource`]).
//! - [`rosbridge`] – rosbridge v2 WebSocket client implementing both seams.
//! - [`variants`] – supported robot platforms, their topics, message
//!   schemas and body models.
//! - [`odom_provider`] – [`OdomProvider`]: acquisition task + queue +
//!   processing thread feeding a motion classifier.
//! - [`lidar_provider`] – [`LidarProvider`]: LIDAR subscription driving a
//!   path-safety classifier.
//! - [`registry`] – process-wide single-instance registry.

pub mod lidar_provider;
pub mod odom_provider;
pub mod registry;
pub mod rosbridge;
pub mod source;
pub mod variants;

pub use lidar_provider::LidarProvider;
pub use odom_provider::OdomProvider;
pub use rosbridge::RosbridgeSource;
pub use source::{OdomSource, ScanCallback, ScanSource, Subscription};
pub use variants::{OdomProviderConfig, RobotVariant};
