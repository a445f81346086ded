//! [`PerceptionStack`] – assembles the configured providers over one
//! shared transport and reports their combined state.
//!
//! ```rust,no_run
//! use roamsense_runtime::{config::Config, stack::PerceptionStack};
//!
//! let stack = PerceptionStack::from_config(&Config::default());
//! stack.start();
//! let status = stack.status();
//! println!("{}", status.summary());
//! stack.stop();
//! ```

use std::sync::Arc;

use roamsense_middleware::{
    LidarProvider, OdomProvider, OdomSource, RobotVariant, RosbridgeSource, ScanSource, registry,
};
use roamsense_perception::{
    MovementOptions, ObstacleBuffer, PathSafetyClassifier, ScanLogWriter,
};
use roamsense_types::OdomSnapshot;
use serde::Serialize;
use tracing::info;

use crate::config::Config;

/// Registry key of the depth-camera obstacle buffer shared by all stacks.
pub const OBSTACLE_BUFFER_KEY: &str = "depth_obstacles";

/// Point-in-time view of every provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackStatus {
    pub odometry: Option<OdometryStatus>,
    pub lidar: Option<LidarStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OdometryStatus {
    pub robot: RobotVariant,
    pub running: bool,
    pub position: OdomSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LidarStatus {
    pub running: bool,
    pub valid_paths: Vec<usize>,
    pub movement_options: MovementOptions,
    pub lidar_string: String,
}

impl StackStatus {
    /// One line per provider, for operators.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        if let Some(odom) = &self.odometry {
            let p = &odom.position;
            let mut line = format!(
                "[{}] x={:.2} y={:.2} yaw={:.1}° moving={}",
                odom.robot, p.odom_x, p.odom_y, p.odom_yaw_m180_p180, p.moving
            );
            if let Some(attitude) = p.body_attitude {
                line.push_str(&format!(" body={attitude} ({} cm)", p.body_height_cm));
            }
            lines.push(line);
        }
        if let Some(lidar) = &self.lidar {
            lines.push(format!("[lidar] {}", lidar.lidar_string.trim_end()));
        }
        lines.join("\n")
    }
}

pub struct PerceptionStack {
    odometry: Option<Arc<OdomProvider>>,
    lidar: Option<Arc<LidarProvider>>,
    obstacles: Arc<ObstacleBuffer>,
}

impl PerceptionStack {
    /// Build the enabled providers on a rosbridge transport.
    pub fn from_config(cfg: &Config) -> Self {
        let transport = Arc::new(RosbridgeSource::new(cfg.transport.rosbridge_url.clone()));
        Self::with_sources(cfg, transport.clone(), transport)
    }

    /// Build the enabled providers on the given sources.  Providers and the
    /// obstacle buffer are process-wide instances, so only the first stack
    /// decides their configuration and every stack feeds the same buffer.
    pub fn with_sources(cfg: &Config, odom_source: Arc<dyn OdomSource>, scan_source: Arc<dyn ScanSource>) -> Self {
        let obstacles = registry::get_or_init(OBSTACLE_BUFFER_KEY, ObstacleBuffer::new);

        let odometry = cfg
            .odometry
            .enabled
            .then(|| OdomProvider::shared(cfg.odometry.provider_config(), odom_source));

        let lidar = cfg.lidar.enabled.then(|| {
            LidarProvider::registered().unwrap_or_else(|| {
                let mut classifier =
                    PathSafetyClassifier::new(cfg.lidar.classifier.clone()).with_secondary(obstacles.clone());
                if cfg.lidar.log_file {
                    classifier = classifier.with_scan_log(ScanLogWriter::new(
                        &cfg.lidar.log_dir,
                        cfg.lidar.max_file_size_bytes,
                    ));
                }
                LidarProvider::shared(lidar_urid(cfg), classifier, scan_source)
            })
        });

        Self {
            odometry,
            lidar,
            obstacles,
        }
    }

    /// Wrap already-built providers.
    pub fn from_providers(
        odometry: Option<Arc<OdomProvider>>,
        lidar: Option<Arc<LidarProvider>>,
        obstacles: Arc<ObstacleBuffer>,
    ) -> Self {
        Self {
            odometry,
            lidar,
            obstacles,
        }
    }

    pub fn odometry(&self) -> Option<&Arc<OdomProvider>> {
        self.odometry.as_ref()
    }

    pub fn lidar(&self) -> Option<&Arc<LidarProvider>> {
        self.lidar.as_ref()
    }

    /// Buffer a depth-camera adapter can fill with robot-frame obstacles.
    pub fn obstacle_buffer(&self) -> Arc<ObstacleBuffer> {
        self.obstacles.clone()
    }

    pub fn start(&self) {
        if let Some(odom) = &self.odometry {
            odom.start();
        }
        if let Some(lidar) = &self.lidar {
            lidar.start();
        }
        info!(
            odometry = self.odometry.is_some(),
            lidar = self.lidar.is_some(),
            "perception stack started"
        );
    }

    pub fn stop(&self) {
        if let Some(lidar) = &self.lidar {
            lidar.stop();
        }
        if let Some(odom) = &self.odometry {
            odom.stop();
        }
        info!("perception stack stopped");
    }

    pub fn status(&self) -> StackStatus {
        StackStatus {
            odometry: self.odometry.as_ref().map(|odom| OdometryStatus {
                robot: odom.config().variant,
                running: odom.is_running(),
                position: odom.position(),
            }),
            lidar: self.lidar.as_ref().map(|lidar| {
                let latest = lidar.latest();
                LidarStatus {
                    running: lidar.is_running(),
                    valid_paths: latest.as_ref().map(|a| a.valid_paths.clone()).unwrap_or_default(),
                    movement_options: latest
                        .as_ref()
                        .map(|a| a.movement_options.clone())
                        .unwrap_or_default(),
                    lidar_string: latest.map(|a| a.lidar_string.clone()).unwrap_or_default(),
                }
            }),
        }
    }
}

/// The LIDAR URID, falling back to the TurtleBot4 odometry URID.
fn lidar_urid(cfg: &Config) -> Option<String> {
    cfg.lidar.urid.clone().or_else(|| {
        (cfg.odometry.robot == RobotVariant::TurtleBot4)
            .then(|| cfg.odometry.channel.clone())
            .flatten()
    })
}
