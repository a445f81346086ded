//! Transport seams.
//!
//! Providers never speak to a wire protocol directly.  They hand a
//! [`Subscription`] to an [`OdomSource`] (or a topic to a [`ScanSource`])
//! and receive typed messages back.
//!
//! - [`OdomSource`] – pushes decoded [`PoseMessage`]s onto the provider's
//!   internal queue.
//! - [`ScanSource`] – invokes a callback for every `LaserScan`, on the
//!   transport's own task.
//! - [`RosbridgeSource`][crate::rosbridge::RosbridgeSource] implements both.

use std::sync::Arc;

use async_trait::async_trait;
use crossbeam_channel::Sender;
use roamsense_types::{LaserScan, MessageKind, PoseMessage, RoamError};
use tokio::runtime::{Builder, Runtime};
use tracing::error;

/// What an odometry acquisition unit subscribes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub topic: String,
    pub kind: MessageKind,
}

/// Receives odometry messages from the outside world.
///
/// # Contract
///
/// `run` subscribes to `subscription.topic`, decodes each message as
/// `subscription.kind` and sends it on `tx`.  Malformed messages are logged
/// and dropped.  It returns when the stream ends, when `tx` is
/// disconnected, or with an error if the transport fails; callers cancel it
/// by aborting the task.
#[async_trait]
pub trait OdomSource: Send + Sync {
    async fn run(&self, subscription: Subscription, tx: Sender<PoseMessage>) -> Result<(), RoamError>;
}

/// Invoked once per decoded laser scan.
pub type ScanCallback = Arc<dyn Fn(LaserScan) + Send + Sync>;

/// Receives LIDAR sweeps from the outside world.
#[async_trait]
pub trait ScanSource: Send + Sync {
    async fn run(&self, topic: String, on_scan: ScanCallback) -> Result<(), RoamError>;
}

/// Build the single-worker runtime that hosts a provider's acquisition
/// unit, keeping transport I/O off the caller's executor.
///
/// Returns `None` (after logging) if the runtime cannot be created.
pub(crate) fn acquisition_runtime(name: &str) -> Option<Runtime> {
    match Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name(format!("{name}-acq"))
        .enable_all()
        .build()
    {
        Ok(rt) => Some(rt),
        Err(e) => {
            error!(provider = name, error = %e, "failed to build acquisition runtime");
            None
        }
    }
}
