//! Odometry Normalizer.
//!
//! An [`OdomProvider`] bridges one robot's odometry stream to a
//! [`MotionClassifier`].  It runs two units of work:
//!
//! * **Acquisition** – a task on the provider's own single-worker Tokio
//!   runtime that drives an [`OdomSource`] and pushes every decoded
//!   [`PoseMessage`] onto an unbounded queue.
//! * **Processing** – a dedicated OS thread that drains the queue with a
//!   one-second poll timeout and calls [`MotionClassifier::ingest`].
//!
//! ```text
//! transport ──► OdomSource ──► queue ──► processing thread ──► MotionClassifier
//!                (acquisition task)                              ▲
//!                                              snapshot() ───────┘
//! ```
//!
//! Messages are processed strictly in arrival order.  Missing channel
//! configuration and transport failures are logged and leave the provider
//! idle; no lifecycle call returns an error.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use roamsense_perception::MotionClassifier;
use roamsense_types::{OdomSnapshot, PoseMessage, unix_now};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::registry;
use crate::source::{OdomSource, Subscription, acquisition_runtime};
use crate::variants::OdomProviderConfig;

/// Upper bound on how long the processing thread blocks per cycle.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Default)]
struct Units {
    acquisition: Option<JoinHandle<()>>,
    processing: Option<thread::JoinHandle<()>>,
}

pub struct OdomProvider {
    config: OdomProviderConfig,
    subscription: Option<Subscription>,
    source: Arc<dyn OdomSource>,
    classifier: Arc<MotionClassifier>,
    runtime: Option<Runtime>,
    queue_tx: Sender<PoseMessage>,
    queue_rx: Receiver<PoseMessage>,
    stop: Arc<AtomicBool>,
    units: Mutex<Units>,
    acquisition_spawns: AtomicUsize,
    processing_spawns: AtomicUsize,
}

impl OdomProvider {
    /// Build an idle provider.  Use [`OdomProvider::shared`] for the
    /// process-wide instance.
    pub fn new(config: OdomProviderConfig, source: Arc<dyn OdomSource>) -> Self {
        let name = config.variant.name();
        let subscription = config.subscription();
        match &subscription {
            Some(sub) => info!(robot = name, topic = %sub.topic, "odometry provider configured"),
            None => error!(robot = name, "odometry channel not configured; provider stays idle"),
        }
        let (queue_tx, queue_rx) = crossbeam_channel::unbounded();
        Self {
            classifier: Arc::new(MotionClassifier::new(config.body_model)),
            runtime: acquisition_runtime(&format!("odom-{name}")),
            config,
            subscription,
            source,
            queue_tx,
            queue_rx,
            stop: Arc::new(AtomicBool::new(false)),
            units: Mutex::new(Units::default()),
            acquisition_spawns: AtomicUsize::new(0),
            processing_spawns: AtomicUsize::new(0),
        }
    }

    /// The process-wide provider for `config.variant`.
    ///
    /// The first call decides the configuration; later calls return the
    /// same instance and ignore their arguments.
    pub fn shared(config: OdomProviderConfig, source: Arc<dyn OdomSource>) -> Arc<Self> {
        let key = config.variant.name();
        registry::get_or_init(key, || Self::new(config, source))
    }

    pub fn config(&self) -> &OdomProviderConfig {
        &self.config
    }

    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    pub fn classifier(&self) -> &Arc<MotionClassifier> {
        &self.classifier
    }

    /// Start both units.  Each unit that is already alive is left alone
    /// with a warning.
    pub fn start(&self) {
        let robot = self.config.variant.name();
        let Some(subscription) = &self.subscription else {
            error!(robot, "cannot start odometry provider without a channel");
            return;
        };
        let Some(runtime) = &self.runtime else {
            error!(robot, "cannot start odometry provider without an acquisition runtime");
            return;
        };

        self.stop.store(false, Ordering::Release);
        let mut units = self.units.lock();

        if units.acquisition.as_ref().is_some_and(|h| !h.is_finished()) {
            warn!(robot, "odometry acquisition already running");
        } else {
            let source = self.source.clone();
            let subscription = subscription.clone();
            let tx = self.queue_tx.clone();
            units.acquisition = Some(runtime.spawn(async move {
                let topic = subscription.topic.clone();
                info!(robot, topic = %topic, "odometry acquisition started");
                match source.run(subscription, tx).await {
                    Ok(()) => info!(robot, topic = %topic, "odometry stream ended"),
                    Err(e) => error!(robot, topic = %topic, error = %e, "odometry acquisition failed"),
                }
            }));
            self.acquisition_spawns.fetch_add(1, Ordering::Relaxed);
        }

        if units.processing.as_ref().is_some_and(|h| !h.is_finished()) {
            warn!(robot, "odometry processing already running");
        } else {
            let rx = self.queue_rx.clone();
            let classifier = self.classifier.clone();
            let stop = self.stop.clone();
            match thread::Builder::new()
                .name(format!("odom-{robot}"))
                .spawn(move || process_queue(rx, classifier, stop))
            {
                Ok(handle) => {
                    units.processing = Some(handle);
                    self.processing_spawns.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => error!(robot, error = %e, "failed to spawn odometry processing thread"),
            }
        }
    }

    /// Signal the stop flag, abort acquisition and join both units.
    ///
    /// Safe to call when never started.  Joining may block for up to
    /// [`POLL_TIMEOUT`].
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        let (acquisition, processing) = {
            let mut units = self.units.lock();
            (units.acquisition.take(), units.processing.take())
        };
        let had_units = acquisition.is_some() || processing.is_some();

        if let Some(handle) = acquisition {
            handle.abort();
            // Awaiting the aborted task from inside an async context would panic.
            if tokio::runtime::Handle::try_current().is_err() {
                if let Some(runtime) = &self.runtime {
                    let _ = runtime.block_on(handle);
                }
            }
        }
        if let Some(handle) = processing {
            if handle.join().is_err() {
                error!(robot = self.config.variant.name(), "odometry processing thread panicked");
            }
        }
        if had_units {
            info!(robot = self.config.variant.name(), "odometry provider stopped");
        }
    }

    pub fn acquisition_alive(&self) -> bool {
        self.units
            .lock()
            .acquisition
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    pub fn processing_alive(&self) -> bool {
        self.units
            .lock()
            .processing
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Both units alive.
    pub fn is_running(&self) -> bool {
        self.acquisition_alive() && self.processing_alive()
    }

    /// Current pose/motion/attitude state.
    pub fn position(&self) -> OdomSnapshot {
        self.classifier.snapshot()
    }
}

impl Drop for OdomProvider {
    fn drop(&mut self) {
        self.stop();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn process_queue(rx: Receiver<PoseMessage>, classifier: Arc<MotionClassifier>, stop: Arc<AtomicBool>) {
    debug!("odometry processing loop started");
    while !stop.load(Ordering::Acquire) {
        match rx.recv_timeout(POLL_TIMEOUT) {
            Ok(message) => classifier.ingest(&message.into_sample(unix_now())),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("odometry processing loop exited");
}
