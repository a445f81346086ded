//! LIDAR provider: subscribes to `{URID}/pi/scan` and runs every sweep
//! through a [`PathSafetyClassifier`] directly on the transport task.
//! There is no queue on this path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use roamsense_perception::lidar::sweep_from_laser_scan;
use roamsense_perception::{MovementOptions, PathSafetyClassifier, ScanAssessment};
use roamsense_types::LaserScan;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::registry;
use crate::source::{ScanCallback, ScanSource, acquisition_runtime};

const REGISTRY_KEY: &str = "rplidar";

/// Scan topic for a robot URID.
pub fn scan_topic(urid: &str) -> String {
    format!("{urid}/pi/scan")
}

pub struct LidarProvider {
    topic: Option<String>,
    classifier: Arc<PathSafetyClassifier>,
    source: Arc<dyn ScanSource>,
    runtime: Option<Runtime>,
    task: Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
    subscriptions: AtomicUsize,
}

impl LidarProvider {
    /// The classifier starts in its "no scan" state so accessors report
    /// DO NOT MOVE until the first sweep arrives.
    pub fn new(urid: Option<String>, classifier: PathSafetyClassifier, source: Arc<dyn ScanSource>) -> Self {
        let topic = urid
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(scan_topic);
        match &topic {
            Some(topic) => info!(topic = %topic, "lidar provider configured"),
            None => error!("lidar URID not configured; provider stays idle"),
        }
        let classifier = Arc::new(classifier);
        classifier.process(None);
        Self {
            topic,
            classifier,
            source,
            runtime: acquisition_runtime("rplidar"),
            task: Mutex::new(None),
            running: AtomicBool::new(false),
            subscriptions: AtomicUsize::new(0),
        }
    }

    /// The process-wide LIDAR provider; the first call decides its
    /// configuration.
    pub fn shared(urid: Option<String>, classifier: PathSafetyClassifier, source: Arc<dyn ScanSource>) -> Arc<Self> {
        registry::get_or_init(REGISTRY_KEY, || Self::new(urid, classifier, source))
    }

    /// The process-wide LIDAR provider, if one has been built.
    pub fn registered() -> Option<Arc<Self>> {
        registry::get(REGISTRY_KEY)
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn classifier(&self) -> &Arc<PathSafetyClassifier> {
        &self.classifier
    }

    pub fn start(&self) {
        let Some(topic) = &self.topic else {
            error!("cannot start lidar provider without a URID");
            return;
        };
        let Some(runtime) = &self.runtime else {
            error!("cannot start lidar provider without an acquisition runtime");
            return;
        };

        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            warn!(topic = %topic, "lidar provider already running");
            return;
        }

        let classifier = self.classifier.clone();
        let on_scan: ScanCallback = Arc::new(move |scan: LaserScan| {
            let sweep = sweep_from_laser_scan(&scan);
            classifier.process(Some(&sweep));
        });
        let source = self.source.clone();
        let topic = topic.clone();
        *task = Some(runtime.spawn(async move {
            info!(topic = %topic, "lidar subscription started");
            match source.run(topic.clone(), on_scan).await {
                Ok(()) => info!(topic = %topic, "lidar stream ended"),
                Err(e) => error!(topic = %topic, error = %e, "lidar acquisition failed"),
            }
        }));
        self.subscriptions.fetch_add(1, Ordering::Relaxed);
        self.running.store(true, Ordering::Release);
        info!("lidar provider started");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            info!("lidar provider stopped");
        }
    }

    /// Started and not stopped.  A subscription that failed still counts
    /// as running; the classifier simply keeps its last result.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn latest(&self) -> Option<Arc<ScanAssessment>> {
        self.classifier.latest()
    }

    pub fn valid_paths(&self) -> Option<Vec<usize>> {
        self.classifier.valid_paths()
    }

    pub fn raw_scan(&self) -> Option<Vec<[f64; 2]>> {
        self.classifier.raw_scan()
    }

    pub fn lidar_string(&self) -> Option<String> {
        self.classifier.lidar_string()
    }

    pub fn movement_options(&self) -> MovementOptions {
        self.classifier.movement_options()
    }
}

impl Drop for LidarProvider {
    fn drop(&mut self) {
        self.stop();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use roamsense_perception::LidarConfig;
    use roamsense_perception::lidar::NO_SCAN_SUMMARY;
    use roamsense_types::RoamError;
    use std::time::{Duration, Instant};

    struct ScriptedScans {
        scans: Vec<LaserScan>,
        runs: AtomicUsize,
        topics: parking_lot::Mutex<Vec<String>>,
    }

    impl ScriptedScans {
        fn new(scans: Vec<LaserScan>) -> Arc<Self> {
            Arc::new(Self {
                scans,
                runs: AtomicUsize::new(0),
                topics: parking_lot::Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ScanSource for ScriptedScans {
        async fn run(&self, topic: String, on_scan: ScanCallback) -> Result<(), RoamError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.topics.lock().push(topic);
            for scan in &self.scans {
                on_scan(scan.clone());
            }
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    /// Four beams; the beam that lands straight ahead reads 0.5 m.
    fn scan_with_obstacle_ahead() -> LaserScan {
        LaserScan {
            angle_min: -std::f64::consts::PI,
            angle_max: std::f64::consts::PI,
            angle_increment: std::f64::consts::FRAC_PI_2,
            // Reversed sensor angles are 270, 180, 90, 0; sensor 0 is ahead.
            ranges: vec![5.0, 5.0, 5.0, 0.5],
            ..LaserScan::default()
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        cond()
    }

    #[test]
    fn topic_is_derived_from_urid() {
        assert_eq!(scan_topic("tb4"), "tb4/pi/scan");
    }

    #[test]
    fn reports_do_not_move_before_first_scan() {
        let provider = LidarProvider::new(
            Some("tb4".into()),
            PathSafetyClassifier::new(LidarConfig::default()),
            ScriptedScans::new(Vec::new()),
        );
        assert_eq!(provider.valid_paths(), Some(Vec::new()));
        assert_eq!(provider.lidar_string().as_deref(), Some(NO_SCAN_SUMMARY));
        assert!(provider.raw_scan().is_none());
        assert!(!provider.is_running());
    }

    #[test]
    fn scans_flow_through_classifier() {
        let source = ScriptedScans::new(vec![scan_with_obstacle_ahead()]);
        let provider = LidarProvider::new(
            Some("tb4".into()),
            PathSafetyClassifier::new(LidarConfig::default()),
            source.clone(),
        );
        provider.start();
        assert!(provider.is_running());
        assert!(wait_until(|| provider.raw_scan().is_some()));

        assert_eq!(source.topics.lock().as_slice(), ["tb4/pi/scan".to_string()]);
        let options = provider.movement_options();
        assert!(options.advance.is_empty());
        assert!(options.retreat);
        assert_eq!(provider.valid_paths(), Some(vec![0, 1, 2, 6, 7, 8, 9]));
        provider.stop();
        assert!(!provider.is_running());
    }

    #[test]
    fn start_is_idempotent() {
        let source = ScriptedScans::new(Vec::new());
        let provider = LidarProvider::new(
            Some("tb4".into()),
            PathSafetyClassifier::new(LidarConfig::default()),
            source.clone(),
        );
        provider.start();
        assert!(wait_until(|| source.runs.load(Ordering::SeqCst) == 1));
        provider.start();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(provider.subscriptions.load(Ordering::SeqCst), 1);
        assert_eq!(source.runs.load(Ordering::SeqCst), 1);
        provider.stop();
    }

    #[test]
    fn missing_urid_stays_idle() {
        let source = ScriptedScans::new(Vec::new());
        let provider = LidarProvider::new(
            None,
            PathSafetyClassifier::new(LidarConfig::default()),
            source.clone(),
        );
        provider.start();
        assert!(!provider.is_running());
        assert!(provider.topic().is_none());
        assert_eq!(source.runs.load(Ordering::SeqCst), 0);
        provider.stop();
    }

    #[test]
    fn shared_provider_is_a_singleton() {
        let a = LidarProvider::shared(
            Some("first".into()),
            PathSafetyClassifier::new(LidarConfig::default()),
            ScriptedScans::new(Vec::new()),
        );
        let b = LidarProvider::shared(
            Some("second".into()),
            PathSafetyClassifier::new(LidarConfig {
                half_width_robot: 0.5,
                ..LidarConfig::default()
            }),
            ScriptedScans::new(Vec::new()),
        );
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.topic(), Some("first/pi/scan"));
        assert_eq!(b.classifier().config().half_width_robot, 0.20);
        assert!(LidarProvider::registered().is_some_and(|r| Arc::ptr_eq(&r, &a)));
        registry::reset::<LidarProvider>(REGISTRY_KEY);
        assert!(LidarProvider::registered().is_none());
    }
}
