//! rosbridge v2 WebSocket transport.
//!
//! [`RosbridgeSource`] connects to a `rosbridge_server`, sends one
//! `subscribe` operation per topic and translates every matching `publish`
//! frame into a typed message:
//!
//! ```text
//! → {"op":"subscribe","topic":"tb4/c3/odom","type":"nav_msgs/msg/Odometry"}
//! ← {"op":"publish","topic":"tb4/c3/odom","msg":{ … }}
//! ```
//!
//! Frames for other topics, non-publish operations and undecodable
//! messages are logged and skipped; the stream keeps running.

use async_trait::async_trait;
use crossbeam_channel::Sender;
use futures_util::{SinkExt, StreamExt};
use roamsense_types::{LaserScan, PoseMessage, RoamError};
use serde_json::{Value, json};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::source::{OdomSource, ScanCallback, ScanSource, Subscription};

/// Maximum number of LiDAR range readings accepted in a single scan.
///
/// Larger payloads are dropped to bound per-sweep work on malformed input.
pub const MAX_LIDAR_RANGES: usize = roamsense_perception::lidar::MAX_SWEEP_BEAMS;

/// ROS type name for laser scans.
pub const LASER_SCAN_TYPE: &str = "sensor_msgs/msg/LaserScan";

/// WebSocket client for a `rosbridge_server`.
#[derive(Debug, Clone)]
pub struct RosbridgeSource {
    url: String,
}

impl RosbridgeSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Build a rosbridge `subscribe` frame.
    pub fn subscribe_frame(topic: &str, ros_type: &str) -> String {
        json!({
            "op": "subscribe",
            "topic": topic,
            "type": ros_type,
        })
        .to_string()
    }

    /// Extract the `msg` body of a `publish` frame addressed to `topic`.
    pub fn parse_publish(text: &str, topic: &str) -> Option<Value> {
        let Ok(mut frame) = serde_json::from_str::<Value>(text) else {
            warn!(topic, "ignoring non-JSON rosbridge frame");
            return None;
        };
        if frame.get("op").and_then(Value::as_str) != Some("publish") {
            return None;
        }
        if frame.get("topic").and_then(Value::as_str) != Some(topic) {
            return None;
        }
        frame.get_mut("msg").map(Value::take)
    }

    /// Subscribe to `topic` and hand every message body to `on_msg` until
    /// the socket closes or `on_msg` returns `false`.
    async fn stream_topic<F>(&self, topic: &str, ros_type: &str, mut on_msg: F) -> Result<(), RoamError>
    where
        F: FnMut(Value) -> bool + Send,
    {
        let (ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| RoamError::Transport {
                endpoint: self.url.clone(),
                details: e.to_string(),
            })?;
        info!(url = %self.url, topic, ros_type, "rosbridge connected");

        let (mut ws_tx, mut ws_rx) = ws.split();
        ws_tx
            .send(Message::Text(Self::subscribe_frame(topic, ros_type).into()))
            .await
            .map_err(|e| RoamError::Transport {
                endpoint: self.url.clone(),
                details: format!("subscribe {topic}: {e}"),
            })?;

        while let Some(frame) = ws_rx.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    if let Some(msg) = Self::parse_publish(text.as_str(), topic) {
                        if !on_msg(msg) {
                            debug!(topic, "consumer gone, closing rosbridge stream");
                            break;
                        }
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(RoamError::Transport {
                        endpoint: self.url.clone(),
                        details: e.to_string(),
                    });
                }
            }
        }

        info!(url = %self.url, topic, "rosbridge stream closed");
        Ok(())
    }
}

/// Decode a `sensor_msgs/LaserScan` body, rejecting oversized payloads.
pub fn decode_laser_scan(msg: Value) -> Result<LaserScan, RoamError> {
    let scan: LaserScan =
        serde_json::from_value(msg).map_err(|e| RoamError::Decode(format!("{LASER_SCAN_TYPE}: {e}")))?;
    if scan.ranges.len() > MAX_LIDAR_RANGES {
        return Err(RoamError::Decode(format!(
            "{LASER_SCAN_TYPE}: {} ranges exceeds limit of {MAX_LIDAR_RANGES}",
            scan.ranges.len()
        )));
    }
    Ok(scan)
}

#[async_trait]
impl OdomSource for RosbridgeSource {
    async fn run(&self, subscription: Subscription, tx: Sender<PoseMessage>) -> Result<(), RoamError> {
        let kind = subscription.kind;
        self.stream_topic(&subscription.topic, kind.ros_type(), |msg| match kind.decode(msg) {
            Ok(pose) => tx.send(pose).is_ok(),
            Err(e) => {
                warn!(error = %e, "dropping malformed odometry message");
                true
            }
        })
        .await
    }
}

#[async_trait]
impl ScanSource for RosbridgeSource {
    async fn run(&self, topic: String, on_scan: ScanCallback) -> Result<(), RoamError> {
        self.stream_topic(&topic, LASER_SCAN_TYPE, |msg| {
            match decode_laser_scan(msg) {
                Ok(scan) => on_scan(scan),
                Err(e) => warn!(error = %e, "dropping malformed laser scan"),
            }
            true
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roamsense_types::MessageKind;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    /// Serve one client: check its subscribe frame, then play `frames`
    /// and close.
    async fn scripted_server(frames: Vec<String>) -> (String, tokio::task::JoinHandle<Value>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let subscribe = match ws.next().await.unwrap().unwrap() {
                Message::Text(t) => serde_json::from_str::<Value>(t.as_str()).unwrap(),
                other => panic!("expected subscribe frame, got {other:?}"),
            };
            for f in frames {
                ws.send(Message::Text(f.into())).await.unwrap();
            }
            ws.close(None).await.unwrap();
            subscribe
        });
        (format!("ws://{addr}"), handle)
    }

    fn odom_frame(topic: &str, x: f64) -> String {
        json!({
            "op": "publish",
            "topic": topic,
            "msg": {
                "header": {"stamp": {"sec": 5, "nanosec": 0}, "frame_id": "odom"},
                "child_frame_id": "base_link",
                "pose": {"pose": {
                    "position": {"x": x, "y": 0.0, "z": 0.0},
                    "orientation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0}
                }}
            }
        })
        .to_string()
    }

    #[test]
    fn subscribe_frame_has_rosbridge_fields() {
        let frame: Value =
            serde_json::from_str(&RosbridgeSource::subscribe_frame("tb/c3/odom", "nav_msgs/msg/Odometry")).unwrap();
        assert_eq!(frame["op"], "subscribe");
        assert_eq!(frame["topic"], "tb/c3/odom");
        assert_eq!(frame["type"], "nav_msgs/msg/Odometry");
    }

    #[test]
    fn parse_publish_filters_topic_and_op() {
        let good = r#"{"op":"publish","topic":"a","msg":{"k":1}}"#;
        assert_eq!(RosbridgeSource::parse_publish(good, "a"), Some(json!({"k":1})));
        assert_eq!(RosbridgeSource::parse_publish(good, "b"), None);
        let status = r#"{"op":"status","topic":"a","msg":{}}"#;
        assert_eq!(RosbridgeSource::parse_publish(status, "a"), None);
        assert_eq!(RosbridgeSource::parse_publish("not json", "a"), None);
    }

    #[test]
    fn oversized_scan_is_rejected() {
        let msg = json!({
            "angle_min": 0.0, "angle_max": 1.0, "angle_increment": 0.0001,
            "ranges": vec![1.0; MAX_LIDAR_RANGES + 1]
        });
        assert!(matches!(decode_laser_scan(msg), Err(RoamError::Decode(_))));
    }

    #[test]
    fn null_ranges_decode_as_infinite() {
        let msg = json!({
            "angle_min": 0.0, "angle_max": 1.0, "angle_increment": 0.5,
            "ranges": [0.5, null]
        });
        let scan = decode_laser_scan(msg).unwrap();
        assert_eq!(scan.ranges[0], 0.5);
        assert!(scan.ranges[1].is_infinite());
    }

    #[tokio::test]
    async fn odom_stream_decodes_and_skips_malformed() {
        let topic = "tb/c3/odom";
        let frames = vec![
            odom_frame(topic, 1.0),
            json!({"op":"publish","topic":topic,"msg":{"garbage":true}}).to_string(),
            odom_frame("other/topic", 9.0),
            odom_frame(topic, 2.0),
        ];
        let (url, server) = scripted_server(frames).await;
        let (tx, rx) = crossbeam_channel::unbounded();

        let source = RosbridgeSource::new(url);
        let sub = Subscription {
            topic: topic.to_string(),
            kind: MessageKind::Odometry,
        };
        tokio::time::timeout(Duration::from_secs(5), OdomSource::run(&source, sub, tx))
            .await
            .unwrap()
            .unwrap();

        let subscribe = server.await.unwrap();
        assert_eq!(subscribe["topic"], topic);
        assert_eq!(subscribe["type"], "nav_msgs/msg/Odometry");

        let xs: Vec<f64> = rx
            .try_iter()
            .map(|m| m.into_sample(0.0).position.x)
            .collect();
        assert_eq!(xs, vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn scan_stream_invokes_callback() {
        let topic = "tb/pi/scan";
        let frame = json!({
            "op": "publish",
            "topic": topic,
            "msg": {"angle_min": 0.0, "angle_max": 1.0, "angle_increment": 0.5, "ranges": [0.4, 0.6]}
        })
        .to_string();
        let (url, server) = scripted_server(vec![frame]).await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ScanCallback = Arc::new(move |scan: LaserScan| sink.lock().unwrap().push(scan.ranges));

        let source = RosbridgeSource::new(url);
        tokio::time::timeout(
            Duration::from_secs(5),
            ScanSource::run(&source, topic.to_string(), callback),
        )
        .await
        .unwrap()
        .unwrap();

        let subscribe = server.await.unwrap();
        assert_eq!(subscribe["type"], LASER_SCAN_TYPE);
        assert_eq!(*seen.lock().unwrap(), vec![vec![0.4, 0.6]]);
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (tx, _rx) = crossbeam_channel::unbounded();
        let source = RosbridgeSource::new(format!("ws://{addr}"));
        let sub = Subscription {
            topic: "x".to_string(),
            kind: MessageKind::Odometry,
        };
        let err = OdomSource::run(&source, sub, tx).await.unwrap_err();
        assert!(matches!(err, RoamError::Transport { .. }));
    }
}
