//! Supported robot platforms and how each one publishes odometry.
//!
//! | Variant | Token | Topic | Message | Body model |
//! |---|---|---|---|---|
//! | `turtlebot4` | URID | `{URID}/c3/odom` | `nav_msgs/Odometry` | unmeasured |
//! | `unitree_go2` | ethernet channel | `rt/utlidar/robot_pose` | `PoseStamped` | standing > 24 cm, sitting > 3 cm |
//! | `unitree_g1` | ethernet channel | `rt/odommodestate` | `SportModeState` | always standing |
//! | `tron` | topic (default `odom`) | token | `nav_msgs/Odometry` | standing > 60 cm, sitting > 3 cm |

use std::fmt;
use std::str::FromStr;

use roamsense_perception::BodyStateModel;
use roamsense_types::{MessageKind, RoamError};
use serde::{Deserialize, Serialize};

use crate::source::Subscription;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RobotVariant {
    #[serde(rename = "turtlebot4")]
    TurtleBot4,
    #[serde(rename = "unitree_go2")]
    UnitreeGo2,
    #[serde(rename = "unitree_g1")]
    UnitreeG1,
    #[serde(rename = "tron")]
    Tron,
}

impl RobotVariant {
    pub const ALL: [RobotVariant; 4] = [
        RobotVariant::TurtleBot4,
        RobotVariant::UnitreeGo2,
        RobotVariant::UnitreeG1,
        RobotVariant::Tron,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RobotVariant::TurtleBot4 => "turtlebot4",
            RobotVariant::UnitreeGo2 => "unitree_go2",
            RobotVariant::UnitreeG1 => "unitree_g1",
            RobotVariant::Tron => "tron",
        }
    }

    /// Topic to subscribe to for the given channel token.
    pub fn topic(&self, token: &str) -> String {
        match self {
            RobotVariant::TurtleBot4 => format!("{token}/c3/odom"),
            RobotVariant::UnitreeGo2 => "rt/utlidar/robot_pose".to_string(),
            RobotVariant::UnitreeG1 => "rt/odommodestate".to_string(),
            RobotVariant::Tron => token.to_string(),
        }
    }

    pub fn message_kind(&self) -> MessageKind {
        match self {
            RobotVariant::TurtleBot4 | RobotVariant::Tron => MessageKind::Odometry,
            RobotVariant::UnitreeGo2 => MessageKind::PoseStamped,
            RobotVariant::UnitreeG1 => MessageKind::SportModeState,
        }
    }

    /// Token used when none is configured.
    pub fn default_token(&self) -> Option<&'static str> {
        match self {
            RobotVariant::Tron => Some("odom"),
            _ => None,
        }
    }

    /// Calibrated body model for this platform.
    pub fn default_body_model(&self) -> BodyStateModel {
        match self {
            RobotVariant::TurtleBot4 => BodyStateModel::Unmeasured,
            RobotVariant::UnitreeGo2 => BodyStateModel::HeightThreshold {
                standing_above_cm: 24,
                sitting_above_cm: 3,
            },
            RobotVariant::UnitreeG1 => BodyStateModel::AlwaysStanding,
            RobotVariant::Tron => BodyStateModel::HeightThreshold {
                standing_above_cm: 60,
                sitting_above_cm: 3,
            },
        }
    }
}

impl fmt::Display for RobotVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RobotVariant {
    type Err = RoamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        RobotVariant::ALL
            .into_iter()
            .find(|v| v.name() == wanted)
            .ok_or_else(|| RoamError::Config(format!("unknown robot '{s}'")))
    }
}

/// Everything an [`OdomProvider`][crate::odom_provider::OdomProvider] is
/// fixed to at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdomProviderConfig {
    pub variant: RobotVariant,
    /// URID, ethernet channel or topic, depending on the variant.
    pub token: Option<String>,
    pub body_model: BodyStateModel,
}

impl OdomProviderConfig {
    /// Config with the variant's default token and body model.
    pub fn for_variant(variant: RobotVariant, token: Option<String>) -> Self {
        Self {
            variant,
            token,
            body_model: variant.default_body_model(),
        }
    }

    pub fn with_body_model(mut self, body_model: BodyStateModel) -> Self {
        self.body_model = body_model;
        self
    }

    /// The configured token, falling back to the variant default; blank
    /// tokens count as missing.
    pub fn effective_token(&self) -> Option<String> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or_else(|| self.variant.default_token().map(str::to_string))
    }

    /// `None` when no usable token is available.
    pub fn subscription(&self) -> Option<Subscription> {
        self.effective_token().map(|token| Subscription {
            topic: self.variant.topic(&token),
            kind: self.variant.message_kind(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for v in RobotVariant::ALL {
            assert_eq!(v.name().parse::<RobotVariant>().unwrap(), v);
        }
        assert_eq!(" TurtleBot4 ".parse::<RobotVariant>().unwrap(), RobotVariant::TurtleBot4);
        assert!(matches!("roomba".parse::<RobotVariant>(), Err(RoamError::Config(_))));
    }

    #[test]
    fn serde_names_match_display() {
        for v in RobotVariant::ALL {
            assert_eq!(serde_json::to_string(&v).unwrap(), format!("\"{v}\""));
        }
    }

    #[test]
    fn turtlebot_topic_uses_urid() {
        let cfg = OdomProviderConfig::for_variant(RobotVariant::TurtleBot4, Some("tb4_01".into()));
        let sub = cfg.subscription().unwrap();
        assert_eq!(sub.topic, "tb4_01/c3/odom");
        assert_eq!(sub.kind, MessageKind::Odometry);
        assert_eq!(cfg.body_model, BodyStateModel::Unmeasured);
    }

    #[test]
    fn unitree_topics_are_fixed() {
        let go2 = OdomProviderConfig::for_variant(RobotVariant::UnitreeGo2, Some("eth0".into()));
        assert_eq!(go2.subscription().unwrap().topic, "rt/utlidar/robot_pose");
        assert_eq!(go2.subscription().unwrap().kind, MessageKind::PoseStamped);

        let g1 = OdomProviderConfig::for_variant(RobotVariant::UnitreeG1, Some("eth0".into()));
        assert_eq!(g1.subscription().unwrap().kind, MessageKind::SportModeState);
        assert_eq!(g1.body_model, BodyStateModel::AlwaysStanding);
    }

    #[test]
    fn missing_token_yields_no_subscription() {
        let cfg = OdomProviderConfig::for_variant(RobotVariant::TurtleBot4, None);
        assert!(cfg.subscription().is_none());
        let blank = OdomProviderConfig::for_variant(RobotVariant::UnitreeGo2, Some("  ".into()));
        assert!(blank.subscription().is_none());
    }

    #[test]
    fn tron_defaults_to_odom_topic() {
        let cfg = OdomProviderConfig::for_variant(RobotVariant::Tron, None);
        assert_eq!(cfg.subscription().unwrap().topic, "odom");
        let custom = OdomProviderConfig::for_variant(RobotVariant::Tron, Some("tron/odom".into()));
        assert_eq!(custom.subscription().unwrap().topic, "tron/odom");
    }

    #[test]
    fn body_model_override() {
        let model = BodyStateModel::HeightThreshold {
            standing_above_cm: 30,
            sitting_above_cm: 5,
        };
        let cfg = OdomProviderConfig::for_variant(RobotVariant::UnitreeGo2, Some("eth0".into()))
            .with_body_model(model);
        assert_eq!(cfg.body_model, model);
    }
}
