//! Telemetry payload for the robot's message bus

use crate::core::TagPosition;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often a position provider publishes [`UwbState`]
pub const PUBLISH_PERIOD: Duration = Duration::from_millis(200);

/// Position message as the robot's telemetry bus expects it
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UwbState {
    pub position_x: f64,
    pub position_y: f64,
    pub tag_id: i32,
}

impl UwbState {
    /// Bus topic for a robot, e.g. `rt/robot1/uwb_state`
    pub fn topic(robot_prefix: &str) -> String {
        format!("rt/{}/uwb_state", robot_prefix.trim_matches('/'))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<TagPosition> for UwbState {
    fn from(position: TagPosition) -> Self {
        Self {
            position_x: position.x,
            position_y: position.y,
            tag_id: i32::from(position.tag_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Point2;

    #[test]
    fn test_topic() {
        assert_eq!(UwbState::topic("go2"), "rt/go2/uwb_state");
        assert_eq!(UwbState::topic("/go2/"), "rt/go2/uwb_state");
    }

    #[test]
    fn test_from_position() {
        let state = UwbState::from(TagPosition::new(Point2::new(-1.25, 2.5), 7));
        assert_eq!(state.position_x, -1.25);
        assert_eq!(state.position_y, 2.5);
        assert_eq!(state.tag_id, 7);

        assert_eq!(UwbState::from(TagPosition::default()), UwbState::default());
    }

    #[test]
    fn test_json_field_names() {
        let state = UwbState {
            position_x: 1.5,
            position_y: -0.5,
            tag_id: 2,
        };
        let json = state.to_json().unwrap();
        assert_eq!(json, r#"{"position_x":1.5,"position_y":-0.5,"tag_id":2}"#);

        let parsed: UwbState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }
}
