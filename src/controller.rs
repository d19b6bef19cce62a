use async_trait::async_trait;
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    color::{hs_to_rgb, rgb_to_hs},
    models::{Color, ColorMode},
};

mod home_assistant;
pub use home_assistant::HomeAssistant;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("controller call failed: {status}")]
    Status { status: reqwest::StatusCode },
}

/// Attributes of a light, as reported by the controller
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateAttributes {
    #[serde(default)]
    pub rgb_color: Option<Vec<f64>>,
    #[serde(default)]
    pub hs_color: Option<Vec<f64>>,
    #[serde(default)]
    pub brightness: Option<u8>,
}

impl StateAttributes {
    /// Color of the light, from `rgb_color` if present, otherwise from `hs_color`
    pub fn color(&self) -> Option<Color> {
        if let Some([r, g, b]) = self.rgb_color.as_deref() {
            let channel = |c: f64| c.round().clamp(0.0, 255.0) as u8;
            return Some(Color::new(channel(*r), channel(*g), channel(*b)));
        }

        if let Some([h, s]) = self.hs_color.as_deref() {
            return Some(hs_to_rgb(*h as f32, *s as f32));
        }

        None
    }
}

/// State of a light entity
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    pub state: String,
    #[serde(default)]
    pub attributes: StateAttributes,
}

impl ControllerState {
    pub fn is_on(&self) -> bool {
        self.state == "on"
    }
}

/// Parameters of a light `turn_on` call
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct LightCommand {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rgb_color: Option<[u8; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hs_color: Option<(u16, u8)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
}

impl LightCommand {
    pub fn color(color: Color, mode: ColorMode, brightness: u8) -> Self {
        let (rgb_color, hs_color) = match mode {
            ColorMode::Rgb => (Some([color.red, color.green, color.blue]), None),
            ColorMode::Hs => (None, Some(rgb_to_hs(color))),
        };

        Self {
            rgb_color,
            hs_color,
            brightness: Some(brightness),
        }
    }

    /// Command bringing a light back to `state`, or `None` if the light should be turned off
    pub fn restoring(state: &ControllerState) -> Option<Self> {
        if !state.is_on() {
            return None;
        }

        let color = state
            .attributes
            .color()
            .unwrap_or_else(|| Color::new(255, 255, 255));

        Some(Self {
            rgb_color: Some([color.red, color.green, color.blue]),
            hs_color: None,
            brightness: state.attributes.brightness,
        })
    }
}

/// Remote light the dominant color is sent to
#[async_trait]
pub trait LightController: Send + Sync {
    /// Fetch the current state of the light
    async fn state(&self) -> Result<ControllerState, ControllerError>;

    async fn turn_on(&self, command: &LightCommand) -> Result<(), ControllerError>;

    async fn turn_off(&self) -> Result<(), ControllerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_state() {
        let state: ControllerState = serde_json::from_str(
            r#"{
                "entity_id": "light.test",
                "state": "on",
                "attributes": {
                    "rgb_color": [255, 128, 0],
                    "hs_color": [30.1, 100.0],
                    "brightness": 200,
                    "friendly_name": "Strip"
                }
            }"#,
        )
        .expect("failed to deserialize state");

        assert!(state.is_on());
        assert_eq!(state.attributes.brightness, Some(200));
        assert_eq!(state.attributes.color(), Some(Color::new(255, 128, 0)));
    }

    #[test]
    fn deserialize_off_state() {
        let state: ControllerState = serde_json::from_str(
            r#"{ "state": "off", "attributes": { "rgb_color": null, "brightness": null } }"#,
        )
        .expect("failed to deserialize state");

        assert!(!state.is_on());
        assert_eq!(state.attributes.color(), None);
        assert_eq!(LightCommand::restoring(&state), None);
    }

    #[test]
    fn color_from_hs() {
        let attributes = StateAttributes {
            hs_color: Some(vec![120.0, 100.0]),
            ..Default::default()
        };

        assert_eq!(attributes.color(), Some(Color::new(0, 255, 0)));

        let attributes = StateAttributes {
            rgb_color: Some(vec![1.0, 2.0]),
            ..Default::default()
        };

        assert_eq!(attributes.color(), None);
    }

    #[test]
    fn serialize_commands() {
        let color = Color::new(255, 0, 0);

        assert_eq!(
            serde_json::to_value(LightCommand::color(color, ColorMode::Rgb, 255)).unwrap(),
            serde_json::json!({ "rgb_color": [255, 0, 0], "brightness": 255 })
        );
        assert_eq!(
            serde_json::to_value(LightCommand::color(color, ColorMode::Hs, 128)).unwrap(),
            serde_json::json!({ "hs_color": [0, 100], "brightness": 128 })
        );
        assert_eq!(
            serde_json::to_value(LightCommand::default()).unwrap(),
            serde_json::json!({})
        );
    }

    #[test]
    fn restore_on_state() {
        let state = ControllerState {
            state: "on".to_owned(),
            attributes: StateAttributes {
                brightness: Some(42),
                ..Default::default()
            },
        };

        assert_eq!(
            LightCommand::restoring(&state),
            Some(LightCommand {
                rgb_color: Some([255, 255, 255]),
                hs_color: None,
                brightness: Some(42),
            })
        );
    }
}
