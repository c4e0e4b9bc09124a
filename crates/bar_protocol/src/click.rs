use serde::{Deserialize, Serialize};

/// A pointer interaction with one of the segments, as reported by the bar.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClickEvent {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    pub button: u8,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_y: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum MouseButton {
    #[display("left")]
    Left,
    #[display("middle")]
    Middle,
    #[display("right")]
    Right,
    #[display("scroll-up")]
    ScrollUp,
    #[display("scroll-down")]
    ScrollDown,
    #[display("button {}", _0)]
    Other(u8),
}

impl From<u8> for MouseButton {
    fn from(button: u8) -> Self {
        match button {
            1 => MouseButton::Left,
            2 => MouseButton::Middle,
            3 => MouseButton::Right,
            4 => MouseButton::ScrollUp,
            5 => MouseButton::ScrollDown,
            other => MouseButton::Other(other),
        }
    }
}

impl ClickEvent {
    pub fn mouse_button(&self) -> MouseButton {
        MouseButton::from(self.button)
    }

    pub fn instance(&self) -> Option<&str> {
        self.instance.as_deref()
    }
}
