use serde::{Deserialize, Serialize};

/// The first line of an i3bar stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, smart_default::SmartDefault)]
pub struct Header {
    #[default = 1]
    pub version: u32,
    #[serde(default)]
    #[default = true]
    pub click_events: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_signal: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cont_signal: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_header() {
        assert_eq!(serde_json::to_string(&Header::default()).unwrap(), r#"{"version":1,"click_events":true}"#);
    }
}
