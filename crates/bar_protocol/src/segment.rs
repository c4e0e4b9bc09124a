use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single block of the bar.
///
/// Fields the bar understands but barmux does not care about (`background`, `border`, `min_width`, ...)
/// are kept in `extra` so that segments coming from upstream survive the round trip unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub full_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator_block_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgent: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Segment {
    pub fn text(full_text: impl Into<String>) -> Self {
        Segment { full_text: full_text.into(), ..Default::default() }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Segments without text are not shown on the bar.
    pub fn is_hidden(&self) -> bool {
        self.full_text.is_empty()
    }

    pub fn instance(&self) -> Option<&str> {
        self.instance.as_deref()
    }

    /// Whether this segment is addressed by the given `(name, instance)` pair.
    pub fn matches(&self, name: &str, instance: Option<&str>) -> bool {
        self.name == name && self.instance() == instance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serialize_skips_unset_fields() {
        let segment = Segment::text("b").with_name("B");
        assert_eq!(serde_json::to_string(&segment).unwrap(), r#"{"full_text":"b","name":"B"}"#);
    }

    #[test]
    fn test_unknown_fields_survive() {
        let raw = r##"{"full_text":"x","name":"disk","background":"#000000","min_width":100}"##;
        let segment: Segment = serde_json::from_str(raw).unwrap();
        assert_eq!(segment.extra.get("min_width"), Some(&Value::from(100)));
        let back: Value = serde_json::to_value(&segment).unwrap();
        assert_eq!(back, serde_json::from_str::<Value>(raw).unwrap());
    }

    #[test]
    fn test_matches() {
        let segment = Segment::text("x").with_name("net").with_instance("eth0");
        assert!(segment.matches("net", Some("eth0")));
        assert!(!segment.matches("net", None));
        assert!(!segment.matches("disk", Some("eth0")));
    }
}
