use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use bar_protocol::{ClickEvent, MouseButton, Segment};

use super::{Probe, ProbeOutput};
use crate::{config::ProbeOptions, error::ConfigError};

const DEFAULT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Shows the current local (or UTC) time. A left click toggles to `format_alt`, if one is configured.
#[derive(Debug)]
pub struct TimeProbe {
    format: String,
    format_alt: Option<String>,
    utc: bool,
    show_alt: AtomicBool,
}

impl TimeProbe {
    pub fn from_options(options: &mut ProbeOptions) -> Result<Self, ConfigError> {
        let format = options.take_string("format")?.unwrap_or_else(|| DEFAULT_FORMAT.to_string());
        validate_format(options.probe_id(), "format", &format)?;
        let format_alt = options.take_string("format_alt")?;
        if let Some(format_alt) = &format_alt {
            validate_format(options.probe_id(), "format_alt", format_alt)?;
        }
        let utc = options.take_bool("utc")?.unwrap_or(false);
        Ok(TimeProbe { format, format_alt, utc, show_alt: AtomicBool::new(false) })
    }

    fn current_format(&self) -> &str {
        match &self.format_alt {
            Some(alt) if self.show_alt.load(Ordering::SeqCst) => alt,
            _ => &self.format,
        }
    }
}

fn validate_format(probe_id: &str, option: &str, format: &str) -> Result<(), ConfigError> {
    use chrono::format::{Item, StrftimeItems};
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::InvalidOption {
            id: probe_id.to_string(),
            option: option.to_string(),
            message: format!("`{}` is not a valid strftime format", format),
        });
    }
    Ok(())
}

impl Probe for TimeProbe {
    fn run(&self) -> Result<ProbeOutput> {
        let text = if self.utc {
            chrono::Utc::now().format(self.current_format()).to_string()
        } else {
            chrono::Local::now().format(self.current_format()).to_string()
        };
        Ok(ProbeOutput::single(Segment::text(text)))
    }

    fn on_click(&self, event: &ClickEvent) -> Result<()> {
        if event.mouse_button() == MouseButton::Left {
            self.show_alt.fetch_xor(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn handles_clicks(&self) -> bool {
        self.format_alt.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn probe(options: serde_json::Value) -> Result<TimeProbe, ConfigError> {
        let serde_json::Value::Object(map) = options else { unreachable!() };
        TimeProbe::from_options(&mut ProbeOptions::new("time", map))
    }

    #[test]
    fn test_click_toggles_format() {
        let probe = probe(json!({ "format": "plain", "format_alt": "alternative", "utc": true })).unwrap();
        assert!(probe.handles_clicks());
        assert_eq!(probe.run().unwrap().segments[0].full_text, "plain");

        probe.on_click(&ClickEvent { name: "time".to_string(), button: 1, ..Default::default() }).unwrap();
        assert_eq!(probe.run().unwrap().segments[0].full_text, "alternative");

        probe.on_click(&ClickEvent { name: "time".to_string(), button: 3, ..Default::default() }).unwrap();
        assert_eq!(probe.run().unwrap().segments[0].full_text, "alternative");
    }

    #[test]
    fn test_without_alt_format_clicks_are_not_wanted() {
        assert!(!probe(json!({})).unwrap().handles_clicks());
    }

    #[test]
    fn test_invalid_format() {
        assert!(matches!(probe(json!({ "format": "%Q" })), Err(ConfigError::InvalidOption { .. })));
    }
}
