use std::time::Duration;

use serde_json::{Map, Value};

use crate::{error::ConfigError, util::replace_env_var_references};

/// The kind-specific options of one probe entry.
///
/// Options are taken out as the probe kind reads them; whatever is left afterwards is unknown to the kind
/// and reported by [`ProbeOptions::warn_unused`].
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    probe_id: String,
    options: Map<String, Value>,
}

impl ProbeOptions {
    pub fn new(probe_id: impl Into<String>, options: Map<String, Value>) -> Self {
        ProbeOptions { probe_id: probe_id.into(), options }
    }

    pub fn probe_id(&self) -> &str {
        &self.probe_id
    }

    /// String option, with `${VAR}` references expanded.
    pub fn take_string(&mut self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.options.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(replace_env_var_references(s))),
            Some(other) => Err(self.invalid(key, format!("expected a string, got {}", other))),
        }
    }

    pub fn require_string(&mut self, key: &str) -> Result<String, ConfigError> {
        self.take_string(key)?
            .ok_or_else(|| ConfigError::MissingOption { id: self.probe_id.clone(), option: key.to_string() })
    }

    pub fn take_bool(&mut self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.options.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(other) => Err(self.invalid(key, format!("expected true or false, got {}", other))),
        }
    }

    /// Duration option, given in (possibly fractional) seconds.
    pub fn take_seconds(&mut self, key: &str) -> Result<Option<Duration>, ConfigError> {
        match self.options.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_f64()
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .map(Some)
                .ok_or_else(|| self.invalid(key, format!("{} is not a valid number of seconds", n))),
            Some(other) => Err(self.invalid(key, format!("expected a number of seconds, got {}", other))),
        }
    }

    /// Log every option that no one asked for.
    pub fn warn_unused(self) {
        for key in self.unused_keys() {
            log::warn!("Ignoring unknown option `{}` of probe `{}`", key, self.probe_id);
        }
    }

    pub fn unused_keys(&self) -> impl Iterator<Item = &str> {
        self.options.keys().map(String::as_str)
    }

    fn invalid(&self, key: &str, message: String) -> ConfigError {
        ConfigError::InvalidOption { id: self.probe_id.clone(), option: key.to_string(), message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;
    use serde_json::json;

    fn options(value: Value) -> ProbeOptions {
        match value {
            Value::Object(map) => ProbeOptions::new("test", map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_take_and_leftovers() {
        let mut opts = options(json!({ "command": "date", "timeout": 1.5, "verbose": true, "colour": "red" }));
        assert_eq!(opts.require_string("command").unwrap(), "date");
        assert_eq!(opts.take_seconds("timeout").unwrap(), Some(Duration::from_millis(1500)));
        assert_eq!(opts.take_bool("verbose").unwrap(), Some(true));
        assert_eq!(opts.take_string("missing").unwrap(), None);
        assert_eq!(opts.unused_keys().collect_vec(), vec!["colour"]);
    }

    #[test]
    fn test_type_errors() {
        let mut opts = options(json!({ "command": 3, "timeout": "soon" }));
        assert!(matches!(opts.take_string("command"), Err(ConfigError::InvalidOption { option, .. }) if option == "command"));
        assert!(matches!(opts.take_seconds("timeout"), Err(ConfigError::InvalidOption { .. })));
        assert!(matches!(opts.require_string("path"), Err(ConfigError::MissingOption { .. })));
    }
}
