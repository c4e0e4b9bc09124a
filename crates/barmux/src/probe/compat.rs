//! Adapts the loosely shaped results probes may hand back into the exact segment records the scheduler caches.
//!
//! Accepted JSON shapes: a plain string, a segment object, an array of segment objects, and the legacy
//! `[position, response]` pair. A `cached_until` field (seconds from now) overrides the cadence. A `position`
//! is never taken from a probe result; placement is configuration only.

use std::{collections::HashSet, time::Duration};

use anyhow::{bail, Context, Result};
use bar_protocol::{ProbeId, Segment};
use serde_json::{Map, Value};

use super::ProbeOutput;
use crate::config::Palette;

/// Interpret JSON printed by an external command.
pub fn output_from_value(probe_id: &str, value: Value) -> Result<ProbeOutput> {
    match value {
        Value::String(text) => Ok(ProbeOutput::text(text)),
        Value::Object(map) => {
            let (segment, cached_until) = segment_from_map(probe_id, map)?;
            Ok(ProbeOutput { segments: vec![segment], cached_until })
        }
        Value::Array(mut items) if is_legacy_pair(&items) => {
            log::warn!(
                "Probe `{}` returned a position along with its result; positions are set in the configuration, ignoring it",
                probe_id
            );
            output_from_value(probe_id, items.remove(1))
        }
        Value::Array(items) => {
            let mut output = ProbeOutput::default();
            for item in items {
                let map = match item {
                    Value::Object(map) => map,
                    other => bail!("Expected an array of segment objects, got {}", other),
                };
                let (segment, cached_until) = segment_from_map(probe_id, map)?;
                output.segments.push(segment);
                output.cached_until = match (output.cached_until, cached_until) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
            }
            Ok(output)
        }
        other => bail!("Unsupported result shape: {}", other),
    }
}

fn is_legacy_pair(items: &[Value]) -> bool {
    matches!(items, [Value::Number(_), Value::Object(_) | Value::String(_)])
}

fn segment_from_map(probe_id: &str, mut map: Map<String, Value>) -> Result<(Segment, Option<Duration>)> {
    if map.remove("position").is_some() {
        log::warn!("Probe `{}` returned a `position` field; positions are set in the configuration, ignoring it", probe_id);
    }
    let cached_until = match map.remove("cached_until") {
        None | Some(Value::Null) => None,
        Some(value) => {
            let secs = value.as_f64().with_context(|| format!("`cached_until` must be a number of seconds, got {}", value))?;
            Some(Duration::try_from_secs_f64(secs.max(0.0)).context("`cached_until` is out of range")?)
        }
    };
    let segment = serde_json::from_value(Value::Object(map)).context("Malformed segment")?;
    Ok((segment, cached_until))
}

/// Turn the segments of a successful run into cacheable segments:
/// every segment is named after the probe, colors are resolved against the palette,
/// and each instance appears at most once.
pub fn finalize(probe_id: &ProbeId, segments: Vec<Segment>, palette: &Palette) -> Vec<Segment> {
    let mut seen_instances = HashSet::new();
    let mut result = Vec::with_capacity(segments.len());
    for mut segment in segments {
        if !segment.name.is_empty() && segment.name != probe_id.as_str() {
            log::debug!("Probe `{}` named its segment `{}`, renaming it", probe_id, segment.name);
        }
        segment.name = probe_id.to_string();

        if let Some(color) = segment.color.take() {
            segment.color = palette.resolve(&color);
            if segment.color.is_none() {
                log::warn!("Probe `{}` returned invalid color `{}`, ignoring it", probe_id, color);
            }
        }

        if !seen_instances.insert(segment.instance.clone()) {
            log::warn!("Probe `{}` returned instance {:?} more than once, keeping the first one", probe_id, segment.instance);
            continue;
        }
        result.push(segment);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_plain_string() {
        assert_eq!(output_from_value("x", json!("hello")).unwrap(), ProbeOutput::text("hello"));
    }

    #[test]
    fn test_object_with_cache_duration_and_position() {
        let output = output_from_value("x", json!({ "full_text": "5 new", "color": "good", "cached_until": 30, "position": 2 })).unwrap();
        assert_eq!(output.cached_until, Some(Duration::from_secs(30)));
        assert_eq!(output.segments, vec![Segment::text("5 new").with_color("good")]);
        assert!(output.segments[0].extra.is_empty());
    }

    #[test]
    fn test_legacy_position_pair() {
        let output = output_from_value("x", json!([3, { "full_text": "up" }])).unwrap();
        assert_eq!(output.segments, vec![Segment::text("up")]);
    }

    #[test]
    fn test_array_of_instances() {
        let output = output_from_value(
            "net",
            json!([
                { "full_text": "eth0 up", "instance": "eth0", "cached_until": 10 },
                { "full_text": "wlan0 down", "instance": "wlan0", "cached_until": 2 }
            ]),
        )
        .unwrap();
        assert_eq!(output.segments.len(), 2);
        assert_eq!(output.cached_until, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_unsupported_shapes() {
        assert!(output_from_value("x", json!(42)).is_err());
        assert!(output_from_value("x", json!(["a", "b"])).is_err());
        assert!(output_from_value("x", json!({ "full_text": "a", "cached_until": "later" })).is_err());
    }

    #[test]
    fn test_finalize() {
        let palette = Palette::default();
        let segments = vec![
            Segment::text("a").with_instance("0").with_color("bad"),
            Segment::text("b").with_instance("1").with_color("not-a-color").with_name("other"),
            Segment::text("c").with_instance("0"),
        ];
        let finalized = finalize(&ProbeId::from("disk"), segments, &palette);
        assert_eq!(
            finalized,
            vec![
                Segment::text("a").with_instance("0").with_color("#FF0000").with_name("disk"),
                Segment::text("b").with_instance("1").with_name("disk"),
            ]
        );
    }
}
