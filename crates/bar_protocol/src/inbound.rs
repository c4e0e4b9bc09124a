use serde_json::Value;

use crate::{ClickEvent, Header, Segment};

/// A classified line read from the input stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The protocol header of the upstream status generator.
    Header(Header),
    /// A complete status line, in display order.
    Frame(Vec<Segment>),
    /// A click reported by the bar.
    Click(ClickEvent),
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Line is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("Malformed segment in status frame: {0}")]
    Segment(#[source] serde_json::Error),
    #[error("Malformed click event: {0}")]
    Click(#[source] serde_json::Error),
    #[error("Unrecognized message shape: {0}")]
    UnknownShape(String),
}

/// Strip the framing of the infinite JSON array from a raw line.
///
/// Returns `None` for lines that carry no message (blank lines and the lone `[` / `]` that open and close the stream).
pub fn clean_line(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line == "[" || line == "]" {
        return None;
    }
    let line = line.strip_prefix(',').unwrap_or(line).trim_start();
    let line = line.strip_suffix(',').unwrap_or(line).trim_end();
    if line.is_empty() {
        None
    } else {
        Some(line)
    }
}

/// Parse a raw input line into a message.
///
/// `Ok(None)` means the line was only protocol framing.
pub fn parse_line(line: &str) -> Result<Option<Inbound>, ParseError> {
    let Some(cleaned) = clean_line(line) else { return Ok(None) };
    let value = match serde_json::from_str::<Value>(cleaned) {
        Ok(value) => value,
        // Some bars open the stream and send the first event on the same line.
        Err(err) => match cleaned.strip_prefix('[') {
            Some(rest) => match clean_line(rest) {
                Some(rest) => serde_json::from_str::<Value>(rest).map_err(|_| ParseError::Json(err))?,
                None => return Ok(None),
            },
            None => return Err(ParseError::Json(err)),
        },
    };
    classify(value).map(Some)
}

fn classify(value: Value) -> Result<Inbound, ParseError> {
    match value {
        Value::Array(items) => {
            let segments =
                items.into_iter().map(serde_json::from_value::<Segment>).collect::<Result<Vec<_>, _>>().map_err(ParseError::Segment)?;
            Ok(Inbound::Frame(segments))
        }
        Value::Object(ref map) if map.contains_key("button") && map.contains_key("name") => {
            serde_json::from_value(value).map(Inbound::Click).map_err(ParseError::Click)
        }
        Value::Object(ref map) if map.contains_key("version") => {
            serde_json::from_value(value.clone()).map(Inbound::Header).map_err(|_| ParseError::UnknownShape(value.to_string()))
        }
        other => Err(ParseError::UnknownShape(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clean_line() {
        assert_eq!(clean_line("["), None);
        assert_eq!(clean_line("  "), None);
        assert_eq!(clean_line(",[{\"full_text\":\"a\"}],"), Some("[{\"full_text\":\"a\"}]"));
        assert_eq!(clean_line("[{\"full_text\":\"a\"}],"), Some("[{\"full_text\":\"a\"}]"));
    }

    #[test]
    fn test_parse_frame() {
        let parsed = parse_line(r#",[{"name":"u1","full_text":"U1"},{"name":"u2","full_text":"U2"}]"#).unwrap();
        assert_eq!(
            parsed,
            Some(Inbound::Frame(vec![Segment::text("U1").with_name("u1"), Segment::text("U2").with_name("u2")]))
        );
    }

    #[test]
    fn test_parse_empty_frame() {
        assert_eq!(parse_line("[]").unwrap(), Some(Inbound::Frame(Vec::new())));
    }

    #[test]
    fn test_parse_click() {
        let parsed = parse_line(r#",{"name":"B","button":1,"instance":"x","x":10,"y":4}"#).unwrap();
        let Some(Inbound::Click(click)) = parsed else { panic!("expected a click, got {:?}", parsed) };
        assert_eq!(click.name, "B");
        assert_eq!(click.instance(), Some("x"));
        assert_eq!(click.mouse_button(), crate::MouseButton::Left);
        assert_eq!((click.x, click.y), (10, 4));
    }

    #[test]
    fn test_parse_click_glued_to_stream_start() {
        let parsed = parse_line(r#"[{"name":"B","button":3}"#).unwrap();
        assert!(matches!(parsed, Some(Inbound::Click(ClickEvent { button: 3, .. }))));
    }

    #[test]
    fn test_parse_header() {
        let parsed = parse_line(r#"{"version":1}"#).unwrap();
        assert_eq!(parsed, Some(Inbound::Header(Header { version: 1, click_events: false, stop_signal: None, cont_signal: None })));
    }

    #[test]
    fn test_unknown_shapes_are_errors() {
        assert!(matches!(parse_line(r#"{"foo":1}"#), Err(ParseError::UnknownShape(_))));
        assert!(matches!(parse_line("not json"), Err(ParseError::Json(_))));
        assert!(matches!(parse_line("[1, 2]"), Err(ParseError::Segment(_))));
    }
}
