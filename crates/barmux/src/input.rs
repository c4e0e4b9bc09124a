//! Reads the stream coming from upstream: status frames of the wrapped generator, and clicks reported by the bar.

use std::io::BufRead;

use bar_protocol::{ClickEvent, Inbound, Segment};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::InputError;

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Frame(Vec<Segment>),
    Click(ClickEvent),
    /// The input reached EOF or could not be read anymore.
    Terminated,
}

/// Read `input` line by line on a dedicated thread until EOF, forwarding everything meaningful to `evt_send`.
pub fn spawn_reader<R: BufRead + Send + 'static>(input: R, evt_send: UnboundedSender<InputEvent>) -> std::io::Result<()> {
    std::thread::Builder::new().name("barmux-input".to_string()).spawn(move || read_events(input, &evt_send))?;
    Ok(())
}

fn read_events<R: BufRead>(input: R, evt_send: &UnboundedSender<InputEvent>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                log::error!("Failed to read input: {}", err);
                break;
            }
        };
        let event = match to_event(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(err) => {
                log::warn!("Ignoring input line `{}`: {}", line.trim(), err);
                continue;
            }
        };
        if evt_send.send(event).is_err() {
            log::debug!("Input receiver dropped, stopping to read");
            return;
        }
    }
    log::debug!("Input reached EOF");
    let _ = evt_send.send(InputEvent::Terminated);
}

fn to_event(line: &str) -> Result<Option<InputEvent>, InputError> {
    Ok(match bar_protocol::parse_line(line)? {
        Some(Inbound::Frame(frame)) => Some(InputEvent::Frame(frame)),
        Some(Inbound::Click(click)) => Some(InputEvent::Click(click)),
        Some(Inbound::Header(header)) => {
            log::debug!("Upstream header: {:?}", header);
            None
        }
        None => None,
    })
}
