//! The probe interface, and the probes shipped with barmux.
//!
//! A probe produces the segments of one bar entry on request. It owns whatever state it needs and is
//! addressed by the scheduler only through [`Probe`].

use std::{panic::AssertUnwindSafe, time::Duration};

use anyhow::Result;
use bar_protocol::{ClickEvent, Segment};

use crate::{error::ProbeError, util::panic_message};

pub mod builtin;
pub mod command;
pub mod compat;
pub mod file;
pub mod static_text;
pub mod time;

#[cfg(test)]
pub mod testing;

pub trait Probe: Send + Sync {
    /// Produce the current segments of this probe.
    fn run(&self) -> Result<ProbeOutput>;

    /// React to a click on one of the segments of this probe.
    /// Only called when [`Probe::handles_clicks`] returns true, and always on the worker pool.
    fn on_click(&self, _event: &ClickEvent) -> Result<()> {
        Ok(())
    }

    fn handles_clicks(&self) -> bool {
        false
    }
}

/// What a successful probe run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeOutput {
    pub segments: Vec<Segment>,
    /// Overrides the cadence of the probe for this result. Zero means "stale right away".
    pub cached_until: Option<Duration>,
}

impl ProbeOutput {
    pub fn text(full_text: impl Into<String>) -> Self {
        Self::single(Segment::text(full_text))
    }

    pub fn single(segment: Segment) -> Self {
        ProbeOutput { segments: vec![segment], cached_until: None }
    }

    pub fn cached_until(mut self, duration: Duration) -> Self {
        self.cached_until = Some(duration);
        self
    }
}

/// Result of a probe run, with any error or panic already converted.
pub type ProbeOutcome = Result<ProbeOutput, ProbeError>;

/// Run a probe, converting errors and panics into a [`ProbeError`].
pub fn execute(probe: &dyn Probe) -> ProbeOutcome {
    match std::panic::catch_unwind(AssertUnwindSafe(|| probe.run())) {
        Ok(result) => result.map_err(ProbeError::from),
        Err(payload) => Err(ProbeError::Panicked(panic_message(&*payload))),
    }
}

/// Run the click handler of a probe, converting errors and panics into a [`ProbeError`].
pub fn execute_click(probe: &dyn Probe, event: &ClickEvent) -> Result<(), ProbeError> {
    match std::panic::catch_unwind(AssertUnwindSafe(|| probe.on_click(event))) {
        Ok(result) => result.map_err(ProbeError::from),
        Err(payload) => Err(ProbeError::Panicked(panic_message(&*payload))),
    }
}

#[cfg(test)]
mod tests {
    use super::{testing::FnProbe, *};

    #[test]
    fn test_execute_converts_errors() {
        let probe = FnProbe::new(|| anyhow::bail!("no battery"));
        assert_eq!(execute(&probe), Err(ProbeError::Failed("no battery".to_string())));
    }

    #[test]
    fn test_execute_catches_panics() {
        let probe = FnProbe::new(|| panic!("index out of bounds"));
        assert_eq!(execute(&probe), Err(ProbeError::Panicked("index out of bounds".to_string())));
    }

    #[test]
    fn test_execute_ok() {
        let probe = FnProbe::new(|| Ok(ProbeOutput::text("42%")));
        assert_eq!(execute(&probe).unwrap().segments, vec![Segment::text("42%")]);
    }
}
