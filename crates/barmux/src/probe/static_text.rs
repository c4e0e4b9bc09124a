use anyhow::Result;
use bar_protocol::Segment;

use super::{Probe, ProbeOutput};
use crate::{config::ProbeOptions, error::ConfigError};

/// Shows a fixed piece of text.
#[derive(Debug, Clone)]
pub struct StaticProbe {
    segment: Segment,
}

impl StaticProbe {
    pub fn from_options(options: &mut ProbeOptions) -> Result<Self, ConfigError> {
        let mut segment = Segment::text(options.take_string("text")?.unwrap_or_default());
        segment.short_text = options.take_string("short_text")?;
        segment.color = options.take_string("color")?;
        segment.markup = options.take_string("markup")?;
        Ok(StaticProbe { segment })
    }
}

impl Probe for StaticProbe {
    fn run(&self) -> Result<ProbeOutput> {
        Ok(ProbeOutput::single(self.segment.clone()))
    }
}
