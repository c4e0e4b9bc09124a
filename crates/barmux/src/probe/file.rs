use std::path::PathBuf;

use anyhow::{Context, Result};
use bar_protocol::Segment;

use super::{Probe, ProbeOutput};
use crate::{config::ProbeOptions, error::ConfigError};

/// Shows the first line of a file, e.g. something from `/sys`, substituted into `format` at `{}`.
#[derive(Debug, Clone)]
pub struct FileProbe {
    path: PathBuf,
    format: String,
    color: Option<String>,
}

impl FileProbe {
    pub fn from_options(options: &mut ProbeOptions) -> Result<Self, ConfigError> {
        Ok(FileProbe {
            path: PathBuf::from(options.require_string("path")?),
            format: options.take_string("format")?.unwrap_or_else(|| "{}".to_string()),
            color: options.take_string("color")?,
        })
    }
}

impl Probe for FileProbe {
    fn run(&self) -> Result<ProbeOutput> {
        let content = std::fs::read_to_string(&self.path).with_context(|| format!("Failed to read {}", self.path.display()))?;
        let first_line = content.lines().next().unwrap_or_default().trim();
        let mut segment = Segment::text(self.format.replace("{}", first_line));
        segment.color = self.color.clone();
        Ok(ProbeOutput::single(segment))
    }
}
