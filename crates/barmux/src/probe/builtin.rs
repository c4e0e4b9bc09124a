use std::{sync::Arc, time::Duration};

use super::{command::CommandProbe, file::FileProbe, static_text::StaticProbe, time::TimeProbe, Probe};
use crate::{
    config::{ExecMode, ProbeOptions},
    error::ConfigError,
};

type Constructor = fn(&mut ProbeOptions) -> Result<Arc<dyn Probe>, ConfigError>;

/// A kind of probe that can be referenced from the configuration.
pub struct ProbeKind {
    pub name: &'static str,
    pub default_mode: ExecMode,
    /// `None` means the global `cache_timeout`.
    pub default_cadence: Option<Duration>,
    pub construct: Constructor,
}

pub static PROBE_KINDS: &[ProbeKind] = &[
    ProbeKind {
        name: "static",
        default_mode: ExecMode::Inline,
        default_cadence: Some(Duration::ZERO),
        construct: construct_static,
    },
    ProbeKind {
        name: "time",
        default_mode: ExecMode::Inline,
        default_cadence: Some(Duration::from_secs(1)),
        construct: construct_time,
    },
    ProbeKind {
        name: "command",
        default_mode: ExecMode::Pooled,
        default_cadence: None,
        construct: construct_command,
    },
    ProbeKind {
        name: "file",
        default_mode: ExecMode::Pooled,
        default_cadence: None,
        construct: construct_file,
    },
];

fn construct_static(opts: &mut ProbeOptions) -> Result<Arc<dyn Probe>, ConfigError> {
    Ok(Arc::new(StaticProbe::from_options(opts)?))
}

fn construct_time(opts: &mut ProbeOptions) -> Result<Arc<dyn Probe>, ConfigError> {
    Ok(Arc::new(TimeProbe::from_options(opts)?))
}

fn construct_command(opts: &mut ProbeOptions) -> Result<Arc<dyn Probe>, ConfigError> {
    Ok(Arc::new(CommandProbe::from_options(opts)?))
}

fn construct_file(opts: &mut ProbeOptions) -> Result<Arc<dyn Probe>, ConfigError> {
    Ok(Arc::new(FileProbe::from_options(opts)?))
}

pub fn lookup_kind(name: &str) -> Option<&'static ProbeKind> {
    PROBE_KINDS.iter().find(|kind| kind.name == name)
}
