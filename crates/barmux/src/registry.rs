use std::{collections::HashMap, sync::Arc, time::Duration};

use bar_protocol::ProbeId;
use itertools::Itertools;

use crate::{
    config::{BarConfig, ExecMode, Position, ProbeOptions},
    error::ConfigError,
    probe::{builtin, Probe},
};

/// Static description of a registered probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeDescriptor {
    pub id: ProbeId,
    pub name: String,
    pub kind: String,
    /// Minimum time between two runs. Zero means the probe only runs on demand.
    pub cadence: Duration,
    pub mode: ExecMode,
    pub position: Position,
    pub handles_clicks: bool,
}

impl ProbeDescriptor {
    pub fn new(id: impl Into<ProbeId>, mode: ExecMode, cadence: Duration) -> Self {
        let id = id.into();
        ProbeDescriptor {
            name: id.to_string(),
            kind: id.to_string(),
            id,
            cadence,
            mode,
            position: Position::End,
            handles_clicks: false,
        }
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }
}

#[derive(Clone)]
pub struct RegisteredProbe {
    pub descriptor: ProbeDescriptor,
    pub probe: Arc<dyn Probe>,
}

impl RegisteredProbe {
    pub fn new(mut descriptor: ProbeDescriptor, probe: Arc<dyn Probe>) -> Self {
        descriptor.handles_clicks = probe.handles_clicks();
        RegisteredProbe { descriptor, probe }
    }

    pub fn id(&self) -> &ProbeId {
        &self.descriptor.id
    }
}

impl std::fmt::Debug for RegisteredProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProbe").field("descriptor", &self.descriptor).finish_non_exhaustive()
    }
}

/// The table of all probes, in the order they were configured.
/// That order is the layout order of the bar and the tie-break of the scheduler.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    probes: Vec<RegisteredProbe>,
    index: HashMap<ProbeId, usize>,
}

impl Registry {
    pub fn new(probes: Vec<RegisteredProbe>) -> Result<Self, ConfigError> {
        let mut index = HashMap::with_capacity(probes.len());
        for (i, probe) in probes.iter().enumerate() {
            if index.insert(probe.id().clone(), i).is_some() {
                return Err(ConfigError::DuplicateProbe(probe.id().to_string()));
            }
        }
        Ok(Registry { probes, index })
    }

    pub fn from_config(config: &BarConfig) -> Result<Self, ConfigError> {
        let mut probes = Vec::with_capacity(config.probes.len());
        for probe_config in &config.probes {
            let kind = builtin::lookup_kind(probe_config.kind()).ok_or_else(|| ConfigError::UnknownProbe {
                id: probe_config.id.clone(),
                kind: probe_config.kind().to_string(),
            })?;
            let mut options = ProbeOptions::new(probe_config.id.clone(), probe_config.options.clone());
            let probe = (kind.construct)(&mut options)?;
            options.warn_unused();

            let descriptor = ProbeDescriptor {
                id: ProbeId::from(probe_config.id.as_str()),
                name: probe_config.name.clone().unwrap_or_else(|| probe_config.id.clone()),
                kind: kind.name.to_string(),
                cadence: probe_config.interval.or(kind.default_cadence).unwrap_or(config.general.cache_timeout),
                mode: probe_config.mode.unwrap_or(kind.default_mode),
                position: probe_config.position.clone(),
                handles_clicks: false,
            };
            log::debug!("Registered probe {:?}", descriptor);
            probes.push(RegisteredProbe::new(descriptor, probe));
        }
        Self::new(probes)
    }

    pub fn lookup(&self, id: &str) -> Option<&RegisteredProbe> {
        self.index.get(id).map(|&i| &self.probes[i])
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn enumerate(&self) -> &[RegisteredProbe] {
        &self.probes
    }

    pub fn ids(&self) -> impl Iterator<Item = &ProbeId> {
        self.probes.iter().map(RegisteredProbe::id)
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Human readable table of all probes, one per line.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "No probes configured.".to_string();
        }
        self.probes
            .iter()
            .map(|p| {
                let d = &p.descriptor;
                let cadence =
                    if d.cadence.is_zero() { "on demand".to_string() } else { format!("every {:?}", d.cadence) };
                let clicks = if d.handles_clicks { ", clickable" } else { "" };
                format!("  {} ({}, {}, {}, position {}{})", d.id, d.kind, d.mode, cadence, d.position, clicks)
            })
            .join("\n")
    }
}
