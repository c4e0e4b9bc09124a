//! Probes used by the tests of the scheduler and the supervisor.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::Result;
use bar_protocol::ClickEvent;

use super::{Probe, ProbeOutput};

/// A probe whose run is an arbitrary closure.
pub struct FnProbe<F> {
    f: F,
}

impl<F: Fn() -> Result<ProbeOutput> + Send + Sync> FnProbe<F> {
    pub fn new(f: F) -> Self {
        FnProbe { f }
    }
}

impl<F: Fn() -> Result<ProbeOutput> + Send + Sync> Probe for FnProbe<F> {
    fn run(&self) -> Result<ProbeOutput> {
        (self.f)()
    }
}

/// Counts its runs and how many of them ever overlapped.
#[derive(Default)]
pub struct CountingProbe {
    pub runs: AtomicUsize,
    pub running: AtomicUsize,
    pub overlaps: AtomicUsize,
    pub sleep: Duration,
    pub fail: bool,
    pub output: ProbeOutput,
}

impl CountingProbe {
    pub fn new(output: ProbeOutput) -> Arc<Self> {
        Arc::new(CountingProbe { output, ..Default::default() })
    }

    pub fn sleeping(output: ProbeOutput, sleep: Duration) -> Arc<Self> {
        Arc::new(CountingProbe { output, sleep, ..Default::default() })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(CountingProbe { fail: true, ..Default::default() })
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }
}

impl Probe for CountingProbe {
    fn run(&self) -> Result<ProbeOutput> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if self.running.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        if !self.sleep.is_zero() {
            std::thread::sleep(self.sleep);
        }
        self.running.fetch_sub(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("probe failure");
        }
        Ok(self.output.clone())
    }
}

/// Records every click it receives.
#[derive(Default)]
pub struct ClickRecorder {
    pub clicks: Mutex<Vec<ClickEvent>>,
    pub output: ProbeOutput,
}

impl ClickRecorder {
    pub fn new(output: ProbeOutput) -> Arc<Self> {
        Arc::new(ClickRecorder { output, ..Default::default() })
    }

    pub fn clicks(&self) -> Vec<ClickEvent> {
        self.clicks.lock().unwrap().clone()
    }
}

impl Probe for ClickRecorder {
    fn run(&self) -> Result<ProbeOutput> {
        Ok(self.output.clone())
    }

    fn on_click(&self, event: &ClickEvent) -> Result<()> {
        self.clicks.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn handles_clicks(&self) -> bool {
        true
    }
}
