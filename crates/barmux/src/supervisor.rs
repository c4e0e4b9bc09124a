//! Wires everything together and owns the main loop of the daemon.

use std::{io::Write, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use bar_protocol::ClickEvent;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    time::Instant,
};

use crate::{
    application_lifecycle::{self, ControlMsg},
    cache::SegmentCache,
    config::{self, BarConfig, GeneralConfig},
    error::OutputError,
    input::{self, InputEvent},
    merger::Merger,
    opts::Opt,
    output::OutputWriter,
    paths::BarmuxPaths,
    pool::WorkerPool,
    registry::Registry,
    scheduler::{Completion, PooledJob, Scheduler, SchedulerSettings},
};

/// Read the configuration and build the registry, applying command line overrides.
pub fn load_config(paths: &BarmuxPaths, opts: &Opt) -> Result<(BarConfig, Registry)> {
    log::info!("Loading paths: {}", paths);
    let mut config = config::read_from_file(paths.get_config_file())?;
    if let Some(interval) = opts.interval {
        config.general.interval = interval;
    }
    let registry = Registry::from_config(&config)?;
    Ok((config, registry))
}

/// Run the daemon on stdin and stdout until it is told to stop.
pub fn initialize_daemon(config: BarConfig, registry: Registry, standalone: bool) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("barmux")
        .build()
        .context("Failed to initialize tokio runtime")?;

    let result = rt.block_on(async {
        let (input_send, input_recv) = mpsc::unbounded_channel();
        let (control_send, control_recv) = mpsc::unbounded_channel();
        application_lifecycle::spawn_signal_listener(control_send)?;
        input::spawn_reader(std::io::BufReader::new(std::io::stdin()), input_send).context("Failed to start input reader")?;

        log::info!("Starting barmux with {} probe(s)", registry.len());
        let daemon = Daemon::new(registry, &config.general, standalone, std::io::stdout());
        daemon.run(input_recv, control_recv).await
    });

    // Probes that ignored their deadline may still be blocking some worker threads; those are not waited for.
    rt.shutdown_background();
    result
}

pub struct Daemon<W: Write> {
    registry: Arc<Registry>,
    cache: Arc<SegmentCache>,
    scheduler: Scheduler,
    merger: Merger,
    writer: OutputWriter<W>,
    pool: WorkerPool,
    standalone: bool,
    shutdown_grace: Duration,
    error_color: String,
    completion_send: UnboundedSender<Completion>,
    completion_recv: Option<UnboundedReceiver<Completion>>,
}

impl<W: Write> Daemon<W> {
    pub fn new(registry: Registry, general: &GeneralConfig, standalone: bool, out: W) -> Self {
        let registry = Arc::new(registry);
        let cache = Arc::new(SegmentCache::new(registry.ids().cloned()));
        let scheduler = Scheduler::new(&registry, cache.clone(), SchedulerSettings::from_config(general));
        let pool_size = general.pool_size.unwrap_or_else(|| WorkerPool::default_size(registry.len()));
        log::debug!("Using {} worker(s), probe deadline {:?}", pool_size, general.probe_timeout);
        let (completion_send, completion_recv) = mpsc::unbounded_channel();
        Daemon {
            pool: WorkerPool::new(pool_size, general.probe_timeout),
            merger: Merger::new(!standalone),
            writer: OutputWriter::new(out),
            scheduler,
            registry,
            cache,
            standalone,
            shutdown_grace: general.shutdown_grace,
            error_color: general.color_bad.clone(),
            completion_send,
            completion_recv: Some(completion_recv),
        }
    }

    pub async fn run(
        mut self,
        mut input_recv: UnboundedReceiver<InputEvent>,
        mut control_recv: UnboundedReceiver<ControlMsg>,
    ) -> Result<()> {
        let mut completion_recv = self.completion_recv.take().context("Daemon is already running")?;
        self.writer.write_header()?;

        let result = match self.event_loop(&mut input_recv, &mut control_recv, &mut completion_recv).await {
            Ok(()) => self.shutdown(&mut completion_recv).await,
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            if err.downcast_ref::<OutputError>().is_none() {
                log::error!("Fatal error, closing the bar stream: {:?}", err);
                let message = format!("{:#}", err);
                crate::print_result_err!("while writing the error frame", self.writer.write_error_frame(&message, &self.error_color));
                crate::print_result_err!("while closing the bar stream", self.writer.close());
            }
        }
        result
    }

    async fn event_loop(
        &mut self,
        input_recv: &mut UnboundedReceiver<InputEvent>,
        control_recv: &mut UnboundedReceiver<ControlMsg>,
        completion_recv: &mut UnboundedReceiver<Completion>,
    ) -> Result<()> {
        let mut input_open = true;
        self.tick();
        loop {
            self.publish()?;
            let wake = self.scheduler.next_wake(Instant::now());
            tokio::select! {
                _ = tokio::time::sleep_until(wake) => self.tick(),
                Some(completion) = completion_recv.recv() => self.scheduler.complete(completion, Instant::now()),
                event = input_recv.recv(), if input_open => match event {
                    Some(InputEvent::Frame(frame)) => self.merger.set_upstream(frame),
                    Some(InputEvent::Click(click)) => self.dispatch_click(click),
                    Some(InputEvent::Terminated) | None => {
                        input_open = false;
                        if !self.standalone {
                            log::info!("Input closed, shutting down");
                            return Ok(());
                        }
                        log::debug!("Input closed, no more clicks will arrive");
                    }
                },
                Some(msg) = control_recv.recv() => match msg {
                    ControlMsg::Shutdown => return Ok(()),
                    ControlMsg::RefreshAll => self.scheduler.refresh_all(Instant::now()),
                },
            }
        }
    }

    fn tick(&mut self) {
        let jobs = self.scheduler.tick(Instant::now());
        for job in jobs {
            self.dispatch(job);
        }
    }

    fn dispatch(&self, job: PooledJob) {
        log::debug!("Dispatching {:?}", job);
        let (index, run_id) = (job.index, job.run_id);
        let completion_send = self.completion_send.clone();
        self.pool.spawn(job.into_task(), move |outcome| {
            let _ = completion_send.send(Completion::Run { index, run_id, outcome });
        });
    }

    fn dispatch_click(&self, click: ClickEvent) {
        let Some(job) = self.scheduler.route_click(&self.registry, click) else { return };
        let index = job.index;
        let completion_send = self.completion_send.clone();
        self.pool.spawn(job.into_task(), move |result| {
            let _ = completion_send.send(Completion::Click { index, result });
        });
    }

    fn publish(&mut self) -> Result<()> {
        if let Some(frame) = self.merger.next_frame(&self.registry, &self.cache)? {
            self.writer.write_frame(&frame)?;
        }
        Ok(())
    }

    /// Wait for running probes up to the grace period, show what they produced and close the stream.
    async fn shutdown(&mut self, completion_recv: &mut UnboundedReceiver<Completion>) -> Result<()> {
        let deadline = Instant::now() + self.shutdown_grace;
        while self.scheduler.in_flight() > 0 {
            match tokio::time::timeout_at(deadline, completion_recv.recv()).await {
                Ok(Some(completion)) => self.scheduler.complete(completion, Instant::now()),
                Ok(None) | Err(_) => {
                    log::warn!(
                        "{} probe(s) did not finish within {:?}, not waiting for them",
                        self.scheduler.in_flight(),
                        self.shutdown_grace
                    );
                    break;
                }
            }
        }
        self.pool.close();
        self.publish()?;
        self.writer.close()?;
        log::info!("Stream closed after {} frame(s)", self.writer.frames_written());
        Ok(())
    }
}
