use std::{sync::Arc, time::Duration};

use tokio::sync::Semaphore;

use crate::{error::ProbeError, util::panic_message};

/// Runs blocking probe work on tokio's blocking threads, with a bounded number of jobs at once
/// and a deadline per job.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
    job_timeout: Duration,
}

impl WorkerPool {
    pub fn new(size: usize, job_timeout: Duration) -> Self {
        let size = size.max(1);
        WorkerPool { permits: Arc::new(Semaphore::new(size)), size, job_timeout }
    }

    /// One worker per probe, but no more than there are CPUs.
    pub fn default_size(probe_count: usize) -> usize {
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        probe_count.min(cpus).max(1)
    }

    /// Run `job` once a worker is free, and hand its result to `on_done`.
    ///
    /// A job that misses its deadline is reported as [`ProbeError::TimedOut`] and gives up its worker slot.
    /// The job itself keeps running until it returns on its own; whatever it returns then is dropped.
    pub fn spawn<T, F, D>(&self, job: F, on_done: D)
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, ProbeError> + Send + 'static,
        D: FnOnce(Result<T, ProbeError>) + Send + 'static,
    {
        let permits = self.permits.clone();
        let job_timeout = self.job_timeout;
        tokio::spawn(async move {
            let result = match permits.acquire_owned().await {
                Ok(_permit) => run_with_deadline(job, job_timeout).await,
                Err(_) => Err(ProbeError::Failed("worker pool is shut down".to_string())),
            };
            on_done(result);
        });
    }

    /// Stop handing out workers. Jobs that are still waiting for one fail right away.
    pub fn close(&self) {
        let busy = self.size - self.permits.available_permits().min(self.size);
        log::debug!("Closing worker pool with {} of {} worker(s) busy", busy, self.size);
        self.permits.close();
    }
}

async fn run_with_deadline<T, F>(job: F, job_timeout: Duration) -> Result<T, ProbeError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ProbeError> + Send + 'static,
{
    match tokio::time::timeout(job_timeout, tokio::task::spawn_blocking(job)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) if join_err.is_panic() => Err(ProbeError::Panicked(panic_message(&*join_err.into_panic()))),
        Ok(Err(join_err)) => Err(ProbeError::Failed(join_err.to_string())),
        Err(_) => Err(ProbeError::TimedOut(job_timeout)),
    }
}
