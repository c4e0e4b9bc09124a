//! Handling of the process lifecycle: turning signals into control messages for the supervisor.

use anyhow::{Context, Result};
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::mpsc::UnboundedSender,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMsg {
    /// Stop consuming input, let running probes finish and close the stream.
    Shutdown,
    /// Treat every cached result as stale.
    RefreshAll,
}

/// Forward SIGINT and SIGTERM as [`ControlMsg::Shutdown`], and SIGUSR1 as [`ControlMsg::RefreshAll`].
/// Must be called from within the tokio runtime.
pub fn spawn_signal_listener(control_send: UnboundedSender<ControlMsg>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigusr1 = signal(SignalKind::user_defined1()).context("Failed to install SIGUSR1 handler")?;

    tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                Some(()) = sigint.recv() => ControlMsg::Shutdown,
                Some(()) = sigterm.recv() => ControlMsg::Shutdown,
                Some(()) = sigusr1.recv() => ControlMsg::RefreshAll,
                else => break,
            };
            if msg == ControlMsg::Shutdown {
                log::info!("Shutting down barmux...");
            }
            if control_send.send(msg).is_err() {
                break;
            }
        }
    });
    Ok(())
}
