use std::{
    io::Read,
    process::{Command, Stdio},
    time::Duration,
};

use anyhow::{anyhow, bail, Context, Result};
use bar_protocol::{ClickEvent, Segment};
use wait_timeout::ChildExt;

use super::{compat, Probe, ProbeOutput};
use crate::{config::ProbeOptions, error::ConfigError, util::StringExt};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    /// i3blocks style: full text, short text and color on the first three lines.
    Lines,
    /// A JSON value in any of the shapes understood by [`compat::output_from_value`].
    Json,
}

/// Runs a shell command and shows what it prints.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    probe_id: String,
    command: String,
    on_click: Option<String>,
    format: OutputFormat,
    timeout: Duration,
}

impl CommandProbe {
    pub fn from_options(options: &mut ProbeOptions) -> Result<Self, ConfigError> {
        let format = match options.take_string("format")?.as_deref() {
            None | Some("lines") => OutputFormat::Lines,
            Some("json") => OutputFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidOption {
                    id: options.probe_id().to_string(),
                    option: "format".to_string(),
                    message: format!("expected `lines` or `json`, got `{}`", other),
                })
            }
        };
        Ok(CommandProbe {
            probe_id: options.probe_id().to_string(),
            command: options.require_string("command")?,
            on_click: options.take_string("on_click")?,
            format,
            timeout: options.take_seconds("timeout")?.unwrap_or(DEFAULT_TIMEOUT),
        })
    }

    fn parse_output(&self, stdout: &str) -> Result<ProbeOutput> {
        match self.format {
            OutputFormat::Json if stdout.is_blank() => Ok(ProbeOutput::text("")),
            OutputFormat::Json => {
                let value = serde_json::from_str(stdout.trim()).context("Command output is not valid JSON")?;
                compat::output_from_value(&self.probe_id, value)
            }
            OutputFormat::Lines => {
                let mut lines = stdout.lines().map(str::trim);
                let mut segment = Segment::text(lines.next().unwrap_or_default());
                segment.short_text = lines.next().filter(|s| !s.is_empty()).map(str::to_string);
                segment.color = lines.next().filter(|s| !s.is_empty()).map(str::to_string);
                Ok(ProbeOutput::single(segment))
            }
        }
    }
}

impl Probe for CommandProbe {
    fn run(&self) -> Result<ProbeOutput> {
        let stdout = run_command(&self.command, &[], self.timeout)?;
        self.parse_output(&stdout)
    }

    fn on_click(&self, event: &ClickEvent) -> Result<()> {
        let Some(on_click) = &self.on_click else { return Ok(()) };
        let env = [
            ("BUTTON", event.button.to_string()),
            ("INSTANCE", event.instance.clone().unwrap_or_default()),
            ("X", event.x.to_string()),
            ("Y", event.y.to_string()),
        ];
        run_command(on_click, &env, self.timeout)?;
        Ok(())
    }

    fn handles_clicks(&self) -> bool {
        self.on_click.is_some()
    }
}

/// Run a command through `/bin/sh`, returning its standard output.
/// The command is killed once `timeout` elapses.
pub fn run_command(cmd: &str, env: &[(&str, String)], timeout: Duration) -> Result<String> {
    log::debug!("Running command: {}", cmd);
    let mut child = Command::new("/bin/sh")
        .arg("-c")
        .arg(cmd)
        .envs(env.iter().map(|(k, v)| (*k, v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to spawn `{}`", cmd))?;

    // Drain the pipes while waiting, so chatty commands can not block on a full pipe.
    let mut stdout_pipe = child.stdout.take().context("stdout of child process was not captured")?;
    let mut stderr_pipe = child.stderr.take().context("stderr of child process was not captured")?;
    let stdout_reader = std::thread::spawn(move || {
        let mut buf = String::new();
        stdout_pipe.read_to_string(&mut buf).map(|_| buf)
    });
    let stderr_reader = std::thread::spawn(move || {
        let mut buf = String::new();
        stderr_pipe.read_to_string(&mut buf).map(|_| buf)
    });

    let status = match child.wait_timeout(timeout)? {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            bail!("`{}` did not finish within {:?}", cmd, timeout);
        }
    };

    let stdout = stdout_reader.join().map_err(|_| anyhow!("stdout reader thread panicked"))??;
    let stderr = stderr_reader.join().map_err(|_| anyhow!("stderr reader thread panicked"))??;
    for line in stderr.lines().filter(|l| !l.is_blank()) {
        log::warn!("stderr of `{}`: {}", cmd, line);
    }
    if !status.success() {
        bail!("Execution of `{}` failed ({})", cmd, status);
    }
    Ok(stdout)
}
