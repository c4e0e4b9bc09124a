use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;

/// Struct that gets generated from `RawOpt`.
#[derive(Debug, PartialEq, Eq)]
pub struct Opt {
    pub log_debug: bool,
    pub config_path: Option<PathBuf>,
    /// Overrides the `interval` of the configuration.
    pub interval: Option<Duration>,
    pub standalone: bool,
    pub dry_run: bool,
}

/// Wraps a status generator like i3status, or runs on its own, and merges the output of its probes into the
/// i3bar protocol stream.
#[derive(Parser, Debug, PartialEq)]
#[command(author = "barmux contributors")]
#[command(version = env!("BARMUX_VERSION"))]
pub(super) struct RawOpt {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum number of seconds between two updates of the bar
    #[arg(short, long, value_parser = parse_seconds)]
    interval: Option<Duration>,

    /// Do not wrap another status generator. Stdin then only carries clicks.
    #[arg(short, long)]
    standalone: bool,

    /// Validate the configuration, print a summary and exit
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Write out debug logs.
    #[arg(long = "debug")]
    log_debug: bool,
}

impl Opt {
    pub fn from_env() -> Self {
        let raw: RawOpt = RawOpt::parse();
        raw.into()
    }
}

impl From<RawOpt> for Opt {
    fn from(other: RawOpt) -> Self {
        let RawOpt { config, interval, standalone, dry_run, log_debug } = other;
        Opt { log_debug, config_path: config, interval, standalone, dry_run }
    }
}

fn parse_seconds(s: &str) -> Result<Duration> {
    let secs: f64 = s.trim().parse().with_context(|| format!("expected a number of seconds, got `{}`", s))?;
    if secs <= 0.0 {
        anyhow::bail!("the interval must be positive, got `{}`", s);
    }
    Duration::try_from_secs_f64(secs).with_context(|| format!("`{}` is not a valid number of seconds", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Opt {
        RawOpt::try_parse_from(std::iter::once("barmux").chain(args.iter().copied())).unwrap().into()
    }

    #[test]
    fn test_defaults() {
        assert_eq!(parse(&[]), Opt { log_debug: false, config_path: None, interval: None, standalone: false, dry_run: false });
    }

    #[test]
    fn test_flags() {
        assert_eq!(
            parse(&["-c", "/tmp/bar.json", "-i", "0.5", "-s", "-n", "--debug"]),
            Opt {
                log_debug: true,
                config_path: Some(PathBuf::from("/tmp/bar.json")),
                interval: Some(Duration::from_millis(500)),
                standalone: true,
                dry_run: true,
            }
        );
    }

    #[test]
    fn test_invalid_interval() {
        assert!(RawOpt::try_parse_from(["barmux", "-i", "0"]).is_err());
        assert!(RawOpt::try_parse_from(["barmux", "-i", "soon"]).is_err());
    }
}
