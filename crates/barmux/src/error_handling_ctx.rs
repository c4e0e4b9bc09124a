use crate::error::{ConfigError, OutputError};

pub const EXIT_CONFIG_ERROR: i32 = 1;
pub const EXIT_RUNTIME_ERROR: i32 = 2;

/// Print an error that is about to end the process. Never writes to stdout, which belongs to the bar.
pub fn print_error(err: &anyhow::Error) {
    if let Some(config_err) = err.downcast_ref::<ConfigError>() {
        log::error!("Configuration error: {}", config_err);
        if err.chain().count() > 1 {
            log::debug!("{:?}", err);
        }
    } else if let Some(output_err) = err.downcast_ref::<OutputError>() {
        log::error!("{}: {}", output_err, output_err.0);
    } else {
        log::error!("{:?}", err);
    }
}

/// The exit code the process should terminate with, given the error that stopped it.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some() {
        EXIT_CONFIG_ERROR
    } else {
        EXIT_RUNTIME_ERROR
    }
}
