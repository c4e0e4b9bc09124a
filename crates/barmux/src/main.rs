use anyhow::{Context, Result};
use paths::BarmuxPaths;

mod application_lifecycle;
mod cache;
mod config;
mod error;
mod error_handling_ctx;
mod input;
mod merger;
mod opts;
mod output;
mod paths;
mod pool;
mod probe;
mod registry;
mod scheduler;
mod supervisor;
mod util;

fn main() {
    let opts: opts::Opt = opts::Opt::from_env();

    let log_level_filter = if opts.log_debug { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    if std::env::var("RUST_LOG").is_ok() {
        pretty_env_logger::init_timed();
    } else {
        pretty_env_logger::formatted_timed_builder().filter(Some("barmux"), log_level_filter).init();
    }

    if let Err(err) = run(opts) {
        error_handling_ctx::print_error(&err);
        std::process::exit(error_handling_ctx::exit_code(&err));
    }
}

fn run(opts: opts::Opt) -> Result<()> {
    let paths = opts
        .config_path
        .as_ref()
        .map(BarmuxPaths::from_config_file)
        .unwrap_or_else(BarmuxPaths::default)
        .context("Failed to initialize barmux paths")?;

    let (config, registry) = supervisor::load_config(&paths, &opts)?;

    if opts.dry_run {
        eprintln!("Configuration {} is valid.", paths.get_config_file().display());
        eprintln!("{}", registry.summary());
        return Ok(());
    }

    supervisor::initialize_daemon(config, registry, opts.standalone)
}
