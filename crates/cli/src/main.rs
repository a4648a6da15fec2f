use std::{fs::File, io::stderr, iter, path::PathBuf};

use clap::{ArgAction, Parser};
use commands::Commands;
use mempipe_telemetry::TelemetryConfig;
use tracing::{debug, error, info};

mod commands;
mod config;
pub mod output;

pub use self::config::Options;
use crate::config::{Config, KnownDirs};

#[derive(Parser)]
#[command(
    name = "mempipe",
    version,
    about = "Run programs that insist on file paths against in-memory buffers",
    propagate_version = true,
    flatten_help = true
)]
struct Cli {
    #[clap(flatten)]
    config: Options,

    /// Disable tracing logs and diagnostics.
    #[clap(short, long, action = ArgAction::SetTrue)]
    quiet: bool,

    /// Read configuration from this file, after the default search paths.
    #[clap(long, value_hint = clap::ValueHint::FilePath)]
    config_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn main() {
    mempipe_telemetry::install_error_handler();

    let cli = Cli::parse();

    let known_dirs = KnownDirs::default();
    let config_files = known_dirs
        .config_files()
        .map(PathBuf::from)
        .chain(cli.config_file.clone());

    let env_options = match Options::from_env() {
        Ok(options) => options,
        Err(error) => {
            eprintln!("ignoring invalid MEMPIPE_* environment variables: {error}");
            Options::default()
        }
    };

    let options = iter::once(Options::from_files(config_files))
        .chain(iter::once(env_options))
        .chain(iter::once(cli.config))
        .fold(Options::default(), Options::merge);

    let config = Config {
        known_dirs,
        options,
    };

    let mut telemetry_config = TelemetryConfig::default()
        .enabled(!cli.quiet)
        .with_console_writer(stderr);

    if let Some(path) = config.log_file() {
        match File::options().create(true).append(true).open(path) {
            Ok(file) => telemetry_config = telemetry_config.with_file_writer(file),
            Err(error) => eprintln!("unable to open log file {path:?}: {error}"),
        }
    }

    mempipe_telemetry::install(telemetry_config);

    debug!(
        version = env!("CARGO_PKG_VERSION"),
        settings = ?config.settings()
    );

    let result = match cli.command {
        Commands::Feed(args) => mempipe_telemetry::with_root_span("feed", "feeding a buffer", || {
            commands::feed::feed(config, args)
        }),
        Commands::Capture(args) => {
            mempipe_telemetry::with_root_span("capture", "capturing output", || {
                commands::capture::capture(config, args)
            })
        }
        Commands::Info => commands::info::info(config),
    };

    if let Err(error) = result {
        error!("{error}");
        eprintln!("{error:?}");
        std::process::exit(1);
    }

    info!("done");
}
