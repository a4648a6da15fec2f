use std::path::Path;

use color_eyre::owo_colors::OwoColorize;
use mempipe::{ProcFdResolver, Settings, fd_path::DEFAULT_PROC_ROOT};

use crate::{config::Config, output::OutputBuilder};

fn format_path<P: AsRef<Path>>(path: Option<P>) -> String {
    match path {
        None => "<default>".dimmed().to_string(),
        Some(path) => path.as_ref().to_string_lossy().to_string(),
    }
}

fn format_status(status: bool) -> String {
    if status {
        "Found".green().to_string()
    } else {
        "Not found".red().to_string()
    }
}

fn settings_section(output: &mut OutputBuilder, settings: &Settings) {
    output.section("Settings", |builder| {
        let strategy = settings.strategy();

        builder.property("Strategy", format!("{strategy} ({})", strategy.description()));
        builder.property("Proc root", format_path(settings.proc_root.as_ref()));
        builder.property("Temp directory", format_path(settings.temp_dir()));
        builder.property("Poll interval", format!("{:?}", settings.poll_interval()));
    });
}

pub fn info(config: Config) -> color_eyre::Result<()> {
    let settings = config.settings();
    let mut output = OutputBuilder::new("mempipe");

    output.property("Version", env!("CARGO_PKG_VERSION"));
    output.property("Log file", format_path(config.log_file()));

    settings_section(&mut output, &settings);

    output.section("Descriptor paths", |builder| {
        let proc_root = settings
            .proc_root
            .as_deref()
            .unwrap_or(Path::new(DEFAULT_PROC_ROOT));

        builder.property(
            "Directory",
            ProcFdResolver::new(proc_root).fd_dir().to_string_lossy(),
        );
        builder.property("Status", format_status(settings.resolver().is_some()));
    });

    output.section("Configuration search paths", |builder| {
        for (index, item) in config.known_dirs.config_files().enumerate() {
            builder.property(format!("{index}"), item.to_string_lossy());
        }
    });

    print!("{}", output.build());

    Ok(())
}
