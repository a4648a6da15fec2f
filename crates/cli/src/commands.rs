use std::process::ExitStatus;

use capture::CaptureArgs;
use clap::*;
use color_eyre::eyre::eyre;
use feed::FeedArgs;

pub mod capture;
pub mod feed;
pub mod info;
pub mod program;

#[derive(Subcommand, Debug)]
#[command(flatten_help = true)]
pub enum Commands {
    /// Run a program that reads a file, feeding it a buffer instead.
    #[clap(disable_version_flag = true)]
    Feed(FeedArgs),

    /// Run a program that writes a file, capturing what it writes instead.
    #[clap(disable_version_flag = true)]
    Capture(CaptureArgs),

    /// Show the resolved configuration and whether descriptor paths work here.
    #[clap(disable_version_flag = true)]
    Info,
}

pub(crate) fn check_status(program: &str, status: ExitStatus) -> color_eyre::Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(eyre!("{program} exited with {status}"))
    }
}
