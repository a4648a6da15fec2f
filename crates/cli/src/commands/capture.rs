use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use clap::Args;
use color_eyre::eyre::{Context, OptionExt};
use mempipe::Capture;
use mempipe_env::{CommandExt, Direction, FakePathVars};
use tracing::{error, info};

use crate::{
    commands::{check_status, program::ProgramArgs},
    config::Config,
};

#[derive(Args, Debug, PartialEq)]
pub struct CaptureArgs {
    /// File receiving the captured bytes, or `-` for standard output.
    #[clap(short, long, default_value = "-", value_hint = clap::ValueHint::FilePath)]
    pub(crate) output: PathBuf,

    #[clap(flatten)]
    pub(crate) program: ProgramArgs,
}

fn write_output(output: &Path, data: &[u8]) -> io::Result<()> {
    if output == Path::new("-") {
        let mut stdout = io::stdout().lock();
        stdout.write_all(data)?;
        stdout.flush()
    } else {
        fs::write(output, data)
    }
}

#[tracing::instrument(skip_all, fields(program = %args.program.name()))]
pub fn capture(config: Config, args: CaptureArgs) -> color_eyre::Result<()> {
    let settings = config.settings();

    let mut capture = Capture::open(&settings)?;
    let strategy = capture.strategy();
    let path = capture
        .path()
        .ok_or_eyre("fake path was released early")?
        .to_path_buf();

    info!(?path, %strategy, "capturing output");

    let mut child = args
        .program
        .command(&path)
        .with_env_vars(FakePathVars {
            path,
            direction: Direction::Write,
            strategy,
        })
        .spawn()
        .wrap_err_with(|| format!("failed to run {}", args.program.name()))?;

    let mut exit_status = None;
    capture.capture_loop(
        || match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                exit_status = Some(status);
                false
            }
            Err(error) => {
                error!(%error, "unable to poll program status");
                false
            }
        },
        settings.poll_interval(),
    )?;

    let status = match exit_status {
        Some(status) => status,
        None => child.wait()?,
    };

    let data = capture.finish()?;
    info!(len = data.len(), "captured output");

    write_output(&args.output, &data)
        .wrap_err_with(|| format!("failed to write output to {:?}", args.output))?;

    check_status(&args.program.name(), status)
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs};

    use assert_fs::prelude::PathChild;
    use mempipe::Strategy;

    use super::{CaptureArgs, capture};
    use crate::{commands::program::shell, config::Config};

    fn expected_seq(count: u32) -> String {
        (1..=count).map(|n| format!("{n}\n")).collect()
    }

    #[test]
    fn pipe_output_reaches_the_output_file() -> Result<(), Box<dyn Error>> {
        let temp_dir = assert_fs::TempDir::new()?;
        let output = temp_dir.child("captured.txt");

        let args = CaptureArgs {
            output: output.path().to_path_buf(),
            program: shell("{}", r#"seq 1 100000 > "$1""#, &["{}"]),
        };
        capture(Config::with_strategy(Strategy::Auto), args)?;

        assert_eq!(expected_seq(100_000), fs::read_to_string(output.path())?);
        Ok(())
    }

    #[test]
    fn temp_file_output_reaches_the_output_file() -> Result<(), Box<dyn Error>> {
        let temp_dir = assert_fs::TempDir::new()?;
        let output = temp_dir.child("captured.txt");

        let args = CaptureArgs {
            output: output.path().to_path_buf(),
            program: shell("{}", r#"seq 1 500 > "$1""#, &["{}"]),
        };
        capture(Config::with_strategy(Strategy::TempFile), args)?;

        assert_eq!(expected_seq(500), fs::read_to_string(output.path())?);
        Ok(())
    }

    #[test]
    fn failing_program_is_an_error_after_writing_output() -> Result<(), Box<dyn Error>> {
        let temp_dir = assert_fs::TempDir::new()?;
        let output = temp_dir.child("partial.txt");

        let args = CaptureArgs {
            output: output.path().to_path_buf(),
            program: shell("{}", r#"printf partial > "$1"; exit 3"#, &["{}"]),
        };

        assert!(capture(Config::with_strategy(Strategy::Auto), args).is_err());
        assert_eq!("partial", fs::read_to_string(output.path())?);
        Ok(())
    }
}
