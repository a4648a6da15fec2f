use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use clap::Args;
use color_eyre::eyre::{Context, OptionExt};
use mempipe::Feed;
use mempipe_env::{CommandExt, Direction, FakePathVars};
use tracing::{info, warn};

use crate::{
    commands::{check_status, program::ProgramArgs},
    config::Config,
};

#[derive(Args, Debug, PartialEq)]
pub struct FeedArgs {
    /// File holding the bytes to feed, or `-` for standard input.
    #[clap(short, long, default_value = "-", value_hint = clap::ValueHint::FilePath)]
    pub(crate) input: PathBuf,

    #[clap(flatten)]
    pub(crate) program: ProgramArgs,
}

fn read_input(input: &Path) -> io::Result<Vec<u8>> {
    if input == Path::new("-") {
        let mut data = Vec::new();
        io::stdin().lock().read_to_end(&mut data)?;
        Ok(data)
    } else {
        fs::read(input)
    }
}

#[tracing::instrument(skip_all, fields(program = %args.program.name()))]
pub fn feed(config: Config, args: FeedArgs) -> color_eyre::Result<()> {
    let data = read_input(&args.input)
        .wrap_err_with(|| format!("failed to read input from {:?}", args.input))?;
    let len = data.len();

    let mut feed = Feed::open(data, &config.settings())?;
    let strategy = feed.strategy();
    let path = feed
        .path()
        .ok_or_eyre("fake path was released early")?
        .to_path_buf();

    info!(?path, %strategy, len, "feeding buffer");

    let status = args
        .program
        .command(&path)
        .with_env_vars(FakePathVars {
            path,
            direction: Direction::Read,
            strategy,
        })
        .status()
        .wrap_err_with(|| format!("failed to run {}", args.program.name()))?;

    // Nobody reads the pipe once the program is gone.
    feed.disconnect();
    if let Err(error) = feed.close() {
        warn!(%error, "program did not read all of its input");
    }

    check_status(&args.program.name(), status)
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs};

    use assert_fs::prelude::{FileWriteBin, PathChild};
    use mempipe::Strategy;

    use super::{FeedArgs, feed};
    use crate::{commands::program::shell, config::Config};

    #[test]
    fn program_reads_the_input_through_a_pipe() -> Result<(), Box<dyn Error>> {
        let temp_dir = assert_fs::TempDir::new()?;
        let input = temp_dir.child("input.bin");
        let output = temp_dir.child("output.bin");
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 253) as u8).collect();
        input.write_binary(&data)?;

        let args = FeedArgs {
            input: input.path().to_path_buf(),
            program: shell(
                "{}",
                r#"cat "$1" > "$2""#,
                &["{}", &*output.path().to_string_lossy()],
            ),
        };
        feed(Config::with_strategy(Strategy::Auto), args)?;

        assert_eq!(data, fs::read(output.path())?);
        Ok(())
    }

    #[test]
    fn program_can_stat_a_temp_file() -> Result<(), Box<dyn Error>> {
        let temp_dir = assert_fs::TempDir::new()?;
        let input = temp_dir.child("input.txt");
        let output = temp_dir.child("size.txt");
        input.write_binary(b"0123456789")?;

        let args = FeedArgs {
            input: input.path().to_path_buf(),
            program: shell(
                "{}",
                r#"wc -c < "$1" > "$2""#,
                &["{}", &*output.path().to_string_lossy()],
            ),
        };
        feed(Config::with_strategy(Strategy::TempFile), args)?;

        assert_eq!("10", fs::read_to_string(output.path())?.trim());
        Ok(())
    }

    #[test]
    fn unread_input_is_abandoned_once_the_program_exits() -> Result<(), Box<dyn Error>> {
        let temp_dir = assert_fs::TempDir::new()?;
        let input = temp_dir.child("input.bin");
        let output = temp_dir.child("head.bin");
        input.write_binary(&vec![b'h'; 3 * 1024 * 1024])?;

        let args = FeedArgs {
            input: input.path().to_path_buf(),
            program: shell(
                "{}",
                r#"head -c 5 "$1" > "$2""#,
                &["{}", &*output.path().to_string_lossy()],
            ),
        };
        feed(Config::with_strategy(Strategy::Auto), args)?;

        assert_eq!(b"hhhhh", fs::read(output.path())?.as_slice());
        Ok(())
    }

    #[test]
    fn failing_program_is_an_error() -> Result<(), Box<dyn Error>> {
        let temp_dir = assert_fs::TempDir::new()?;
        let input = temp_dir.child("input.bin");
        input.write_binary(b"ignored")?;

        let args = FeedArgs {
            input: input.path().to_path_buf(),
            program: shell("{}", "exit 3", &[]),
        };

        assert!(feed(Config::with_strategy(Strategy::Auto), args).is_err());
        Ok(())
    }
}
