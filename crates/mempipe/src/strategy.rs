//! Picking between pipes and temporary files.
//!
//! Pipes keep data off disk but only support sequential I/O and need procfs.
//! Temporary files work for programs that seek or `stat` their input, and on
//! platforms without descriptor paths.

use std::{path::Path, thread, time::Duration};

use serde_derive::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr, VariantArray};

use crate::{
    error::Result,
    read::PipedPathRead,
    settings::{Backend, Settings},
    temp::{Access, TempPassthrough},
    write::PipedPathWrite,
};

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
    VariantArray,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Strategy {
    /// Pipes where descriptor paths are available, temporary files otherwise.
    #[default]
    Auto,

    /// Always use an anonymous pipe.
    Pipe,

    /// Always use a real temporary file.
    TempFile,
}

impl Strategy {
    pub fn description(self) -> &'static str {
        match self {
            Strategy::Auto => "pipes where descriptor paths are available, temporary files otherwise",
            Strategy::Pipe => "anonymous pipe, sequential access only",
            Strategy::TempFile => "real temporary file, supports seek and stat",
        }
    }
}

fn temp_passthrough(settings: &Settings, data: Vec<u8>, access: Access) -> Result<TempPassthrough> {
    match settings.temp_dir() {
        Some(dir) => TempPassthrough::open_in(dir, data, access),
        None => TempPassthrough::open(data, access),
    }
}

/// A readable fake path, whichever way it is backed.
#[derive(Debug)]
pub enum Feed {
    Pipe(PipedPathRead),
    TempFile(TempPassthrough),
}

impl Feed {
    pub fn open<D: Into<Vec<u8>>>(data: D, settings: &Settings) -> Result<Self> {
        match settings.backend()? {
            Backend::Pipe(resolver) => PipedPathRead::open_with(data, &resolver).map(Feed::Pipe),
            Backend::TempFile => {
                temp_passthrough(settings, data.into(), Access::READ).map(Feed::TempFile)
            }
        }
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            Feed::Pipe(_) => Strategy::Pipe,
            Feed::TempFile(_) => Strategy::TempFile,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Feed::Pipe(feed) => feed.path(),
            Feed::TempFile(temp) => temp.path(),
        }
    }

    /// Gives up on the reader. Only meaningful for pipes.
    pub fn disconnect(&mut self) {
        if let Feed::Pipe(feed) = self {
            feed.disconnect();
        }
    }

    pub fn close(&mut self) -> Result<()> {
        match self {
            Feed::Pipe(feed) => feed.close(),
            Feed::TempFile(temp) => temp.close(),
        }
    }
}

/// A writable fake path, whichever way it is backed.
#[derive(Debug)]
pub enum Capture {
    Pipe(PipedPathWrite),
    TempFile(TempPassthrough),
}

impl Capture {
    pub fn open(settings: &Settings) -> Result<Self> {
        match settings.backend()? {
            Backend::Pipe(resolver) => PipedPathWrite::open_with(&resolver).map(Capture::Pipe),
            Backend::TempFile => {
                temp_passthrough(settings, Vec::new(), Access::WRITE).map(Capture::TempFile)
            }
        }
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            Capture::Pipe(_) => Strategy::Pipe,
            Capture::TempFile(_) => Strategy::TempFile,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Capture::Pipe(capture) => capture.path(),
            Capture::TempFile(temp) => temp.path(),
        }
    }

    /// One non-blocking capture pass. Temporary files are only read on close.
    pub fn capture_iteration(&mut self) -> Result<usize> {
        match self {
            Capture::Pipe(capture) => capture.capture_iteration(),
            Capture::TempFile(_) => Ok(0),
        }
    }

    /// Keeps capturing while `is_alive` holds, sleeping `idle` between empty
    /// polls.
    pub fn capture_loop<F: FnMut() -> bool>(&mut self, mut is_alive: F, idle: Duration) -> Result<()> {
        match self {
            Capture::Pipe(capture) => capture.capture_loop_with_idle(is_alive, idle),
            Capture::TempFile(_) => {
                while is_alive() {
                    thread::sleep(idle);
                }
                Ok(())
            }
        }
    }

    pub fn finish(self) -> Result<Box<[u8]>> {
        match self {
            Capture::Pipe(capture) => Ok(capture.finish()),
            Capture::TempFile(temp) => temp.into_data(),
        }
    }
}

#[cfg(test)]
mod test {
    #[cfg(target_os = "linux")]
    use std::io::Read;
    use std::{error::Error, fs, str::FromStr};

    use strum::VariantArray;

    use super::{Capture, Feed, Strategy};
    use crate::settings::Settings;

    fn settings(strategy: Strategy) -> Settings {
        Settings {
            strategy: Some(strategy),
            ..Default::default()
        }
    }

    #[test]
    fn names_round_trip_through_strum() -> Result<(), Box<dyn Error>> {
        for strategy in Strategy::VARIANTS {
            assert_eq!(*strategy, Strategy::from_str(&strategy.to_string())?);
        }

        assert_eq!("temp-file", Strategy::TempFile.to_string());
        Ok(())
    }

    #[test]
    fn temp_file_feed_is_seekable() -> Result<(), Box<dyn Error>> {
        let mut feed = Feed::open("seekable", &settings(Strategy::TempFile))?;
        let path = feed.path().expect("open feed has a path").to_path_buf();

        assert_eq!(Strategy::TempFile, feed.strategy());
        assert_eq!(8, fs::metadata(&path)?.len());

        feed.close()?;
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn temp_file_capture_collects_on_finish() -> Result<(), Box<dyn Error>> {
        let mut capture = Capture::open(&settings(Strategy::TempFile))?;
        fs::write(capture.path().expect("open capture has a path"), b"captured")?;

        assert_eq!(0, capture.capture_iteration()?);
        assert_eq!(b"captured", &*capture.finish()?);
        Ok(())
    }

    #[test]
    fn temp_file_capture_with_nothing_written_is_empty() -> Result<(), Box<dyn Error>> {
        let capture = Capture::open(&settings(Strategy::TempFile))?;

        assert!(capture.finish()?.is_empty());
        Ok(())
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn auto_feed_uses_a_pipe_with_procfs() -> Result<(), Box<dyn Error>> {
        let mut feed = Feed::open("piped", &Settings::default())?;
        assert_eq!(Strategy::Pipe, feed.strategy());

        let mut contents = String::new();
        fs::File::open(feed.path().expect("open feed has a path"))?.read_to_string(&mut contents)?;

        assert_eq!("piped", contents);
        feed.close()?;
        Ok(())
    }
}
