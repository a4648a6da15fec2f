use std::{fs, path::Path, slice};

use clap::{ValueEnum, builder::PossibleValue};
use color_eyre::Result;
use mempipe::Settings;
use mempipe_env::SettingsVars;
use serde::{Deserialize, Serialize};
use strum::VariantArray;
use tracing::error;

pub mod known_paths;

pub use known_paths::KnownDirs;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Strategy(pub(crate) mempipe::Strategy);

impl ValueEnum for Strategy {
    fn value_variants<'a>() -> &'a [Self] {
        // SAFETY: slice of a transparent wrapper type of the same length.
        unsafe {
            slice::from_raw_parts(
                mempipe::Strategy::VARIANTS.as_ptr() as *const Self,
                mempipe::Strategy::VARIANTS.len(),
            )
        }
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(PossibleValue::new(<&'static str>::from(self.0)).help(self.0.description()))
    }
}

impl From<Strategy> for mempipe::Strategy {
    fn from(val: Strategy) -> Self {
        val.0
    }
}

#[derive(Debug, clap::Args, Serialize, Deserialize, Default, PartialEq)]
#[group(multiple = true)]
#[serde(default, rename_all = "kebab-case")]
pub struct Options {
    /// How buffers are exposed to programs.
    #[clap(long, help_heading = "Configuration")]
    pub(crate) strategy: Option<Strategy>,

    /// Where procfs is mounted.
    #[clap(long, help_heading = "Configuration", value_hint = clap::ValueHint::DirPath)]
    pub(crate) proc_root: Option<Box<Path>>,

    /// Directory for temporary files.
    #[clap(long, help_heading = "Configuration", value_hint = clap::ValueHint::DirPath)]
    pub(crate) temp_dir: Option<Box<Path>>,

    /// Pause between polls of an idle capture, in milliseconds.
    #[clap(long, help_heading = "Configuration")]
    pub(crate) poll_interval_ms: Option<u64>,

    /// Also write logs to this file.
    #[clap(long, help_heading = "Configuration", value_hint = clap::ValueHint::FilePath)]
    pub(crate) log_file: Option<Box<Path>>,
}

pub struct Config {
    pub options: Options,
    pub known_dirs: KnownDirs,
}

impl Config {
    pub fn settings(&self) -> Settings {
        self.options.settings()
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.options.log_file.as_deref()
    }
}

#[cfg(test)]
impl Config {
    /// Default configuration with a fixed strategy.
    pub(crate) fn with_strategy(strategy: mempipe::Strategy) -> Self {
        Self {
            options: Options {
                strategy: Some(Strategy(strategy)),
                ..Default::default()
            },
            known_dirs: KnownDirs::default(),
        }
    }
}

impl Options {
    pub fn merge(self, other: Self) -> Self {
        Self {
            strategy: other.strategy.or(self.strategy),
            proc_root: other.proc_root.or(self.proc_root),
            temp_dir: other.temp_dir.or(self.temp_dir),
            poll_interval_ms: other.poll_interval_ms.or(self.poll_interval_ms),
            log_file: other.log_file.or(self.log_file),
        }
    }

    pub fn settings(&self) -> Settings {
        Settings {
            strategy: self.strategy.map(Into::into),
            proc_root: self.proc_root.as_deref().map(Path::to_path_buf),
            temp_dir: self.temp_dir.as_deref().map(Path::to_path_buf),
            poll_interval_ms: self.poll_interval_ms,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let encoded_toml = fs::read_to_string(path)?;
        let toml = toml::from_str(&encoded_toml)?;

        Ok(toml)
    }

    pub fn from_files<P: AsRef<Path>>(files: impl IntoIterator<Item = P>) -> Options {
        let mut config = Options::default();

        for file in files.into_iter() {
            let path = file.as_ref();
            if !path.exists() {
                continue;
            }

            match Options::from_file(path) {
                Ok(item) => config = config.merge(item),
                Err(error) => {
                    error!(?path, ?error, "failed to load configuration")
                }
            }
        }

        config
    }

    /// Reads `MEMPIPE_*` overrides from the environment.
    pub fn from_env() -> Result<Self> {
        let vars: SettingsVars = mempipe_env::deserialize_from_env()?;

        Ok(Self {
            strategy: vars.strategy.map(Strategy),
            proc_root: vars.proc_root.map(Into::into),
            temp_dir: vars.temp_dir.map(Into::into),
            poll_interval_ms: vars.poll_interval_ms,
            log_file: None,
        })
    }
}
