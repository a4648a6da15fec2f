use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde_derive::{Deserialize, Serialize};

use crate::{
    error::{MempipeError, Result},
    fd_path::ProcFdResolver,
    strategy::Strategy,
    write::DEFAULT_IDLE_INTERVAL,
};

/// Tunables shared by every fake path the library hands out.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// How buffers are exposed, `auto` unless overridden.
    pub strategy: Option<Strategy>,

    /// Mount point of procfs, `/proc` unless overridden.
    pub proc_root: Option<PathBuf>,

    /// Directory for temporary files, the system default unless overridden.
    pub temp_dir: Option<PathBuf>,

    /// Pause between capture polls that found the pipe empty.
    pub poll_interval_ms: Option<u64>,
}

pub(crate) enum Backend {
    Pipe(ProcFdResolver),
    TempFile,
}

impl Settings {
    pub fn strategy(&self) -> Strategy {
        self.strategy.unwrap_or_default()
    }

    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_IDLE_INTERVAL)
    }

    /// The descriptor path resolver, if descriptor paths work here.
    pub fn resolver(&self) -> Option<ProcFdResolver> {
        match &self.proc_root {
            Some(root) => Some(ProcFdResolver::new(root)).filter(ProcFdResolver::is_available),
            None => ProcFdResolver::current().cloned(),
        }
    }

    /// Values set in `other` take precedence.
    pub fn merge(self, other: Self) -> Self {
        Self {
            strategy: other.strategy.or(self.strategy),
            proc_root: other.proc_root.or(self.proc_root),
            temp_dir: other.temp_dir.or(self.temp_dir),
            poll_interval_ms: other.poll_interval_ms.or(self.poll_interval_ms),
        }
    }

    pub(crate) fn backend(&self) -> Result<Backend> {
        match (self.strategy(), self.resolver()) {
            (Strategy::Auto | Strategy::Pipe, Some(resolver)) => Ok(Backend::Pipe(resolver)),
            (Strategy::Pipe, None) => Err(MempipeError::Unsupported),
            (Strategy::Auto, None) | (Strategy::TempFile, _) => Ok(Backend::TempFile),
        }
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, path::PathBuf, time::Duration};

    use super::{Backend, Settings};
    use crate::{error::MempipeError, strategy::Strategy};

    #[test]
    fn later_settings_win() {
        let base = Settings {
            strategy: Some(Strategy::Pipe),
            temp_dir: Some(PathBuf::from("/base")),
            ..Default::default()
        };
        let overrides = Settings {
            temp_dir: Some(PathBuf::from("/override")),
            poll_interval_ms: Some(5),
            ..Default::default()
        };

        let merged = base.merge(overrides);

        assert_eq!(Strategy::Pipe, merged.strategy());
        assert_eq!(Some(PathBuf::from("/override")), merged.temp_dir);
        assert_eq!(Duration::from_millis(5), merged.poll_interval());
    }

    #[test]
    fn parses_kebab_case_toml() -> Result<(), Box<dyn Error>> {
        let settings: Settings = toml::from_str(
            r#"
            strategy = "temp-file"
            temp-dir = "/var/tmp"
            poll-interval-ms = 10
            "#,
        )?;

        assert_eq!(Strategy::TempFile, settings.strategy());
        assert_eq!(Some(PathBuf::from("/var/tmp")), settings.temp_dir);
        assert_eq!(None, settings.proc_root);
        Ok(())
    }

    #[test]
    fn auto_falls_back_to_temp_files_without_procfs() -> Result<(), Box<dyn Error>> {
        let proc_root = assert_fs::TempDir::new()?;
        let settings = Settings {
            proc_root: Some(proc_root.path().to_path_buf()),
            ..Default::default()
        };

        assert!(matches!(settings.backend()?, Backend::TempFile));
        Ok(())
    }

    #[test]
    fn forced_pipe_without_procfs_is_unsupported() -> Result<(), Box<dyn Error>> {
        let proc_root = assert_fs::TempDir::new()?;
        let settings = Settings {
            strategy: Some(Strategy::Pipe),
            proc_root: Some(proc_root.path().to_path_buf()),
            ..Default::default()
        };

        assert!(matches!(settings.backend(), Err(MempipeError::Unsupported)));
        Ok(())
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn auto_prefers_pipes_with_procfs() -> Result<(), Box<dyn Error>> {
        assert!(matches!(Settings::default().backend()?, Backend::Pipe(_)));
        Ok(())
    }
}
