use std::path::{Path, PathBuf};

use directories::ProjectDirs;

#[derive(Debug)]
pub struct KnownDirs {
    /// The current working directory we launched from.
    cwd: Option<Box<Path>>,

    /// Linux installation prefix (defaults to /)
    #[cfg(target_os = "linux")]
    prefix: Option<Box<Path>>,

    project_dirs: Option<ProjectDirs>,
}

pub trait OptionalPathExt {
    fn join<P>(&self, path: P) -> Option<Box<Path>>
    where
        P: AsRef<Path>;
}

impl<S: AsRef<Path>> OptionalPathExt for Option<S> {
    fn join<P>(&self, path: P) -> Option<Box<Path>>
    where
        P: AsRef<Path>,
    {
        self.as_ref()
            .map(|parent| parent.as_ref().join(path).into_boxed_path())
    }
}

const PROJECT_QUALIFIER: &str = "org";
const PROJECT_ORG: &str = "mempipe";
const PROJECT_NAME: &str = "mempipe";

pub const CONFIG_FILE_NAME: &str = "mempipe.toml";

impl Default for KnownDirs {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir()
                .map(PathBuf::into_boxed_path)
                .ok(),
            #[cfg(target_os = "linux")]
            prefix: Some(Box::from(Path::new("/"))),
            project_dirs: ProjectDirs::from(PROJECT_QUALIFIER, PROJECT_ORG, PROJECT_NAME),
        }
    }
}

impl KnownDirs {
    /// Discover the candidate paths to mempipe configuration directories, ordered from least
    /// priority to highest.
    ///
    /// These can be one of the following:
    ///
    /// - $PREFIX/etc/mempipe (Linux)
    /// - $XDG_CONFIG_DIR:=$HOME/.config/mempipe
    /// - ./
    pub fn config_dirs(&self) -> impl Iterator<Item = Box<Path>> {
        let config_dirs = [
            #[cfg(target_os = "linux")]
            self.prefix.join("etc/mempipe"),
            self.project_dirs
                .as_ref()
                .map(|proj| Box::from(proj.config_local_dir())),
            self.cwd.clone(),
        ];

        config_dirs.into_iter().flatten()
    }

    pub fn config_files(&self) -> impl Iterator<Item = Box<Path>> {
        self.config_dirs()
            .map(|dir| dir.join(CONFIG_FILE_NAME).into_boxed_path())
    }
}
