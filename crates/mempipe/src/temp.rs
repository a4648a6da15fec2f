//! Real temporary files, for programs that need to seek or `stat` their input.

use std::{
    fs::{self, File},
    mem,
    os::unix::fs::MetadataExt,
    path::Path,
};

use memmap::MmapOptions;
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

use crate::error::{MempipeError, Resource, Result};

const TEMP_PREFIX: &str = "mempipe-";

/// Which directions of a [`TempPassthrough`] are of interest. Defaults to
/// [`Access::READ`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Access {
    /// Populate the file with the buffer before handing out the path.
    pub read: bool,

    /// Collect the file contents into the buffer when closing.
    pub write: bool,
}

impl Access {
    pub const READ: Access = Access::new(true, false);
    pub const WRITE: Access = Access::new(false, true);
    pub const READ_WRITE: Access = Access::new(true, true);

    pub const fn new(read: bool, write: bool) -> Self {
        Self { read, write }
    }
}

impl Default for Access {
    fn default() -> Self {
        Self::READ
    }
}

/// A buffer passed through a real, named temporary file.
///
/// The file is deleted when closed. With [`Access::write`], the contents the
/// file ends up with replace the buffer, unless the file is empty: an empty
/// file leaves the buffer as it was.
#[derive(Debug)]
pub struct TempPassthrough {
    data: Box<[u8]>,
    access: Access,
    file: Option<NamedTempFile>,
}

impl TempPassthrough {
    pub fn open<D: Into<Vec<u8>>>(data: D, access: Access) -> Result<Self> {
        Self::create(data.into(), access, |builder| builder.tempfile())
    }

    pub fn open_in<P: AsRef<Path>, D: Into<Vec<u8>>>(dir: P, data: D, access: Access) -> Result<Self> {
        Self::create(data.into(), access, |builder| builder.tempfile_in(dir))
    }

    fn create<F>(data: Vec<u8>, access: Access, make: F) -> Result<Self>
    where
        F: FnOnce(&Builder) -> std::io::Result<NamedTempFile>,
    {
        if !access.read && !access.write {
            return Err(MempipeError::InvalidArgument(
                "temp file passthrough needs read, write, or both",
            ));
        }

        let file = make(Builder::new().prefix(TEMP_PREFIX).rand_bytes(6))
            .map_err(MempipeError::exhausted(Resource::TempFile))?;

        if access.read {
            populate(file.as_file(), &data)?;
        }

        debug!(path = ?file.path(), ?access, len = data.len(), "opened temp file passthrough");

        Ok(Self {
            data: data.into_boxed_slice(),
            access,
            file: Some(file),
        })
    }

    pub fn access(&self) -> Access {
        self.access
    }

    /// Path to hand to the external program. `None` once closed.
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(NamedTempFile::path)
    }

    pub fn file(&self) -> Option<&File> {
        self.file.as_ref().map(NamedTempFile::as_file)
    }

    /// Size of the file as reported by `stat`.
    pub fn len(&self) -> Result<u64> {
        let Some(path) = self.path() else {
            return Ok(0);
        };

        Ok(fs::metadata(path)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Harvests the file (with [`Access::write`]) and deletes it.
    ///
    /// The file is deleted even when harvesting fails. Calling this again is
    /// a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };

        let harvested = if self.access.write {
            harvest(&file)
        } else {
            Ok(None)
        };

        let path = file.path().to_path_buf();
        if let Err(error) = file.close() {
            warn!(?path, %error, "failed to delete temp file");
        }

        // An empty file keeps whatever the buffer held before.
        if let Some(data) = harvested? {
            self.data = data;
        }

        debug!(?path, len = self.data.len(), "closed temp file passthrough");
        Ok(())
    }

    pub fn into_data(mut self) -> Result<Box<[u8]>> {
        self.close()?;
        Ok(mem::take(&mut self.data))
    }
}

impl Drop for TempPassthrough {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            warn!(%error, "failed to harvest temp file");
        }
    }
}

fn populate(file: &File, data: &[u8]) -> Result<()> {
    file.set_len(data.len() as u64)?;

    if data.is_empty() {
        return Ok(());
    }

    // SAFETY: the file was just created by us and nobody else knows its path
    // yet, so it cannot shrink underneath the mapping.
    let mut mapping = unsafe { MmapOptions::new().len(data.len()).map_mut(file) }
        .map_err(MempipeError::exhausted(Resource::Mapping))?;

    mapping.copy_from_slice(data);
    mapping.flush()?;

    Ok(())
}

/// Reads back the file behind `temp`, following the path if the external
/// program replaced the file instead of writing into it.
fn harvest(temp: &NamedTempFile) -> Result<Option<Box<[u8]>>> {
    let on_disk = fs::metadata(temp.path())?;
    let held = temp.as_file().metadata()?;

    let replaced = (on_disk.dev(), on_disk.ino()) != (held.dev(), held.ino());
    let file = if replaced {
        debug!(path = ?temp.path(), "temp file was replaced, reading the new one");
        File::open(temp.path())?
    } else {
        temp.as_file().try_clone()?
    };

    let len = file.metadata()?.len() as usize;
    if len == 0 {
        return Ok(None);
    }

    // SAFETY: the external program is done with the file by the time the
    // caller closes the passthrough.
    let mapping = unsafe { MmapOptions::new().len(len).map(&file) }
        .map_err(MempipeError::exhausted(Resource::Mapping))?;

    Ok(Some(Box::from(&mapping[..])))
}
