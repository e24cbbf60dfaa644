//! Create-once file persistence.
//!
//! Artifacts are written to a temporary file next to their final path,
//! synced, and renamed into place without clobbering. A crash mid-write
//! leaves at most a stray temporary file; the final path either does not
//! exist or holds the complete contents.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};

/// Permission class of a persisted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Owner read/write only (private keys).
    Private,
    /// World readable (certificates, chains).
    Public,
}

impl FileMode {
    #[cfg(unix)]
    const fn bits(self) -> u32 {
        match self {
            Self::Private => 0o600,
            Self::Public => 0o644,
        }
    }
}

/// Writes `contents` to `path`, failing if `path` already exists.
///
/// # Errors
///
/// Returns [`Error::Io`] if the temporary file cannot be written or the
/// rename fails, including when another file appeared at `path` meanwhile.
pub fn write_new(path: &Path, contents: &[u8], mode: FileMode) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::Builder::new()
        .prefix(".home-ca-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| Error::io(dir, e))?;

    write_and_sync(&mut tmp, contents, mode).map_err(|e| Error::io(tmp.path(), e))?;

    tmp.persist_noclobber(path)
        .map_err(|e| Error::io(path, e.error))?;

    debug!(path = %path.display(), bytes = contents.len(), "persisted artifact");
    Ok(())
}

fn write_and_sync(tmp: &mut NamedTempFile, contents: &[u8], mode: FileMode) -> std::io::Result<()> {
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(mode.bits()))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}
