// src/filesystem.rs

//! Filesystem side of install and remove
//!
//! Artifacts are staged in a temporary file next to their destination, made
//! executable, and renamed into place in one step, so a failed copy never
//! leaves a half-written file at the installed location.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Mode given to every installed artifact
pub const INSTALL_MODE: u32 = 0o775;

/// Size of the blocks streamed from source to destination
pub const COPY_BLOCK_SIZE: usize = 64 * 1024;

/// Open the install source, failing before anything is mutated
pub fn open_source(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| Error::SourceMissing {
        path: path.display().to_string(),
        source,
    })
}

/// A fully written, executable copy waiting to be renamed into place
pub struct StagedFile {
    temp: NamedTempFile,
    pub sha256: String,
    pub size: u64,
}

impl StagedFile {
    /// Atomically move the staged copy to `destination`
    pub fn commit(self, destination: &Path) -> Result<()> {
        self.temp
            .persist(destination)
            .map_err(|e| Error::Filesystem {
                path: destination.display().to_string(),
                source: e.error,
            })?;
        debug!("Renamed staged file into {}", destination.display());
        Ok(())
    }
}

/// Copy `source` into a temporary file beside `destination`
///
/// The copy is hashed as it streams and gets [`INSTALL_MODE`] before this
/// returns. The temporary file is deleted if the `StagedFile` is dropped
/// without being committed.
pub fn stage<R: Read>(source: R, destination: &Path) -> Result<StagedFile> {
    let dir = destination
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let fs_error = |source| Error::Filesystem {
        path: destination.display().to_string(),
        source,
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(fs_error)?;
    debug!("Staging {} via {}", destination.display(), temp.path().display());

    let (sha256, size) = copy_hashed(source, temp.as_file_mut()).map_err(fs_error)?;
    temp.as_file_mut().flush().map_err(fs_error)?;
    temp.as_file().sync_all().map_err(fs_error)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(fs::Permissions::from_mode(INSTALL_MODE))
            .map_err(fs_error)?;
    }

    Ok(StagedFile { temp, sha256, size })
}

/// Unlink an installed artifact
pub fn remove(location: &Path) -> Result<()> {
    fs::remove_file(location).map_err(|source| Error::Filesystem {
        path: location.display().to_string(),
        source,
    })
}

/// SHA-256 of a file, as lowercase hex
pub fn hash_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|source| Error::Filesystem {
        path: path.display().to_string(),
        source,
    })?;
    let (sha256, _) = copy_hashed(BufReader::new(file), std::io::sink())?;
    Ok(sha256)
}

/// Stream `reader` into `writer` in fixed blocks, hashing on the way
fn copy_hashed<R: Read, W: Write>(mut reader: R, mut writer: W) -> std::io::Result<(String, u64)> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; COPY_BLOCK_SIZE];
    let mut total = 0u64;

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..read]);
        writer.write_all(&buffer[..read])?;
        total += read as u64;
    }

    Ok((format!("{:x}", hasher.finalize()), total))
}
