// ABOUTME: Packs a single local file into an in-memory tar archive.
// ABOUTME: Name, mode and size are preserved; the daemon extracts it into a directory.

use crate::error::UploadError;
use bytes::Bytes;
use std::fs::{File, Metadata};
use std::io;
use std::path::Path;

#[cfg(unix)]
fn file_mode(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(meta: &Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// Open `path` for archiving.
pub(crate) fn open_file(path: &Path) -> Result<File, UploadError> {
    File::open(path).map_err(|source| UploadError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Build a one-entry uncompressed archive holding the already opened `file`
/// under the file name of `path`.
pub(crate) fn archive_file(file: File, path: &Path) -> Result<Bytes, UploadError> {
    let stat_err = |source| UploadError::Stat {
        path: path.to_path_buf(),
        source,
    };
    let meta = file.metadata().map_err(stat_err)?;
    if !meta.is_file() {
        return Err(stat_err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    let name = path
        .file_name()
        .ok_or_else(|| stat_err(io::Error::new(io::ErrorKind::InvalidInput, "no file name")))?;

    let archive_err = |source| UploadError::Archive {
        path: path.to_path_buf(),
        source,
    };

    let mut header = tar::Header::new_gnu();
    header.set_path(name).map_err(archive_err)?;
    header.set_size(meta.len());
    header.set_mode(file_mode(&meta));
    header.set_cksum();

    let mut builder = tar::Builder::new(Vec::new());
    builder.append(&header, file).map_err(archive_err)?;
    let archive = builder.into_inner().map_err(archive_err)?;

    Ok(Bytes::from(archive))
}
