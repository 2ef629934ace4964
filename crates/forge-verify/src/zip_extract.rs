//! Library-assisted extraction check shared by the ZIP verifiers.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use zip::result::ZipError;
use zip::ZipArchive;

use crate::VerifyError;

/// Fully extract one entry with the `zip` crate to confirm a candidate that
/// passed the cheap verifier check.
///
/// ZipCrypto validates a single byte and WinZip AES two, so collisions reach
/// this point. Outcomes:
/// - the library rejects the password outright => `false`
/// - the decrypted stream fails mid-read (CRC or authentication mismatch on
///   colliding candidates) => `false`
/// - any other failure to open the archive or entry is swallowed and the
///   candidate accepted; the analyst verifies semantically
pub(crate) fn confirm_by_extraction(
    archive_path: &Path,
    entry_path: &str,
    password: &str,
    scratch_dir: &Path,
) -> Result<bool, VerifyError> {
    let file = File::open(archive_path).map_err(|source| VerifyError::Io {
        context: "zip archive",
        source,
    })?;
    let mut archive = match ZipArchive::new(file) {
        Ok(archive) => archive,
        Err(err) => {
            log::debug!("zip library could not reopen {archive_path:?}: {err}");
            return Ok(true);
        }
    };

    let mut entry = match archive.by_name_decrypt(entry_path, password.as_bytes()) {
        Ok(entry) => entry,
        Err(ZipError::InvalidPassword) => return Ok(false),
        Err(err) => {
            log::debug!("zip library could not open entry {entry_path:?}: {err}");
            return Ok(true);
        }
    };

    std::fs::create_dir_all(scratch_dir).map_err(|source| VerifyError::Io {
        context: "scratch directory",
        source,
    })?;
    let mut scratch = tempfile::tempfile_in(scratch_dir).map_err(|source| VerifyError::Io {
        context: "scratch file",
        source,
    })?;
    Ok(io::copy(&mut entry, &mut scratch).is_ok())
}

/// Extract one entry to `out_dir` for the decrypt-and-export hook.
pub(crate) fn extract_entry(
    archive_path: &Path,
    entry_path: &str,
    password: &str,
    out_dir: &Path,
) -> Result<PathBuf, VerifyError> {
    let file = File::open(archive_path).map_err(|source| VerifyError::Io {
        context: "zip archive",
        source,
    })?;
    let mut archive = ZipArchive::new(file)?;
    let mut entry = archive.by_name_decrypt(entry_path, password.as_bytes())?;

    let file_name = entry_path.rsplit('/').next().unwrap_or(entry_path);
    let out_path = out_dir.join(file_name);
    std::fs::create_dir_all(out_dir).map_err(|source| VerifyError::Io {
        context: "export directory",
        source,
    })?;
    let mut out = File::create(&out_path).map_err(|source| VerifyError::Io {
        context: "exported file",
        source,
    })?;
    io::copy(&mut entry, &mut out).map_err(|source| VerifyError::Io {
        context: "exported file",
        source,
    })?;
    Ok(out_path)
}
