//! Credential file persistence.
//!
//! One JSON record at a configurable path, written atomically with
//! owner-only permissions. Loading fails soft: any I/O error or malformed
//! content reads as "no cached credential" so a corrupt file degrades to a
//! re-mint instead of a crash.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use sentinel_common::CredentialRecord;

const OWNER_ONLY: u32 = 0o600;

/// Loads the cached credential record.
///
/// Returns `None` for a missing file, unreadable file, or a body that is
/// not a credential record. Never errors.
#[must_use]
pub fn load(path: &Path) -> Option<CredentialRecord> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            if err.kind() != io::ErrorKind::NotFound {
                log::debug!("failed to read credential file {}: {err}", path.display());
            }
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(record) => Some(record),
        Err(err) => {
            log::debug!(
                "ignoring malformed credential file {}: {err}",
                path.display()
            );
            None
        }
    }
}

/// Persists a credential record.
///
/// Creates parent directories, writes formatted JSON to a `.tmp` sibling,
/// restricts it to owner read/write, renames it into place atomically, and
/// re-applies the permission restriction to the final path so the default
/// umask never exposes the key.
///
/// # Errors
///
/// Returns the underlying I/O error if any step fails.
pub fn save(path: &Path, record: &CredentialRecord) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let contents = serde_json::to_string_pretty(record).map_err(io::Error::other)?;
    let tmp_path = tmp_sibling(path);

    fs::write(&tmp_path, contents)?;
    fs::set_permissions(&tmp_path, fs::Permissions::from_mode(OWNER_ONLY))?;
    fs::rename(&tmp_path, path)?;
    fs::set_permissions(path, fs::Permissions::from_mode(OWNER_ONLY))?;

    log::debug!("saved credential record to {}", path.display());
    Ok(())
}

/// Removes the credential file.
///
/// Returns whether a file was actually deleted; a missing file is not an
/// error.
///
/// # Errors
///
/// Returns the underlying I/O error for failures other than absence.
pub fn remove(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(|| OsString::from("credentials.json"), OsString::from);
    name.push(".tmp");
    path.with_file_name(name)
}
