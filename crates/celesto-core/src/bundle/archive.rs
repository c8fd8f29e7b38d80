//! Deterministic tar.gz bundle construction.
//!
//! The remote service consumes a gzip-compressed tar stream whose entry
//! names are relative to the deployed folder's root. Entry order follows
//! the sorted walk, timestamps are pinned to zero, and modes keep only the
//! permission bits, so identical folder content always produces identical
//! bundle bytes.

use std::fs;
use std::io;
use std::path::{Component, Path};

use flate2::Compression;
use flate2::write::GzEncoder;

use super::walker::{EntryKind, WalkEntry, walk_tree};
use crate::error::{CelestoError, CelestoResult};
use crate::ignore::RuleSet;

/// File name the bundle is uploaded under.
pub const BUNDLE_FILE_NAME: &str = "agent.tar.gz";

/// Build the deployable bundle for `root`, filtered by `rules`.
///
/// Any unreadable file aborts the whole build with an I/O failure; a
/// partially populated archive is never returned.
pub fn build_bundle(root: &Path, rules: &RuleSet) -> CelestoResult<Vec<u8>> {
    let entries = walk_tree(root, rules)?;
    archive_entries(root, &entries)
}

pub(crate) fn archive_entries(root: &Path, entries: &[WalkEntry]) -> CelestoResult<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for entry in entries.iter().filter(|e| e.kind == EntryKind::File) {
        ensure_bundle_path(entry)?;

        let meta =
            fs::metadata(&entry.abs_path).map_err(|err| CelestoError::io(&entry.abs_path, err))?;
        // One scoped read per entry: the file handle is released before the
        // next entry is opened.
        let data = fs::read(&entry.abs_path).map_err(|err| CelestoError::io(&entry.abs_path, err))?;

        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(file_mode(&meta));
        header.set_mtime(0);

        builder
            .append_data(&mut header, &entry.rel_path, data.as_slice())
            .map_err(|err| CelestoError::io(&entry.abs_path, err))?;
    }

    let encoder = builder
        .into_inner()
        .map_err(|err| CelestoError::io(root, err))?;
    encoder.finish().map_err(|err| CelestoError::io(root, err))
}

/// Reject entry names that would escape the bundle root on extraction.
fn ensure_bundle_path(entry: &WalkEntry) -> CelestoResult<()> {
    let path = Path::new(&entry.rel_path);
    if path.is_absolute() || entry.rel_path.starts_with('/') {
        return Err(CelestoError::io(
            &entry.abs_path,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "absolute paths are not allowed in bundles",
            ),
        ));
    }
    for component in path.components() {
        if matches!(component, Component::ParentDir | Component::Prefix(_)) {
            return Err(CelestoError::io(
                &entry.abs_path,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "path traversal is not allowed in bundles",
                ),
            ));
        }
    }
    Ok(())
}

/// Permission bits only: setuid/setgid/sticky never propagate into bundles.
#[cfg(unix)]
fn file_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn file_mode(_meta: &fs::Metadata) -> u32 {
    0o644
}
