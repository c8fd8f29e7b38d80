//! Bundle construction: filtered walk plus deterministic tar.gz archive.

mod archive;
mod walker;

pub use archive::{BUNDLE_FILE_NAME, build_bundle};
pub use walker::{EntryKind, WalkEntry, walk_tree};
