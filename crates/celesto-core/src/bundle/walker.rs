//! Filtered directory traversal for bundle construction.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CelestoError, CelestoResult};
use crate::ignore::RuleSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// One filesystem entry surviving the ignore filter.
#[derive(Debug, Clone)]
pub struct WalkEntry {
    /// Path relative to the walk root: forward slashes, no leading `./`.
    pub rel_path: String,
    /// Absolute path for reading content.
    pub abs_path: PathBuf,
    pub kind: EntryKind,
}

/// Walk `root` depth-first and return the entries the rule set keeps.
///
/// Directories are filtered *before* descent, so an ignored directory's
/// subtree is never visited at all. Children are sorted by name within each
/// directory, which makes the output order (and therefore the archive
/// bytes) reproducible.
pub fn walk_tree(root: &Path, rules: &RuleSet) -> CelestoResult<Vec<WalkEntry>> {
    let mut entries = Vec::new();
    walk_dir(root, "", rules, &mut entries)?;
    Ok(entries)
}

fn walk_dir(
    dir: &Path,
    base: &str,
    rules: &RuleSet,
    out: &mut Vec<WalkEntry>,
) -> CelestoResult<()> {
    let reader = fs::read_dir(dir).map_err(|err| CelestoError::io(dir, err))?;
    let mut children: Vec<_> = reader
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| CelestoError::io(dir, err))?;
    children.sort_by_key(|entry| entry.file_name());

    for child in children {
        let name = child.file_name();
        let Some(name) = name.to_str() else {
            tracing::debug!(
                path = %child.path().display(),
                "skipping entry with a non-UTF-8 name"
            );
            continue;
        };
        let rel_path = if base.is_empty() {
            name.to_string()
        } else {
            format!("{base}/{name}")
        };

        // Type the entry without dereferencing, so a symlink cycle can
        // never recurse.
        let meta = match fs::symlink_metadata(child.path()) {
            Ok(meta) => meta,
            Err(err) => {
                tracing::debug!(
                    path = %child.path().display(),
                    error = %err,
                    "skipping entry that cannot be statted"
                );
                continue;
            }
        };

        if meta.is_dir() {
            if rules.is_ignored(&rel_path, true) {
                continue;
            }
            out.push(WalkEntry {
                rel_path: rel_path.clone(),
                abs_path: child.path(),
                kind: EntryKind::Dir,
            });
            walk_dir(&child.path(), &rel_path, rules, out)?;
        } else if meta.is_file() {
            if rules.is_ignored(&rel_path, false) {
                continue;
            }
            out.push(WalkEntry {
                rel_path,
                abs_path: child.path(),
                kind: EntryKind::File,
            });
        } else if meta.file_type().is_symlink() {
            // A link to a regular file is bundled by content; anything else
            // (broken links, directory links) is omitted, never fatal.
            match fs::metadata(child.path()) {
                Ok(target) if target.is_file() => {
                    if rules.is_ignored(&rel_path, false) {
                        continue;
                    }
                    out.push(WalkEntry {
                        rel_path,
                        abs_path: child.path(),
                        kind: EntryKind::File,
                    });
                }
                Ok(_) => {
                    tracing::debug!(
                        path = %child.path().display(),
                        "skipping symlink to a non-file target"
                    );
                }
                Err(err) => {
                    tracing::debug!(
                        path = %child.path().display(),
                        error = %err,
                        "skipping symlink with an unreadable target"
                    );
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create_dir_all should succeed in test temp dirs");
        }
        fs::write(path, content).expect("write should succeed in test temp dirs");
    }

    fn rel_paths(entries: &[WalkEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.rel_path.as_str()).collect()
    }

    #[test]
    fn walk_is_sorted_and_depth_first() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp.path().join("b.txt"), "b");
        write_file(&tmp.path().join("a").join("z.txt"), "z");
        write_file(&tmp.path().join("a").join("c.txt"), "c");

        let entries = walk_tree(tmp.path(), &RuleSet::empty()).unwrap();
        assert_eq!(rel_paths(&entries), vec!["a", "a/c.txt", "a/z.txt", "b.txt"]);
        assert_eq!(entries[0].kind, EntryKind::Dir);
        assert_eq!(entries[1].kind, EntryKind::File);
    }

    #[test]
    fn ignored_directory_is_never_descended() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp.path().join("keep.py"), "k");
        write_file(&tmp.path().join("skip").join("inner.py"), "i");
        write_file(&tmp.path().join("skip").join("deep").join("deeper.py"), "d");

        let rules = RuleSet::parse("skip/");
        let entries = walk_tree(tmp.path(), &rules).unwrap();
        assert_eq!(rel_paths(&entries), vec!["keep.py"]);
    }

    #[test]
    fn negated_rule_cannot_resurrect_pruned_subtree() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp.path().join("skip").join("wanted.py"), "w");

        let rules = RuleSet::parse("skip/\n!skip/wanted.py");
        let entries = walk_tree(tmp.path(), &rules).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn dotfiles_are_walked() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp.path().join(".env"), "SECRET=1");
        write_file(&tmp.path().join("main.py"), "pass");

        let entries = walk_tree(tmp.path(), &RuleSet::empty()).unwrap();
        assert_eq!(rel_paths(&entries), vec![".env", "main.py"]);
    }

    #[test]
    fn missing_root_is_an_io_error() {
        let tmp = TempDir::new().unwrap();
        let result = walk_tree(&tmp.path().join("absent"), &RuleSet::empty());
        assert!(matches!(result, Err(CelestoError::Io { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_cycle_terminates_and_is_omitted() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp.path().join("sub").join("real.txt"), "r");
        std::os::unix::fs::symlink(tmp.path(), tmp.path().join("sub").join("loop")).unwrap();

        let entries = walk_tree(tmp.path(), &RuleSet::empty()).unwrap();
        assert_eq!(rel_paths(&entries), vec!["sub", "sub/real.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn broken_symlink_is_omitted_not_fatal() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp.path().join("ok.txt"), "ok");
        std::os::unix::fs::symlink(tmp.path().join("gone"), tmp.path().join("dangling")).unwrap();

        let entries = walk_tree(tmp.path(), &RuleSet::empty()).unwrap();
        assert_eq!(rel_paths(&entries), vec!["ok.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn file_symlink_is_bundled_as_a_file() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp.path().join("target.txt"), "t");
        std::os::unix::fs::symlink(tmp.path().join("target.txt"), tmp.path().join("alias.txt"))
            .unwrap();

        let entries = walk_tree(tmp.path(), &RuleSet::empty()).unwrap();
        assert_eq!(rel_paths(&entries), vec!["alias.txt", "target.txt"]);
        assert!(entries.iter().all(|e| e.kind == EntryKind::File));
    }
}
