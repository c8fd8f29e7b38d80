//! `.celestoignore` rule sets and path filtering.
//!
//! An ignore file is UTF-8 text, one gitignore-style pattern per line, with
//! one documented divergence: a `#` only starts an inline comment when it is
//! preceded by whitespace. Loading is deliberately lenient (a broken ignore
//! file downgrades to "no filtering" with a warning) while the archive step
//! downstream stays strict.

mod rule;

use std::path::Path;

pub use rule::IgnoreRule;

/// Default ignore-file name looked up in the folder being deployed.
pub const IGNORE_FILE_NAME: &str = ".celestoignore";

/// Ordered set of ignore rules from one ignore file.
///
/// Order is the file's authoring order; matching keeps the verdict of the
/// *last* rule that matches, which is what makes `!` negation work.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<IgnoreRule>,
}

impl RuleSet {
    /// An empty set that ignores nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse ignore-file text. Never fails: unparseable globs degrade to
    /// literal matches and comment/blank lines are skipped.
    pub fn parse(content: &str) -> Self {
        Self {
            rules: content.lines().filter_map(IgnoreRule::parse).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether `rel_path` is excluded.
    ///
    /// `rel_path` is relative to the traversal root, forward-slash
    /// separated, with no leading `./`. Pure function of the arguments; no
    /// filesystem access.
    ///
    /// A path under an excluded directory is excluded no matter what later
    /// rules say: gitignore gives no way to re-include children of an
    /// excluded directory.
    pub fn is_ignored(&self, rel_path: &str, is_dir: bool) -> bool {
        for (idx, _) in rel_path.match_indices('/') {
            if self.verdict(&rel_path[..idx], true) == Some(true) {
                return true;
            }
        }
        self.verdict(rel_path, is_dir).unwrap_or(false)
    }

    /// Last matching rule's verdict: `Some(true)` = ignore, `Some(false)` =
    /// re-included by negation, `None` = no rule matched.
    fn verdict(&self, rel_path: &str, is_dir: bool) -> Option<bool> {
        let mut verdict = None;
        for rule in &self.rules {
            if rule.matches(rel_path, is_dir) {
                verdict = Some(!rule.negated());
            }
        }
        verdict
    }
}

/// Result of loading an ignore file from disk.
#[derive(Debug)]
pub struct LoadedRules {
    pub rules: RuleSet,
    /// Set when the file exists but could not be used; the deployment
    /// proceeds unfiltered and the caller surfaces this to the user.
    pub warning: Option<String>,
}

/// Load ignore rules from `path`.
///
/// A missing file is not an error (no filtering applies). A file that is
/// unreadable or not valid UTF-8 disables filtering with a warning instead
/// of aborting: the ignore file is the one deliberately lenient boundary of
/// the deployment pipeline.
pub fn load_ignore_file(path: &Path) -> LoadedRules {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return LoadedRules {
                rules: RuleSet::empty(),
                warning: None,
            };
        }
        Err(err) => {
            let warning = format!(
                "ignore file {} could not be read ({err}); deploying unfiltered",
                path.display()
            );
            tracing::warn!("{warning}");
            return LoadedRules {
                rules: RuleSet::empty(),
                warning: Some(warning),
            };
        }
    };

    match String::from_utf8(bytes) {
        Ok(content) => LoadedRules {
            rules: RuleSet::parse(&content),
            warning: None,
        },
        Err(_) => {
            let warning = format!(
                "ignore file {} is not valid UTF-8; deploying unfiltered",
                path.display()
            );
            tracing::warn!("{warning}");
            LoadedRules {
                rules: RuleSet::empty(),
                warning: Some(warning),
            }
        }
    }
}
