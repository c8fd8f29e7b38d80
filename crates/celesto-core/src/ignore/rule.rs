//! Compilation of single `.celestoignore` lines.

use globset::{GlobBuilder, GlobMatcher};

/// One compiled rule from a non-comment, non-empty line of an ignore file.
///
/// Rules are immutable once compiled; matching state lives entirely in the
/// [`RuleSet`](super::RuleSet) that owns them.
#[derive(Debug)]
pub struct IgnoreRule {
    pattern: String,
    negated: bool,
    dir_only: bool,
    anchored: bool,
    matcher: Matcher,
}

#[derive(Debug)]
enum Matcher {
    Glob(GlobMatcher),
    /// Fallback for patterns globset refuses to compile. Ignore files are
    /// user-authored and must never abort a deployment, so a malformed glob
    /// degrades to an exact string comparison.
    Literal(String),
}

impl IgnoreRule {
    /// Parse one raw line of ignore-file text.
    ///
    /// Returns `None` for blank lines and comments. A `#` whose first
    /// non-whitespace position starts the line is a full-line comment; a `#`
    /// preceded by whitespace starts an inline comment; a `#` anywhere else
    /// is a literal character. This matches the documented `.celestoignore`
    /// behavior rather than canonical gitignore.
    pub(crate) fn parse(line: &str) -> Option<Self> {
        if line.trim_start().starts_with('#') {
            return None;
        }

        let line = strip_inline_comment(line);
        let mut pattern = line.trim_end();
        if pattern.is_empty() {
            return None;
        }

        let mut negated = false;
        if pattern.starts_with("\\#") || pattern.starts_with("\\!") {
            // A leading backslash escapes a literal '#' or '!'.
            pattern = &pattern[1..];
        } else if let Some(rest) = pattern.strip_prefix('!') {
            negated = true;
            pattern = rest;
        }

        let mut dir_only = false;
        if let Some(rest) = pattern.strip_suffix('/') {
            dir_only = true;
            pattern = rest;
        }

        let mut anchored = false;
        if let Some(rest) = pattern.strip_prefix('/') {
            anchored = true;
            pattern = rest;
        }
        anchored = anchored || pattern.contains('/');

        if pattern.is_empty() {
            return None;
        }

        Some(Self {
            pattern: pattern.to_string(),
            negated,
            dir_only,
            anchored,
            matcher: compile(pattern),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn negated(&self) -> bool {
        self.negated
    }

    pub fn dir_only(&self) -> bool {
        self.dir_only
    }

    pub fn anchored(&self) -> bool {
        self.anchored
    }

    /// Whether this rule applies to `rel_path`.
    ///
    /// Anchored rules are matched against the whole path from the traversal
    /// root; unanchored rules match the basename at any depth.
    pub(crate) fn matches(&self, rel_path: &str, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        let candidate = if self.anchored {
            rel_path
        } else {
            basename(rel_path)
        };
        match &self.matcher {
            Matcher::Glob(glob) => glob.is_match(candidate),
            Matcher::Literal(text) => candidate == text,
        }
    }
}

/// Truncate at the first `#` preceded by whitespace. A `#` with no
/// whitespace before it stays part of the pattern.
fn strip_inline_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    for i in 1..bytes.len() {
        if bytes[i] == b'#' && (bytes[i - 1] == b' ' || bytes[i - 1] == b'\t') {
            return &line[..i];
        }
    }
    line
}

fn compile(pattern: &str) -> Matcher {
    // literal_separator keeps '*' and '?' from crossing '/' while '**'
    // still spans directories, per gitignore glob semantics.
    match GlobBuilder::new(pattern).literal_separator(true).build() {
        Ok(glob) => Matcher::Glob(glob.compile_matcher()),
        Err(_) => Matcher::Literal(pattern.to_string()),
    }
}

fn basename(rel_path: &str) -> &str {
    rel_path.rsplit('/').next().unwrap_or(rel_path)
}
