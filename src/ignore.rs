//! `.coderignore` handling.
//!
//! Patterns use gitignore syntax. A second, glob-based pass catches exact
//! folder names written without wildcards (`node_modules` vs. `node_modules/`),
//! which gitignore semantics treat differently for files and directories.

use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// Forbidden files and folders of a working directory.
#[derive(Debug, Clone)]
pub struct CoderIgnore {
    patterns: Vec<String>,
    matcher: Gitignore,
}

impl CoderIgnore {
    /// Read `{work_dir}/.clean_coder/.coderignore`. A missing file means no patterns.
    pub fn load(work_dir: &Path) -> Self {
        let path = coderignore_path(work_dir);
        let patterns = match std::fs::read_to_string(&path) {
            Ok(content) => parse_patterns(&content),
            Err(e) => {
                tracing::debug!("No .coderignore at {}: {}", path.display(), e);
                Vec::new()
            }
        };
        Self::from_patterns(work_dir, patterns)
    }

    /// Build a matcher from in-memory patterns rooted at `work_dir`.
    pub fn from_patterns(work_dir: &Path, patterns: Vec<String>) -> Self {
        let mut builder = GitignoreBuilder::new(work_dir);
        for pattern in &patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                tracing::warn!("Invalid .coderignore pattern '{}': {}", pattern, e);
            }
        }
        let matcher = builder.build().unwrap_or_else(|e| {
            tracing::warn!("Failed to build .coderignore matcher: {}", e);
            Gitignore::empty()
        });
        Self { patterns, matcher }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether a path relative to the working directory is forbidden.
    ///
    /// Accepts the forms models produce: `src/app.py`, `/src/app.py`,
    /// `./src/`, `.git`.
    pub fn is_ignored(&self, path: &str) -> bool {
        let path = normalize(path);
        if path.is_empty() {
            return false;
        }

        let rel = PathBuf::from(&path);
        if self.matcher.matched_path_or_any_parents(&rel, false).is_ignore()
            || self.matcher.matched_path_or_any_parents(&rel, true).is_ignore()
        {
            return true;
        }

        let dir_form = format!("{}/", path);
        self.patterns.iter().any(|pattern| {
            let pattern = pattern.trim_end_matches('/');
            fnmatch(pattern, &path) || fnmatch(&format!("{}/", pattern), &dir_form)
        })
    }
}

pub fn coderignore_path(work_dir: &Path) -> PathBuf {
    work_dir.join(".clean_coder").join(".coderignore")
}

fn parse_patterns(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|line| !line.starts_with('#'))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize(path: &str) -> String {
    let mut p = path.trim();
    loop {
        if let Some(rest) = p.strip_prefix("./") {
            p = rest;
        } else if let Some(rest) = p.strip_prefix('/') {
            p = rest;
        } else {
            break;
        }
    }
    p.trim_end_matches('/').to_string()
}

/// Shell-style match where `*` may also cross `/`, like Python's fnmatch.
fn fnmatch(pattern: &str, candidate: &str) -> bool {
    let options = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    glob::Pattern::new(pattern)
        .map(|p| p.matches_with(candidate, options))
        .unwrap_or(false)
}
