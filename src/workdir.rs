//! The `.clean_coder` directory inside the working directory and helpers
//! that render project files for prompts.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::ignore::CoderIgnore;
use crate::util::join_paths;

pub const DOT_DIR: &str = ".clean_coder";

const DEFAULT_CODERIGNORE: &str = "\
.env
.git/
.idea/
.clean_coder/
.coderrules
node_modules/
__pycache__/
venv/
.venv/
*.pyc
*.log
";

/// Paths inside `{WORK_DIR}/.clean_coder`.
#[derive(Debug, Clone)]
pub struct DotDir {
    root: PathBuf,
}

impl DotDir {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            root: work_dir.join(DOT_DIR),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manager_messages(&self) -> PathBuf {
        self.root.join("manager_messages.json")
    }

    pub fn progress_description(&self) -> PathBuf {
        self.root.join("manager_progress_description.txt")
    }

    pub fn project_plan(&self) -> PathBuf {
        self.root.join("project_plan.txt")
    }

    pub fn coderignore(&self) -> PathBuf {
        self.root.join(".coderignore")
    }

    pub fn descriptions(&self) -> PathBuf {
        self.root.join("files_and_folders_descriptions")
    }

    pub fn lib_descriptions(&self) -> PathBuf {
        self.root.join("lib_documentation_descriptions")
    }

    pub fn vector_store(&self) -> PathBuf {
        self.root.join("chroma_base")
    }

    pub fn frontend_feedback_story(&self) -> PathBuf {
        self.root.join("frontend_feedback_story.txt")
    }

    pub fn screenshot_script(&self) -> PathBuf {
        self.root.join("screenshot_codes.py")
    }

    pub fn env_file(&self) -> PathBuf {
        self.root.join(".env")
    }
}

/// Create `.clean_coder` and a default `.coderignore` when missing.
pub fn set_up_dot_clean_coder_dir(work_dir: &Path) -> anyhow::Result<DotDir> {
    let dot = DotDir::new(work_dir);
    std::fs::create_dir_all(dot.root())?;
    let ignore_path = dot.coderignore();
    if !ignore_path.exists() {
        std::fs::write(&ignore_path, DEFAULT_CODERIGNORE)?;
        tracing::info!("Created {}", ignore_path.display());
    }
    Ok(dot)
}

/// Project rules from `{WORK_DIR}/.coderrules`; empty when absent.
pub fn read_coderrules(work_dir: &Path) -> String {
    std::fs::read_to_string(work_dir.join(".coderrules")).unwrap_or_default()
}

/// Indented tree of the working directory, skipping forbidden entries.
pub fn list_directory_tree(work_dir: &Path, ignore: &CoderIgnore) -> String {
    let mut out = String::from("Project tree:\n");
    let walker = WalkDir::new(work_dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry
                .path()
                .strip_prefix(work_dir)
                .map(|rel| !ignore.is_ignored(&rel.to_string_lossy()))
                .unwrap_or(false)
        });

    for entry in walker.filter_map(|e| e.ok()) {
        let indent = "    ".repeat(entry.depth().saturating_sub(1));
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() {
            out.push_str(&format!("{}{}/\n", indent, name));
        } else {
            out.push_str(&format!("{}{}\n", indent, name));
        }
    }
    out
}

/// Render files for a system prompt, optionally with line numbers.
pub fn check_file_contents(work_dir: &Path, files: &[String], line_numbers: bool) -> String {
    let mut out = String::new();
    for filename in files {
        let path = join_paths(work_dir, filename);
        let body = match std::fs::read_to_string(&path) {
            Ok(content) if line_numbers => content
                .lines()
                .enumerate()
                .map(|(i, line)| format!("{}|{}\n", i + 1, line))
                .collect::<String>(),
            Ok(content) => content,
            Err(e) => format!("<could not read file: {}>", e),
        };
        out.push_str(&format!("File: {}:\n\n{}\n\n", filename, body));
    }
    out
}

/// Read a text file, treating a missing file as `<empty>`.
pub fn read_or_empty_marker(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => content,
        _ => "<empty>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_up_creates_default_coderignore() {
        let dir = tempfile::tempdir().unwrap();
        let dot = set_up_dot_clean_coder_dir(dir.path()).unwrap();
        let content = std::fs::read_to_string(dot.coderignore()).unwrap();
        assert!(content.contains("node_modules/"));

        std::fs::write(dot.coderignore(), "custom\n").unwrap();
        set_up_dot_clean_coder_dir(dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(dot.coderignore()).unwrap(), "custom\n");
    }

    #[test]
    fn test_directory_tree_skips_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/react")).unwrap();
        std::fs::write(dir.path().join("src/app.py"), "print(1)\n").unwrap();
        std::fs::write(dir.path().join("node_modules/react/index.js"), "").unwrap();

        let ignore = CoderIgnore::from_patterns(dir.path(), vec!["node_modules/".to_string()]);
        let tree = list_directory_tree(dir.path(), &ignore);
        assert!(tree.contains("src/\n"));
        assert!(tree.contains("    app.py\n"));
        assert!(!tree.contains("node_modules"));
    }

    #[test]
    fn test_check_file_contents_numbers_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "x = 1\ny = 2\n").unwrap();
        let out = check_file_contents(dir.path(), &["a.py".to_string()], true);
        assert!(out.starts_with("File: a.py:\n\n1|x = 1\n2|y = 2\n"));
    }

    #[test]
    fn test_read_coderrules_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_coderrules(dir.path()), "");
    }
}
