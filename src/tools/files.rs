//! Read-only file tools: list a directory, see a file.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{str_arg, Tool};
use crate::ignore::CoderIgnore;
use crate::util::join_paths;

/// List the entries of one directory.
pub struct ListDir {
    ignore: Arc<CoderIgnore>,
}

impl ListDir {
    pub fn new(ignore: Arc<CoderIgnore>) -> Self {
        Self { ignore }
    }
}

#[async_trait]
impl Tool for ListDir {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List files in directory. Use only for dirs content of which is hidden in the project tree."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "Directory to list files in."
                }
            },
            "required": ["directory"]
        })
    }

    async fn execute(&self, args: Value, working_dir: &Path) -> anyhow::Result<String> {
        let directory = str_arg(&args, "directory")?;
        if self.ignore.is_ignored(directory) {
            return Ok(format!(
                "You are not allowed to work with directory {}.",
                directory
            ));
        }

        let mut entries = match tokio::fs::read_dir(join_paths(working_dir, directory)).await {
            Ok(entries) => entries,
            Err(e) => return Ok(format!("Error: {}", e)),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();

        Ok(format!(
            "Content of directory {}:\n{}",
            directory,
            names.join("\n")
        ))
    }
}

/// Show a file with line numbers on both sides of each line.
pub struct SeeFile {
    ignore: Arc<CoderIgnore>,
}

impl SeeFile {
    pub fn new(ignore: Arc<CoderIgnore>) -> Self {
        Self { ignore }
    }
}

/// `{filename}:\n\n` followed by `N|line|N` rows.
pub fn format_numbered(filename: &str, content: &str) -> String {
    let mut out = format!("{}:\n\n", filename);
    for (i, line) in content.lines().enumerate() {
        out.push_str(&format!("{}|{}|{}\n", i + 1, line, i + 1));
    }
    out
}

#[async_trait]
impl Tool for SeeFile {
    fn name(&self) -> &str {
        "see_file"
    }

    fn description(&self) -> &str {
        "Check contents of file."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filename": {
                    "type": "string",
                    "description": "Name and path of file to check."
                }
            },
            "required": ["filename"]
        })
    }

    async fn execute(&self, args: Value, working_dir: &Path) -> anyhow::Result<String> {
        let filename = str_arg(&args, "filename")?;
        if self.ignore.is_ignored(filename) {
            return Ok(format!("You are not allowed to work with {}.", filename));
        }

        match tokio::fs::read_to_string(join_paths(working_dir, filename)).await {
            Ok(content) => Ok(format_numbered(filename, &content)),
            Err(e) => Ok(format!("Error: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, Arc<CoderIgnore>) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("src/app.py"), "a = 1\nb = 2\n").unwrap();
        std::fs::write(dir.path().join("src/util.py"), "").unwrap();
        std::fs::write(dir.path().join(".env"), "SECRET=1\n").unwrap();
        let ignore = Arc::new(CoderIgnore::from_patterns(
            dir.path(),
            vec![".env".to_string(), "node_modules/".to_string()],
        ));
        (dir, ignore)
    }

    #[tokio::test]
    async fn test_see_file_format() {
        let (dir, ignore) = setup();
        let out = SeeFile::new(ignore)
            .execute(json!({"filename": "/src/app.py"}), dir.path())
            .await
            .unwrap();
        assert_eq!(out, "/src/app.py:\n\n1|a = 1|1\n2|b = 2|2\n");
    }

    #[tokio::test]
    async fn test_see_file_refuses_ignored() {
        let (dir, ignore) = setup();
        let out = SeeFile::new(ignore)
            .execute(json!({"filename": ".env"}), dir.path())
            .await
            .unwrap();
        assert_eq!(out, "You are not allowed to work with .env.");
    }

    #[tokio::test]
    async fn test_see_file_missing_is_text_error() {
        let (dir, ignore) = setup();
        let out = SeeFile::new(ignore)
            .execute(json!({"filename": "nope.py"}), dir.path())
            .await
            .unwrap();
        assert!(out.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_list_dir() {
        let (dir, ignore) = setup();
        let tool = ListDir::new(ignore);
        let out = tool
            .execute(json!({"directory": "src"}), dir.path())
            .await
            .unwrap();
        assert_eq!(out, "Content of directory src:\napp.py\nutil.py");

        let denied = tool
            .execute(json!({"directory": "node_modules/"}), dir.path())
            .await
            .unwrap();
        assert_eq!(
            denied,
            "You are not allowed to work with directory node_modules/."
        );
    }
}
