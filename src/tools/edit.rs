//! Editing tools: insert, replace and create.
//!
//! Each edit is applied to an in-memory copy first; a new file is checked
//! as written. The result must pass
//! [`check_syntax`](crate::syntax::check_syntax) and then be approved by the
//! human before anything touches the disk.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{str_arg, usize_arg, Tool};
use crate::human::{is_approval, HumanInput};
use crate::ignore::CoderIgnore;
use crate::syntax::{check_syntax, VALID_SYNTAX};
use crate::util::{join_paths, WRONG_TOOL_CALL_WORD};

/// Asked before any change is written.
pub const APPROVAL_PROMPT: &str =
    "Never accept changes you don't understand. Type (o)k if you accept or provide commentary. ";

const SYNTAX_ERROR_INSERT_CODE: &str = "
Changes can cause next error: {error_response}. Probably you:
- Provided a wrong line number to insert code, or
- Forgot to add an indents on beginning of code.
Please analyze which place is correct to introduce the code before calling a tool.
";

const SYNTAX_ERROR_MODIFY_CODE: &str = "
Changes can cause next error: {error_response}. Probably you:
- Provided a wrong end or beginning line number, or
- Forgot to add an indents on beginning of code.
Think step by step which function/code block you want to change before proposing improved change.
";

const SYNTAX_ERROR_CREATE_FILE: &str = "
File content can cause next error: {error_response}. Probably you:
- Left a bracket, tag or block without its closing part, or
- Mixed up indentation.
Review the whole file before calling the tool again.
";

/// Lines of `content`, each keeping its `\n`.
fn split_lines_keep_ends(content: &str) -> Vec<String> {
    content.split_inclusive('\n').map(str::to_string).collect()
}

/// Insert `code` as a new line after line `after_line` (0 = top of file).
pub fn insert_lines(content: &str, after_line: usize, code: &str) -> String {
    let mut lines = split_lines_keep_ends(content);
    let at = after_line.min(lines.len());
    lines.insert(at, format!("{}\n", code));
    lines.concat()
}

/// Replace lines `start_line..=end_line` (1-based) with `code`.
pub fn replace_lines(content: &str, start_line: usize, end_line: usize, code: &str) -> String {
    let mut lines = split_lines_keep_ends(content);
    let start = start_line.saturating_sub(1).min(lines.len());
    let end = end_line.clamp(start, lines.len());
    lines.splice(start..end, std::iter::once(format!("{}\n", code)));
    lines.concat()
}

/// Wrong-tool-call message when `content` fails the syntax check.
fn syntax_rejection(content: &str, filename: &str, error_template: &str) -> Option<String> {
    let syntax = check_syntax(content, filename);
    if syntax == VALID_SYNTAX {
        return None;
    }
    tracing::info!("Wrong syntax provided for {}, asking to correct: {}", filename, syntax);
    Some(format!(
        "{}{}",
        WRONG_TOOL_CALL_WORD,
        error_template.replace("{error_response}", &syntax)
    ))
}

/// Shared tail of insert/replace: syntax check, approval, write.
async fn check_approve_write(
    human: &dyn HumanInput,
    path: &Path,
    filename: &str,
    new_content: String,
    error_template: &str,
    success: &str,
) -> anyhow::Result<String> {
    if let Some(rejection) = syntax_rejection(&new_content, filename, error_template) {
        return Ok(rejection);
    }

    let answer = human.ask(APPROVAL_PROMPT).await?;
    if !is_approval(&answer) {
        return Ok(format!("Human: {}", answer));
    }

    if let Err(e) = tokio::fs::write(path, new_content).await {
        return Ok(format!("Error: {}", e));
    }
    tracing::debug!("Wrote {}", path.display());
    Ok(success.to_string())
}

/// Insert new code after a given line.
pub struct InsertCode {
    ignore: Arc<CoderIgnore>,
    human: Arc<dyn HumanInput>,
}

impl InsertCode {
    pub fn new(ignore: Arc<CoderIgnore>, human: Arc<dyn HumanInput>) -> Self {
        Self { ignore, human }
    }
}

#[async_trait]
impl Tool for InsertCode {
    fn name(&self) -> &str {
        "insert_code"
    }

    fn description(&self) -> &str {
        "Insert new piece of code into provided file. Use when new code need to be added without replacing old one.\nProper indentation is important."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filename": {
                    "type": "string",
                    "description": "Name and path of file to change."
                },
                "start_line": {
                    "type": "integer",
                    "description": "Line number to insert new code after."
                },
                "code": {
                    "type": "string",
                    "description": "Code to insert into the file. Without backticks around. Start it with appropriate indentation if needed."
                }
            },
            "required": ["filename", "start_line", "code"]
        })
    }

    async fn execute(&self, args: Value, working_dir: &Path) -> anyhow::Result<String> {
        let filename = str_arg(&args, "filename")?;
        let start_line = usize_arg(&args, "start_line")?;
        let code = str_arg(&args, "code")?;
        if self.ignore.is_ignored(filename) {
            return Ok(format!("You are not allowed to work with {}.", filename));
        }

        let path = join_paths(working_dir, filename);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => return Ok(format!("Error: {}", e)),
        };

        check_approve_write(
            self.human.as_ref(),
            &path,
            filename,
            insert_lines(&content, start_line, code),
            SYNTAX_ERROR_INSERT_CODE,
            "Code inserted.",
        )
        .await
    }
}

/// Replace an inclusive line range with new code.
pub struct ReplaceCode {
    ignore: Arc<CoderIgnore>,
    human: Arc<dyn HumanInput>,
}

impl ReplaceCode {
    pub fn new(ignore: Arc<CoderIgnore>, human: Arc<dyn HumanInput>) -> Self {
        Self { ignore, human }
    }
}

#[async_trait]
impl Tool for ReplaceCode {
    fn name(&self) -> &str {
        "replace_code"
    }

    fn description(&self) -> &str {
        "Replace old piece of code between start_line and end_line with new one. Proper indentation is important.\nExchange entire functions or code blocks at once. Avoid changing functions partially."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filename": {
                    "type": "string",
                    "description": "Name and path of file to change."
                },
                "start_line": {
                    "type": "integer",
                    "description": "Start line number to replace (inclusive)."
                },
                "code": {
                    "type": "string",
                    "description": "New piece of code to replace old one. Without backticks around. Start it with appropriate indentation if needed."
                },
                "end_line": {
                    "type": "integer",
                    "description": "End line number to replace (inclusive)."
                }
            },
            "required": ["filename", "start_line", "code", "end_line"]
        })
    }

    async fn execute(&self, args: Value, working_dir: &Path) -> anyhow::Result<String> {
        let filename = str_arg(&args, "filename")?;
        let start_line = usize_arg(&args, "start_line")?;
        let end_line = usize_arg(&args, "end_line")?;
        let code = str_arg(&args, "code")?;
        if self.ignore.is_ignored(filename) {
            return Ok(format!("You are not allowed to work with {}.", filename));
        }

        let path = join_paths(working_dir, filename);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => return Ok(format!("Error: {}", e)),
        };

        check_approve_write(
            self.human.as_ref(),
            &path,
            filename,
            replace_lines(&content, start_line, end_line, code),
            SYNTAX_ERROR_MODIFY_CODE,
            "Code modified.",
        )
        .await
    }
}

/// Create a new file, making parent directories as needed.
pub struct CreateFileWithCode {
    ignore: Arc<CoderIgnore>,
    human: Arc<dyn HumanInput>,
}

impl CreateFileWithCode {
    pub fn new(ignore: Arc<CoderIgnore>, human: Arc<dyn HumanInput>) -> Self {
        Self { ignore, human }
    }
}

#[async_trait]
impl Tool for CreateFileWithCode {
    fn name(&self) -> &str {
        "create_file_with_code"
    }

    fn description(&self) -> &str {
        "Create new file with provided code. If you need to create directory, all directories in provided path will be\nautomatically created.\nDo not write files longer than 1000 words. If you need to create big files, start small, and next add new functions\nwith another tools."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filename": {
                    "type": "string",
                    "description": "Name and path of file to create."
                },
                "code": {
                    "type": "string",
                    "description": "Code to write in the file."
                }
            },
            "required": ["filename", "code"]
        })
    }

    async fn execute(&self, args: Value, working_dir: &Path) -> anyhow::Result<String> {
        let filename = str_arg(&args, "filename")?;
        let code = str_arg(&args, "code")?;
        if self.ignore.is_ignored(filename) {
            return Ok(format!("You are not allowed to work with {}.", filename));
        }
        if let Some(rejection) = syntax_rejection(code, filename, SYNTAX_ERROR_CREATE_FILE) {
            return Ok(rejection);
        }

        let answer = self.human.ask(APPROVAL_PROMPT).await?;
        if !is_approval(&answer) {
            return Ok(format!("Human: {}", answer));
        }

        let path = join_paths(working_dir, filename);
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Ok(format!("Error: {}", e));
            }
        }
        if let Err(e) = tokio::fs::write(&path, code).await {
            return Ok(format!("Error: {}", e));
        }
        Ok("File been created successfully.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::human::ScriptedInput;

    fn setup(answers: &[&str]) -> (tempfile::TempDir, Arc<CoderIgnore>, Arc<ScriptedInput>) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("app.py"),
            "def main():\n    a = 1\n    return a\n",
        )
        .unwrap();
        let ignore = Arc::new(CoderIgnore::from_patterns(
            dir.path(),
            vec![".env".to_string()],
        ));
        let human = Arc::new(ScriptedInput::new(answers.iter().copied()));
        (dir, ignore, human)
    }

    const BUTTON_VUE: &str =
        "<template>\n<div>Click</div>\n</template>\n<script>\nexport default { name: 'Button' }\n</script>\n";

    fn read(dir: &tempfile::TempDir, name: &str) -> String {
        std::fs::read_to_string(dir.path().join(name)).unwrap()
    }

    #[test]
    fn test_line_helpers() {
        let content = "a\nb\nc\n";
        assert_eq!(insert_lines(content, 0, "x"), "x\na\nb\nc\n");
        assert_eq!(insert_lines(content, 2, "x"), "a\nb\nx\nc\n");
        assert_eq!(insert_lines(content, 99, "x"), "a\nb\nc\nx\n");
        assert_eq!(replace_lines(content, 2, 3, "y"), "a\ny\n");
        assert_eq!(replace_lines(content, 1, 1, "y"), "y\nb\nc\n");
    }

    #[tokio::test]
    async fn test_insert_code_approved() {
        let (dir, ignore, human) = setup(&["ok"]);
        let tool = InsertCode::new(ignore, human.clone());
        let out = tool
            .execute(
                json!({"filename": "app.py", "start_line": 2, "code": "    b = 2"}),
                dir.path(),
            )
            .await
            .unwrap();
        assert_eq!(out, "Code inserted.");
        assert_eq!(
            read(&dir, "app.py"),
            "def main():\n    a = 1\n    b = 2\n    return a\n"
        );
        assert_eq!(human.prompts(), vec![APPROVAL_PROMPT]);
    }

    #[tokio::test]
    async fn test_insert_code_syntax_error_does_not_ask_or_write() {
        let (dir, ignore, human) = setup(&[]);
        let tool = InsertCode::new(ignore, human.clone());
        let out = tool
            .execute(
                json!({"filename": "app.py", "start_line": 1, "code": "    x = (1"}),
                dir.path(),
            )
            .await
            .unwrap();
        assert!(out.starts_with(WRONG_TOOL_CALL_WORD));
        assert!(out.contains("Provided a wrong line number to insert code"));
        assert!(human.prompts().is_empty());
        assert_eq!(read(&dir, "app.py"), "def main():\n    a = 1\n    return a\n");
    }

    #[tokio::test]
    async fn test_replace_code_rejected_keeps_file() {
        let (dir, ignore, human) = setup(&["use a constant instead"]);
        let tool = ReplaceCode::new(ignore, human);
        let out = tool
            .execute(
                json!({"filename": "app.py", "start_line": 2, "end_line": 2, "code": "    a = 2"}),
                dir.path(),
            )
            .await
            .unwrap();
        assert_eq!(out, "Human: use a constant instead");
        assert_eq!(read(&dir, "app.py"), "def main():\n    a = 1\n    return a\n");
    }

    #[tokio::test]
    async fn test_replace_code_approved() {
        let (dir, ignore, human) = setup(&["o"]);
        let tool = ReplaceCode::new(ignore, human);
        let out = tool
            .execute(
                json!({"filename": "app.py", "start_line": 2, "end_line": 3, "code": "    return 2"}),
                dir.path(),
            )
            .await
            .unwrap();
        assert_eq!(out, "Code modified.");
        assert_eq!(read(&dir, "app.py"), "def main():\n    return 2\n");
    }

    #[tokio::test]
    async fn test_replace_code_syntax_template() {
        let (dir, ignore, human) = setup(&[]);
        let tool = ReplaceCode::new(ignore, human);
        let out = tool
            .execute(
                json!({"filename": "app.py", "start_line": 1, "end_line": 1, "code": "def main(:"}),
                dir.path(),
            )
            .await
            .unwrap();
        assert!(out.starts_with(WRONG_TOOL_CALL_WORD));
        assert!(out.contains("Provided a wrong end or beginning line number"));
    }

    #[tokio::test]
    async fn test_create_file_makes_directories() {
        let (dir, ignore, human) = setup(&["ok"]);
        let tool = CreateFileWithCode::new(ignore, human);
        let out = tool
            .execute(
                json!({"filename": "/src/components/Button.vue", "code": BUTTON_VUE}),
                dir.path(),
            )
            .await
            .unwrap();
        assert_eq!(out, "File been created successfully.");
        assert_eq!(read(&dir, "src/components/Button.vue"), BUTTON_VUE);
    }

    #[tokio::test]
    async fn test_create_file_syntax_error_does_not_ask_or_write() {
        let (dir, ignore, human) = setup(&["ok"]);
        let tool = CreateFileWithCode::new(ignore, human.clone());
        let out = tool
            .execute(
                json!({"filename": "broken.py", "code": "def f(:\n    return (1\n"}),
                dir.path(),
            )
            .await
            .unwrap();
        assert!(out.starts_with(WRONG_TOOL_CALL_WORD), "{}", out);
        assert!(out.contains("Syntax Error"));
        assert!(out.contains("Review the whole file"));
        assert!(human.prompts().is_empty());
        assert_eq!(human.remaining(), 1);
        assert!(!dir.path().join("broken.py").exists());
    }

    #[tokio::test]
    async fn test_edit_tools_refuse_ignored_paths() {
        let (dir, ignore, human) = setup(&[]);
        let tool = CreateFileWithCode::new(ignore, human.clone());
        let out = tool
            .execute(json!({"filename": ".env", "code": "X=1"}), dir.path())
            .await
            .unwrap();
        assert_eq!(out, "You are not allowed to work with .env.");
        assert!(human.prompts().is_empty());
        assert!(!dir.path().join(".env").exists());
    }
}
