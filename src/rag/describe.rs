//! LLM-written descriptions of project files and file chunks.
//!
//! Descriptions are stored one per file under the descriptions directory,
//! named after the relative path with `/` replaced by `=`. Chunk
//! descriptions add a `_chunk{n}` suffix.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use walkdir::WalkDir;

use super::splitter::split_code;
use crate::ignore::CoderIgnore;
use crate::llm::{ChatMessage, LlmChain};
use crate::prompts::{fill, DESCRIBE_FILE, DESCRIBE_FILE_CHUNK};

/// Files with these extensions are described and indexed.
pub const CODE_EXTENSIONS: &[&str] = &[
    "js", "jsx", "ts", "tsx", "vue", "py", "rb", "php", "java", "c", "cpp", "cs", "go", "swift",
    "kt", "rs", "htm", "html", "css", "scss", "sass", "less", "prompt",
];

const DESCRIBE_BATCH_SIZE: usize = 8;

pub fn is_code_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| CODE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Relative (`/`-separated) paths of all describable, non-ignored files.
pub fn collect_file_paths(root: &Path, ignore: &CoderIgnore) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let rel = relative_posix(root, entry.path());
            !ignore.is_ignored(&rel)
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_code_file(entry.path()))
        .map(|entry| relative_posix(root, entry.path()))
        .collect();
    files.sort();
    files
}

fn relative_posix(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Description file stem for a relative path: `src/app.py` → `src=app.py`.
pub fn description_stem(rel_path: &str) -> String {
    rel_path.trim_start_matches('/').replace('/', "=")
}

/// Collection id for a description file name: `src=app.py.txt` → `src/app.py`.
pub fn description_id(file_name: &str) -> String {
    file_name
        .strip_suffix(".txt")
        .unwrap_or(file_name)
        .replace('=', "/")
}

fn progress_bar(len: usize, label: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "{msg}: {percent:>3}%|{bar:40.yellow/magenta}| {pos}/{len} files [{elapsed_precise}<{eta}]",
    ) {
        bar.set_style(style);
    }
    bar.set_message(label.to_string());
    bar
}

/// Writes descriptions of files under `root` into `descriptions_dir`.
pub struct Describer {
    llm: LlmChain,
    root: PathBuf,
    descriptions_dir: PathBuf,
    coderrules: String,
    show_progress: bool,
}

impl Describer {
    pub fn new(
        llm: LlmChain,
        root: impl Into<PathBuf>,
        descriptions_dir: impl Into<PathBuf>,
        coderrules: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            root: root.into(),
            descriptions_dir: descriptions_dir.into(),
            coderrules: coderrules.into(),
            show_progress: true,
        }
    }

    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    pub fn descriptions_dir(&self) -> &Path {
        &self.descriptions_dir
    }

    /// File name on top of its content.
    async fn file_content(&self, rel_path: &str) -> anyhow::Result<String> {
        let path = self.root.join(rel_path);
        let content = tokio::fs::read_to_string(&path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(format!("{}\n\n{}", name, content))
    }

    async fn write_description(&self, stem: &str, description: &str) -> anyhow::Result<()> {
        let path = self.descriptions_dir.join(format!("{}.txt", stem));
        tokio::fs::write(path, description).await?;
        Ok(())
    }

    /// Describe whole files, `DESCRIBE_BATCH_SIZE` at a time. Returns the
    /// number of descriptions written.
    pub async fn write_file_descriptions(&self, files: &[String]) -> anyhow::Result<usize> {
        tokio::fs::create_dir_all(&self.descriptions_dir).await?;
        let bar = progress_bar(files.len(), "[1/2]Describing files", self.show_progress);
        let mut written = 0;

        for batch in files.chunks(DESCRIBE_BATCH_SIZE) {
            let mut described = Vec::with_capacity(batch.len());
            let mut conversations = Vec::with_capacity(batch.len());
            for rel_path in batch {
                match self.file_content(rel_path).await {
                    Ok(code) => {
                        let prompt = fill(
                            DESCRIBE_FILE,
                            &[("coderrules", &self.coderrules), ("code", &code)],
                        );
                        conversations.push(vec![ChatMessage::user(prompt)]);
                        described.push(rel_path);
                    }
                    Err(e) => tracing::warn!("Skipping {}: {}", rel_path, e),
                }
            }

            let responses = self.llm.batch(conversations).await;
            for (rel_path, response) in described.into_iter().zip(responses) {
                match response {
                    Ok(response) => {
                        let text = response.content.unwrap_or_default();
                        self.write_description(&description_stem(rel_path), &text)
                            .await?;
                        written += 1;
                    }
                    Err(e) => tracing::warn!("Failed to describe {}: {}", rel_path, e),
                }
            }
            bar.inc(batch.len() as u64);
        }

        bar.finish();
        Ok(written)
    }

    /// Describe every chunk of files that split into more than one chunk.
    pub async fn write_file_chunks_descriptions(&self, files: &[String]) -> anyhow::Result<usize> {
        tokio::fs::create_dir_all(&self.descriptions_dir).await?;
        let bar = progress_bar(files.len(), "[2/2]Describing file chunks", self.show_progress);
        let mut written = 0;

        for rel_path in files {
            bar.inc(1);
            let file_code = match self.file_content(rel_path).await {
                Ok(code) => code,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", rel_path, e);
                    continue;
                }
            };
            let extension = Path::new(rel_path)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            let chunks = split_code(&file_code, extension);
            if chunks.len() <= 1 {
                continue;
            }

            let conversations = chunks
                .iter()
                .map(|chunk| {
                    vec![ChatMessage::user(fill(
                        DESCRIBE_FILE_CHUNK,
                        &[
                            ("coderrules", &self.coderrules),
                            ("file_code", &file_code),
                            ("chunk_code", chunk),
                        ],
                    ))]
                })
                .collect();
            let responses = self.llm.batch(conversations).await;
            for (nr, response) in responses.into_iter().enumerate() {
                match response {
                    Ok(response) => {
                        let stem = format!("{}_chunk{}", description_stem(rel_path), nr);
                        self.write_description(&stem, &response.content.unwrap_or_default())
                            .await?;
                        written += 1;
                    }
                    Err(e) => tracing::warn!("Failed to describe chunk {} of {}: {}", nr, rel_path, e),
                }
            }
        }

        bar.finish();
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedLlm;
    use crate::llm::ChatResponse;
    use std::sync::Arc;

    #[test]
    fn test_description_names_roundtrip() {
        assert_eq!(description_stem("src/app.py"), "src=app.py");
        assert_eq!(description_id("src=app.py.txt"), "src/app.py");
        assert_eq!(description_id("src=app.py_chunk2.txt"), "src/app.py_chunk2");
    }

    #[test]
    fn test_collect_file_paths_respects_ignore_and_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/components")).unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/lib")).unwrap();
        std::fs::write(dir.path().join("src/app.py"), "").unwrap();
        std::fs::write(dir.path().join("src/components/Nav.VUE"), "").unwrap();
        std::fs::write(dir.path().join("src/notes.md"), "").unwrap();
        std::fs::write(dir.path().join("node_modules/lib/index.js"), "").unwrap();
        let ignore = CoderIgnore::from_patterns(dir.path(), vec!["node_modules/".to_string()]);

        let files = collect_file_paths(dir.path(), &ignore);
        assert_eq!(files, vec!["src/app.py", "src/components/Nav.VUE"]);
    }

    #[tokio::test]
    async fn test_write_file_descriptions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/app.py"), "print('hi')\n").unwrap();
        std::fs::write(dir.path().join("main.py"), "import src.app\n").unwrap();

        let llm = Arc::new(ScriptedLlm::new("mini").with_responder(|messages| {
            let prompt = messages[0].text_content().unwrap_or_default();
            let described = if prompt.contains("app.py\n\nprint") { "app" } else { "main" };
            ChatResponse {
                content: Some(format!("Describes {}", described)),
                ..Default::default()
            }
        }));
        let descriptions = dir.path().join(".clean_coder/files_and_folders_descriptions");
        let describer = Describer::new(ScriptedLlm::chain(&llm), dir.path(), &descriptions, "")
            .without_progress();

        let written = describer
            .write_file_descriptions(&["src/app.py".to_string(), "main.py".to_string()])
            .await
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(
            std::fs::read_to_string(descriptions.join("src=app.py.txt")).unwrap(),
            "Describes app"
        );
        assert_eq!(
            std::fs::read_to_string(descriptions.join("main.py.txt")).unwrap(),
            "Describes main"
        );
    }

    #[tokio::test]
    async fn test_chunk_descriptions_only_for_multi_chunk_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut big = String::new();
        for f in 0..3 {
            big.push_str(&format!("def function_{}():\n", f));
            for i in 0..40 {
                big.push_str(&format!("    value_{} = compute_something_long({})\n", i, i));
            }
        }
        std::fs::write(dir.path().join("big.py"), &big).unwrap();
        std::fs::write(dir.path().join("small.py"), "x = 1\n").unwrap();

        let llm = Arc::new(ScriptedLlm::new("mini").with_responder(|_| ChatResponse {
            content: Some("chunk".to_string()),
            ..Default::default()
        }));
        let descriptions = dir.path().join("descriptions");
        let describer = Describer::new(ScriptedLlm::chain(&llm), dir.path(), &descriptions, "")
            .without_progress();
        let written = describer
            .write_file_chunks_descriptions(&["big.py".to_string(), "small.py".to_string()])
            .await
            .unwrap();

        assert!(written >= 2);
        assert!(descriptions.join("big.py_chunk0.txt").exists());
        assert!(!descriptions.join("small.py_chunk0.txt").exists());
    }
}
