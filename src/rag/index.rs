//! Building and refreshing the description collection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::describe::{collect_file_paths, description_id, description_stem, Describer};
use super::embed::Embedder;
use super::store::VectorCollection;
use crate::human::HumanInput;
use crate::ignore::CoderIgnore;
use crate::llm::LlmChain;
use crate::workdir::{read_coderrules, DotDir};

const UPLOAD_BATCH_SIZE: usize = 100;

/// Upload every description in `descriptions_dir`, `UPLOAD_BATCH_SIZE` at a time.
pub async fn upload_descriptions_to_vdb(
    descriptions_dir: &Path,
    collection: &VectorCollection,
) -> anyhow::Result<usize> {
    println!("Uploading file descriptions to vector storage...");
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(descriptions_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".txt") && entry.file_type().await?.is_file() {
            names.push(name);
        }
    }
    names.sort();

    let mut uploaded = 0;
    for batch in names.chunks(UPLOAD_BATCH_SIZE) {
        let mut ids = Vec::with_capacity(batch.len());
        let mut docs = Vec::with_capacity(batch.len());
        for name in batch {
            docs.push(tokio::fs::read_to_string(descriptions_dir.join(name)).await?);
            ids.push(description_id(name));
        }
        collection.upsert(&ids, &docs).await?;
        uploaded += ids.len();
    }
    tracing::info!(collection = collection.name(), "Uploaded {} descriptions", uploaded);
    Ok(uploaded)
}

/// Upsert the stored descriptions (whole file and chunks) of `files`.
pub async fn upsert_file_list(
    files: &[String],
    descriptions_dir: &Path,
    collection: &VectorCollection,
) -> anyhow::Result<usize> {
    let mut ids = Vec::new();
    let mut docs = Vec::new();
    for file in files {
        let stem = glob::Pattern::escape(&description_stem(file));
        let pattern = descriptions_dir.join(format!("{}*", stem));
        for path in glob::glob(&pattern.to_string_lossy())?.filter_map(Result::ok) {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            docs.push(tokio::fs::read_to_string(&path).await?);
            ids.push(description_id(&name));
        }
    }
    collection.upsert(&ids, &docs).await?;
    println!("Re-indexing of modified files completed.");
    Ok(ids.len())
}

/// Content hashes of the files described so far.
#[derive(Debug, Default)]
struct IndexManifest {
    hashes: HashMap<String, String>,
}

fn file_hash(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    Some(hex::encode(Sha256::digest(&bytes)))
}

impl IndexManifest {
    fn load(path: &Path) -> Self {
        let hashes = std::fs::read(path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default();
        Self { hashes }
    }

    fn save(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, serde_json::to_vec_pretty(&self.hashes)?)?;
        Ok(())
    }

    /// Files whose content differs from the last described version.
    fn changed(&self, root: &Path, files: &[String]) -> Vec<String> {
        files
            .iter()
            .filter(|f| match file_hash(&root.join(f.trim_start_matches('/'))) {
                Some(hash) => self.hashes.get(f.as_str()) != Some(&hash),
                None => false,
            })
            .cloned()
            .collect()
    }

    fn record(&mut self, root: &Path, files: &[String]) {
        for file in files {
            if let Some(hash) = file_hash(&root.join(file.trim_start_matches('/'))) {
                self.hashes.insert(file.clone(), hash);
            }
        }
    }
}

/// Descriptions on disk plus the collection they are uploaded to.
pub struct ProjectIndex {
    describer: Describer,
    collection: Arc<VectorCollection>,
    root: PathBuf,
    manifest_path: PathBuf,
}

impl ProjectIndex {
    pub fn new(
        describer: Describer,
        collection: Arc<VectorCollection>,
        root: impl Into<PathBuf>,
        manifest_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            describer,
            collection,
            root: root.into(),
            manifest_path: manifest_path.into(),
        }
    }

    /// Index of the working directory's own files.
    pub async fn for_work_dir(
        work_dir: &Path,
        llm: LlmChain,
        embedder: Arc<dyn Embedder>,
    ) -> anyhow::Result<Self> {
        let dot = DotDir::new(work_dir);
        let collection = VectorCollection::get_or_create(
            &dot.vector_store(),
            &super::file_descriptions_collection(work_dir),
            embedder,
        )
        .await?;
        let describer = Describer::new(llm, work_dir, dot.descriptions(), read_coderrules(work_dir));
        Ok(Self::new(
            describer,
            Arc::new(collection),
            work_dir,
            dot.root().join("index_manifest.json"),
        ))
    }

    pub fn collection(&self) -> Arc<VectorCollection> {
        self.collection.clone()
    }

    /// Describe `files` from scratch and upload all descriptions.
    pub async fn write_and_index_descriptions(&self, files: &[String]) -> anyhow::Result<()> {
        self.describer.write_file_descriptions(files).await?;
        self.describer.write_file_chunks_descriptions(files).await?;
        upload_descriptions_to_vdb(self.describer.descriptions_dir(), &self.collection).await?;

        let mut manifest = IndexManifest::load(&self.manifest_path);
        manifest.record(&self.root, files);
        manifest.save(&self.manifest_path)
    }

    /// Re-describe and re-upload files that changed since they were last
    /// described. Returns the files that were refreshed.
    pub async fn update_descriptions(&self, files: &[String]) -> anyhow::Result<Vec<String>> {
        let mut manifest = IndexManifest::load(&self.manifest_path);
        let changed = manifest.changed(&self.root, files);
        if changed.is_empty() {
            return Ok(changed);
        }

        self.describer.write_file_descriptions(&changed).await?;
        self.describer.write_file_chunks_descriptions(&changed).await?;
        upsert_file_list(&changed, self.describer.descriptions_dir(), &self.collection).await?;

        manifest.record(&self.root, &changed);
        manifest.save(&self.manifest_path)?;
        Ok(changed)
    }
}

/// Offer to index the project when no collection exists yet.
pub async fn prompt_index_project_files(
    human: &dyn HumanInput,
    work_dir: &Path,
    ignore: &CoderIgnore,
    llm: LlmChain,
    embedder: Option<Arc<dyn Embedder>>,
) -> anyhow::Result<()> {
    let dot = DotDir::new(work_dir);
    if VectorCollection::exists(&dot.vector_store(), &super::file_descriptions_collection(work_dir)) {
        return Ok(());
    }
    let Some(embedder) = embedder else {
        tracing::info!("No embedding provider configured, file search index is disabled");
        return Ok(());
    };

    let choice = human
        .choose(
            "Do you want to index your project files for improving file search?\nHint: Skip for testing Clean Coder; index for real projects.",
            &["Proceed", "Skip"],
        )
        .await?;
    if choice != 0 {
        return Ok(());
    }

    let files = collect_file_paths(work_dir, ignore);
    let choice = human
        .choose(
            &format!(
                "Going to index {} files. Indexing could be time-consuming and costly. Are you ready to go?\nHint: Ensure you provided all files and directories you don't want to index in {}/.clean_coder/.coderignore to avoid describing trashy files.",
                files.len(),
                work_dir.display()
            ),
            &["Index", "Skip"],
        )
        .await?;
    if choice != 0 {
        return Ok(());
    }

    let index = ProjectIndex::for_work_dir(work_dir, llm, embedder).await?;
    index.write_and_index_descriptions(&files).await
}
