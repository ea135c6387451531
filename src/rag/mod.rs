//! Semantic file search.
//!
//! Files are described by an LLM, the descriptions are embedded into a
//! [`VectorCollection`] and queries are answered by [`Retriever`], which
//! re-ranks the nearest descriptions with a binary relevance check.

pub mod describe;
pub mod embed;
pub mod index;
pub mod retrieval;
pub mod splitter;
pub mod store;

use std::path::Path;

pub use describe::{collect_file_paths, Describer};
pub use embed::{Embedder, EmbeddingClient};
pub use index::{prompt_index_project_files, upload_descriptions_to_vdb, upsert_file_list, ProjectIndex};
pub use retrieval::{BinaryRanker, Retriever, NO_RELEVANT_DOCUMENTS};
pub use store::{QueryResult, VectorCollection};

use crate::config::work_dir_name;

/// Collection holding the descriptions of the project's own files.
pub fn file_descriptions_collection(work_dir: &Path) -> String {
    format!("clean_coder_{}_file_descriptions", work_dir_name(work_dir))
}

/// Collection holding the descriptions of harvested library sources.
pub fn lib_documentation_collection(work_dir: &Path) -> String {
    format!(
        "clean_coder_{}_lib_documentation_descriptions",
        work_dir_name(work_dir)
    )
}
