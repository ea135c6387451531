//! Persisted manager conversation.
//!
//! The system prompt is rebuilt on every start, so only the messages after
//! it are stored.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::ChatMessage;

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointSnapshot {
    saved_at: DateTime<Utc>,
    messages: Vec<ChatMessage>,
}

/// JSON checkpoint of a conversation.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Store everything but the leading system message.
    pub async fn save(&self, messages: &[ChatMessage]) -> anyhow::Result<()> {
        let snapshot = CheckpointSnapshot {
            saved_at: Utc::now(),
            messages: messages.iter().skip(1).cloned().collect(),
        };
        let data = serde_json::to_vec_pretty(&snapshot)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, data).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        tracing::debug!(
            "Saved {} messages to {}",
            snapshot.messages.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Stored messages, or `None` when there is no usable checkpoint.
    pub async fn load(&self) -> Option<Vec<ChatMessage>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!("Failed to read checkpoint {}: {}", self.path.display(), err);
                return None;
            }
        };
        match serde_json::from_slice::<CheckpointSnapshot>(&bytes) {
            Ok(snapshot) => {
                tracing::info!(
                    "Resuming conversation saved at {} ({} messages)",
                    snapshot.saved_at,
                    snapshot.messages.len()
                );
                Some(snapshot.messages)
            }
            Err(e) => {
                tracing::warn!("Failed to parse checkpoint {}: {}", self.path.display(), e);
                None
            }
        }
    }
}
