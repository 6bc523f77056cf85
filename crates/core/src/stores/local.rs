use crate::embeddings::{cosine_similarity, Embedder};
use crate::models::{ChunkMetadata, ChunkRecord, RetrievedChunk};
use crate::traits::{ChunkInserter, ChunkRetriever};
use crate::SearchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const META_FILE: &str = "collection.json";
const RECORDS_FILE: &str = "records.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectionMeta {
    name: String,
    embedding_model: String,
    dimensions: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    id: String,
    document: String,
    metadata: ChunkMetadata,
    embedding: Vec<f32>,
}

struct CollectionState {
    meta: CollectionMeta,
    records: Vec<StoredRecord>,
    ids: HashSet<String>,
}

/// Collection persisted as `<root>/<name>/collection.json` plus an append-only
/// `records.jsonl`. Nearest-neighbour search is an exact cosine scan.
pub struct LocalCollection {
    name: String,
    dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    state: Mutex<CollectionState>,
}

impl LocalCollection {
    /// Opens the named collection under `root`, creating directories and metadata as needed.
    pub async fn open(
        root: &Path,
        name: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, SearchError> {
        validate_name(name)?;

        let dir = root.join(name);
        fs::create_dir_all(&dir).await?;

        let model_id = embedder.model_id();
        let meta_path = dir.join(META_FILE);
        let meta = match fs::read_to_string(&meta_path).await {
            Ok(raw) => {
                let meta: CollectionMeta = serde_json::from_str(&raw)?;
                if meta.embedding_model != model_id {
                    return Err(SearchError::EmbeddingMismatch {
                        collection: name.to_string(),
                        expected: meta.embedding_model,
                        found: model_id,
                    });
                }
                meta
            }
            Err(error) if error.kind() == ErrorKind::NotFound => {
                let meta = CollectionMeta {
                    name: name.to_string(),
                    embedding_model: model_id,
                    dimensions: None,
                };
                write_meta(&meta_path, &meta).await?;
                meta
            }
            Err(error) => return Err(error.into()),
        };

        let records = load_records(&dir.join(RECORDS_FILE)).await?;
        let ids = records.iter().map(|record| record.id.clone()).collect();

        Ok(Self {
            name: name.to_string(),
            dir,
            embedder,
            state: Mutex::new(CollectionState { meta, records, ids }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ChunkInserter for LocalCollection {
    async fn insert_chunk(&self, record: &ChunkRecord) -> Result<(), SearchError> {
        let mut state = self.state.lock().await;
        if state.ids.contains(&record.id) {
            return Err(SearchError::DuplicateRecord(record.id.clone()));
        }

        let embedding = self.embedder.embed(&record.text).await?;
        let dimensions = state.meta.dimensions;
        match dimensions {
            Some(expected) if expected != embedding.len() => {
                return Err(SearchError::DimensionMismatch {
                    expected,
                    found: embedding.len(),
                });
            }
            Some(_) => {}
            None => {
                state.meta.dimensions = Some(embedding.len());
                write_meta(&self.dir.join(META_FILE), &state.meta).await?;
            }
        }

        let stored = StoredRecord {
            id: record.id.clone(),
            document: record.text.clone(),
            metadata: record.metadata.clone(),
            embedding,
        };

        let mut line = serde_json::to_string(&stored)?;
        line.push('\n');
        append_line(&self.dir.join(RECORDS_FILE), line.as_bytes()).await?;

        debug!(collection = %self.name, id = %stored.id, "stored chunk");
        state.ids.insert(stored.id.clone());
        state.records.push(stored);
        Ok(())
    }
}

#[async_trait]
impl ChunkRetriever for LocalCollection {
    async fn retrieve(
        &self,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, SearchError> {
        let query = self.embedder.embed(question).await?;
        let state = self.state.lock().await;

        if let Some(expected) = state.meta.dimensions {
            if expected != query.len() {
                return Err(SearchError::DimensionMismatch {
                    expected,
                    found: query.len(),
                });
            }
        }

        let mut scored = state
            .records
            .iter()
            .map(|record| (cosine_similarity(&query, &record.embedding), record))
            .collect::<Vec<_>>();
        scored.sort_by(|left, right| right.0.total_cmp(&left.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, record)| RetrievedChunk {
                id: record.id.clone(),
                document: record.document.clone(),
                metadata: record.metadata.clone(),
                score,
            })
            .collect())
    }
}

fn validate_name(name: &str) -> Result<(), SearchError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && name != "."
        && name != "..";

    if valid {
        Ok(())
    } else {
        Err(SearchError::Request(format!("invalid collection name: {name:?}")))
    }
}

async fn write_meta(path: &Path, meta: &CollectionMeta) -> Result<(), SearchError> {
    fs::write(path, serde_json::to_vec_pretty(meta)?).await?;
    Ok(())
}

/// Appends one record line. A failed write is cut back to the previous length
/// so the file never keeps a partial line.
async fn append_line(path: &Path, line: &[u8]) -> Result<(), SearchError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    let committed = file.metadata().await?.len();

    let written = async {
        file.write_all(line).await?;
        file.flush().await
    }
    .await;

    if let Err(error) = written {
        warn!(path = %path.display(), %error, "append failed, truncating partial record");
        file.set_len(committed).await?;
        return Err(error.into());
    }
    Ok(())
}

/// Loads every stored record. An unparseable last line is a torn append: it is
/// dropped and the file truncated before it. Corruption anywhere else is an error.
async fn load_records(path: &Path) -> Result<Vec<StoredRecord>, SearchError> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(error.into()),
    };

    let mut records = Vec::new();
    let mut offset = 0;
    for line in raw.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str(line) {
            Ok(record) => records.push(record),
            Err(error) if raw[offset..].trim().is_empty() => {
                warn!(path = %path.display(), %error, "dropping torn trailing record");
                let file = OpenOptions::new().write(true).open(path).await?;
                file.set_len(start as u64).await?;
                break;
            }
            Err(error) => return Err(error.into()),
        }
    }
    Ok(records)
}
