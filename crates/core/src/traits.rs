use crate::error::{GenerationError, SearchError};
use crate::models::{ChunkRecord, RetrievedChunk};
use async_trait::async_trait;

/// Write side of a collection: embeds and persists one chunk.
#[async_trait]
pub trait ChunkInserter: Send + Sync {
    async fn insert_chunk(&self, record: &ChunkRecord) -> Result<(), SearchError>;
}

/// Read side of a collection: the `top_k` chunks nearest to `question`, most similar first.
#[async_trait]
pub trait ChunkRetriever: Send + Sync {
    async fn retrieve(
        &self,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, SearchError>;
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_id(&self) -> String;

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, GenerationError>;
}
