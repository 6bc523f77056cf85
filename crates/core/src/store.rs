use crate::config::RagConfig;
use crate::embeddings::{CharacterNgramEmbedder, Embedder, HttpEmbedder};
use crate::models::{ChunkRecord, RetrievedChunk};
use crate::stores::{LocalCollection, QdrantCollection};
use crate::traits::{ChunkInserter, ChunkRetriever};
use crate::SearchError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// A named collection bound to one embedder, on whichever backend is configured.
pub enum Collection {
    Local(LocalCollection),
    Qdrant(QdrantCollection),
}

/// Gets or creates `name` on the configured backend.
pub async fn open_collection(
    config: &RagConfig,
    embedder: Arc<dyn Embedder>,
    name: &str,
) -> Result<Collection, SearchError> {
    match config.qdrant_endpoint() {
        Some(endpoint) => Ok(Collection::Qdrant(QdrantCollection::new(
            endpoint, name, embedder,
        )?)),
        None => Ok(Collection::Local(
            LocalCollection::open(&config.storage_path, name, embedder).await?,
        )),
    }
}

/// Picks the HTTP embedder when an embeddings endpoint is configured, the local
/// n-gram embedder otherwise.
pub fn build_embedder(config: &RagConfig) -> Result<Arc<dyn Embedder>, SearchError> {
    match config.embedding_endpoint() {
        Some(endpoint) => Ok(Arc::new(HttpEmbedder::new(
            endpoint,
            config.embedding_model.clone(),
            config.embedding_api_key.clone(),
        )?)),
        None => {
            let embedder = CharacterNgramEmbedder::default();
            warn!(
                requested = %config.embedding_model,
                using = %embedder.model_id(),
                "no EMBEDDING_URL configured, falling back to the local n-gram embedder"
            );
            Ok(Arc::new(embedder))
        }
    }
}

#[async_trait]
impl ChunkInserter for Collection {
    async fn insert_chunk(&self, record: &ChunkRecord) -> Result<(), SearchError> {
        match self {
            Collection::Local(collection) => collection.insert_chunk(record).await,
            Collection::Qdrant(collection) => collection.insert_chunk(record).await,
        }
    }
}

#[async_trait]
impl ChunkRetriever for Collection {
    async fn retrieve(
        &self,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, SearchError> {
        match self {
            Collection::Local(collection) => collection.retrieve(question, top_k).await,
            Collection::Qdrant(collection) => collection.retrieve(question, top_k).await,
        }
    }
}
