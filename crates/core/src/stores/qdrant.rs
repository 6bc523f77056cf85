use crate::embeddings::Embedder;
use crate::models::{ChunkMetadata, ChunkRecord, RetrievedChunk};
use crate::traits::{ChunkInserter, ChunkRetriever};
use crate::SearchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Collection backed by a Qdrant server. Points are keyed by a UUIDv5 of the
/// chunk identity; the identity itself travels in the payload.
pub struct QdrantCollection {
    endpoint: String,
    collection: String,
    client: Client,
    embedder: Arc<dyn Embedder>,
    ready: AtomicBool,
}

impl QdrantCollection {
    pub fn new(
        endpoint: &str,
        collection: impl Into<String>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, SearchError> {
        let endpoint = url::Url::parse(endpoint)?;
        Ok(Self {
            endpoint: endpoint.as_str().trim_end_matches('/').to_string(),
            collection: collection.into(),
            client: Client::new(),
            embedder,
            ready: AtomicBool::new(false),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.endpoint, self.collection)
    }

    /// Creates the collection with cosine distance if it does not exist yet.
    pub async fn ensure_collection(&self, vector_size: usize) -> Result<(), SearchError> {
        if self.ready.load(Ordering::Acquire) {
            return Ok(());
        }

        let response = self.client.get(self.collection_url()).send().await?;
        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                let created = self
                    .client
                    .put(self.collection_url())
                    .json(&json!({
                        "vectors": { "size": vector_size, "distance": "Cosine" }
                    }))
                    .send()
                    .await?;
                check_status(created.status())?;
                info!(collection = %self.collection, vector_size, "created qdrant collection");
            }
            status => return Err(backend_error(status)),
        }

        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    async fn point_exists(&self, point_id: &Uuid) -> Result<bool, SearchError> {
        let response = self
            .client
            .post(format!("{}/points", self.collection_url()))
            .json(&json!({
                "ids": [point_id.to_string()],
                "with_payload": false,
                "with_vector": false,
            }))
            .send()
            .await?;
        check_status(response.status())?;

        let parsed: Value = response.json().await?;
        Ok(parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .is_some_and(|found| !found.is_empty()))
    }
}

pub fn point_id(identity: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, identity.as_bytes())
}

#[async_trait]
impl ChunkInserter for QdrantCollection {
    async fn insert_chunk(&self, record: &ChunkRecord) -> Result<(), SearchError> {
        let embedding = self.embedder.embed(&record.text).await?;
        self.ensure_collection(embedding.len()).await?;

        let id = point_id(&record.id);
        if self.point_exists(&id).await? {
            return Err(SearchError::DuplicateRecord(record.id.clone()));
        }

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&json!({
                "points": [{
                    "id": id.to_string(),
                    "vector": embedding,
                    "payload": {
                        "id": record.id,
                        "document": record.text,
                        "source": record.metadata.source,
                        "page": record.metadata.page,
                        "chunk_index": record.metadata.chunk_index,
                        "embedding_model": self.embedder.model_id(),
                    },
                }]
            }))
            .send()
            .await?;
        check_status(response.status())?;

        debug!(collection = %self.collection, id = %record.id, "stored chunk");
        Ok(())
    }
}

#[async_trait]
impl ChunkRetriever for QdrantCollection {
    async fn retrieve(
        &self,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, SearchError> {
        let query_vector = self.embedder.embed(question).await?;

        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&json!({
                "vector": query_vector,
                "limit": top_k,
                "with_payload": true,
            }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        check_status(response.status())?;

        let parsed: Value = response.json().await?;
        parse_search_hits(&parsed)
    }
}

fn parse_search_hits(parsed: &Value) -> Result<Vec<RetrievedChunk>, SearchError> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    hits.iter()
        .map(|hit| {
            let text = |pointer: &str| {
                hit.pointer(pointer)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| SearchError::BackendResponse {
                        backend: "qdrant".to_string(),
                        details: format!("hit is missing {pointer}"),
                    })
            };
            let number = |pointer: &str| {
                hit.pointer(pointer)
                    .and_then(Value::as_u64)
                    .ok_or_else(|| SearchError::BackendResponse {
                        backend: "qdrant".to_string(),
                        details: format!("hit is missing {pointer}"),
                    })
            };

            Ok(RetrievedChunk {
                id: text("/payload/id")?,
                document: text("/payload/document")?,
                metadata: ChunkMetadata {
                    source: text("/payload/source")?,
                    page: u32::try_from(number("/payload/page")?)
                        .map_err(|_| out_of_range("/payload/page"))?,
                    chunk_index: usize::try_from(number("/payload/chunk_index")?)
                        .map_err(|_| out_of_range("/payload/chunk_index"))?,
                },
                score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0) as f32,
            })
        })
        .collect()
}

fn out_of_range(pointer: &str) -> SearchError {
    SearchError::BackendResponse {
        backend: "qdrant".to_string(),
        details: format!("hit has out-of-range {pointer}"),
    }
}

fn check_status(status: StatusCode) -> Result<(), SearchError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(backend_error(status))
    }
}

fn backend_error(status: StatusCode) -> SearchError {
    SearchError::BackendResponse {
        backend: "qdrant".to_string(),
        details: status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;

    #[test]
    fn point_ids_are_stable_per_identity() {
        assert_eq!(point_id("a.pdf::p1::c0"), point_id("a.pdf::p1::c0"));
        assert_ne!(point_id("a.pdf::p1::c0"), point_id("a.pdf::p1::c1"));
    }

    #[test]
    fn search_hits_keep_order_and_payload() {
        let response = json!({
            "result": [
                {
                    "id": "x",
                    "score": 0.91,
                    "payload": {
                        "id": "manual.pdf::p4::c1",
                        "document": "Torque the bolts to 40 Nm.",
                        "source": "manual.pdf",
                        "page": 4,
                        "chunk_index": 1
                    }
                },
                {
                    "id": "y",
                    "score": 0.42,
                    "payload": {
                        "id": "manual.pdf::p1::c0",
                        "document": "Safety first.",
                        "source": "manual.pdf",
                        "page": 1,
                        "chunk_index": 0
                    }
                }
            ]
        });

        let hits = parse_search_hits(&response).expect("hits should parse");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "manual.pdf::p4::c1");
        assert_eq!(hits[0].metadata.page, 4);
        assert_eq!(hits[0].metadata.chunk_index, 1);
        assert_eq!(hits[1].document, "Safety first.");
    }

    #[test]
    fn hits_without_payload_are_backend_errors() {
        let response = json!({ "result": [{ "id": "x", "score": 0.1 }] });
        assert!(matches!(
            parse_search_hits(&response),
            Err(SearchError::BackendResponse { .. })
        ));
    }

    #[test]
    fn oversized_page_is_a_backend_error() {
        let response = json!({
            "result": [{
                "id": "x",
                "score": 0.5,
                "payload": {
                    "id": "big.pdf::p1::c0",
                    "document": "text",
                    "source": "big.pdf",
                    "page": u64::from(u32::MAX) + 1,
                    "chunk_index": 0
                }
            }]
        });

        match parse_search_hits(&response) {
            Err(SearchError::BackendResponse { details, .. }) => {
                assert!(details.contains("/payload/page"), "{details}")
            }
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[test]
    fn endpoint_must_be_a_url() {
        let embedder: Arc<dyn Embedder> = Arc::new(CharacterNgramEmbedder::default());
        assert!(QdrantCollection::new("not a url", "docs", embedder.clone()).is_err());

        let store = QdrantCollection::new("http://localhost:6333/", "docs", embedder)
            .expect("valid endpoint");
        assert_eq!(store.collection_url(), "http://localhost:6333/collections/docs");
    }
}
