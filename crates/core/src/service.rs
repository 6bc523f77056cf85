use crate::answer::answer_query;
use crate::config::RagConfig;
use crate::embeddings::Embedder;
use crate::extractor::LopdfExtractor;
use crate::ingest::ingest_pdfs;
use crate::llm::OpenAiChatModel;
use crate::models::{Answer, IngestSummary};
use crate::store::{build_embedder, open_collection, Collection};
use crate::traits::ChatModel;
use crate::{IngestError, SearchError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Ingestion and answering wired to one configuration.
///
/// Collections are opened once and shared by every clone of the service, so
/// repeated queries do not reload the store and inserts into one collection
/// are serialised.
#[derive(Clone)]
pub struct RagService {
    config: Arc<RagConfig>,
    embedder: Arc<dyn Embedder>,
    chat_model: Option<Arc<dyn ChatModel>>,
    collections: Arc<Mutex<HashMap<String, Arc<Collection>>>>,
}

impl RagService {
    pub fn from_config(config: Arc<RagConfig>) -> Result<Self, SearchError> {
        let embedder = build_embedder(&config)?;
        let chat_model = config.openai_credential().map(|api_key| {
            Arc::new(OpenAiChatModel::new(
                api_key,
                &config.openai_model,
                &config.openai_base_url,
            )) as Arc<dyn ChatModel>
        });

        Ok(Self::new(config, embedder, chat_model))
    }

    pub fn new(
        config: Arc<RagConfig>,
        embedder: Arc<dyn Embedder>,
        chat_model: Option<Arc<dyn ChatModel>>,
    ) -> Self {
        Self {
            config,
            embedder,
            chat_model,
            collections: Arc::default(),
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn chat_model_id(&self) -> Option<String> {
        self.chat_model.as_ref().map(|model| model.model_id())
    }

    /// Handle to the named collection, opened on first use.
    pub async fn collection(&self, name: &str) -> Result<Arc<Collection>, SearchError> {
        let mut open = self.collections.lock().await;
        if let Some(collection) = open.get(name) {
            return Ok(collection.clone());
        }

        let collection = Arc::new(open_collection(&self.config, self.embedder.clone(), name).await?);
        debug!(collection = %name, "opened collection");
        open.insert(name.to_string(), collection.clone());
        Ok(collection)
    }

    /// Ingests `paths` into the configured collection.
    pub async fn ingest(&self, paths: &[PathBuf]) -> Result<IngestSummary, IngestError> {
        tokio::fs::create_dir_all(&self.config.storage_path).await?;
        let collection = self.collection(&self.config.collection).await?;

        let summary = ingest_pdfs(
            paths,
            &LopdfExtractor,
            collection.as_ref(),
            &self.config.ingestion_options(),
        )
        .await?;

        info!(
            files = paths.len(),
            chunks = summary.chunks_added,
            collection = %self.config.collection,
            "ingestion finished"
        );
        Ok(summary)
    }

    pub async fn answer(&self, question: &str, top_k: usize) -> Result<Answer, SearchError> {
        self.answer_in(&self.config.collection, question, top_k).await
    }

    pub async fn answer_in(
        &self,
        collection: &str,
        question: &str,
        top_k: usize,
    ) -> Result<Answer, SearchError> {
        let collection = self.collection(collection).await?;
        answer_query(collection.as_ref(), self.chat_model.as_deref(), question, top_k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::tests::write_pdf;
    use crate::models::Generation;
    use tempfile::tempdir;

    #[tokio::test]
    async fn ingest_then_answer_without_credential() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let pdf = dir.path().join("handbook.pdf");
        write_pdf(
            &pdf,
            &[Some("Coolant must be replaced every 500 hours."), Some("Warranty lasts two years.")],
        )?;

        let config = Arc::new(RagConfig::context_only(dir.path().join("vectorstore")));
        let service = RagService::from_config(config)?;
        assert!(service.chat_model_id().is_none());

        let summary = service.ingest(&[pdf]).await?;
        assert_eq!(summary.chunks_added, 2);
        assert_eq!(summary.ids, vec!["handbook.pdf::p1::c0", "handbook.pdf::p2::c0"]);
        assert!(dir.path().join("vectorstore").is_dir());

        let answer = service.answer("When is coolant replaced?", 2).await?;
        assert_eq!(answer.generation, Generation::ContextOnly);
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].id, "handbook.pdf::p1::c0");
        assert!(answer.answer.contains("Coolant must be replaced every 500 hours."));
        assert!(answer.answer.contains("Warranty lasts two years."));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_collection_answers_from_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let service = RagService::from_config(Arc::new(RagConfig::context_only(dir.path())))?;

        let answer = service.answer_in("empty", "anything?", 5).await?;
        assert!(answer.sources.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn collections_are_opened_once_and_shared_by_clones(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let service = RagService::from_config(Arc::new(RagConfig::context_only(dir.path())))?;
        let clone = service.clone();

        let first = service.collection("docs").await?;
        let second = clone.collection("docs").await?;
        let other = service.collection("other").await?;

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        Ok(())
    }

    #[tokio::test]
    async fn ingested_chunks_are_visible_to_the_next_query() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let service = RagService::from_config(Arc::new(RagConfig::context_only(dir.path().join("store"))))?;
        assert!(service.answer("anything?", 5).await?.sources.is_empty());

        let pdf = dir.path().join("notes.pdf");
        write_pdf(&pdf, &[Some("Filters are cleaned monthly.")])?;
        service.ingest(&[pdf]).await?;

        let answer = service.answer("When are filters cleaned?", 5).await?;
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].id, "notes.pdf::p1::c0");
        Ok(())
    }

    #[test]
    fn credential_enables_chat_model() -> Result<(), Box<dyn std::error::Error>> {
        let config = RagConfig {
            openai_api_key: Some("sk-test".to_string()),
            ..RagConfig::default()
        };
        let service = RagService::from_config(Arc::new(config))?;
        assert_eq!(service.chat_model_id().as_deref(), Some("openai:gpt-4o-mini"));
        Ok(())
    }
}
