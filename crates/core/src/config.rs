use crate::models::IngestionOptions;
use std::path::PathBuf;

pub const DEFAULT_STORAGE_PATH: &str = "./vectorstore";
pub const DEFAULT_COLLECTION: &str = "docs";
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Process-wide settings, resolved once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct RagConfig {
    pub storage_path: PathBuf,
    pub collection: String,
    pub embedding_model: String,
    /// OpenAI-compatible embeddings server. Unset means the local n-gram embedder.
    pub embedding_url: Option<String>,
    pub embedding_api_key: Option<String>,
    /// Qdrant endpoint. Unset means the on-disk store under `storage_path`.
    pub qdrant_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub chunk_max_chars: usize,
    pub upload_dir: PathBuf,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            collection: DEFAULT_COLLECTION.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_url: None,
            embedding_api_key: None,
            qdrant_url: None,
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            chunk_max_chars: IngestionOptions::default().chunk_max_chars,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
        }
    }
}

impl RagConfig {
    /// Local store rooted at `storage_path`, local embedder, no model credential.
    pub fn context_only(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
            ..Self::default()
        }
    }

    /// The model credential, if one is set to something other than whitespace.
    pub fn openai_credential(&self) -> Option<&str> {
        non_blank(self.openai_api_key.as_deref())
    }

    pub fn embedding_endpoint(&self) -> Option<&str> {
        non_blank(self.embedding_url.as_deref())
    }

    pub fn qdrant_endpoint(&self) -> Option<&str> {
        non_blank(self.qdrant_url.as_deref())
    }

    pub fn ingestion_options(&self) -> IngestionOptions {
        IngestionOptions {
            chunk_max_chars: self.chunk_max_chars,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
