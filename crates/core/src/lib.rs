pub mod answer;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod service;
pub mod store;
pub mod stores;
pub mod traits;

pub use answer::{
    answer_query, build_prompt, context_only_answer, CONTEXT_ONLY_PREFIX, DEFAULT_TOP_K,
    SYSTEM_PROMPT,
};
pub use chunking::{chunk_text, ChunkingConfig};
pub use config::RagConfig;
pub use embeddings::{CharacterNgramEmbedder, Embedder, HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{GenerationError, IngestError, SearchError};
pub use extractor::{extract_page_texts, LopdfExtractor, PageText, PdfExtractor};
pub use ingest::{discover_pdf_files, expand_input_paths, ingest_pdfs, source_name};
pub use llm::OpenAiChatModel;
pub use models::{
    chunk_identity, Answer, ChunkMetadata, ChunkRecord, Generation, IngestSummary,
    IngestionOptions, RetrievedChunk, SourceCitation,
};
pub use service::RagService;
pub use store::{build_embedder, open_collection, Collection};
pub use stores::{LocalCollection, QdrantCollection};
pub use traits::{ChatModel, ChunkInserter, ChunkRetriever};
