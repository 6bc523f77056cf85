use serde::{Deserialize, Serialize, Serializer};

/// Metadata stored alongside every chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub source: String,
    pub page: u32,
    pub chunk_index: usize,
}

/// A chunk ready for insertion: identity, text and metadata. The store embeds it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRecord {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl ChunkRecord {
    pub fn new(source: &str, page: u32, chunk_index: usize, text: String) -> Self {
        Self {
            id: chunk_identity(source, page, chunk_index),
            text,
            metadata: ChunkMetadata {
                source: source.to_string(),
                page,
                chunk_index,
            },
        }
    }
}

/// Composite storage key `<source>::p<page>::c<index>`.
pub fn chunk_identity(source: &str, page: u32, chunk_index: usize) -> String {
    format!("{source}::p{page}::c{chunk_index}")
}

/// One nearest-neighbour hit, as returned by a retriever.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub id: String,
    pub document: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceCitation {
    pub id: String,
    pub source: String,
    pub page: u32,
    pub chunk_index: usize,
}

impl From<&RetrievedChunk> for SourceCitation {
    fn from(hit: &RetrievedChunk) -> Self {
        Self {
            id: hit.id.clone(),
            source: hit.metadata.source.clone(),
            page: hit.metadata.page,
            chunk_index: hit.metadata.chunk_index,
        }
    }
}

/// How the answer text was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    Completed { text: String, model: String },
    /// The model answered without text; the answer falls back to the context.
    Blank { model: String },
    Failed { reason: String },
    ContextOnly,
}

impl Generation {
    /// Wire form of the outcome: the model id, `openai_error:<reason>` or `context-only`.
    pub fn model_tag(&self) -> String {
        match self {
            Generation::Completed { model, .. } | Generation::Blank { model } => model.clone(),
            Generation::Failed { reason } => format!("openai_error:{reason}"),
            Generation::ContextOnly => "context-only".to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Generation::Failed { .. })
    }
}

fn serialize_model_tag<S>(generation: &Generation, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&generation.model_tag())
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceCitation>,
    #[serde(rename = "model", serialize_with = "serialize_model_tag")]
    pub generation: Generation,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestSummary {
    pub chunks_added: usize,
    pub ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_max_chars: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: 1_200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_uses_page_and_index() {
        let record = ChunkRecord::new("manual.pdf", 2, 1, "text".to_string());
        assert_eq!(record.id, "manual.pdf::p2::c1");
        assert_eq!(record.metadata.page, 2);
        assert_eq!(record.metadata.chunk_index, 1);
    }

    #[test]
    fn answer_serializes_generation_as_model_string() {
        let answer = Answer {
            answer: "x".to_string(),
            sources: Vec::new(),
            generation: Generation::Failed {
                reason: "timeout".to_string(),
            },
        };
        let value = serde_json::to_value(&answer).expect("answer should serialize");
        assert_eq!(value["model"], "openai_error:timeout");
        assert!(value.get("generation").is_none());
    }
}
