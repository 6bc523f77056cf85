use crate::models::{Answer, Generation, RetrievedChunk, SourceCitation};
use crate::traits::{ChatModel, ChunkRetriever};
use crate::SearchError;
use tracing::{info, warn};

pub const DEFAULT_TOP_K: usize = 5;

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant answering ONLY from the provided context. \
If the answer is not in the context, say you don't know.";

pub const CONTEXT_ONLY_PREFIX: &str = "Context-only answer (no LLM configured):";

pub fn build_prompt(question: &str, contexts: &[&str]) -> String {
    format!(
        "{SYSTEM_PROMPT}\n\nContext:\n{}\n\nQuestion: {question}\nAnswer:",
        contexts.join("\n---\n")
    )
}

pub fn context_only_answer(contexts: &[&str]) -> String {
    format!("{CONTEXT_ONLY_PREFIX}\n\n{}", contexts.join("\n\n---\n\n"))
}

/// Retrieves the `top_k` nearest chunks and answers from them.
///
/// Retrieval errors propagate. A failing `model` never does: the answer falls
/// back to the retrieved text and the failure is kept in [`Generation::Failed`].
/// A model that answers with blank text also gets the fallback, tagged with its id.
pub async fn answer_query<R>(
    retriever: &R,
    model: Option<&dyn ChatModel>,
    question: &str,
    top_k: usize,
) -> Result<Answer, SearchError>
where
    R: ChunkRetriever + ?Sized,
{
    if question.trim().is_empty() {
        return Err(SearchError::Request("question is empty".to_string()));
    }
    if top_k == 0 {
        return Err(SearchError::Request("top_k must be at least 1".to_string()));
    }

    let hits: Vec<RetrievedChunk> = retriever.retrieve(question, top_k).await?;
    let contexts = hits.iter().map(|hit| hit.document.as_str()).collect::<Vec<_>>();
    let prompt = build_prompt(question, &contexts);

    let generation = match model {
        Some(model) => match model.complete(SYSTEM_PROMPT, &prompt).await {
            Ok(text) if text.trim().is_empty() => {
                warn!(model = %model.model_id(), "model returned no text, answering from context");
                Generation::Blank {
                    model: model.model_id(),
                }
            }
            Ok(text) => Generation::Completed {
                text,
                model: model.model_id(),
            },
            Err(error) => {
                warn!(model = %model.model_id(), %error, "generation failed, answering from context");
                Generation::Failed {
                    reason: error.to_string(),
                }
            }
        },
        None => Generation::ContextOnly,
    };

    let answer = match &generation {
        Generation::Completed { text, .. } => text.clone(),
        Generation::Blank { .. } | Generation::Failed { .. } | Generation::ContextOnly => {
            context_only_answer(&contexts)
        }
    };

    info!(
        retrieved = hits.len(),
        model = %generation.model_tag(),
        "answered question"
    );

    Ok(Answer {
        answer,
        sources: hits.iter().map(SourceCitation::from).collect(),
        generation,
    })
}
