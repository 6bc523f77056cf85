use crate::error::IngestError;
use crate::models::IngestionOptions;

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::from(IngestionOptions::default())
    }
}

impl From<IngestionOptions> for ChunkingConfig {
    fn from(value: IngestionOptions) -> Self {
        Self {
            max_chars: value.chunk_max_chars,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chars must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Splits page text into paragraph chunks, falling back to sentence packing for
/// paragraphs longer than `max_chars`. A single sentence longer than the budget
/// is kept whole.
pub fn chunk_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();

    for paragraph in text
        .split("\n\n")
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
    {
        if char_len(paragraph) <= config.max_chars {
            chunks.push(paragraph.to_string());
            continue;
        }

        pack_sentences(paragraph, config.max_chars, &mut chunks);
    }

    chunks
}

fn pack_sentences(paragraph: &str, max_chars: usize, chunks: &mut Vec<String>) {
    let flattened = paragraph.replace('\n', " ");
    let mut buffer = String::new();

    for sentence in flattened
        .split(". ")
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
    {
        let sentence = if sentence.ends_with('.') {
            sentence.to_string()
        } else {
            format!("{sentence}.")
        };

        if char_len(&buffer) + 1 + char_len(&sentence) <= max_chars {
            if !buffer.is_empty() {
                buffer.push(' ');
            }
            buffer.push_str(&sentence);
        } else {
            if !buffer.is_empty() {
                chunks.push(std::mem::take(&mut buffer));
            }
            buffer = sentence;
        }
    }

    if !buffer.is_empty() {
        chunks.push(buffer);
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(max_chars: usize) -> ChunkingConfig {
        ChunkingConfig { max_chars }
    }

    #[test]
    fn empty_and_whitespace_text_yield_nothing() {
        assert!(chunk_text("", budget(100)).is_empty());
        assert!(chunk_text("  \n\n \t \n\n", budget(100)).is_empty());
    }

    #[test]
    fn short_paragraphs_are_kept_whole_and_in_order() {
        let text = "First paragraph\nwith a line break.\n\n\n\nSecond one.\n\n   \n\nThird.";
        let chunks = chunk_text(text, budget(100));
        assert_eq!(
            chunks,
            vec![
                "First paragraph\nwith a line break.".to_string(),
                "Second one.".to_string(),
                "Third.".to_string(),
            ]
        );
    }

    #[test]
    fn long_paragraph_is_packed_by_sentence() {
        let chunks = chunk_text("Sentence one. Sentence two. Sentence three.", budget(15));
        assert_eq!(
            chunks,
            vec![
                "Sentence one.".to_string(),
                "Sentence two.".to_string(),
                "Sentence three.".to_string(),
            ]
        );
        assert!(chunks.iter().all(|chunk| chunk.ends_with('.')));
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 15));
    }

    #[test]
    fn sentences_share_a_chunk_while_they_fit() {
        let chunks = chunk_text("Aa bb. Cc dd. Ee ff. Gg hh.", budget(14));
        assert_eq!(
            chunks,
            vec!["Aa bb. Cc dd.".to_string(), "Ee ff. Gg hh.".to_string()]
        );
    }

    #[test]
    fn newlines_inside_long_paragraphs_become_spaces() {
        let chunks = chunk_text("Line one\ncontinues here. Line two\nends", budget(20));
        assert_eq!(
            chunks,
            vec!["Line one continues here.".to_string(), "Line two ends.".to_string()]
        );
    }

    #[test]
    fn oversized_sentence_stays_whole_in_its_own_chunk() {
        let long = "This single sentence is far longer than the budget allows";
        let text = format!("Tiny. {long}. End.");
        let chunks = chunk_text(&text, budget(12));

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "Tiny.");
        assert_eq!(chunks[1], format!("{long}."));
        assert_eq!(chunks[2], "End.");
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 12 || chunk == &chunks[1]);
        }
    }

    #[test]
    fn chunking_preserves_content_order() {
        let text = "Alpha one. Alpha two. Alpha three.\n\nBeta.\n\nGamma one. Gamma two.";
        let chunks = chunk_text(text, budget(22));
        let rebuilt = chunks.join(" ");
        let words: Vec<&str> = rebuilt.split_whitespace().collect();
        let expected: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(words, expected);
    }

    #[test]
    fn budget_is_measured_in_characters() {
        let chunks = chunk_text("Ünïcödé ñame. Ötherß wörd.", budget(14));
        assert_eq!(
            chunks,
            vec!["Ünïcödé ñame.".to_string(), "Ötherß wörd.".to_string()]
        );
    }

    #[test]
    fn zero_budget_is_rejected() {
        assert!(budget(0).validate().is_err());
        assert!(ChunkingConfig::default().validate().is_ok());
        assert_eq!(ChunkingConfig::default().max_chars, 1_200);
    }
}
