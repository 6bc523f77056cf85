use crate::chunking::{chunk_text, ChunkingConfig};
use crate::extractor::PdfExtractor;
use crate::models::{ChunkRecord, IngestSummary, IngestionOptions};
use crate::traits::ChunkInserter;
use crate::IngestError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Expands directories to the PDFs below them; files are passed through as given.
pub fn expand_input_paths(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, IngestError> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let found = discover_pdf_files(input);
            if found.is_empty() {
                return Err(IngestError::InvalidArgument(format!(
                    "no pdf files found in {}",
                    input.display()
                )));
            }
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

pub fn source_name(path: &Path) -> Result<String, IngestError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))
}

/// Extracts, chunks and stores every file in order, one record per chunk.
///
/// The first failing file aborts the batch. Records stored for earlier files are
/// kept.
pub async fn ingest_pdfs<E, I>(
    paths: &[PathBuf],
    extractor: &E,
    inserter: &I,
    options: &IngestionOptions,
) -> Result<IngestSummary, IngestError>
where
    E: PdfExtractor + ?Sized,
    I: ChunkInserter + ?Sized,
{
    let config = ChunkingConfig::from(options.clone());
    config.validate()?;

    let mut summary = IngestSummary::default();

    for path in paths {
        let source = source_name(path)?;
        let pages = extractor.extract_pages(path)?;
        let before = summary.chunks_added;

        for page in pages {
            for (index, text) in chunk_text(&page.text, config).into_iter().enumerate() {
                let record = ChunkRecord::new(&source, page.number, index, text);
                inserter.insert_chunk(&record).await?;
                debug!(id = %record.id, "ingested chunk");

                summary.chunks_added += 1;
                summary.ids.push(record.id);
            }
        }

        info!(
            path = %path.display(),
            chunks = summary.chunks_added - before,
            "ingested pdf"
        );
    }

    Ok(summary)
}
