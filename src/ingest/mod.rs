//! Offline ingestion pipeline: crawl the documentation site, split pages
//! into chunks, embed them, and persist everything to the vector
//! collection.
//!
//! Embeddings are generated before the existing collection is touched, so
//! a failed run leaves previously ingested data in place.

pub mod chunking;

#[cfg(test)]
mod tests;

use std::time::{Duration, Instant};

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use crate::config::{COLLECTION_NAME, Config};
use crate::crawler::{Document, SiteCrawler};
use crate::gemini::GeminiClient;
use crate::store::{ChunkRecord, VectorStore, is_populated};
use crate::{Result, TutorError};

use chunking::split_document;

/// Summary of a completed ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestStats {
    pub pages_crawled: usize,
    pub pages_failed: usize,
    pub documents_kept: usize,
    pub chunks_stored: usize,
    pub duration: Duration,
}

/// Run ingestion unless the collection already holds data.
///
/// Returns `None` when ingestion was skipped.
#[inline]
pub async fn run_if_needed(config: &Config) -> Result<Option<IngestStats>> {
    let collection_dir = config.collection_dir();
    if is_populated(&collection_dir) {
        info!(
            "Collection at {:?} already populated, skipping ingestion",
            collection_dir
        );
        return Ok(None);
    }

    run(config).await.map(Some)
}

/// Run the full crawl, chunk, embed, and store pipeline.
#[inline]
pub async fn run(config: &Config) -> Result<IngestStats> {
    let started = Instant::now();

    let api_key = Config::api_key().map_err(|e| TutorError::Config(e.to_string()))?;
    let gemini = GeminiClient::new(&config.gemini, api_key)?;

    let mut crawler = SiteCrawler::new(config.site.clone());
    let documents = crawler.crawl()?;
    let pages_crawled = crawler.stats.successful_crawls;
    let pages_failed = crawler.stats.failed_crawls;

    let documents = filter_documents(documents, config.chunking.min_document_length);
    let documents_kept = documents.len();
    info!("Kept {} documents after filtering", documents_kept);

    let chunks: Vec<_> = documents
        .iter()
        .flat_map(|doc| split_document(doc, &config.chunking))
        .collect();

    if chunks.is_empty() {
        return Err(TutorError::Crawler(
            "crawl produced no usable documents".to_string(),
        ));
    }
    info!("Split {} documents into {} chunks", documents_kept, chunks.len());

    let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
    let progress = embedding_progress(texts.len());
    progress.set_message("Generating embeddings");
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(config.gemini.embed_batch_size) {
        let batch_vectors = gemini
            .embed_batch(batch)
            .map_err(|e| TutorError::Embedding(format!("{:#}", e)))?;
        progress.inc(batch.len() as u64);
        vectors.extend(batch_vectors);
    }
    progress.finish_and_clear();

    let dimension = vectors
        .first()
        .map(Vec::len)
        .ok_or_else(|| TutorError::Embedding("no embeddings were generated".to_string()))?;

    let created_at = Utc::now().to_rfc3339();
    let records: Vec<ChunkRecord> = chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, vector)| ChunkRecord {
            id: uuid::Uuid::new_v4().to_string(),
            vector,
            source_url: chunk.source_url,
            title: chunk.title,
            content: chunk.content,
            start_offset: chunk.start_offset as u32,
            chunk_index: chunk.chunk_index as u32,
            created_at: created_at.clone(),
        })
        .collect();
    let chunks_stored = records.len();

    let store = VectorStore::create(&config.collection_dir(), COLLECTION_NAME, dimension).await?;
    if let Err(e) = store.store_batch(records).await {
        // The old collection is already gone at this point; surface loudly
        error!("Failed to persist {} chunks: {}", chunks_stored, e);
        return Err(e);
    }

    let stats = IngestStats {
        pages_crawled,
        pages_failed,
        documents_kept,
        chunks_stored,
        duration: started.elapsed(),
    };
    info!(
        "Ingestion complete: {} chunks stored in {:?}",
        stats.chunks_stored, stats.duration
    );
    Ok(stats)
}

/// Drop documents whose trimmed text is empty or at most
/// `min_document_length` characters.
fn filter_documents(documents: Vec<Document>, min_document_length: usize) -> Vec<Document> {
    documents
        .into_iter()
        .filter(|doc| {
            let length = doc.content.trim().chars().count();
            if length <= min_document_length {
                warn!(
                    "Discarding document '{}' ({} chars, below minimum)",
                    doc.source_url, length
                );
                false
            } else {
                true
            }
        })
        .collect()
}

fn embedding_progress(total: usize) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }
    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    progress
}
