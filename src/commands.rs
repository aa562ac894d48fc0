use dialoguer::Input;
use indicatif::ProgressBar;
use std::time::Duration;
use tracing::{error, info};

use crate::chat::{ChatTurn, GREETING_RESPONSE, ResponseScope, TutorResponse, TutorService};
use crate::config::{COLLECTION_NAME, Config};
use crate::ingest;
use crate::store::{VectorStore, is_populated};
use crate::{Result, TutorError};

/// Shown to the user when a turn fails; the turn is recorded so the
/// conversation can continue.
const FALLBACK_ANSWER: &str = "Sorry, I encountered an issue. Please try again.";

/// Longest source excerpt printed under an answer, in characters.
const SOURCE_PREVIEW_CHARS: usize = 300;

/// Shown when an in-scope answer was generated without any retrieved
/// documentation backing it.
const EMPTY_RETRIEVAL_NOTICE: &str =
    "I couldn't find anything relevant in the documentation. Try a more specific question.";

/// Crawl the documentation site and build the vector collection.
#[inline]
pub async fn run_ingest(config: &Config) -> Result<()> {
    match ingest::run_if_needed(config).await? {
        Some(stats) => {
            println!("Ingestion complete!");
            println!("  Pages crawled: {}", stats.pages_crawled);
            println!("  Pages failed: {}", stats.pages_failed);
            println!("  Documents kept: {}", stats.documents_kept);
            println!("  Chunks stored: {}", stats.chunks_stored);
            println!("  Duration: {:?}", stats.duration);
        }
        None => {
            println!(
                "Collection at {} is already populated, skipping ingestion.",
                config.collection_dir().display()
            );
            println!("Delete that directory to re-ingest from scratch.");
        }
    }
    Ok(())
}

/// Interactive question-answering loop against the ingested documentation.
#[inline]
pub async fn run_chat(config: &Config) -> Result<()> {
    let service = match TutorService::initialize(config).await {
        Ok(service) => service,
        Err(TutorError::Unavailable(reason)) => {
            println!("The tutor is not ready yet: {}", reason);
            println!("Run 'docs-tutor ingest' first.");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    println!("{}", GREETING_RESPONSE);
    println!("Type 'exit' or 'quit' to leave.");
    println!();

    let mut history = seeded_history();

    loop {
        let question: String = match Input::new().with_prompt("You").interact_text() {
            Ok(input) => input,
            // Closed stdin ends the session
            Err(e) => {
                info!("Input ended: {}", e);
                break;
            }
        };

        let question = question.trim().to_string();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }

        let spinner = thinking_spinner();
        let result = service.answer(&question, &history).await;
        spinner.finish_and_clear();

        match result {
            Ok(response) => {
                println!();
                println!("{}", response.answer);
                if let Some(notice) = retrieval_notice(&response) {
                    println!();
                    println!("{}", notice);
                } else if response.scope == ResponseScope::InScope {
                    print_sources(&response.sources);
                }
                println!();

                history.push(ChatTurn::user(question));
                history.push(ChatTurn::assistant(response.answer));
            }
            Err(e) => {
                error!("Failed to answer question: {}", e);
                println!();
                println!("Something went wrong: {}", e);
                println!("{}", FALLBACK_ANSWER);
                println!();

                // Record the failed exchange so the model sees it in context
                history.push(ChatTurn::user(question));
                history.push(ChatTurn::assistant(FALLBACK_ANSWER));
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

/// Show the state of the ingested collection and the active configuration.
#[inline]
pub async fn run_status(config: &Config) -> Result<()> {
    let collection_dir = config.collection_dir();

    println!("Data directory: {}", config.data_dir.display());
    println!("Site: {}", config.site.root_url);
    println!(
        "Chunking: {} chars, {} overlap",
        config.chunking.chunk_size, config.chunking.chunk_overlap
    );
    println!(
        "Models: {} (chat), {} (embeddings)",
        config.gemini.chat_model, config.gemini.embedding_model
    );
    match Config::api_key() {
        Ok(_) => println!("API key: configured"),
        Err(e) => println!("API key: {}", e),
    }
    println!();

    if !is_populated(&collection_dir) {
        println!("Collection: not ingested yet");
        println!("Run 'docs-tutor ingest' to build it.");
        return Ok(());
    }

    match VectorStore::open_existing(&collection_dir, COLLECTION_NAME).await {
        Ok(store) => {
            println!("Collection: {}", collection_dir.display());
            println!("  Chunks indexed: {}", store.count().await?);
            println!("  Vector dimensions: {}", store.vector_dimension());
        }
        Err(e) => {
            println!("Collection exists but could not be opened: {}", e);
        }
    }

    Ok(())
}

/// The conversation opens with the welcome message as the first assistant
/// turn, so the model sees it in context.
fn seeded_history() -> Vec<ChatTurn> {
    vec![ChatTurn::assistant(GREETING_RESPONSE)]
}

/// An in-scope answer with no retrieved chunks behind it gets a notice
/// instead of a source listing.
fn retrieval_notice(response: &TutorResponse) -> Option<&'static str> {
    (response.scope == ResponseScope::InScope && response.sources.is_empty())
        .then_some(EMPTY_RETRIEVAL_NOTICE)
}

fn print_sources(sources: &[crate::store::RetrievedChunk]) {
    if sources.is_empty() {
        return;
    }

    println!();
    println!("Sources:");

    // One entry per page, keeping the best-ranked chunk for the preview
    let mut seen = Vec::new();
    for source in sources {
        if seen.contains(&source.source_url) {
            continue;
        }
        seen.push(source.source_url.clone());

        println!("  {} ({})", source.title, source.source_url);
        println!("    {}", preview(&source.content));
    }
}

fn preview(content: &str) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= SOURCE_PREVIEW_CHARS {
        return collapsed;
    }
    let truncated: String = collapsed.chars().take(SOURCE_PREVIEW_CHARS).collect();
    format!("{}...", truncated)
}

fn thinking_spinner() -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Thinking...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
