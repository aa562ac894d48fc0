//! The question-answering service: embed the question, retrieve the nearest
//! documentation chunks, and generate a grounded answer with the recent
//! conversation history attached.

pub mod prompt;


use tracing::{debug, info};

use crate::config::{COLLECTION_NAME, Config};
use crate::gemini::{Content, GeminiClient};
use crate::store::{RetrievedChunk, VectorStore};
use crate::{Result, TutorError};

pub use prompt::{GREETING_RESPONSE, OUT_OF_SCOPE_PHRASES, ResponseScope};

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One prior message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl ChatTurn {
    #[inline]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    #[inline]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// A generated answer together with the chunks that grounded it.
///
/// `sources` is empty unless the answer was classified in scope.
#[derive(Debug, Clone, PartialEq)]
pub struct TutorResponse {
    pub answer: String,
    pub sources: Vec<RetrievedChunk>,
    pub scope: ResponseScope,
}

/// The retrieval-augmented answering service.
pub struct TutorService {
    gemini: GeminiClient,
    store: VectorStore,
    top_k: usize,
    history_window: usize,
}

impl TutorService {
    /// Open the ingested collection and build the Gemini client.
    ///
    /// Fails with [`TutorError::Unavailable`] when no ingested collection
    /// exists, so callers can tell the user to run ingestion first.
    #[inline]
    pub async fn initialize(config: &Config) -> Result<Self> {
        let api_key = Config::api_key().map_err(|e| TutorError::Config(e.to_string()))?;
        let gemini = GeminiClient::new(&config.gemini, api_key)?;
        let store = VectorStore::open_existing(&config.collection_dir(), COLLECTION_NAME).await?;

        info!(
            "Tutor service ready ({} chunks indexed)",
            store.count().await?
        );

        Ok(Self {
            gemini,
            store,
            top_k: config.retrieval.top_k,
            history_window: config.retrieval.history_window,
        })
    }

    #[inline]
    pub fn with_parts(
        gemini: GeminiClient,
        store: VectorStore,
        top_k: usize,
        history_window: usize,
    ) -> Self {
        Self {
            gemini,
            store,
            top_k,
            history_window,
        }
    }

    /// Answer a question against the ingested documentation.
    ///
    /// Retrieval always runs against the question alone; the conversation
    /// history only influences generation.
    #[inline]
    pub async fn answer(&self, question: &str, history: &[ChatTurn]) -> Result<TutorResponse> {
        debug!("Answering question ({} chars)", question.len());

        let query_vector = self
            .gemini
            .embed(question)
            .map_err(|e| TutorError::Embedding(format!("{:#}", e)))?;

        let retrieved = self
            .store
            .search_similar(&query_vector, self.top_k)
            .await?;
        debug!("Retrieved {} chunks for question", retrieved.len());

        let system_prompt = prompt::build_system_prompt(&retrieved);

        let mut contents: Vec<Content> = trailing_window(history, self.history_window)
            .iter()
            .map(|turn| match turn.role {
                Role::User => Content::user(turn.text.clone()),
                Role::Assistant => Content::model(turn.text.clone()),
            })
            .collect();
        contents.push(Content::user(question));

        let answer = self
            .gemini
            .generate_answer(&system_prompt, contents)
            .map_err(|e| TutorError::Generation(format!("{:#}", e)))?;

        let scope = prompt::classify_answer(&answer);
        let sources = if scope == ResponseScope::InScope {
            retrieved
        } else {
            Vec::new()
        };

        Ok(TutorResponse {
            answer,
            sources,
            scope,
        })
    }
}

/// The last `window` turns of the history, oldest first.
fn trailing_window(history: &[ChatTurn], window: usize) -> &[ChatTurn] {
    let start = history.len().saturating_sub(window);
    &history[start..]
}
