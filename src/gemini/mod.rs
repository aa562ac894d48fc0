//! Client for the Gemini REST API, covering both text embedding and chat
//! completion.
//!
//! Requests are synchronous with a global timeout and are never retried;
//! errors surface directly to the caller.


use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::GeminiConfig;

/// Safety categories blocked at medium-and-above severity on every
/// generation request.
const SAFETY_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

const SAFETY_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";

#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: Url,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    temperature: f32,
    embed_batch_size: usize,
    agent: ureq::Agent,
}

/// A single message part on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Part {
    pub text: String,
}

/// A conversation message on the wire. Gemini uses the role name "model"
/// for assistant turns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    #[inline]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part { text: text.into() }],
        }
    }

    #[inline]
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: SystemInstruction,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: String,
    threshold: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

impl GeminiClient {
    #[inline]
    pub fn new(config: &GeminiConfig, api_key: String) -> Result<Self> {
        let base_url =
            Url::parse(&config.endpoint).context("Failed to parse Gemini endpoint URL")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key,
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.temperature,
            embed_batch_size: config.embed_batch_size,
            agent,
        })
    }

    /// Generate an embedding vector for a single text input
    #[inline]
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for text (length: {})", text.len());

        let request = EmbedRequest {
            model: format!("models/{}", self.embedding_model),
            content: EmbedContent {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            },
        };

        let url = self.model_url(&self.embedding_model, "embedContent")?;
        let response_text = self
            .post_json(&url, &serde_json::to_string(&request)?)
            .context("Failed to generate embedding")?;

        let embed_response: EmbedResponse =
            serde_json::from_str(&response_text).context("Failed to parse embedding response")?;

        debug!(
            "Generated embedding with {} dimensions",
            embed_response.embedding.values.len()
        );

        Ok(embed_response.embedding.values)
    }

    /// Generate embeddings for multiple texts, batching requests to stay
    /// under the API's per-call limit.
    #[inline]
    pub fn embed_batch<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.embed_batch_size) {
            let batch_results = self
                .embed_single_batch(batch)
                .with_context(|| format!("Failed to embed batch of {} texts", batch.len()))?;
            results.extend(batch_results);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }

    fn embed_single_batch<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Vec<f32>>> {
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: format!("models/{}", self.embedding_model),
                    content: EmbedContent {
                        parts: vec![Part {
                            text: text.as_ref().to_string(),
                        }],
                    },
                })
                .collect(),
        };

        let url = self.model_url(&self.embedding_model, "batchEmbedContents")?;
        let response_text = self.post_json(&url, &serde_json::to_string(&request)?)?;

        let batch_response: BatchEmbedResponse = serde_json::from_str(&response_text)
            .context("Failed to parse batch embedding response")?;

        if batch_response.embeddings.len() != texts.len() {
            return Err(anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                batch_response.embeddings.len()
            ));
        }

        Ok(batch_response
            .embeddings
            .into_iter()
            .map(|e| e.values)
            .collect())
    }

    /// Generate an answer from the chat model with the fixed sampling
    /// temperature and safety thresholds.
    #[inline]
    pub fn generate_answer(&self, system_instruction: &str, contents: Vec<Content>) -> Result<String> {
        debug!(
            "Generating answer from {} conversation messages",
            contents.len()
        );

        let request = GenerateRequest {
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: system_instruction.to_string(),
                }],
            },
            contents,
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category: (*category).to_string(),
                    threshold: SAFETY_THRESHOLD.to_string(),
                })
                .collect(),
        };

        let url = self.model_url(&self.chat_model, "generateContent")?;
        let response_text = self
            .post_json(&url, &serde_json::to_string(&request)?)
            .context("Failed to generate answer")?;

        let response: GenerateResponse =
            serde_json::from_str(&response_text).context("Failed to parse generation response")?;

        let answer = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| anyhow!("Generation response contained no candidates"))?;

        debug!("Generated answer ({} chars)", answer.len());
        Ok(answer)
    }

    fn model_url(&self, model: &str, operation: &str) -> Result<Url> {
        let path = format!(
            "{}/models/{}:{}",
            self.base_url.path().trim_end_matches('/'),
            model,
            operation
        );
        let mut url = self.base_url.clone();
        url.set_path(&path);
        Ok(url)
    }

    fn post_json(&self, url: &Url, body: &str) -> Result<String> {
        match self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .send(body)
        {
            Ok(mut response) => response
                .body_mut()
                .read_to_string()
                .context("Failed to read response body"),
            Err(ureq::Error::StatusCode(status)) => {
                Err(anyhow!("Gemini API returned HTTP {}", status))
            }
            Err(e) => Err(anyhow::Error::from(e)).context("Gemini API request failed"),
        }
    }
}
