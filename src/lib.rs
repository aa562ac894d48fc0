use thiserror::Error;

pub type Result<T> = std::result::Result<T, TutorError>;

#[derive(Error, Debug)]
pub enum TutorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Crawler error: {0}")]
    Crawler(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("The tutor is temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chat;
pub mod commands;
pub mod config;
pub mod crawler;
pub mod gemini;
pub mod ingest;
pub mod store;
