//! System prompt assembly and answer scope classification.
//!
//! The model is instructed to answer canned phrases for greetings and for
//! questions outside the documentation's scope. Classification works
//! backwards from the generated answer: an exact greeting match or a
//! case-insensitive refusal phrase marks the answer as out of scope, and
//! sources are only shown for in-scope answers.

use crate::store::RetrievedChunk;

/// Instruction prefix sent with every generation request. The retrieved
/// context is appended under the Context heading.
const SYSTEM_PROMPT_HEADER: &str = "\
You are a friendly and knowledgeable AI tutor for Streamlit, the Python \
framework for building data apps. Answer the user's question using ONLY the \
documentation excerpts provided in the Context section below.

Rules:
- If the user greets you without asking a question, respond with exactly: \
\"Hello there! How can I help you with your Streamlit project today?\"
- If the question is not about Streamlit, or the Context does not contain \
enough information to answer it, say that you are a Streamlit-focused AI \
tutor and cannot provide information on that topic.
- Never invent APIs, parameters, or behavior that the Context does not \
describe.
- Prefer concrete code examples from the Context when they help.

Context:
";

/// Exact response the model is instructed to give for a plain greeting.
pub const GREETING_RESPONSE: &str =
    "Hello there! How can I help you with your Streamlit project today?";

/// Phrases that mark a generated answer as a refusal. Matched
/// case-insensitively as substrings.
pub const OUT_OF_SCOPE_PHRASES: &[&str] = &[
    "i don't have enough information",
    "not in my knowledge base",
    "cannot provide information on that topic",
    "streamlit-focused ai tutor",
    "i am sorry",
    "i apologize",
    "not related to streamlit",
];

/// How a generated answer relates to the documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseScope {
    /// Answer grounded in retrieved documentation. Sources are shown.
    InScope,
    /// Refusal or off-topic answer. Sources are suppressed.
    OutOfScope,
    /// The canned greeting. Sources are suppressed.
    Greeting,
}

/// Build the full system prompt from the retrieved chunks.
#[inline]
pub fn build_system_prompt(chunks: &[RetrievedChunk]) -> String {
    let mut prompt = String::from(SYSTEM_PROMPT_HEADER);

    if chunks.is_empty() {
        prompt.push_str("(no documentation excerpts were retrieved)\n");
        return prompt;
    }

    for (i, chunk) in chunks.iter().enumerate() {
        prompt.push_str(&format!(
            "\n[Excerpt {} from {}]\n{}\n",
            i + 1,
            chunk.source_url,
            chunk.content
        ));
    }

    prompt
}

/// Classify a generated answer by inspecting its text.
#[inline]
pub fn classify_answer(answer: &str) -> ResponseScope {
    if answer.trim() == GREETING_RESPONSE {
        return ResponseScope::Greeting;
    }

    let lowered = answer.to_lowercase();
    if OUT_OF_SCOPE_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
    {
        return ResponseScope::OutOfScope;
    }

    ResponseScope::InScope
}
