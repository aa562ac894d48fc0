#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

/// End-to-end tests of the answering pipeline with a mocked Gemini API and
/// a real on-disk vector collection
use docs_tutor::chat::{ChatTurn, GREETING_RESPONSE, ResponseScope, TutorService};
use docs_tutor::config::{COLLECTION_NAME, GeminiConfig};
use docs_tutor::gemini::GeminiClient;
use docs_tutor::store::{ChunkRecord, VectorStore};
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

const DIMENSION: usize = 8;

async fn populated_store(dir: &TempDir) -> VectorStore {
    let store = VectorStore::create(dir.path(), COLLECTION_NAME, DIMENSION)
        .await
        .expect("should create store");

    let records = vec![
        ChunkRecord {
            id: Uuid::new_v4().to_string(),
            vector: vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            source_url: "https://docs.streamlit.io/develop/widgets".to_string(),
            title: "Widgets".to_string(),
            content: "st.button renders a clickable button widget.".to_string(),
            start_offset: 0,
            chunk_index: 0,
            created_at: chrono::Utc::now().to_rfc3339(),
        },
        ChunkRecord {
            id: Uuid::new_v4().to_string(),
            vector: vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            source_url: "https://docs.streamlit.io/develop/caching".to_string(),
            title: "Caching".to_string(),
            content: "st.cache_data caches function results across reruns.".to_string(),
            start_offset: 0,
            chunk_index: 0,
            created_at: chrono::Utc::now().to_rfc3339(),
        },
    ];
    store.store_batch(records).await.expect("should store");
    store
}

async fn mock_embedding(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1beta/models/embedding-001:embedContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": { "values": [0.9, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0] }
        })))
        .mount(server)
        .await;
}

async fn mock_generation(server: &MockServer, answer: &str) {
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": answer }] }
            }]
        })))
        .mount(server)
        .await;
}

fn test_client(server: &MockServer) -> GeminiClient {
    let config = GeminiConfig {
        endpoint: format!("{}/v1beta", server.uri()),
        ..GeminiConfig::default()
    };
    GeminiClient::new(&config, "test-key".to_string()).expect("client should build")
}

#[tokio::test]
async fn grounded_answers_include_sources() {
    let server = MockServer::start().await;
    mock_embedding(&server).await;
    mock_generation(&server, "Use st.button to render a button in your app.").await;

    let dir = TempDir::new().expect("tempdir");
    let store = populated_store(&dir).await;
    let service = TutorService::with_parts(test_client(&server), store, 8, 5);

    let response = service
        .answer("how do I add a button?", &[])
        .await
        .expect("should answer");

    assert_eq!(response.scope, ResponseScope::InScope);
    assert_eq!(response.answer, "Use st.button to render a button in your app.");
    assert!(!response.sources.is_empty());
    // The nearest chunk is the widgets page
    assert_eq!(
        response.sources[0].source_url,
        "https://docs.streamlit.io/develop/widgets"
    );
}

#[tokio::test]
async fn refusals_suppress_sources() {
    let server = MockServer::start().await;
    mock_embedding(&server).await;
    mock_generation(
        &server,
        "I am a Streamlit-focused AI tutor and cannot provide information on that topic.",
    )
    .await;

    let dir = TempDir::new().expect("tempdir");
    let store = populated_store(&dir).await;
    let service = TutorService::with_parts(test_client(&server), store, 8, 5);

    let response = service
        .answer("what is the capital of France?", &[])
        .await
        .expect("should answer");

    assert_eq!(response.scope, ResponseScope::OutOfScope);
    assert!(response.sources.is_empty());
}

#[tokio::test]
async fn greetings_suppress_sources() {
    let server = MockServer::start().await;
    mock_embedding(&server).await;
    mock_generation(&server, GREETING_RESPONSE).await;

    let dir = TempDir::new().expect("tempdir");
    let store = populated_store(&dir).await;
    let service = TutorService::with_parts(test_client(&server), store, 8, 5);

    let response = service.answer("hello!", &[]).await.expect("should answer");

    assert_eq!(response.scope, ResponseScope::Greeting);
    assert_eq!(response.answer, GREETING_RESPONSE);
    assert!(response.sources.is_empty());
}

#[tokio::test]
async fn conversation_history_is_forwarded_to_generation() {
    let server = MockServer::start().await;
    mock_embedding(&server).await;

    // Only the question plus the last five history turns may be forwarded
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .and(wiremock::matchers::body_partial_json(json!({
            "contents": [
                { "role": "model", "parts": [{ "text": "turn 3" }] },
                { "role": "user", "parts": [{ "text": "turn 4" }] },
                { "role": "model", "parts": [{ "text": "turn 5" }] },
                { "role": "user", "parts": [{ "text": "turn 6" }] },
                { "role": "model", "parts": [{ "text": "turn 7" }] },
                { "role": "user", "parts": [{ "text": "and how do I cache it?" }] }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Use st.cache_data." }] }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("tempdir");
    let store = populated_store(&dir).await;
    let service = TutorService::with_parts(test_client(&server), store, 8, 5);

    let history: Vec<ChatTurn> = (0..8)
        .map(|i| {
            if i % 2 == 0 {
                ChatTurn::user(format!("turn {}", i))
            } else {
                ChatTurn::assistant(format!("turn {}", i))
            }
        })
        .collect();

    let response = service
        .answer("and how do I cache it?", &history)
        .await
        .expect("should answer");

    assert_eq!(response.answer, "Use st.cache_data.");
}

#[tokio::test]
async fn generation_failures_surface_as_errors() {
    let server = MockServer::start().await;
    mock_embedding(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1) // a single attempt, no retries
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("tempdir");
    let store = populated_store(&dir).await;
    let service = TutorService::with_parts(test_client(&server), store, 8, 5);

    assert!(service.answer("anything", &[]).await.is_err());
}
