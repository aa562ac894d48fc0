#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

/// Integration tests for the LanceDB-backed vector collection with
/// realistic documentation data
use docs_tutor::TutorError;
use docs_tutor::config::COLLECTION_NAME;
use docs_tutor::store::{ChunkRecord, VectorStore, is_populated};
use tempfile::TempDir;
use uuid::Uuid;

const DIMENSION: usize = 16;

fn record(content: &str, chunk_index: u32, vector: Vec<f32>) -> ChunkRecord {
    ChunkRecord {
        id: Uuid::new_v4().to_string(),
        vector,
        source_url: format!(
            "https://docs.streamlit.io/{}",
            content.split_whitespace().next().unwrap_or("page")
        ),
        title: "Streamlit docs".to_string(),
        content: content.to_string(),
        start_offset: chunk_index * 800,
        chunk_index,
        created_at: chrono::Utc::now().to_rfc3339(),
    }
}

/// A unit vector along one of the first few axes, padded to DIMENSION.
fn axis_vector(axis: usize) -> Vec<f32> {
    let mut vector = vec![0.0; DIMENSION];
    vector[axis] = 1.0;
    vector
}

#[tokio::test]
async fn store_and_search_returns_nearest_chunks_first() {
    let dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::create(dir.path(), COLLECTION_NAME, DIMENSION)
        .await
        .expect("should create store");

    store
        .store_batch(vec![
            record("widgets st.button adds a button", 0, axis_vector(0)),
            record("caching st.cache_data memoizes results", 1, axis_vector(1)),
            record("deploy community cloud deployment", 2, axis_vector(2)),
        ])
        .await
        .expect("should store records");

    assert_eq!(store.count().await.expect("should count"), 3);

    // Query closest to the caching chunk's vector
    let mut query = axis_vector(1);
    query[0] = 0.1;
    let results = store
        .search_similar(&query, 2)
        .await
        .expect("should search");

    assert_eq!(results.len(), 2);
    assert!(results[0].content.contains("st.cache_data"));
    assert_eq!(results[0].chunk_index, 1);
    // Distances are ordered ascending
    assert!(results[0].distance <= results[1].distance);
}

#[tokio::test]
async fn search_limit_caps_results() {
    let dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::create(dir.path(), COLLECTION_NAME, DIMENSION)
        .await
        .expect("should create store");

    let records: Vec<ChunkRecord> = (0..10)
        .map(|i| record("page content", i, axis_vector((i % DIMENSION as u32) as usize)))
        .collect();
    store.store_batch(records).await.expect("should store");

    let results = store
        .search_similar(&axis_vector(0), 4)
        .await
        .expect("should search");

    assert_eq!(results.len(), 4);
}

#[tokio::test]
async fn open_existing_fails_for_missing_directory() {
    let dir = TempDir::new().expect("should create temp dir");
    let missing = dir.path().join("never-created");

    let result = VectorStore::open_existing(&missing, COLLECTION_NAME).await;

    assert!(matches!(result, Err(TutorError::Unavailable(_))));
}

#[tokio::test]
async fn open_existing_fails_for_empty_directory() {
    let dir = TempDir::new().expect("should create temp dir");

    let result = VectorStore::open_existing(dir.path(), COLLECTION_NAME).await;

    assert!(matches!(result, Err(TutorError::Unavailable(_))));
}

#[tokio::test]
async fn open_existing_fails_for_empty_collection() {
    let dir = TempDir::new().expect("should create temp dir");
    VectorStore::create(dir.path(), COLLECTION_NAME, DIMENSION)
        .await
        .expect("should create store");

    let result = VectorStore::open_existing(dir.path(), COLLECTION_NAME).await;

    assert!(matches!(result, Err(TutorError::Unavailable(_))));
}

#[tokio::test]
async fn open_existing_detects_dimension_and_serves_queries() {
    let dir = TempDir::new().expect("should create temp dir");
    {
        let store = VectorStore::create(dir.path(), COLLECTION_NAME, DIMENSION)
            .await
            .expect("should create store");
        store
            .store_batch(vec![record("widgets st.slider", 0, axis_vector(3))])
            .await
            .expect("should store");
    }

    let reopened = VectorStore::open_existing(dir.path(), COLLECTION_NAME)
        .await
        .expect("should open existing store");

    assert_eq!(reopened.vector_dimension(), DIMENSION);
    let results = reopened
        .search_similar(&axis_vector(3), 1)
        .await
        .expect("should search");
    assert_eq!(results.len(), 1);
    assert!(results[0].content.contains("st.slider"));
}

#[tokio::test]
async fn create_replaces_previous_collection() {
    let dir = TempDir::new().expect("should create temp dir");

    let store = VectorStore::create(dir.path(), COLLECTION_NAME, DIMENSION)
        .await
        .expect("should create store");
    store
        .store_batch(vec![
            record("old content", 0, axis_vector(0)),
            record("old content", 1, axis_vector(1)),
        ])
        .await
        .expect("should store");
    drop(store);

    let store = VectorStore::create(dir.path(), COLLECTION_NAME, DIMENSION)
        .await
        .expect("should recreate store");
    store
        .store_batch(vec![record("new content", 0, axis_vector(2))])
        .await
        .expect("should store");

    // The old rows are gone, not appended to
    assert_eq!(store.count().await.expect("should count"), 1);
}

#[tokio::test]
async fn relative_data_dirs_keep_data_under_the_given_path() {
    let data_dir = std::path::PathBuf::from(format!("tutor-store-test-{}", Uuid::new_v4()));

    let store = VectorStore::create(&data_dir, COLLECTION_NAME, DIMENSION)
        .await
        .expect("should create store");
    store
        .store_batch(vec![record("relative path content", 0, axis_vector(0))])
        .await
        .expect("should store");
    drop(store);

    // The table lives inside the directory we named, not somewhere else
    assert!(is_populated(&data_dir));
    assert!(data_dir.join(format!("{}.lance", COLLECTION_NAME)).exists());

    let reopened = VectorStore::open_existing(&data_dir, COLLECTION_NAME)
        .await
        .expect("should open existing store");
    assert_eq!(reopened.count().await.expect("should count"), 1);
    drop(reopened);

    // Recreating over the same relative path replaces the collection
    let store = VectorStore::create(&data_dir, COLLECTION_NAME, DIMENSION)
        .await
        .expect("should recreate store");
    assert_eq!(store.count().await.expect("should count"), 0);
    drop(store);

    std::fs::remove_dir_all(&data_dir).expect("should clean up");
}

#[tokio::test]
async fn dimension_mismatch_is_rejected() {
    let dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::create(dir.path(), COLLECTION_NAME, DIMENSION)
        .await
        .expect("should create store");

    let result = store
        .store_batch(vec![record("short vector", 0, vec![1.0, 2.0])])
        .await;

    assert!(matches!(result, Err(TutorError::Store(_))));
}
