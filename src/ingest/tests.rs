use super::*;
use tempfile::TempDir;

fn document(url: &str, content: String) -> Document {
    Document {
        source_url: url.to_string(),
        title: "Page".to_string(),
        content,
    }
}

#[test]
fn documents_at_the_minimum_length_are_discarded() {
    let documents = vec![
        document("https://docs.streamlit.io/a", "x".repeat(50)),
        document("https://docs.streamlit.io/b", "x".repeat(51)),
    ];

    let kept = filter_documents(documents, 50);

    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].source_url, "https://docs.streamlit.io/b");
}

#[test]
fn whitespace_only_documents_are_discarded() {
    let documents = vec![
        document("https://docs.streamlit.io/blank", "   \n\t  ".to_string()),
        document("https://docs.streamlit.io/real", "y".repeat(200)),
    ];

    let kept = filter_documents(documents, 50);

    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].source_url, "https://docs.streamlit.io/real");
}

#[test]
fn length_filter_counts_trimmed_characters() {
    // 60 chars of padding around 40 chars of text trims down to 40
    let padded = format!("{}{}{}", " ".repeat(30), "z".repeat(40), " ".repeat(30));
    let documents = vec![document("https://docs.streamlit.io/padded", padded)];

    assert!(filter_documents(documents, 50).is_empty());
}

#[tokio::test]
async fn ingestion_is_skipped_when_collection_is_populated() {
    let dir = TempDir::new().expect("tempdir");
    let config = Config {
        data_dir: dir.path().to_path_buf(),
        ..Config::default()
    };

    let collection_dir = config.collection_dir();
    std::fs::create_dir_all(&collection_dir).expect("create dir");
    std::fs::write(collection_dir.join("data.lance"), b"x").expect("write");

    let result = run_if_needed(&config).await.expect("should not error");
    assert!(result.is_none());
}
