//! Persistent vector collection backed by LanceDB.
//!
//! Ingestion creates the collection fresh each run (any prior data at the
//! same location is deleted first); the chat service opens it read-only
//! and refuses to operate on a missing or empty collection.


use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::TutorError;

/// A chunk together with its embedding vector, as persisted in the
/// collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub source_url: String,
    pub title: String,
    pub content: String,
    pub start_offset: u32,
    pub chunk_index: u32,
    pub created_at: String,
}

/// A chunk returned from nearest-neighbor search.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub source_url: String,
    pub title: String,
    pub content: String,
    pub start_offset: u32,
    pub chunk_index: u32,
    pub distance: f32,
}

/// Handle to the persisted vector collection.
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: usize,
}

impl VectorStore {
    /// Create a fresh collection, deleting any existing data at the target
    /// location first. Used by the ingestion pipeline.
    #[inline]
    pub async fn create(
        data_dir: &Path,
        collection_name: &str,
        vector_dimension: usize,
    ) -> Result<Self, TutorError> {
        if data_dir.exists() {
            info!("Removing existing collection at {:?}", data_dir);
            std::fs::remove_dir_all(data_dir).map_err(|e| {
                TutorError::Store(format!("Failed to delete existing collection: {}", e))
            })?;
        }
        std::fs::create_dir_all(data_dir).map_err(|e| {
            TutorError::Store(format!("Failed to create collection directory: {}", e))
        })?;

        let connection = Self::connect(data_dir).await?;

        let schema = create_schema(vector_dimension);
        connection
            .create_empty_table(collection_name, schema)
            .execute()
            .await
            .map_err(|e| TutorError::Store(format!("Failed to create collection: {}", e)))?;

        info!(
            "Created collection '{}' at {:?} with {} dimensions",
            collection_name, data_dir, vector_dimension
        );

        Ok(Self {
            connection,
            table_name: collection_name.to_string(),
            vector_dimension,
        })
    }

    /// Open an existing collection for querying.
    ///
    /// Fails with [`TutorError::Unavailable`] when the storage directory is
    /// missing or empty, or the collection itself is absent or holds no
    /// chunks. Callers must treat that as "refuse to start".
    #[inline]
    pub async fn open_existing(
        data_dir: &Path,
        collection_name: &str,
    ) -> Result<Self, TutorError> {
        if !is_populated(data_dir) {
            return Err(TutorError::Unavailable(format!(
                "no ingested collection found at {:?}; run the ingest command first",
                data_dir
            )));
        }

        let connection = Self::connect(data_dir).await?;

        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| TutorError::Store(format!("Failed to list collections: {}", e)))?;
        if !table_names.contains(&collection_name.to_string()) {
            return Err(TutorError::Unavailable(format!(
                "collection '{}' does not exist at {:?}",
                collection_name, data_dir
            )));
        }

        let vector_dimension = detect_vector_dimension(&connection, collection_name).await?;

        let store = Self {
            connection,
            table_name: collection_name.to_string(),
            vector_dimension,
        };

        if store.count().await? == 0 {
            return Err(TutorError::Unavailable(format!(
                "collection '{}' is empty",
                collection_name
            )));
        }

        debug!(
            "Opened collection '{}' with {} dimensions",
            store.table_name, store.vector_dimension
        );
        Ok(store)
    }

    async fn connect(data_dir: &Path) -> Result<Connection, TutorError> {
        // A file:// URI needs an absolute path; relative paths would be
        // misparsed (the first component becomes the URI host) and the data
        // would silently land somewhere else.
        let data_dir = std::path::absolute(data_dir)
            .map_err(|e| TutorError::Store(format!("Failed to resolve collection path: {}", e)))?;
        let uri = format!("file://{}", data_dir.display());
        lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| TutorError::Store(format!("Failed to connect to LanceDB: {}", e)))
    }

    #[inline]
    pub fn vector_dimension(&self) -> usize {
        self.vector_dimension
    }

    /// Store a batch of chunk records
    #[inline]
    pub async fn store_batch(&self, records: Vec<ChunkRecord>) -> Result<(), TutorError> {
        if records.is_empty() {
            debug!("No records to store");
            return Ok(());
        }

        debug!("Storing batch of {} records", records.len());

        for record in &records {
            if record.vector.len() != self.vector_dimension {
                return Err(TutorError::Store(format!(
                    "Vector dimension mismatch: expected {}, got {}",
                    self.vector_dimension,
                    record.vector.len()
                )));
            }
        }

        let record_batch = self.create_record_batch(&records)?;

        let table = self.open_table().await?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| TutorError::Store(format!("Failed to insert records: {}", e)))?;

        info!("Stored {} records", records.len());
        Ok(())
    }

    /// Search for the chunks nearest to the query vector
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, TutorError> {
        debug!("Searching for similar vectors with limit: {}", limit);

        let table = self.open_table().await?;

        let query = table
            .vector_search(query_vector)
            .map_err(|e| TutorError::Store(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(limit);

        let mut results = query
            .execute()
            .await
            .map_err(|e| TutorError::Store(format!("Failed to execute search: {}", e)))?;

        let mut retrieved = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| TutorError::Store(format!("Failed to read result stream: {}", e)))?
        {
            retrieved.extend(parse_search_batch(&batch)?);
        }

        debug!("Retrieved {} chunks", retrieved.len());
        Ok(retrieved)
    }

    /// Get the total number of chunks stored
    #[inline]
    pub async fn count(&self) -> Result<usize, TutorError> {
        let table = self.open_table().await?;
        table
            .count_rows(None)
            .await
            .map_err(|e| TutorError::Store(format!("Failed to count rows: {}", e)))
    }

    async fn open_table(&self) -> Result<lancedb::Table, TutorError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| TutorError::Store(format!("Failed to open collection: {}", e)))
    }

    fn create_record_batch(&self, records: &[ChunkRecord]) -> Result<RecordBatch, TutorError> {
        let len = records.len();
        let vector_dim = self.vector_dimension;

        let mut ids = Vec::with_capacity(len);
        let mut source_urls = Vec::with_capacity(len);
        let mut titles = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut start_offsets = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);

        for record in records {
            ids.push(record.id.as_str());
            source_urls.push(record.source_url.as_str());
            titles.push(record.title.as_str());
            contents.push(record.content.as_str());
            start_offsets.push(record.start_offset);
            chunk_indices.push(record.chunk_index);
            created_ats.push(record.created_at.as_str());
            flat_values.extend_from_slice(&record.vector);
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| TutorError::Store(format!("Failed to create vector array: {}", e)))?;

        let schema = create_schema(vector_dim);
        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(source_urls)),
            Arc::new(StringArray::from(titles)),
            Arc::new(StringArray::from(contents)),
            Arc::new(UInt32Array::from(start_offsets)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| TutorError::Store(format!("Failed to create record batch: {}", e)))
    }
}

/// Check whether the storage directory exists and contains any data.
/// This is the ingestion trigger's "already ingested" test.
#[inline]
pub fn is_populated(data_dir: &Path) -> bool {
    match std::fs::read_dir(data_dir) {
        Ok(mut entries) => entries.next().is_some(),
        Err(_) => false,
    }
}

fn create_schema(vector_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                vector_dim as i32,
            ),
            false,
        ),
        Field::new("source_url", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("start_offset", DataType::UInt32, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

async fn detect_vector_dimension(
    connection: &Connection,
    table_name: &str,
) -> Result<usize, TutorError> {
    let table = connection
        .open_table(table_name)
        .execute()
        .await
        .map_err(|e| TutorError::Store(format!("Failed to open collection: {}", e)))?;

    let schema = table
        .schema()
        .await
        .map_err(|e| TutorError::Store(format!("Failed to get collection schema: {}", e)))?;

    for field in schema.fields() {
        if field.name() == "vector" {
            if let DataType::FixedSizeList(_, size) = field.data_type() {
                return Ok(*size as usize);
            }
        }
    }

    Err(TutorError::Store(
        "Could not find vector column or determine dimension".to_string(),
    ))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<RetrievedChunk>, TutorError> {
    let num_rows = batch.num_rows();
    let mut results = Vec::with_capacity(num_rows);

    let source_urls = string_column(batch, "source_url")?;
    let titles = string_column(batch, "title")?;
    let contents = string_column(batch, "content")?;
    let start_offsets = u32_column(batch, "start_offset")?;
    let chunk_indices = u32_column(batch, "chunk_index")?;

    // Distance column is added by the vector search
    let distances = batch
        .column_by_name("_distance")
        .map(|col| col.as_any().downcast_ref::<Float32Array>());

    for row in 0..num_rows {
        let distance = distances
            .flatten()
            .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

        results.push(RetrievedChunk {
            source_url: source_urls.value(row).to_string(),
            title: titles.value(row).to_string(),
            content: contents.value(row).to_string(),
            start_offset: start_offsets.value(row),
            chunk_index: chunk_indices.value(row),
            distance,
        });
    }

    Ok(results)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, TutorError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| TutorError::Store(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| TutorError::Store(format!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array, TutorError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| TutorError::Store(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| TutorError::Store(format!("Invalid {} column type", name)))
}
