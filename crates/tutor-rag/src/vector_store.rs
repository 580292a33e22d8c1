//! Similarity index implementations

use async_trait::async_trait;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value, VectorParamsBuilder, value::Kind,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

use tutor_core::{Error, IndexedPassage, Result, ScoredPassage, SimilarityIndex};

/// Payload key holding the passage text in Qdrant points
const CONTENT_KEY: &str = "content";

/// Local in-memory vector store implementation
pub struct LocalVectorStore {
    passages: Arc<RwLock<HashMap<String, IndexedPassage>>>,
    dimension: RwLock<Option<usize>>,
}

impl LocalVectorStore {
    /// Create a new local vector store
    pub fn new() -> Self {
        Self {
            passages: Arc::new(RwLock::new(HashMap::new())),
            dimension: RwLock::new(None),
        }
    }

    /// Simple cosine similarity calculation
    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }

    fn check_dimension(&self, len: usize) -> Result<()> {
        let dimension = *self
            .dimension
            .read()
            .map_err(|e| Error::IndexUnavailable(format!("Lock error: {}", e)))?;
        match dimension {
            Some(d) if d != len => Err(Error::IndexUnavailable(format!(
                "Vector has {} dimensions, index expects {}",
                len, d
            ))),
            _ => Ok(()),
        }
    }
}

impl Default for LocalVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SimilarityIndex for LocalVectorStore {
    async fn initialize(&self, dimension: usize) -> Result<()> {
        let mut current = self
            .dimension
            .write()
            .map_err(|e| Error::IndexUnavailable(format!("Lock error: {}", e)))?;
        *current = Some(dimension);
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredPassage>> {
        self.check_dimension(vector.len())?;

        let passages = self
            .passages
            .read()
            .map_err(|e| Error::IndexUnavailable(format!("Lock error: {}", e)))?;

        let mut scored: Vec<(&String, ScoredPassage)> = passages
            .iter()
            .map(|(id, p)| {
                (
                    id,
                    ScoredPassage {
                        text: p.text.clone(),
                        metadata: p.metadata.clone(),
                        score: Self::cosine_similarity(vector, &p.embedding),
                    },
                )
            })
            .collect();

        // Ties broken by id so repeated queries return the same order.
        scored.sort_by(|(id_a, a), (id_b, b)| b.score.total_cmp(&a.score).then_with(|| id_a.cmp(id_b)));
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, p)| p).collect())
    }

    async fn upsert(&self, new_passages: Vec<IndexedPassage>) -> Result<usize> {
        for passage in &new_passages {
            self.check_dimension(passage.embedding.len())?;
        }

        let mut passages = self
            .passages
            .write()
            .map_err(|e| Error::IndexUnavailable(format!("Lock error: {}", e)))?;

        let count = new_passages.len();
        for passage in new_passages {
            passages.insert(passage.id.clone(), passage);
        }
        Ok(count)
    }

    async fn count(&self) -> Result<usize> {
        let passages = self
            .passages
            .read()
            .map_err(|e| Error::IndexUnavailable(format!("Lock error: {}", e)))?;
        Ok(passages.len())
    }
}

/// Qdrant-backed similarity index
pub struct QdrantVectorStore {
    client: Qdrant,
    collection_name: String,
}

impl QdrantVectorStore {
    pub fn new(url: &str, api_key: Option<String>, collection_name: &str) -> Result<Self> {
        let mut builder = Qdrant::from_url(url);
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder
            .build()
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            collection_name: collection_name.to_string(),
        })
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }
}

#[async_trait]
impl SimilarityIndex for QdrantVectorStore {
    async fn initialize(&self, dimension: usize) -> Result<()> {
        let exists = self
            .client
            .collection_exists(self.collection_name.clone())
            .await
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection_name)
                        .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
                )
                .await
                .map_err(|e| Error::IndexUnavailable(e.to_string()))?;
            info!(collection = %self.collection_name, dimension, "created Qdrant collection");
        }

        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredPassage>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection_name, vector.to_vec(), k as u64).with_payload(true),
            )
            .await
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| {
                let (text, metadata) = split_payload(point.payload);
                ScoredPassage {
                    text,
                    metadata,
                    score: point.score,
                }
            })
            .collect())
    }

    async fn upsert(&self, passages: Vec<IndexedPassage>) -> Result<usize> {
        if passages.is_empty() {
            return Ok(0);
        }

        let count = passages.len();
        let points = passages
            .into_iter()
            .map(|p| {
                let mut body = match p.metadata {
                    serde_json::Value::Object(map) => map,
                    _ => serde_json::Map::new(),
                };
                body.insert(CONTENT_KEY.to_string(), json!(p.text));
                let payload = Payload::try_from(serde_json::Value::Object(body))
                    .map_err(|e| Error::Serialization(e.to_string()))?;
                Ok(PointStruct::new(p.id, p.embedding, payload))
            })
            .collect::<Result<Vec<_>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection_name, points).wait(true))
            .await
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;

        Ok(count)
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection_name).exact(true))
            .await
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        Ok(response.result.map_or(0, |r| r.count as usize))
    }
}

/// Separate the passage text from the rest of a point's payload
fn split_payload(mut payload: HashMap<String, Value>) -> (String, serde_json::Value) {
    let text = match payload.remove(CONTENT_KEY).and_then(|v| v.kind) {
        Some(Kind::StringValue(s)) => s,
        _ => String::new(),
    };

    let metadata = payload
        .into_iter()
        .map(|(key, value)| (key, value_to_json(value)))
        .collect::<serde_json::Map<_, _>>();

    (text, serde_json::Value::Object(metadata))
}

fn value_to_json(value: Value) -> serde_json::Value {
    match value.kind {
        Some(Kind::StringValue(s)) => json!(s),
        Some(Kind::IntegerValue(i)) => json!(i),
        Some(Kind::DoubleValue(d)) => json!(d),
        Some(Kind::BoolValue(b)) => json!(b),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(value_to_json).collect())
        }
        Some(Kind::StructValue(s)) => serde_json::Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, value_to_json(v)))
                .collect(),
        ),
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(id: &str, embedding: Vec<f32>, title: &str) -> IndexedPassage {
        IndexedPassage {
            id: id.to_string(),
            text: format!("text of {id}"),
            embedding,
            metadata: json!({"title": title}),
        }
    }

    #[tokio::test]
    async fn test_local_vector_store() {
        let store = LocalVectorStore::new();
        store.initialize(2).await.unwrap();

        let stored = store
            .upsert(vec![passage("a", vec![1.0, 0.0], "A"), passage("b", vec![0.0, 1.0], "B")])
            .await
            .unwrap();
        assert_eq!(stored, 2);
        assert_eq!(store.count().await.unwrap(), 2);

        // Upsert replaces by id.
        store.upsert(vec![passage("a", vec![1.0, 0.0], "A2")]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_query_orders_by_descending_score() {
        let store = LocalVectorStore::new();
        store.initialize(2).await.unwrap();
        store
            .upsert(vec![
                passage("far", vec![0.0, 1.0], "Far"),
                passage("near", vec![1.0, 0.1], "Near"),
                passage("mid", vec![1.0, 1.0], "Mid"),
            ])
            .await
            .unwrap();

        let results = store.query(&[1.0, 0.0], 3).await.unwrap();
        let titles: Vec<_> = results.iter().map(|r| r.source_name().unwrap()).collect();
        assert_eq!(titles, vec!["Near", "Mid", "Far"]);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_query_returns_min_of_k_and_available() {
        let store = LocalVectorStore::new();
        store.initialize(2).await.unwrap();
        store.upsert(vec![passage("a", vec![1.0, 0.0], "A")]).await.unwrap();

        assert_eq!(store.query(&[1.0, 0.0], 3).await.unwrap().len(), 1);
        assert_eq!(store.query(&[1.0, 0.0], 0).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_empty_index_returns_empty() {
        let store = LocalVectorStore::new();
        store.initialize(3).await.unwrap();
        assert!(store.query(&[0.1, 0.2, 0.3], 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let store = LocalVectorStore::new();
        store.initialize(3).await.unwrap();
        let err = store.query(&[1.0, 0.0], 3).await.unwrap_err();
        assert!(matches!(err, Error::IndexUnavailable(_)));
        let err = store.upsert(vec![passage("a", vec![1.0], "A")]).await.unwrap_err();
        assert!(matches!(err, Error::IndexUnavailable(_)));
    }

    #[tokio::test]
    async fn test_ties_are_stable() {
        let store = LocalVectorStore::new();
        store.initialize(2).await.unwrap();
        store
            .upsert(vec![
                passage("c", vec![1.0, 0.0], "C"),
                passage("a", vec![1.0, 0.0], "A"),
                passage("b", vec![1.0, 0.0], "B"),
            ])
            .await
            .unwrap();
        let titles: Vec<_> = store
            .query(&[1.0, 0.0], 3)
            .await
            .unwrap()
            .iter()
            .map(|r| r.source_name().unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_split_payload() {
        let mut payload = HashMap::new();
        payload.insert(CONTENT_KEY.to_string(), Value::from("Isaac Sim renders scenes.".to_string()));
        payload.insert("title".to_string(), Value::from("NVIDIA Isaac".to_string()));
        payload.insert("chunk".to_string(), Value::from(2i64));

        let (text, metadata) = split_payload(payload);
        assert_eq!(text, "Isaac Sim renders scenes.");
        assert_eq!(metadata, json!({"title": "NVIDIA Isaac", "chunk": 2}));
    }
}
