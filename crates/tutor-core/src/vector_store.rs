//! Similarity index trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// A passage returned by a similarity query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub text: String,
    pub metadata: serde_json::Value,
    pub score: f32,
}

impl ScoredPassage {
    /// Human-readable name of the passage's origin, if the metadata carries one.
    pub fn source_name(&self) -> Option<&str> {
        ["title", "source", "name"].iter().find_map(|key| {
            self.metadata
                .get(*key)
                .and_then(|v| v.as_str())
                .filter(|name| !name.trim().is_empty())
        })
    }
}

/// A passage to be written into the index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedPassage {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: serde_json::Value,
}

/// Trait for vector similarity indexes (e.g., Qdrant, in-memory)
///
/// Queries are side-effect free and return passages ordered by descending
/// similarity. An empty index yields an empty result, not an error; an
/// unreachable backing store is `Error::IndexUnavailable`.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Prepare storage for vectors of the given dimension (idempotent)
    async fn initialize(&self, dimension: usize) -> Result<()>;

    /// Return up to `k` nearest passages to `vector`
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredPassage>>;

    /// Insert or replace passages by id
    async fn upsert(&self, passages: Vec<IndexedPassage>) -> Result<usize>;

    /// Get the total number of stored passages
    async fn count(&self) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn passage(metadata: serde_json::Value) -> ScoredPassage {
        ScoredPassage {
            text: "ROS 2 nodes communicate over topics.".to_string(),
            metadata,
            score: 0.9,
        }
    }

    #[test]
    fn test_source_name_prefers_title() {
        let p = passage(json!({"title": "Chapter 2: Nodes", "source": "docs/ros2.md"}));
        assert_eq!(p.source_name(), Some("Chapter 2: Nodes"));
    }

    #[test]
    fn test_source_name_falls_through_keys() {
        assert_eq!(passage(json!({"source": "docs/ros2.md"})).source_name(), Some("docs/ros2.md"));
        assert_eq!(passage(json!({"name": "Gazebo"})).source_name(), Some("Gazebo"));
    }

    #[test]
    fn test_source_name_skips_blank_keys() {
        let p = passage(json!({"title": "", "source": "ros2.md"}));
        assert_eq!(p.source_name(), Some("ros2.md"));
        let p = passage(json!({"title": " ", "source": 7, "name": "Isaac Sim"}));
        assert_eq!(p.source_name(), Some("Isaac Sim"));
    }

    #[test]
    fn test_source_name_missing() {
        assert_eq!(passage(json!({})).source_name(), None);
        assert_eq!(passage(json!({"title": "  "})).source_name(), None);
        assert_eq!(passage(json!({"title": 42})).source_name(), None);
        assert_eq!(passage(serde_json::Value::Null).source_name(), None);
    }
}
