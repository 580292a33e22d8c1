//! Test doubles for the capability traits

use async_trait::async_trait;
use serde_json::json;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

use tutor_core::{
    ChatMessage, EmbeddingProvider, Error, GenerationProvider, GenerationResult, IndexedPassage,
    InteractionRecord, InteractionRecorder, RecordOutcome, Result, ScoredPassage, SimilarityIndex,
};

/// Passages titled `chapter-<i>.md` with text `passage <i>` and the given scores
pub fn passages(scores: &[f32]) -> Vec<ScoredPassage> {
    scores
        .iter()
        .enumerate()
        .map(|(i, score)| ScoredPassage {
            text: format!("passage {i}"),
            metadata: json!({"title": format!("chapter-{i}.md")}),
            score: *score,
        })
        .collect()
}

pub struct ScriptedGenerator {
    reply: Option<String>,
    calls: AtomicUsize,
    last_prompt: Mutex<String>,
}

impl ScriptedGenerator {
    pub fn answering(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(String::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(String::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Content of the user message from the most recent call
    pub fn last_prompt(&self) -> String {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedGenerator {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<GenerationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(user) = messages.last() {
            *self.last_prompt.lock().unwrap() = user.content.clone();
        }
        match &self.reply {
            Some(text) => Ok(GenerationResult {
                text: text.clone(),
                model_id: "scripted".to_string(),
                tokens_used: None,
            }),
            None => Err(Error::Generation("quota exhausted".to_string())),
        }
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

pub struct CountingEmbedder {
    dimension: usize,
    fail: bool,
    hang: bool,
    calls: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail: false,
            hang: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(4)
        }
    }

    /// Never answers
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::new(4)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail {
            return Err(Error::Embedding("provider fault".to_string()));
        }
        Ok(vec![0.5; self.dimension])
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

pub struct StaticIndex {
    results: Option<Vec<ScoredPassage>>,
    honour_k: bool,
    hang: bool,
    calls: AtomicUsize,
    last_k: Mutex<Option<usize>>,
}

impl StaticIndex {
    pub fn with(results: Vec<ScoredPassage>) -> Self {
        Self {
            results: Some(results),
            honour_k: true,
            hang: false,
            calls: AtomicUsize::new(0),
            last_k: Mutex::new(None),
        }
    }

    pub fn ignoring_k(results: Vec<ScoredPassage>) -> Self {
        Self {
            honour_k: false,
            ..Self::with(results)
        }
    }

    pub fn unavailable() -> Self {
        Self {
            results: None,
            ..Self::with(Vec::new())
        }
    }

    /// Accepts queries but never answers them
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::with(passages(&[0.9]))
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_k(&self) -> Option<usize> {
        *self.last_k.lock().unwrap()
    }
}

#[async_trait]
impl SimilarityIndex for StaticIndex {
    async fn initialize(&self, _dimension: usize) -> Result<()> {
        Ok(())
    }

    async fn query(&self, _vector: &[f32], k: usize) -> Result<Vec<ScoredPassage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_k.lock().unwrap() = Some(k);
        if self.hang {
            std::future::pending::<()>().await;
        }
        let results = self
            .results
            .clone()
            .ok_or_else(|| Error::IndexUnavailable("connection refused".to_string()))?;
        Ok(if self.honour_k {
            results.into_iter().take(k).collect()
        } else {
            results
        })
    }

    async fn upsert(&self, passages: Vec<IndexedPassage>) -> Result<usize> {
        Ok(passages.len())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.results.as_ref().map_or(0, Vec::len))
    }
}

/// Forwards every record to a channel so tests can await the background write
pub struct ChannelRecorder {
    tx: mpsc::UnboundedSender<InteractionRecord>,
}

impl ChannelRecorder {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<InteractionRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl InteractionRecorder for ChannelRecorder {
    async fn record(&self, record: InteractionRecord) -> RecordOutcome {
        match self.tx.send(record) {
            Ok(()) => RecordOutcome::Stored { id: 1 },
            Err(e) => RecordOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }
}

pub struct FailingRecorder;

#[async_trait]
impl InteractionRecorder for FailingRecorder {
    async fn record(&self, _record: InteractionRecord) -> RecordOutcome {
        RecordOutcome::Failed {
            reason: "database is locked".to_string(),
        }
    }
}
