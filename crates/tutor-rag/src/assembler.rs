//! Answer assembler: context selection, prompt composition, generation and provenance

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use tutor_core::{
    Answer, ContextFragment, EmbeddingProvider, Error, GenerationProvider, InteractionRecord,
    InteractionRecorder, Prompt, RecordOutcome, Result, SimilarityIndex, SourceRef, UNKNOWN_LABEL,
    excerpt,
};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful robotics and AI assistant.";

pub const DEFAULT_PREAMBLE: &str =
    "You are a helpful assistant for a Physical AI & Humanoid Robotics textbook.";

pub const DEFAULT_FALLBACK_CONTEXT: &str = "You are a helpful assistant for a Physical AI & Humanoid Robotics textbook. \
Answer questions about ROS 2, Gazebo, NVIDIA Isaac, humanoid robots, and robotics in general. \
Be clear, technical but accessible, and provide practical examples when possible.";

/// What to do when embedding or index lookup fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalFailurePolicy {
    /// Answer from the static fallback context instead
    #[default]
    Fallback,
    /// Fail the request with the retrieval error
    Propagate,
}

impl FromStr for RetrievalFailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fallback" | "degrade" => Ok(Self::Fallback),
            "propagate" | "strict" => Ok(Self::Propagate),
            _ => Err(Error::Configuration(format!(
                "unknown retrieval failure policy: {s}"
            ))),
        }
    }
}

/// Configuration for answer assembly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblerConfig {
    pub top_k: usize,
    pub preview_chars: usize,
    pub retrieval_timeout: Duration,
    pub on_retrieval_failure: RetrievalFailurePolicy,
    pub system_prompt: String,
    pub preamble: String,
    pub fallback_context: String,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            preview_chars: 200,
            retrieval_timeout: Duration::from_secs(10),
            on_retrieval_failure: RetrievalFailurePolicy::Fallback,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            preamble: DEFAULT_PREAMBLE.to_string(),
            fallback_context: DEFAULT_FALLBACK_CONTEXT.to_string(),
        }
    }
}

struct Retrieval {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn SimilarityIndex>,
}

/// Turns a question into a grounded, source-annotated answer
///
/// Context comes from exactly one place per request: the user's selected text
/// when there is any, otherwise a nearest-neighbour lookup, otherwise (no
/// retrieval configured, or retrieval failed under the fallback policy) a
/// static priming fragment. The `sources` of the answer are exactly the
/// fragments that went into the prompt, in the same order.
pub struct AnswerAssembler {
    generator: Arc<dyn GenerationProvider>,
    retrieval: Option<Retrieval>,
    recorder: Option<Arc<dyn InteractionRecorder>>,
    config: AssemblerConfig,
}

impl AnswerAssembler {
    /// Create an assembler in degraded mode (no retrieval, no recording)
    pub fn new(generator: Arc<dyn GenerationProvider>) -> Self {
        Self {
            generator,
            retrieval: None,
            recorder: None,
            config: AssemblerConfig::default(),
        }
    }

    /// Enable nearest-neighbour retrieval
    pub fn with_retrieval(
        mut self,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn SimilarityIndex>,
    ) -> Self {
        self.retrieval = Some(Retrieval { embedder, index });
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn InteractionRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_config(mut self, config: AssemblerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Whether answers are grounded by retrieval rather than the fallback context
    pub fn has_retrieval(&self) -> bool {
        self.retrieval.is_some()
    }

    pub fn generator(&self) -> &Arc<dyn GenerationProvider> {
        &self.generator
    }

    /// Answer a question, optionally scoped to a passage the user selected
    pub async fn answer_question(&self, question: &str, selected_text: Option<&str>) -> Result<Answer> {
        let fragments = self.select_context(question, selected_text).await?;
        let prompt = self.compose_prompt(question, &fragments);

        let generated = self
            .generator
            .generate(&prompt.to_messages())
            .await
            .map_err(|e| e.context("generating answer"))?;

        let answer = Answer {
            text: generated.text,
            sources: self.annotate(&fragments),
        };

        self.record_in_background(InteractionRecord::new(
            question,
            answer.text.clone(),
            selected_text.map(str::to_string),
        ));

        Ok(answer)
    }

    /// Decide which fragments ground the answer
    pub async fn select_context(
        &self,
        question: &str,
        selected_text: Option<&str>,
    ) -> Result<Vec<ContextFragment>> {
        if let Some(text) = selected_text.filter(|t| !t.is_empty()) {
            debug!("using selected text as context, skipping retrieval");
            return Ok(vec![ContextFragment::selected(text)]);
        }

        let Some(retrieval) = &self.retrieval else {
            return Ok(vec![ContextFragment::fallback(self.config.fallback_context.clone())]);
        };

        match self.retrieve(retrieval, question).await {
            Ok(fragments) => Ok(fragments),
            Err(e) => match self.config.on_retrieval_failure {
                RetrievalFailurePolicy::Fallback => {
                    warn!(error = %e, "retrieval failed, answering from fallback context");
                    Ok(vec![ContextFragment::fallback(self.config.fallback_context.clone())])
                }
                RetrievalFailurePolicy::Propagate => Err(e.context("retrieving context")),
            },
        }
    }

    async fn retrieve(&self, retrieval: &Retrieval, question: &str) -> Result<Vec<ContextFragment>> {
        let limit = self.config.retrieval_timeout;

        let vector = timeout(limit, retrieval.embedder.embed(question))
            .await
            .map_err(|_| Error::Embedding(format!("No embedding within {:?}", limit)))??;

        let passages = timeout(limit, retrieval.index.query(&vector, self.config.top_k))
            .await
            .map_err(|_| Error::IndexUnavailable(format!("No index response within {:?}", limit)))??;

        debug!(results = passages.len(), top_k = self.config.top_k, "retrieved passages");

        Ok(passages
            .into_iter()
            .take(self.config.top_k)
            .map(|p| {
                let label = p.source_name().unwrap_or(UNKNOWN_LABEL).to_string();
                ContextFragment::retrieved(p.text, label, p.score)
            })
            .collect())
    }

    pub fn compose_prompt(&self, question: &str, fragments: &[ContextFragment]) -> Prompt {
        Prompt::new(
            self.config.system_prompt.clone(),
            self.config.preamble.clone(),
            fragments,
            question,
        )
    }

    /// One source entry per fragment, excerpts cut to the preview bound
    pub fn annotate(&self, fragments: &[ContextFragment]) -> Vec<SourceRef> {
        fragments
            .iter()
            .map(|f| SourceRef {
                excerpt: excerpt(&f.text, self.config.preview_chars),
                source_label: f.source_label.clone(),
                score: f.score,
            })
            .collect()
    }

    fn record_in_background(&self, record: InteractionRecord) {
        let Some(recorder) = self.recorder.clone() else {
            return;
        };

        tokio::spawn(async move {
            match recorder.record(record).await {
                RecordOutcome::Stored { id } => debug!(id, "interaction recorded"),
                RecordOutcome::Failed { reason } => warn!(%reason, "failed to record interaction"),
            }
        });
    }
}
