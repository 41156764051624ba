//! The question-answering service shared by all request handlers.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::RagConfig;
use crate::context::ContextAssembler;
use crate::corpus::IndexedCorpus;
use crate::embedding::NormalizingEmbedder;
use crate::error::{DocQaError, Result};
use crate::generator::{AnswerGenerator, GenerationRequest};
use crate::retriever::Retriever;

pub const EMPTY_QUESTION_ANSWER: &str = "Please ask a question.";
pub const NOT_AVAILABLE_ANSWER: &str = "This topic is not available in the document.";
pub const GENERATION_FAILED_ANSWER: &str = "Error generating answer.";
pub const INTERNAL_ERROR_ANSWER: &str = "Internal server error. Check terminal.";

/// How a question was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    Answered,
    EmptyQuestion,
    NotAvailable,
    GenerationFailed,
    InternalError,
}

/// The reply to one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QaResponse {
    pub answer: String,
    /// Image URLs, in relevance order.
    pub images: Vec<String>,
    #[serde(skip)]
    pub outcome: AnswerOutcome,
}

impl QaResponse {
    fn fixed(answer: &str, outcome: AnswerOutcome) -> Self {
        Self { answer: answer.to_string(), images: Vec::new(), outcome }
    }
}

enum Failure {
    Generation(String),
    Internal(String),
}

/// Answers questions against a loaded corpus.
///
/// Construct once at startup and share behind an `Arc`.
pub struct DocumentQa {
    retriever: Retriever,
    assembler: ContextAssembler,
    generator: Arc<dyn AnswerGenerator>,
    generation_timeout: Duration,
    image_url_prefix: String,
}

impl DocumentQa {
    pub fn new(
        corpus: Arc<IndexedCorpus>,
        embedder: NormalizingEmbedder,
        generator: Arc<dyn AnswerGenerator>,
        config: &RagConfig,
    ) -> Self {
        Self {
            retriever: Retriever::new(corpus, embedder, config),
            assembler: ContextAssembler::from_config(config),
            generator,
            generation_timeout: config.generation_timeout(),
            image_url_prefix: config.image_url_prefix.clone(),
        }
    }

    /// Number of indexed chunks.
    pub fn chunk_count(&self) -> usize {
        self.retriever.corpus().len()
    }

    /// Answer `question`. Failures are reported through the fixed answers
    /// and [`QaResponse::outcome`], never as errors.
    pub async fn ask(&self, question: &str) -> QaResponse {
        let question = question.trim();
        if question.is_empty() {
            return QaResponse::fixed(EMPTY_QUESTION_ANSWER, AnswerOutcome::EmptyQuestion);
        }

        match self.answer(question).await {
            Ok(response) => {
                info!(outcome = ?response.outcome, image_count = response.images.len(), "answered question");
                response
            }
            Err(Failure::Generation(message)) => {
                warn!(error = %message, "answer generation failed");
                QaResponse::fixed(GENERATION_FAILED_ANSWER, AnswerOutcome::GenerationFailed)
            }
            Err(Failure::Internal(message)) => {
                error!(error = %message, "question failed");
                QaResponse::fixed(INTERNAL_ERROR_ANSWER, AnswerOutcome::InternalError)
            }
        }
    }

    async fn answer(&self, question: &str) -> std::result::Result<QaResponse, Failure> {
        let hits = self.retriever.retrieve(question).await.map_err(|e| Failure::Internal(e.to_string()))?;
        if hits.is_empty() {
            return Ok(QaResponse::fixed(NOT_AVAILABLE_ANSWER, AnswerOutcome::NotAvailable));
        }

        let context = self.assembler.assemble(&hits, self.retriever.corpus().metadata());
        if !context.has_text() {
            return Ok(QaResponse::fixed(NOT_AVAILABLE_ANSWER, AnswerOutcome::NotAvailable));
        }

        let request = GenerationRequest::new(context.text, question);
        let answer = self.generate(&request).await.map_err(|e| Failure::Generation(e.to_string()))?;

        let images =
            context.images.iter().map(|file| format!("{}{file}", self.image_url_prefix)).collect();
        Ok(QaResponse { answer: answer.trim().to_string(), images, outcome: AnswerOutcome::Answered })
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        match tokio::time::timeout(self.generation_timeout, self.generator.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(DocQaError::Generation {
                provider: self.generator.name().to_string(),
                message: format!("timed out after {}s", self.generation_timeout.as_secs()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::document::Chunk;
    use crate::embedding::EmbeddingProvider;
    use crate::index::VectorIndex;
    use crate::metadata::MetadataStore;

    struct AxisProvider;

    #[async_trait]
    impl EmbeddingProvider for AxisProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("fail-embed") {
                return Err(DocQaError::Embedding { provider: "axis".into(), message: "boom".into() });
            }
            let lower = text.to_lowercase();
            Ok(vec![
                if lower.contains("password") { 1.0 } else { 0.0 },
                if lower.contains("weather") { 1.0 } else { 0.0 },
                if lower.contains("diagram") { 0.5 } else { 0.0 },
            ])
        }

        fn name(&self) -> &str {
            "axis"
        }
    }

    enum Script {
        Reply(&'static str),
        Fail,
        Hang,
    }

    struct ScriptedGenerator {
        script: Script,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl AnswerGenerator for ScriptedGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<String> {
            self.seen.lock().unwrap().push(request.clone());
            match self.script {
                Script::Reply(text) => Ok(text.to_string()),
                Script::Fail => {
                    Err(DocQaError::Generation { provider: "scripted".into(), message: "down".into() })
                }
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(String::new())
                }
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    async fn service(script: Script) -> (DocumentQa, Arc<ScriptedGenerator>) {
        let chunks = vec![
            Chunk::text("Password Reset\nOpen settings and choose reset password.", "a.docx"),
            Chunk::image("Password Reset diagram password flow", "pw.png", "a.docx"),
        ];
        let embedder = NormalizingEmbedder::new(Arc::new(AxisProvider));
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let vectors = embedder.embed_documents(&texts).await.unwrap();
        let corpus = Arc::new(
            IndexedCorpus::new(VectorIndex::build(&vectors).unwrap(), MetadataStore::from_chunks(&chunks))
                .unwrap(),
        );
        let generator = Arc::new(ScriptedGenerator { script, seen: Mutex::new(Vec::new()) });
        let config = RagConfig::builder().generation_timeout_secs(5).build().unwrap();
        (DocumentQa::new(corpus, embedder, generator.clone(), &config), generator)
    }

    #[tokio::test]
    async fn blank_question_short_circuits() {
        let (qa, generator) = service(Script::Reply("x")).await;
        let response = qa.ask("   ").await;
        assert_eq!(response.answer, EMPTY_QUESTION_ANSWER);
        assert_eq!(response.outcome, AnswerOutcome::EmptyQuestion);
        assert!(generator.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn answered_question_carries_image_urls() {
        let (qa, generator) = service(Script::Reply("  Open settings.  ")).await;
        let response = qa.ask("How do I reset my password?").await;

        assert_eq!(response.outcome, AnswerOutcome::Answered);
        assert_eq!(response.answer, "Open settings.");
        assert_eq!(response.images, vec!["/static/images/pw.png"]);
        let seen = generator.seen.lock().unwrap();
        assert!(seen[0].context.starts_with("Password Reset\n"));
        assert_eq!(seen[0].question, "How do I reset my password?");
    }

    #[tokio::test]
    async fn unrelated_question_is_not_available() {
        let (qa, generator) = service(Script::Reply("x")).await;
        let response = qa.ask("What is the weather?").await;
        assert_eq!(response.answer, NOT_AVAILABLE_ANSWER);
        assert!(response.images.is_empty());
        assert_eq!(response.outcome, AnswerOutcome::NotAvailable);
        assert!(generator.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn generator_failure_is_reported() {
        let (qa, _) = service(Script::Fail).await;
        let response = qa.ask("password").await;
        assert_eq!(response.answer, GENERATION_FAILED_ANSWER);
        assert!(response.images.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn generator_timeout_is_a_generation_failure() {
        let (qa, _) = service(Script::Hang).await;
        let response = qa.ask("password").await;
        assert_eq!(response.outcome, AnswerOutcome::GenerationFailed);
    }

    #[tokio::test]
    async fn embedding_failure_is_internal_error() {
        let (qa, _) = service(Script::Reply("x")).await;
        let response = qa.ask("fail-embed").await;
        assert_eq!(response.answer, INTERNAL_ERROR_ANSWER);
        assert_eq!(response.outcome, AnswerOutcome::InternalError);
    }

    #[test]
    fn outcome_is_not_serialized() {
        let response = QaResponse::fixed(NOT_AVAILABLE_ANSWER, AnswerOutcome::NotAvailable);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({"answer": NOT_AVAILABLE_ANSWER, "images": []}));
    }
}
