use std::sync::Arc;

use async_trait::async_trait;
use docqa_rag::qa::{EMPTY_QUESTION_ANSWER, INTERNAL_ERROR_ANSWER, NOT_AVAILABLE_ANSWER};
use docqa_rag::{
    AnswerGenerator, Chunk, DocumentQa, EmbeddingProvider, GenerationRequest, IndexedCorpus,
    MetadataStore, NormalizingEmbedder, RagConfig, Result, VectorIndex,
};
use docqa_server::{AppState, app_router};
use serde_json::Value;

struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let lower = text.to_lowercase();
        Ok(vec![
            if lower.contains("password") { 1.0 } else { 0.0 },
            if lower.contains("weather") { 1.0 } else { 0.0 },
        ])
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

struct EchoGenerator;

#[async_trait]
impl AnswerGenerator for EchoGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        Ok(format!("Answer for: {}", request.question))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

struct PanickingGenerator;

#[async_trait]
impl AnswerGenerator for PanickingGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        panic!("generator blew up");
    }

    fn name(&self) -> &str {
        "panicking"
    }
}

async fn spawn_server() -> (String, tokio::task::JoinHandle<()>, tempfile::TempDir) {
    spawn_server_with(Arc::new(EchoGenerator)).await
}

async fn spawn_server_with(
    generator: Arc<dyn AnswerGenerator>,
) -> (String, tokio::task::JoinHandle<()>, tempfile::TempDir) {
    let images = tempfile::tempdir().expect("image dir");
    std::fs::write(images.path().join("reset.png"), b"png bytes").expect("write image");

    let chunks = vec![
        Chunk::text("Password Reset\nOpen settings.", "a.docx"),
        Chunk::image("Password Reset diagram password", "reset.png", "a.docx"),
    ];
    let embedder = NormalizingEmbedder::new(Arc::new(KeywordEmbedder));
    let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
    let vectors = embedder.embed_documents(&texts).await.expect("embed");
    let corpus = IndexedCorpus::new(
        VectorIndex::build(&vectors).expect("index"),
        MetadataStore::from_chunks(&chunks),
    )
    .expect("corpus");
    let qa = DocumentQa::new(Arc::new(corpus), embedder, generator, &RagConfig::default());

    let app = app_router(AppState { qa: Arc::new(qa), image_dir: images.path().to_path_buf() });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    (format!("http://{}", addr), handle, images)
}

#[tokio::test]
async fn health_reports_chunk_count() {
    let (base, handle, _images) = spawn_server().await;

    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .expect("health response")
        .json()
        .await
        .expect("health json");
    assert_eq!(body, serde_json::json!({"status": "ok", "service": "docqa", "chunks": 2}));

    handle.abort();
}

#[tokio::test]
async fn index_serves_html() {
    let (base, handle, _images) = spawn_server().await;

    let response = reqwest::get(format!("{}/", base)).await.expect("index response");
    assert!(response.status().is_success());
    let text = response.text().await.expect("index body");
    assert!(text.contains("<form id=\"ask\">"));

    handle.abort();
}

#[tokio::test]
async fn ask_accepts_json_and_returns_image_urls() {
    let (base, handle, _images) = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/ask", base))
        .json(&serde_json::json!({"question": "How do I reset my password?"}))
        .send()
        .await
        .expect("ask response");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("ask json");
    assert_eq!(body["answer"], "Answer for: How do I reset my password?");
    assert_eq!(body["images"], serde_json::json!(["/static/images/reset.png"]));
    assert!(body.get("outcome").is_none());

    let image = client
        .get(format!("{}/static/images/reset.png", base))
        .send()
        .await
        .expect("image response");
    assert!(image.status().is_success());
    assert_eq!(image.bytes().await.expect("image bytes").as_ref(), b"png bytes");

    handle.abort();
}

#[tokio::test]
async fn ask_accepts_form_bodies() {
    let (base, handle, _images) = spawn_server().await;

    let body: Value = reqwest::Client::new()
        .post(format!("{}/ask", base))
        .form(&[("question", "weather today?")])
        .send()
        .await
        .expect("ask response")
        .json()
        .await
        .expect("ask json");
    assert_eq!(body["answer"], NOT_AVAILABLE_ANSWER);
    assert_eq!(body["images"], serde_json::json!([]));

    handle.abort();
}

#[tokio::test]
async fn unreadable_or_blank_questions_get_prompt() {
    let (base, handle, _images) = spawn_server().await;
    let client = reqwest::Client::new();

    for request in [
        client.post(format!("{}/ask", base)).header("content-type", "application/json").body("{not json"),
        client.post(format!("{}/ask", base)).json(&serde_json::json!({"question": "   "})),
        client.post(format!("{}/ask", base)).json(&serde_json::json!({})),
        client.post(format!("{}/ask", base)).body("question=hello"),
    ] {
        let response = request.send().await.expect("ask response");
        assert!(response.status().is_success());
        let body: Value = response.json().await.expect("ask json");
        assert_eq!(body["answer"], EMPTY_QUESTION_ANSWER);
    }

    handle.abort();
}

#[tokio::test]
async fn panic_while_answering_returns_internal_error_reply() {
    let (base, handle, _images) = spawn_server_with(Arc::new(PanickingGenerator)).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/ask", base))
        .json(&serde_json::json!({"question": "How do I reset my password?"}))
        .send()
        .await
        .expect("ask response");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("ask json");
    assert_eq!(body, serde_json::json!({"answer": INTERNAL_ERROR_ANSWER, "images": []}));

    let health = client.get(format!("{}/health", base)).send().await.expect("health response");
    assert!(health.status().is_success());

    handle.abort();
}
