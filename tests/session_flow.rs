//! Integration tests for the upload → chat flow against a mock backend.
//!
//! Every test starts its own `wiremock` server, so they run in parallel and
//! need no network access. Request counts are asserted with `.expect(n)`,
//! which is verified when the server is dropped.
//!
//! Run with:
//!   cargo test --test session_flow
//!
//! Set `RUST_LOG=edgequake_pdfchat=debug` to see the client's logs.

use edgequake_pdfchat::{
    ApiClient, ChatRoute, ChatSession, ChatState, ChunkId, ClientConfig, ClientError, DocumentId,
    DocumentSession, FallbackReason, PreviewMode, Role, StagedFile, SubmitRejection,
    UploadController, UploadError, UploadState,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

struct Harness {
    server: MockServer,
    config: ClientConfig,
    api: ApiClient,
    docs: DocumentSession,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn harness() -> Harness {
    init_tracing();
    let server = MockServer::start().await;
    let config = ClientConfig::builder()
        .base_url(server.uri())
        .request_timeout_secs(5)
        .upload_timeout_secs(5)
        .build()
        .unwrap();
    let api = ApiClient::new(&config).unwrap();
    let docs = DocumentSession::new(api.clone(), &config);
    Harness {
        server,
        config,
        api,
        docs,
    }
}

impl Harness {
    fn uploader(&self) -> UploadController {
        UploadController::new(self.api.clone(), &self.config)
    }

    fn chat(&self, route: &str) -> ChatSession {
        ChatSession::open(&ChatRoute::parse(route), &self.docs, &self.config)
    }
}

fn pdf(name: &str, body: &str) -> StagedFile {
    StagedFile::from_bytes(name, format!("%PDF-1.7\n{body}\n%%EOF\n")).unwrap()
}

fn upload_ok(doc_id: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "doc_id": doc_id,
        "chunks": ["a", "b", "c"],
        "message": "File uploaded and processed"
    }))
}

fn chunk_list(ids: &[u64]) -> ResponseTemplate {
    let chunks: Vec<_> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| json!({"chunk_id": id, "page": i + 1, "preview": format!("chunk {id}")}))
        .collect();
    ResponseTemplate::new(200).set_body_json(chunks)
}

async fn upload_bodies(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST" && r.url.path() == "/upload")
        .map(|r| String::from_utf8_lossy(&r.body).into_owned())
        .collect()
}

// ── Upload ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_reports_identity_and_chunk_count() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(upload_ok(42))
        .expect(1)
        .mount(&h.server)
        .await;

    let mut upload = h.uploader();
    upload.select_file(pdf("spec.pdf", "spec"));
    let hand_off = upload.upload().await.unwrap();

    assert_eq!(hand_off.doc_id, DocumentId::from(42));
    assert_eq!(hand_off.chunk_count, 3);
    assert_eq!(hand_off.route().to_path(), "/chat?doc_id=42");
    assert_eq!(
        upload.state(),
        &UploadState::Uploaded {
            doc_id: DocumentId::from(42),
            chunk_count: 3
        }
    );
}

#[tokio::test]
async fn upload_then_continue_sends_one_request() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(upload_ok(42))
        .expect(1)
        .mount(&h.server)
        .await;

    let mut upload = h.uploader();
    upload.select_file(pdf("spec.pdf", "spec"));
    upload.upload().await.unwrap();

    let hand_off = upload.continue_to_chat().await.unwrap();
    assert!(hand_off.reused);
    assert_eq!(hand_off.doc_id, DocumentId::from(42));
}

#[tokio::test]
async fn continue_twice_uploads_once() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(upload_ok(7))
        .expect(1)
        .mount(&h.server)
        .await;

    let mut upload = h.uploader();
    upload.select_file(pdf("notes.pdf", "notes"));

    let first = upload.continue_to_chat().await.unwrap();
    let second = upload.continue_to_chat().await.unwrap();
    assert!(!first.reused);
    assert!(second.reused);
    assert_eq!(first.route(), second.route());
}

#[tokio::test]
async fn new_selection_is_uploaded_again() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(upload_ok(1))
        .expect(2)
        .mount(&h.server)
        .await;

    let mut upload = h.uploader();
    upload.select_file(pdf("a.pdf", "a"));
    upload.continue_to_chat().await.unwrap();

    upload.select_file(pdf("b.pdf", "b"));
    assert_eq!(upload.state(), &UploadState::Idle);
    let hand_off = upload.continue_to_chat().await.unwrap();
    assert!(!hand_off.reused);

    let bodies = upload_bodies(&h.server).await;
    assert!(bodies[1].contains("filename=\"b.pdf\""));
}

#[tokio::test]
async fn doc_name_is_sent_only_when_present() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(upload_ok(1))
        .expect(2)
        .mount(&h.server)
        .await;

    let mut upload = h.uploader();
    upload.select_file(pdf("a.pdf", "a"));
    upload.set_name("   ");
    upload.upload().await.unwrap();

    upload.set_name("Lecture 3");
    upload.upload().await.unwrap();

    let bodies = upload_bodies(&h.server).await;
    assert_eq!(bodies.len(), 2);
    assert!(bodies[0].contains("name=\"file\""));
    assert!(!bodies[0].contains("name=\"doc_name\""));
    assert!(bodies[1].contains("name=\"doc_name\""));
    assert!(bodies[1].contains("Lecture 3"));
}

#[tokio::test]
async fn failed_upload_shows_service_message_and_can_retry() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"message": "Only PDF files are allowed"})),
        )
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(upload_ok(9))
        .mount(&h.server)
        .await;

    let mut upload = h.uploader();
    upload.select_file(pdf("a.pdf", "a"));

    let err = upload.continue_to_chat().await.unwrap_err();
    assert_eq!(err, UploadError::Failed("Only PDF files are allowed".into()));
    assert_eq!(
        edgequake_pdfchat::render::upload_status(upload.state()).as_deref(),
        Some("Only PDF files are allowed")
    );

    let hand_off = upload.continue_to_chat().await.unwrap();
    assert_eq!(hand_off.doc_id, DocumentId::from(9));
}

#[tokio::test]
async fn upload_without_file_never_reaches_the_network() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(upload_ok(1))
        .expect(0)
        .mount(&h.server)
        .await;

    let mut upload = h.uploader();
    assert_eq!(upload.continue_to_chat().await.unwrap_err(), UploadError::NoFileSelected);
    assert_eq!(upload.state(), &UploadState::Idle);
}

#[tokio::test]
async fn upload_prefetches_chunk_previews() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(upload_ok(42))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/upload/42/chunks"))
        .respond_with(chunk_list(&[1, 2, 3]))
        .expect(1)
        .mount(&h.server)
        .await;

    let mut upload = h.uploader().with_prefetch(h.docs.clone());
    upload.select_file(pdf("spec.pdf", "spec"));
    upload.continue_to_chat().await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while h.docs.chunks().len() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("prefetch did not populate the cache");

    assert_eq!(h.docs.current(), Some(DocumentId::from(42)));
    assert_eq!(h.docs.chunks()[0].chunk_id, ChunkId::from(1));
    assert_eq!(h.docs.chunks()[2].page, 3);
}

#[tokio::test]
async fn cancelled_upload_can_be_retried() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(upload_ok(1).set_delay(Duration::from_secs(2)))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(upload_ok(2))
        .mount(&h.server)
        .await;

    let mut upload = h.uploader();
    upload.select_file(pdf("slow.pdf", "slow"));
    let outcome =
        tokio::time::timeout(Duration::from_millis(100), upload.continue_to_chat()).await;
    assert!(outcome.is_err());

    assert_eq!(
        upload.state(),
        &UploadState::Failed {
            reason: edgequake_pdfchat::config::DEFAULT_UPLOAD_ERROR_FALLBACK.into()
        }
    );

    let hand_off = upload.continue_to_chat().await.unwrap();
    assert_eq!(hand_off.doc_id, DocumentId::from(2));
    assert!(!hand_off.reused);
}

// ── Chunks ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn chunk_listing_failure_yields_empty_list() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path("/upload/5/chunks"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&h.server)
        .await;

    let chunks = h.docs.load(&DocumentId::from(5)).await;
    assert!(chunks.is_empty());
    assert!(h.docs.chunks().is_empty());
    assert_eq!(h.docs.current(), Some(DocumentId::from(5)));
}

#[tokio::test]
async fn stale_chunk_listing_is_discarded() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path("/upload/1/chunks"))
        .respond_with(chunk_list(&[10, 11]).set_delay(Duration::from_millis(300)))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/upload/2/chunks"))
        .respond_with(chunk_list(&[20]))
        .mount(&h.server)
        .await;

    let slow = tokio::spawn({
        let docs = h.docs.clone();
        async move { docs.load(&DocumentId::from(1)).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    h.docs.load(&DocumentId::from(2)).await;
    let stale = slow.await.unwrap();
    assert_eq!(stale.len(), 2);

    assert_eq!(h.docs.current(), Some(DocumentId::from(2)));
    let cached = h.docs.chunks();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].chunk_id, ChunkId::from(20));
}

// ── Chat ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn deadline_question_with_mixed_citations() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_json(json!({"doc_id": 42, "question": "What is the deadline?"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "March 1",
            "citations": [5, {"chunk_id": 9, "page": 2}]
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let mut chat = h.chat("/chat?doc_id=42");
    let reply = chat.ask(&h.api, "What is the deadline?").await.unwrap();

    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.content, "March 1");
    let cites = reply.citations();
    assert_eq!(cites.len(), 2);
    assert_eq!((cites[0].chunk_id.clone(), cites[0].page), (ChunkId::from(5), None));
    assert_eq!((cites[1].chunk_id.clone(), cites[1].page), (ChunkId::from(9), Some(2)));

    let t = chat.transcript();
    assert_eq!(t.len(), 3);
    assert_eq!(t[1].role, Role::User);
    assert_eq!(t[1].content, "What is the deadline?");
    assert_eq!(chat.state(), ChatState::Ready);
}

#[tokio::test]
async fn failed_question_appends_one_error_message() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({"error": "LLM unavailable", "message": "ignored"})),
        )
        .mount(&h.server)
        .await;

    let mut chat = h.chat("/chat?doc_id=42");
    let reply = chat.ask(&h.api, "Why?").await.unwrap();
    assert_eq!(reply.content, "LLM unavailable");

    let t = chat.transcript();
    assert_eq!(t.len(), 3);
    assert_eq!(t[1].content, "Why?");
    assert_eq!(chat.state(), ChatState::Ready);
}

#[tokio::test]
async fn failed_question_without_reason_uses_fallback() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&h.server)
        .await;

    let mut chat = h.chat("/chat?doc_id=42");
    let reply = chat.ask(&h.api, "Why?").await.unwrap();
    assert_eq!(reply.content, edgequake_pdfchat::config::DEFAULT_CHAT_ERROR_FALLBACK);
}

#[tokio::test]
async fn blank_question_sends_nothing() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "x"})))
        .expect(0)
        .mount(&h.server)
        .await;

    let mut chat = h.chat("/chat?doc_id=42");
    assert_eq!(
        chat.ask(&h.api, "  \n ").await.unwrap_err(),
        SubmitRejection::EmptyQuestion
    );
    assert_eq!(chat.transcript().len(), 1);
}

#[tokio::test]
async fn missing_identity_sends_nothing() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "x"})))
        .expect(0)
        .mount(&h.server)
        .await;

    let mut chat = h.chat("/chat?doc_id=");
    assert_eq!(chat.state(), ChatState::NoDocument);
    assert_eq!(
        chat.ask(&h.api, "Hello?").await.unwrap_err(),
        SubmitRejection::NoDocument
    );
}

#[tokio::test]
async fn question_while_pending_is_rejected() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "first answer"})))
        .expect(1)
        .mount(&h.server)
        .await;

    let mut chat = h.chat("/chat?doc_id=42");
    let ticket = chat.submit("first").unwrap();
    assert_eq!(chat.submit("second").unwrap_err(), SubmitRejection::QuestionPending);
    assert_eq!(chat.transcript().len(), 2);

    let result = h.api.ask(ticket.doc_id(), ticket.question()).await;
    let reply = chat.resolve(ticket, result).unwrap();
    assert_eq!(reply.content, "first answer");
    assert_eq!(chat.transcript().len(), 3);
}

#[tokio::test]
async fn cancelled_question_does_not_stay_pending() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"answer": "too late"}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&h.server)
        .await;

    let mut chat = h.chat("/chat?doc_id=42");
    let outcome = tokio::time::timeout(Duration::from_millis(100), chat.ask(&h.api, "Slow?")).await;
    assert!(outcome.is_err());

    assert_eq!(chat.state(), ChatState::Ready);
    let t = chat.transcript();
    assert_eq!(t.len(), 3);
    assert_eq!(t[1].content, "Slow?");
    assert_eq!(t[2].content, edgequake_pdfchat::config::DEFAULT_CHAT_ERROR_FALLBACK);
}

// ── Preview ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn embeddable_artifact_keeps_embed_mode() {
    let h = harness().await;
    Mock::given(method("HEAD"))
        .and(path("/upload/42"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "application/pdf"))
        .mount(&h.server)
        .await;

    let mut chat = h.chat("/chat?doc_id=42");
    let mode = chat.check_embed(&h.docs).await.clone();
    assert_eq!(
        mode,
        PreviewMode::Embedded(h.api.artifact_url(&DocumentId::from(42)))
    );
}

#[tokio::test]
async fn missing_artifact_falls_back_to_chunks() {
    let h = harness().await;
    Mock::given(method("HEAD"))
        .and(path("/upload/42"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/upload/42/chunks"))
        .respond_with(chunk_list(&[1, 2]))
        .mount(&h.server)
        .await;

    h.docs.load(&DocumentId::from(42)).await;
    let mut chat = h.chat("/chat?doc_id=42");
    chat.check_embed(&h.docs).await;

    let pane = chat.preview(&h.docs);
    assert_eq!(pane.mode, PreviewMode::Chunks(FallbackReason::EmbedFailed));
    assert_eq!(pane.chunks.len(), 2);
    assert!(pane.reference.is_some());
}

#[tokio::test]
async fn direct_navigation_loads_chunk_previews() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path("/upload/42/chunks"))
        .respond_with(chunk_list(&[7]))
        .expect(1)
        .mount(&h.server)
        .await;

    let mut chat = h.chat("/chat?doc_id=42");
    assert_eq!(h.docs.current(), Some(DocumentId::from(42)));
    chat.report_embed_failure();

    tokio::time::timeout(Duration::from_secs(5), async {
        while chat.preview(&h.docs).chunks.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("chat did not load chunk previews");

    let pane = chat.preview(&h.docs);
    assert_eq!(pane.mode, PreviewMode::Chunks(FallbackReason::EmbedFailed));
    assert_eq!(pane.chunks[0].chunk_id, ChunkId::from(7));
}

#[tokio::test]
async fn chat_after_load_does_not_refetch() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path("/upload/42/chunks"))
        .respond_with(chunk_list(&[1, 2]))
        .expect(1)
        .mount(&h.server)
        .await;

    h.docs.load(&DocumentId::from(42)).await;
    let chat = h.chat("/chat?doc_id=42");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(chat.preview(&h.docs).chunks.len(), 2);
}

// ── Health & staging ─────────────────────────────────────────────────────────

#[tokio::test]
async fn health_check() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "message": "ready"})),
        )
        .mount(&h.server)
        .await;

    let status = h.api.health().await.unwrap();
    assert!(status.is_ok());
    assert_eq!(status.message.as_deref(), Some("ready"));
}

#[tokio::test]
async fn stage_from_url() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path("/files/notes.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4\n%%EOF\n".to_vec()))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/page.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&h.server)
        .await;

    let file = StagedFile::resolve(&format!("{}/files/notes.pdf", h.server.uri()), 5)
        .await
        .unwrap();
    assert_eq!(file.file_name(), "notes.pdf");

    let err = StagedFile::resolve(&format!("{}/files/page.html", h.server.uri()), 5)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotAPdf { .. }));
}
