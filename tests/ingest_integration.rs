//! Ingestion integration: upload limits, extraction, chunk registration
//!
//! Runs the full upload path with a deterministic embedding stub and a chat
//! stub, so nothing touches the network or downloads a model.

use async_trait::async_trait;
use docqa::answer::{ChatProvider, ChatRequest, LlmError};
use docqa::config::Config;
use docqa::embedding::{EmbeddingError, EmbeddingProvider};
use docqa::engine::Engine;
use docqa::DocqaError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::sync::Arc;
use tempfile::TempDir;

const DIM: usize = 16;

struct HashProvider;

impl EmbeddingProvider for HashProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut v = vec![0.0f32; DIM];
        for (i, b) in text.bytes().enumerate() {
            v[(i + b as usize) % DIM] += b as f32;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1.0);
        Ok(v.iter().map(|x| x / norm).collect())
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "hash-test-model"
    }
}

struct CannedChat;

#[async_trait]
impl ChatProvider for CannedChat {
    async fn complete(&self, _request: &ChatRequest) -> Result<String, LlmError> {
        Ok("canned answer".to_string())
    }
}

/// Build a minimal valid PDF with one text line per page
fn fixture_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn test_engine(config: Config) -> (Engine, TempDir) {
    let temp = TempDir::new().unwrap();
    let engine = Engine::new(
        config,
        temp.path().to_path_buf(),
        Arc::new(HashProvider),
        Arc::new(CannedChat),
    )
    .unwrap();
    (engine, temp)
}

#[tokio::test]
async fn upload_produces_processed_document_with_chunks() {
    let (engine, _temp) = test_engine(Config::default());

    let bytes = fixture_pdf(&[
        "This paper introduces a novel retrieval method.",
        "Experiments show strong results on benchmarks.",
        "We conclude with directions for future work.",
    ]);

    let report = engine.upload("paper.pdf", &bytes).await.unwrap();

    assert_eq!(report.document.name, "paper.pdf");
    assert_eq!(report.document.page_count, 3);
    assert!(report.chunks > 0);
    assert_eq!(report.embedded, report.chunks);
    assert!(report.skipped_pages.is_empty());

    let docs = engine.documents().unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].status, "processed");
    assert_eq!(docs[0].chunk_count, report.chunks);
}

#[tokio::test]
async fn over_page_limit_fails_and_leaves_no_state() {
    let mut config = Config::default();
    config.ingest.max_pages = 2;
    let (engine, _temp) = test_engine(config);

    let bytes = fixture_pdf(&["one", "two", "three"]);
    let err = engine.upload("big.pdf", &bytes).await.unwrap_err();

    assert!(matches!(
        err,
        DocqaError::PageLimitExceeded {
            pages: 3,
            max_pages: 2
        }
    ));
    assert!(engine.documents().unwrap().is_empty());
}

#[tokio::test]
async fn over_byte_limit_fails_and_leaves_no_state() {
    let mut config = Config::default();
    config.ingest.max_file_size = "100B".to_string();
    let (engine, _temp) = test_engine(config);

    let bytes = fixture_pdf(&["a page of text"]);
    assert!(bytes.len() > 100);

    let err = engine.upload("big.pdf", &bytes).await.unwrap_err();
    assert!(matches!(err, DocqaError::SizeLimitExceeded { .. }));
    assert!(engine.documents().unwrap().is_empty());
}

#[tokio::test]
async fn garbage_bytes_fail_extraction() {
    let (engine, _temp) = test_engine(Config::default());

    let err = engine
        .upload("junk.pdf", b"this is not a pdf document")
        .await
        .unwrap_err();
    assert!(matches!(err, DocqaError::Extraction { .. }));
    assert!(engine.documents().unwrap().is_empty());
}

#[tokio::test]
async fn empty_name_is_rejected() {
    let (engine, _temp) = test_engine(Config::default());
    let bytes = fixture_pdf(&["text"]);

    let err = engine.upload("  ", &bytes).await.unwrap_err();
    assert!(matches!(err, DocqaError::Config(_)));
}

#[tokio::test]
async fn small_chunk_size_splits_pages() {
    let mut config = Config::default();
    config.ingest.chunk_size = 16;
    config.ingest.chunk_overlap = 4;
    let (engine, _temp) = test_engine(config);

    let bytes = fixture_pdf(&["a reasonably long sentence that needs several chunks"]);
    let report = engine.upload("split.pdf", &bytes).await.unwrap();

    assert!(report.chunks > 1);
    assert_eq!(report.embedded, report.chunks);
}
