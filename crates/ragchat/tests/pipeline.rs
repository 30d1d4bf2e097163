//! End-to-end pipeline tests with deterministic in-process backends

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ragchat::config::RagConfig;
use ragchat::generation::{GenerationService, GENERATION_FALLBACK};
use ragchat::providers::{EmbeddingProvider, LlmProvider};
use ragchat::retrieval::VectorIndex;
use ragchat::session::RETRIEVAL_FALLBACK;
use ragchat::types::{Chunk, Document};
use ragchat::{Error, RagEngine, Result};

/// Deterministic bag-of-words embedder: each word hashes into a bucket, so
/// texts sharing vocabulary score higher under cosine similarity.
struct HashEmbedder {
    dimensions: usize,
    fail: AtomicBool,
}

impl HashEmbedder {
    fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            fail: AtomicBool::new(false),
        }
    }

    fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Retrieval("embedder offline".to_string()));
        }
        let mut vector = vec![0.0f32; self.dimensions];
        for word in text.split_whitespace() {
            let word: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            if word.is_empty() {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            vector[(hasher.finish() as usize) % self.dimensions] += 1.0;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hash-test"
    }
}

/// LLM double that records every prompt pair and replies with a counter.
#[derive(Default)]
struct RecordingLlm {
    prompts: Mutex<Vec<(String, String)>>,
    calls: AtomicUsize,
}

impl RecordingLlm {
    fn last_user_prompt(&self) -> String {
        self.prompts
            .lock()
            .unwrap()
            .last()
            .map(|(_, user)| user.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for RecordingLlm {
    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("<think>deliberating</think>answer-{}", n))
    }

    fn name(&self) -> &str {
        "recording-test"
    }

    fn model(&self) -> &str {
        "recording-model"
    }
}

/// LLM double that tracks how many calls are in flight simultaneously.
#[derive(Default)]
struct CountingLlm {
    current: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl LlmProvider for CountingLlm {
    async fn chat(&self, _system: &str, _user: &str) -> Result<String> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("ok".to_string())
    }

    fn name(&self) -> &str {
        "counting-test"
    }

    fn model(&self) -> &str {
        "counting-model"
    }
}

/// LLM double that always fails.
struct BrokenLlm;

#[async_trait]
impl LlmProvider for BrokenLlm {
    async fn chat(&self, _system: &str, _user: &str) -> Result<String> {
        Err(Error::Generation("connection refused".to_string()))
    }

    fn name(&self) -> &str {
        "broken-test"
    }

    fn model(&self) -> &str {
        "broken-model"
    }
}

const DIMENSIONS: usize = 32;

fn test_config(storage: &tempfile::TempDir) -> RagConfig {
    let mut config = RagConfig::default();
    config.embeddings.dimensions = DIMENSIONS;
    config.chunking.chunk_size = 160;
    config.chunking.chunk_overlap = 20;
    config.vector_db.storage_path = storage.path().join("vector_db");
    config
}

fn engine_with(
    config: RagConfig,
    embedder: Arc<HashEmbedder>,
    llm: Arc<RecordingLlm>,
) -> RagEngine {
    RagEngine::with_providers(config, embedder, llm).unwrap()
}

const SAMPLE_TEXT: &str = "\
Quantum computers use qubits to represent information, and qubits can hold superpositions.\n\n\
Sourdough bread needs a mature starter, patient folding, and a long cold proof in the fridge.\n\n\
The midfield pressed high all season and the football club finally won the league title.";

fn sample_document() -> Document {
    Document::new("notes.txt", SAMPLE_TEXT)
}

#[tokio::test]
async fn test_rag_turn_grounds_answer_in_retrieved_context() {
    let storage = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new(DIMENSIONS));
    let llm = Arc::new(RecordingLlm::default());
    let engine = engine_with(test_config(&storage), Arc::clone(&embedder), Arc::clone(&llm));

    let mut session = engine.ingest(sample_document()).await.unwrap();
    assert!(session.is_document_ready());

    let history = session
        .turn("What do quantum computers use qubits for?")
        .await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].assistant_message, "answer-0");

    let prompt = llm.last_user_prompt();
    assert!(prompt.contains("What do quantum computers use qubits for?"));
    assert!(
        prompt.contains("qubits can hold superpositions"),
        "retrieved chunk missing from prompt: {}",
        prompt
    );
}

#[tokio::test]
async fn test_plain_chat_mode_sends_empty_context() {
    let storage = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new(DIMENSIONS));
    let llm = Arc::new(RecordingLlm::default());
    let engine = engine_with(test_config(&storage), embedder, Arc::clone(&llm));

    let mut session = engine.session();
    assert!(!session.is_document_ready());

    let history = session.turn("Hello there").await;
    assert_eq!(history.len(), 1);

    let prompt = llm.last_user_prompt();
    assert!(prompt.ends_with("Context: "), "unexpected prompt: {}", prompt);
}

#[tokio::test]
async fn test_empty_message_is_a_no_op() {
    let storage = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new(DIMENSIONS));
    let llm = Arc::new(RecordingLlm::default());
    let engine = engine_with(test_config(&storage), embedder, Arc::clone(&llm));

    let mut session = engine.session();
    session.turn("   ").await;
    session.turn("").await;
    session.turn("\n\t").await;

    assert!(session.history().is_empty());
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_regenerate_replaces_only_the_last_turn() {
    let storage = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new(DIMENSIONS));
    let llm = Arc::new(RecordingLlm::default());
    let engine = engine_with(test_config(&storage), embedder, Arc::clone(&llm));

    let mut session = engine.session();
    session.turn("Q1").await;
    session.turn("Q2").await;
    assert_eq!(session.history()[1].assistant_message, "answer-1");

    let history = session.regenerate().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].user_message, "Q1");
    assert_eq!(history[0].assistant_message, "answer-0");
    assert_eq!(history[1].user_message, "Q2");
    assert_eq!(history[1].assistant_message, "answer-2");
}

#[tokio::test]
async fn test_regenerate_on_empty_history_is_a_no_op() {
    let storage = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new(DIMENSIONS));
    let llm = Arc::new(RecordingLlm::default());
    let engine = engine_with(test_config(&storage), embedder, Arc::clone(&llm));

    let mut session = engine.session();
    let history = session.regenerate().await;
    assert!(history.is_empty());
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_generation_concurrency_bound() {
    let llm = Arc::new(CountingLlm::default());
    let service = Arc::new(GenerationService::new(
        Arc::clone(&llm) as Arc<dyn LlmProvider>,
        2,
    ));

    let tasks: Vec<_> = (0..5)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.answer(&format!("question {}", i), "", &[]).await })
        })
        .collect();

    for task in join_all(tasks).await {
        task.unwrap();
    }

    assert_eq!(llm.calls.load(Ordering::SeqCst), 5);
    assert!(
        llm.max_in_flight.load(Ordering::SeqCst) <= 2,
        "gate admitted {} concurrent calls",
        llm.max_in_flight.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn test_generation_failure_never_aborts_the_conversation() {
    let storage = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new(DIMENSIONS));
    let engine =
        RagEngine::with_providers(test_config(&storage), embedder, Arc::new(BrokenLlm)).unwrap();

    let mut session = engine.session();
    session.turn("first").await;
    let history = session.turn("second").await;

    assert_eq!(history.len(), 2);
    for turn in history {
        assert_eq!(turn.assistant_message, GENERATION_FALLBACK);
    }
}

#[tokio::test]
async fn test_index_round_trip_preserves_query_results() {
    let storage = tempfile::tempdir().unwrap();
    let path = storage.path().join("vector_db");
    let embedder = HashEmbedder::new(DIMENSIONS);

    let doc = sample_document();
    let chunks: Vec<Chunk> = SAMPLE_TEXT
        .split("\n\n")
        .enumerate()
        .map(|(i, part)| Chunk::new(&doc, part.to_string(), i as u32, 0, part.len()))
        .collect();

    let built = VectorIndex::build(chunks, &embedder, &path).await.unwrap();
    let query = embedder.embed("sourdough starter and folding").await.unwrap();
    let fresh = built.search(&query, 2).unwrap();

    let loaded = VectorIndex::load(&path).await.unwrap();
    let reloaded = loaded.search(&query, 2).unwrap();

    assert_eq!(fresh.len(), reloaded.len());
    for (a, b) in fresh.iter().zip(reloaded.iter()) {
        assert_eq!(a.chunk.text, b.chunk.text);
        assert_eq!(a.chunk.chunk_index, b.chunk.chunk_index);
        assert!((a.similarity - b.similarity).abs() < 1e-6);
    }
    assert!(fresh[0].chunk.text.contains("Sourdough"));
}

#[tokio::test]
async fn test_corrupt_index_triggers_silent_rebuild() {
    let storage = tempfile::tempdir().unwrap();
    let path = storage.path().join("vector_db");
    let embedder = HashEmbedder::new(DIMENSIONS);

    let doc = sample_document();
    let chunks: Vec<Chunk> = SAMPLE_TEXT
        .split("\n\n")
        .enumerate()
        .map(|(i, part)| Chunk::new(&doc, part.to_string(), i as u32, 0, part.len()))
        .collect();

    VectorIndex::build(chunks.clone(), &embedder, &path)
        .await
        .unwrap();
    std::fs::write(path.join("vectors.bin"), b"not a vector index").unwrap();

    let index = VectorIndex::load_or_build(chunks.clone(), &embedder, &path)
        .await
        .unwrap();
    assert_eq!(index.len(), chunks.len());

    // The rebuild re-persisted a loadable artifact
    let reloaded = VectorIndex::load(&path).await.unwrap();
    assert_eq!(reloaded.len(), chunks.len());
}

#[tokio::test]
async fn test_stale_dimensions_trigger_rebuild() {
    let storage = tempfile::tempdir().unwrap();
    let path = storage.path().join("vector_db");

    let doc = sample_document();
    let chunks: Vec<Chunk> = SAMPLE_TEXT
        .split("\n\n")
        .enumerate()
        .map(|(i, part)| Chunk::new(&doc, part.to_string(), i as u32, 0, part.len()))
        .collect();

    let old_embedder = HashEmbedder::new(8);
    VectorIndex::build(chunks.clone(), &old_embedder, &path)
        .await
        .unwrap();

    let new_embedder = HashEmbedder::new(DIMENSIONS);
    let index = VectorIndex::load_or_build(chunks, &new_embedder, &path)
        .await
        .unwrap();
    assert_eq!(index.dimensions(), DIMENSIONS);
}

#[tokio::test]
async fn test_failed_ingest_leaves_session_in_plain_chat_mode() {
    let storage = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new(DIMENSIONS));
    let llm = Arc::new(RecordingLlm::default());
    let engine = engine_with(test_config(&storage), embedder, Arc::clone(&llm));

    let mut session = engine.session();
    let err = session
        .ingest(Document::new("empty.txt", "   \n  "))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Ingestion(_)));
    assert!(!session.is_document_ready());

    // Still answers in plain-chat mode
    let history = session.turn("hello").await;
    assert_eq!(history.len(), 1);
    assert!(llm.last_user_prompt().ends_with("Context: "));
}

#[tokio::test]
async fn test_retrieval_failure_degrades_turn_and_surfaces_in_regenerate() {
    let storage = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new(DIMENSIONS));
    let llm = Arc::new(RecordingLlm::default());
    let engine = engine_with(test_config(&storage), Arc::clone(&embedder), llm);

    let mut session = engine.ingest(sample_document()).await.unwrap();

    // A normal turn degrades to the fixed apology
    embedder.set_failing(true);
    let history = session.turn("how do qubits work?").await;
    assert_eq!(history.last().unwrap().assistant_message, RETRIEVAL_FALLBACK);

    // A healthy turn, then a failing regenerate surfaces the real error
    embedder.set_failing(false);
    session.turn("what about sourdough?").await;
    embedder.set_failing(true);
    let history = session.regenerate().await;

    let last = history.last().unwrap();
    assert_eq!(last.user_message, "what about sourdough?");
    assert_ne!(last.assistant_message, RETRIEVAL_FALLBACK);
    assert!(
        last.assistant_message.contains("embedder offline"),
        "expected surfaced error, got: {}",
        last.assistant_message
    );
}

#[tokio::test]
async fn test_shared_engine_serves_multiple_sessions() {
    let storage = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new(DIMENSIONS));
    let llm = Arc::new(RecordingLlm::default());
    let engine = engine_with(test_config(&storage), embedder, Arc::clone(&llm));

    let mut chat_a = engine.session();
    let mut chat_b = engine.session();

    chat_a.turn("from a").await;
    chat_b.turn("from b").await;
    chat_a.turn("again from a").await;

    assert_eq!(chat_a.history().len(), 2);
    assert_eq!(chat_b.history().len(), 1);
    assert_eq!(llm.calls.load(Ordering::SeqCst), 3);
}
