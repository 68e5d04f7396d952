use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lumina::errors::ModelErrorKind;
use lumina::llm::EmbeddingBackend;
use lumina::llm::GenerationBackend;
use lumina::llm::ResilientModelClient;
use lumina::llm::RetryPolicy;
use lumina::models::EmbeddingVector;
use lumina::models::NewRecord;
use lumina::models::StoredRecord;
use lumina::models::UserId;
use lumina::rag::cited_ids;
use lumina::rag::LexicalReranker;
use lumina::rag::PipelineSettings;
use lumina::rag::RagService;
use lumina::rag::NO_RELEVANT_INFORMATION;
use lumina::store::InMemoryVectorStore;
use lumina::store::VectorStore;
use lumina::LuminaError;
use lumina::Result;

/// Known words get their own axis; everything else shares the last one
const VOCABULARY: &[&str] = &[
    "the", "sky", "is", "blue", "what", "color", "grass", "green", "banana", "recipes",
];
const DIMENSION: usize = VOCABULARY.len() + 1;

/// Deterministic bag-of-words embedder
struct BagOfWordsBackend {
    answer: String,
    generate_failures: u32,
    embed_calls: AtomicU32,
    generate_calls: AtomicU32,
    prompts: Mutex<Vec<String>>,
}

impl BagOfWordsBackend {
    fn new() -> Arc<Self> {
        Self::failing_first(0)
    }

    fn failing_first(generate_failures: u32) -> Arc<Self> {
        Arc::new(Self {
            answer: "The sky is blue [1].".to_string(),
            generate_failures,
            embed_calls: AtomicU32::new(0),
            generate_calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn embed_calls(&self) -> u32 {
        self.embed_calls.load(Ordering::SeqCst)
    }

    fn generate_calls(&self) -> u32 {
        self.generate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingBackend for BagOfWordsBackend {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        let mut vector = vec![0.0; DIMENSION];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let axis = VOCABULARY
                .iter()
                .position(|known| *known == word)
                .unwrap_or(DIMENSION - 1);
            vector[axis] += 1.0;
        }
        Ok(vector)
    }
}

#[async_trait]
impl GenerationBackend for BagOfWordsBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let call = self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.generate_failures {
            return Err(LuminaError::model(
                ModelErrorKind::RateLimited,
                "429 Too Many Requests",
            ));
        }
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.answer.clone())
    }
}

/// Ignores the caller and always searches one fixed owner's records
struct MisroutingStore {
    inner: InMemoryVectorStore,
    always: UserId,
}

#[async_trait]
impl VectorStore for MisroutingStore {
    async fn insert_batch(&self, records: Vec<NewRecord>) -> Result<usize> {
        self.inner.insert_batch(records).await
    }

    async fn search(
        &self,
        _owner: &UserId,
        query_vector: &[f32],
        similarity_threshold: f32,
        limit: usize,
    ) -> Result<Vec<StoredRecord>> {
        self.inner
            .search(&self.always, query_vector, similarity_threshold, limit)
            .await
    }
}

/// Rejects every insert; searches see nothing
struct ReadOnlyStore {
    inner: InMemoryVectorStore,
    inserts: AtomicU32,
}

#[async_trait]
impl VectorStore for ReadOnlyStore {
    async fn insert_batch(&self, _records: Vec<NewRecord>) -> Result<usize> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Err(LuminaError::Store("disk full".to_string()))
    }

    async fn search(
        &self,
        owner: &UserId,
        query_vector: &[f32],
        similarity_threshold: f32,
        limit: usize,
    ) -> Result<Vec<StoredRecord>> {
        self.inner
            .search(owner, query_vector, similarity_threshold, limit)
            .await
    }
}

fn sky_text() -> String {
    "The sky is blue. ".repeat(500)
}

fn settings() -> PipelineSettings {
    PipelineSettings {
        embedding_dimension: DIMENSION,
        ..PipelineSettings::default()
    }
}

fn service_with_store(
    backend: Arc<BagOfWordsBackend>,
    store: Arc<dyn VectorStore>,
) -> RagService {
    let client = ResilientModelClient::new(
        backend.clone(),
        backend,
        RetryPolicy::new(5, Duration::from_secs(1)),
    );
    RagService::new(
        Arc::new(client),
        store,
        Arc::new(LexicalReranker::new()),
        settings(),
    )
    .unwrap()
}

fn service(backend: Arc<BagOfWordsBackend>) -> (RagService, Arc<InMemoryVectorStore>) {
    let store = Arc::new(InMemoryVectorStore::with_dimension(DIMENSION));
    (service_with_store(backend, store.clone()), store)
}

#[tokio::test(start_paused = true)]
async fn test_sky_end_to_end() -> Result<()> {
    let backend = BagOfWordsBackend::new();
    let (service, store) = service(backend.clone());
    let alice = UserId::from("alice");

    let stored = service.ingest(&sky_text(), "sky.txt", &alice).await?;
    assert_eq!(stored, 3);
    assert_eq!(store.len(), 3);

    let result = service.answer("What color is the sky?", &alice).await?;

    assert!(result.answer.contains('['));
    assert!(!result.citations.is_empty());
    assert!(result.citations.len() <= 5);
    let ids: Vec<usize> = result.citations.iter().map(|c| c.id).collect();
    assert_eq!(ids, (1..=result.citations.len()).collect::<Vec<_>>());
    assert!(result
        .citations
        .iter()
        .all(|c| c.metadata.source == "sky.txt" && c.content.contains("The sky is blue.")));

    assert_eq!(backend.generate_calls(), 1);
    let prompts = backend.prompts.lock().unwrap();
    assert!(prompts[0].contains("[Source 1]: "));
    assert!(prompts[0].contains("What color is the sky?"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unrelated_question_gets_fallback_without_generation() -> Result<()> {
    let backend = BagOfWordsBackend::new();
    let (service, _) = service(backend.clone());
    let alice = UserId::from("alice");
    service.ingest(&sky_text(), "sky.txt", &alice).await?;

    let result = service.answer("banana recipes", &alice).await?;

    assert_eq!(result.answer, NO_RELEVANT_INFORMATION);
    assert!(result.citations.is_empty());
    assert_eq!(backend.generate_calls(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_other_owners_documents_are_invisible() -> Result<()> {
    let backend = BagOfWordsBackend::new();
    let (service, _) = service(backend.clone());

    service
        .ingest(&sky_text(), "sky.txt", &UserId::from("alice"))
        .await?;
    let result = service
        .answer("What color is the sky?", &UserId::from("bob"))
        .await?;

    assert_eq!(result.answer, NO_RELEVANT_INFORMATION);
    assert!(result.citations.is_empty());
    assert_eq!(backend.generate_calls(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_misrouted_search_results_are_dropped() -> Result<()> {
    let backend = BagOfWordsBackend::new();
    let store = Arc::new(MisroutingStore {
        inner: InMemoryVectorStore::with_dimension(DIMENSION),
        always: UserId::from("alice"),
    });
    let service = service_with_store(backend.clone(), store);

    service
        .ingest(&sky_text(), "sky.txt", &UserId::from("alice"))
        .await?;
    let result = service
        .answer("What color is the sky?", &UserId::from("mallory"))
        .await?;

    assert_eq!(result.answer, NO_RELEVANT_INFORMATION);
    assert!(result.citations.is_empty());
    assert_eq!(backend.generate_calls(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_citations_come_from_owned_chunks_in_rank_order() -> Result<()> {
    let backend = BagOfWordsBackend::new();
    let (service, _) = service(backend.clone());
    let alice = UserId::from("alice");

    service.ingest(&sky_text(), "sky.txt", &alice).await?;
    service
        .ingest("The grass is green.", "grass.txt", &alice)
        .await?;
    service
        .ingest("The sky is blue.", "other.txt", &UserId::from("bob"))
        .await?;

    let result = service.answer("What color is the sky?", &alice).await?;

    assert!(result.citations.len() <= 5);
    for (position, citation) in result.citations.iter().enumerate() {
        assert_eq!(citation.id, position + 1);
        assert_ne!(citation.metadata.source, "other.txt");
    }
    for id in cited_ids(&result.answer) {
        assert!(id >= 1 && id <= result.citations.len());
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_empty_document_stores_nothing() -> Result<()> {
    let backend = BagOfWordsBackend::new();
    let (service, store) = service(backend);

    let stored = service.ingest("", "empty.txt", &UserId::from("alice")).await?;

    assert_eq!(stored, 0);
    assert!(store.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_generation_is_retried() -> Result<()> {
    let backend = BagOfWordsBackend::failing_first(2);
    let (service, _) = service(backend.clone());
    let alice = UserId::from("alice");
    service.ingest(&sky_text(), "sky.txt", &alice).await?;

    let start = tokio::time::Instant::now();
    let result = service.answer("What color is the sky?", &alice).await?;

    assert_eq!(result.answer, "The sky is blue [1].");
    assert_eq!(backend.generate_calls(), 3);
    // Backoff of 1s then 2s
    assert_eq!(start.elapsed(), Duration::from_secs(3));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_store_failure_aborts_ingest_without_retry() -> Result<()> {
    let backend = BagOfWordsBackend::new();
    let store = Arc::new(ReadOnlyStore {
        inner: InMemoryVectorStore::with_dimension(DIMENSION),
        inserts: AtomicU32::new(0),
    });
    let service = service_with_store(backend.clone(), store.clone());
    let alice = UserId::from("alice");

    let result = service.ingest(&sky_text(), "sky.txt", &alice).await;

    match result {
        Err(LuminaError::Store(message)) => assert_eq!(message, "disk full"),
        other => panic!("expected store error, got {other:?}"),
    }
    assert_eq!(store.inserts.load(Ordering::SeqCst), 1);
    // One embedding per chunk, nothing re-embedded
    assert_eq!(backend.embed_calls(), 3);

    let answer = service.answer("What color is the sky?", &alice).await?;
    assert_eq!(answer.answer, NO_RELEVANT_INFORMATION);
    assert!(answer.citations.is_empty());
    assert_eq!(backend.generate_calls(), 0);
    Ok(())
}
