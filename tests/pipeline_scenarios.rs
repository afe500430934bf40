//! End-to-end pipeline scenarios with deterministic mock providers.
//!
//! These exercise the grounding contract the way the hosting layer would:
//! build an index from text sources, install it into a slot, ask questions,
//! and check refusal/citation behavior, memory bounding, and the typed
//! failure surface.

use std::sync::Arc;
use std::time::Duration;

use docloom::config::PipelineConfig;
use docloom::loader::{DocumentSource, TextSource};
use docloom::pipeline::{AnswerPipeline, IndexSlot};
use docloom::providers::GenerationProvider;
use docloom::providers::mock::{MockEmbeddingProvider, MockGenerationProvider};
use docloom::stores::InMemoryVectorStore;
use docloom::types::PipelineError;
use docloom::{EmbeddingProvider, REFUSAL_TEXT};

fn pipeline_with(generator: Arc<dyn GenerationProvider>) -> AnswerPipeline {
    AnswerPipeline::builder()
        .embedder(Arc::new(MockEmbeddingProvider::new()))
        .generator(generator)
        .build()
        .expect("pipeline should build")
}

fn grounded_pipeline() -> AnswerPipeline {
    pipeline_with(Arc::new(MockGenerationProvider::grounded()))
}

fn corpus() -> Vec<Box<dyn DocumentSource>> {
    vec![
        Box::new(TextSource::new(
            "handbook.txt",
            "Admission exams are held in July. Candidates must register online \
             before the end of June. Results are published in August.",
        )),
        Box::new(TextSource::new(
            "grants.txt",
            "Scholarships are awarded to enrolled students every March. \
             Applications require a transcript and a letter of recommendation.",
        )),
    ]
}

async fn ready_slot(pipeline: &AnswerPipeline, sources: &[Box<dyn DocumentSource>]) -> IndexSlot {
    let slot = IndexSlot::new();
    let built = pipeline
        .build_index(sources, Arc::new(InMemoryVectorStore::new()))
        .await
        .expect("index should build");
    slot.install(built);
    slot
}

#[tokio::test]
async fn direct_match_answers_with_citations() {
    let pipeline = grounded_pipeline();
    let slot = ready_slot(&pipeline, &corpus()).await;

    let answer = pipeline
        .answer("s1", "when are admission exams?", &slot)
        .await
        .unwrap();
    assert!(
        answer.text.contains("July"),
        "expected an answer grounded in the handbook, got: {}",
        answer.text
    );
    assert!(answer.cited_sources >= 1);
}

#[tokio::test]
async fn unsupported_question_yields_exact_refusal() {
    let pipeline = grounded_pipeline();
    // Only the scholarship document is indexed.
    let sources: Vec<Box<dyn DocumentSource>> = vec![Box::new(TextSource::new(
        "grants.txt",
        "Scholarships are awarded to enrolled students every March. \
         Applications require a transcript and a letter of recommendation.",
    ))];
    let slot = ready_slot(&pipeline, &sources).await;

    let answer = pipeline
        .answer("s1", "what is the admission exam format?", &slot)
        .await
        .unwrap();
    assert_eq!(answer.text, REFUSAL_TEXT);
}

#[tokio::test]
async fn empty_source_set_is_an_ingestion_error() {
    let pipeline = grounded_pipeline();
    let err = pipeline
        .build_index(&[], Arc::new(InMemoryVectorStore::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Ingestion(_)));
}

#[tokio::test]
async fn all_sources_failing_is_an_ingestion_error() {
    let pipeline = grounded_pipeline();
    let sources: Vec<Box<dyn DocumentSource>> =
        vec![Box::new(TextSource::new("empty.txt", "   "))];
    let err = pipeline
        .build_index(&sources, Arc::new(InMemoryVectorStore::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Ingestion(_)));
}

#[tokio::test]
async fn answer_before_build_fails_with_retrieval_error() {
    let pipeline = grounded_pipeline();
    let slot = IndexSlot::new();
    let err = pipeline
        .answer("s1", "anything?", &slot)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Retrieval(_)));
}

#[tokio::test]
async fn empty_and_oversized_questions_are_rejected() {
    let pipeline = grounded_pipeline();
    let slot = ready_slot(&pipeline, &corpus()).await;

    let err = pipeline.answer("s1", "   ", &slot).await.unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));

    let oversized = "x".repeat(1001);
    let err = pipeline.answer("s1", &oversized, &slot).await.unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
}

/// Answers with the number of history turns it was shown.
struct HistoryCountingGenerator;

#[async_trait::async_trait]
impl GenerationProvider for HistoryCountingGenerator {
    async fn generate(
        &self,
        prompt: &docloom::AssembledPrompt,
        _options: &docloom::providers::GenerationOptions,
    ) -> Result<String, docloom::providers::GenerateError> {
        Ok(prompt.history.len().to_string())
    }
}

#[tokio::test]
async fn memory_is_bounded_and_reset_clears_it() {
    let config = PipelineConfig::builder().max_turns(3).build().unwrap();
    let pipeline = AnswerPipeline::builder()
        .embedder(Arc::new(MockEmbeddingProvider::new()))
        .generator(Arc::new(HistoryCountingGenerator))
        .config(config)
        .build()
        .unwrap();
    let slot = ready_slot(&pipeline, &corpus()).await;

    for i in 0..7 {
        let answer = pipeline
            .answer("bounded", &format!("question number {i} about exams"), &slot)
            .await
            .unwrap();
        // The prompt never carries more than the configured bound.
        let seen: usize = answer.text.parse().unwrap();
        assert!(seen <= 3, "history leaked past the bound: {seen}");
        assert_eq!(seen, i.min(3));
    }

    pipeline.reset_session("bounded");
    let answer = pipeline
        .answer("bounded", "are admission exams in July?", &slot)
        .await
        .unwrap();
    assert_eq!(answer.text, "0", "reset should clear all turns");
}

#[tokio::test]
async fn failed_generation_propagates_and_leaves_memory_untouched() {
    let pipeline = pipeline_with(Arc::new(MockGenerationProvider::failing("upstream down")));
    let slot = ready_slot(&pipeline, &corpus()).await;

    let err = pipeline
        .answer("s-fail", "when are admission exams?", &slot)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Generation(_)));
}

#[tokio::test]
async fn slow_generation_times_out_distinctly() {
    let config = PipelineConfig::builder()
        .generation_timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let pipeline = AnswerPipeline::builder()
        .embedder(Arc::new(MockEmbeddingProvider::new()))
        .generator(Arc::new(MockGenerationProvider::delayed(
            Duration::from_millis(400),
        )))
        .config(config)
        .build()
        .unwrap();
    let slot = ready_slot(&pipeline, &corpus()).await;

    let err = pipeline
        .answer("s-slow", "when are admission exams?", &slot)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::GenerationTimeout(_)));
}

#[tokio::test]
async fn rebuild_with_same_corpus_ranks_identically() {
    let pipeline = grounded_pipeline();
    let store_a = Arc::new(InMemoryVectorStore::new());
    let store_b = Arc::new(InMemoryVectorStore::new());
    let built_a = pipeline.build_index(&corpus(), store_a).await.unwrap();
    let built_b = pipeline.build_index(&corpus(), store_b).await.unwrap();

    let embedder = MockEmbeddingProvider::new();
    let query = embedder.embed("when are admission exams?").await.unwrap();
    let params = docloom::SearchParams::default();
    let ids_a: Vec<String> = built_a
        .index()
        .search(&query, &params)
        .await
        .unwrap()
        .into_iter()
        .map(|hit| hit.record.id)
        .collect();
    let ids_b: Vec<String> = built_b
        .index()
        .search(&query, &params)
        .await
        .unwrap()
        .into_iter()
        .map(|hit| hit.record.id)
        .collect();
    assert_eq!(ids_a, ids_b);
    assert!(!ids_a.is_empty());
}

#[tokio::test]
async fn installing_a_new_build_supersedes_the_old_one() {
    let pipeline = grounded_pipeline();
    let slot = ready_slot(&pipeline, &corpus()).await;
    assert_eq!(pipeline.health(&slot).document_count, 2);

    let smaller: Vec<Box<dyn DocumentSource>> = vec![Box::new(TextSource::new(
        "handbook.txt",
        "Admission exams are held in July.",
    ))];
    let built = pipeline
        .build_index(&smaller, Arc::new(InMemoryVectorStore::new()))
        .await
        .unwrap();
    let previous = slot.install(built);
    assert!(previous.is_some());
    assert_eq!(pipeline.health(&slot).document_count, 1);
}

#[tokio::test]
async fn health_reflects_slot_state() {
    let pipeline = grounded_pipeline();
    let slot = IndexSlot::new();
    let health = pipeline.health(&slot);
    assert!(!health.index_ready);
    assert_eq!(health.document_count, 0);

    let built = pipeline
        .build_index(&corpus(), Arc::new(InMemoryVectorStore::new()))
        .await
        .unwrap();
    slot.install(built);
    let health = pipeline.health(&slot);
    assert!(health.index_ready);
    assert_eq!(health.document_count, 2);
}

#[tokio::test]
async fn sessions_do_not_leak_into_each_other() {
    let pipeline = grounded_pipeline();
    let slot = ready_slot(&pipeline, &corpus()).await;

    pipeline
        .answer("alice", "when are admission exams?", &slot)
        .await
        .unwrap();
    pipeline.reset_session("bob"); // resetting an untouched session is a no-op
    let answer = pipeline
        .answer("alice", "when are admission exams?", &slot)
        .await
        .unwrap();
    assert!(answer.text.contains("July"));
}
