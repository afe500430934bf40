//! Minimal end-to-end run with the deterministic mock providers.
//!
//! ```bash
//! cargo run --example ask_docs
//! ```

use std::sync::Arc;

use docloom::loader::{DocumentSource, TextSource};
use docloom::pipeline::{AnswerPipeline, IndexSlot};
use docloom::providers::mock::{MockEmbeddingProvider, MockGenerationProvider};
use docloom::stores::InMemoryVectorStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let pipeline = AnswerPipeline::builder()
        .embedder(Arc::new(MockEmbeddingProvider::new()))
        .generator(Arc::new(MockGenerationProvider::grounded()))
        .build()?;

    let sources: Vec<Box<dyn DocumentSource>> = vec![
        Box::new(TextSource::new(
            "admissions.txt",
            "Admission exams are held in July. Candidates register online in June. \
             Results are published during the second week of August.",
        )),
        Box::new(TextSource::new(
            "scholarships.txt",
            "Scholarships are awarded every March to enrolled students with \
             strong academic records. Renewals happen annually.",
        )),
    ];

    let slot = IndexSlot::new();
    let built = pipeline
        .build_index(&sources, Arc::new(InMemoryVectorStore::new()))
        .await?;
    println!(
        "indexed {} documents into {} chunks",
        built.document_count(),
        built.chunk_count()
    );
    slot.install(built);

    for question in [
        "when are admission exams?",
        "when are scholarships awarded?",
        "how do I park on campus?",
    ] {
        let answer = pipeline.answer("demo", question, &slot).await?;
        println!("\nQ: {question}");
        println!("A: {} (sources: {})", answer.text, answer.cited_sources);
    }

    let health = pipeline.health(&slot);
    println!(
        "\nhealth: ready={} documents={}",
        health.index_ready, health.document_count
    );
    Ok(())
}
