//! Builds a persistent SQLite-backed index and answers against it.
//!
//! ```bash
//! cargo run --example sqlite_corpus --features sqlite
//! ```

use std::sync::Arc;

use docloom::loader::{DocumentSource, TextSource};
use docloom::pipeline::{AnswerPipeline, IndexSlot};
use docloom::providers::mock::{MockEmbeddingProvider, MockGenerationProvider};
use docloom::stores::sqlite::{DEFAULT_COLLECTION, SqliteVectorStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let db_path = std::env::temp_dir().join("docloom_demo.db");
    let store = SqliteVectorStore::open(&db_path, DEFAULT_COLLECTION).await?;
    println!("collection '{}' at {}", store.table(), db_path.display());

    let pipeline = AnswerPipeline::builder()
        .embedder(Arc::new(MockEmbeddingProvider::new()))
        .generator(Arc::new(MockGenerationProvider::grounded()))
        .build()?;

    let sources: Vec<Box<dyn DocumentSource>> = vec![Box::new(TextSource::new(
        "handbook.txt",
        "Admission exams are held in July. The library opens at eight. \
         Tuition payments are due before each semester begins.",
    ))];

    let slot = IndexSlot::new();
    let built = pipeline.build_index(&sources, Arc::new(store)).await?;
    println!(
        "indexed {} chunks (build {})",
        built.chunk_count(),
        built.build_id()
    );
    slot.install(built);

    let answer = pipeline
        .answer("demo", "when does the library open?", &slot)
        .await?;
    println!("A: {} (sources: {})", answer.text, answer.cited_sources);
    Ok(())
}
