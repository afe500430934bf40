//! HTTP-level tests for the OpenAI-compatible providers against a local mock
//! server.

use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use docloom::prompt::assemble;
use docloom::providers::openai::{OpenAiConfig, OpenAiEmbeddings, OpenAiGeneration};
use docloom::providers::{
    EmbedError, EmbeddingProvider, GenerateError, GenerationOptions, GenerationProvider,
};
use docloom::retrieval::RetrievedChunk;

fn config_for(server: &MockServer) -> OpenAiConfig {
    OpenAiConfig::new("sk-test")
        .unwrap()
        .with_base_url(&format!("{}/v1", server.base_url()))
        .unwrap()
}

fn sample_prompt() -> docloom::AssembledPrompt {
    assemble(
        "when are admission exams?",
        &[RetrievedChunk {
            id: "handbook.txt#0.0".into(),
            origin: "handbook.txt".into(),
            chunk_index: 0,
            text: "Admission exams are held in July.".into(),
            score: 0.9,
        }],
        Vec::new(),
    )
}

#[tokio::test]
async fn embeddings_roundtrip() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/embeddings")
                .header("authorization", "Bearer sk-test");
            then.status(200).json_body(json!({
                "data": [{"embedding": [0.1, 0.2, 0.3]}]
            }));
        })
        .await;

    let provider = OpenAiEmbeddings::new(config_for(&server)).unwrap();
    let vector = provider.embed("some text").await.unwrap();
    assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    mock.assert_async().await;
}

#[tokio::test]
async fn embeddings_http_failure_is_a_provider_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(500).body("internal error");
        })
        .await;

    let provider = OpenAiEmbeddings::new(config_for(&server)).unwrap();
    let err = provider.embed("some text").await.unwrap_err();
    assert!(matches!(err, EmbedError::Provider(_)), "got: {err}");
}

#[tokio::test]
async fn embeddings_deadline_maps_to_timeout() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(200)
                .delay(Duration::from_millis(500))
                .json_body(json!({"data": [{"embedding": [0.0]}]}));
        })
        .await;

    let config = config_for(&server).with_embed_timeout(Duration::from_millis(50));
    let provider = OpenAiEmbeddings::new(config).unwrap();
    let err = provider.embed("some text").await.unwrap_err();
    assert!(matches!(err, EmbedError::Timeout(_)), "got: {err}");
}

#[tokio::test]
async fn chat_roundtrip_carries_context_and_question() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("Admission exams are held in July")
                .body_contains("when are admission exams?");
            then.status(200).json_body(json!({
                "choices": [{"message": {"content": "They are held in July."}}]
            }));
        })
        .await;

    let provider = OpenAiGeneration::new(config_for(&server)).unwrap();
    let answer = provider
        .generate(&sample_prompt(), &GenerationOptions::default())
        .await
        .unwrap();
    assert_eq!(answer, "They are held in July.");
    mock.assert_async().await;
}

#[tokio::test]
async fn chat_http_failure_is_a_provider_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(429).body("rate limited");
        })
        .await;

    let provider = OpenAiGeneration::new(config_for(&server)).unwrap();
    let err = provider
        .generate(&sample_prompt(), &GenerationOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerateError::Provider(_)), "got: {err}");
}

#[tokio::test]
async fn chat_deadline_maps_to_timeout() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200)
                .delay(Duration::from_millis(500))
                .json_body(json!({"choices": [{"message": {"content": "late"}}]}));
        })
        .await;

    let provider = OpenAiGeneration::new(config_for(&server)).unwrap();
    let options = GenerationOptions {
        timeout: Duration::from_millis(50),
        ..GenerationOptions::default()
    };
    let err = provider
        .generate(&sample_prompt(), &options)
        .await
        .unwrap_err();
    assert!(matches!(err, GenerateError::Timeout(_)), "got: {err}");
}
