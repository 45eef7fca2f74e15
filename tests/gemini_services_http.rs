//! HTTP-level tests for the hosted conversion and embedding clients,
//! exercised against a local mock server.

use httpmock::prelude::*;
use serde_json::json;
use url::Url;

use questsmith::index::{EmbeddingProvider, EmbeddingTask, GeminiEmbeddings};
use questsmith::retry::RetryPolicy;
use questsmith::services::{ConversionService, GeminiConverter};
use questsmith::types::ExtractError;

fn endpoint(server: &MockServer, path: &str) -> Url {
    Url::parse(&server.url(path)).expect("mock server url parses")
}

#[tokio::test]
async fn converter_parses_candidate_text() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/generate")
                .query_param("key", "test-key");
            then.status(200).json_body(json!({
                "candidates": [{
                    "content": {
                        "parts": [{ "text": "```latex\nFind $\\frac{1}{2}$.\n```" }]
                    }
                }]
            }));
        })
        .await;

    let converter = GeminiConverter::new(
        endpoint(&server, "/generate"),
        "test-key",
        RetryPolicy::zero_delay(3),
    );
    let markup = converter.convert_to_latex("Find 1/2.").await.unwrap();

    mock.assert_async().await;
    assert_eq!(markup, "Find $\\frac{1}{2}$.");
}

#[tokio::test]
async fn converter_returns_empty_reply_for_fallback() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/generate");
            then.status(200).json_body(json!({ "candidates": [] }));
        })
        .await;

    let converter = GeminiConverter::new(
        endpoint(&server, "/generate"),
        "test-key",
        RetryPolicy::zero_delay(3),
    );
    // An empty reply is not an error; the pipeline treats it as a signal to
    // fall back to the rule-based converter.
    let markup = converter.convert_to_latex("Find 1/2.").await.unwrap();
    assert!(markup.is_empty());
}

#[tokio::test]
async fn converter_retries_then_surfaces_server_errors() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/generate");
            then.status(503).body("overloaded");
        })
        .await;

    let converter = GeminiConverter::new(
        endpoint(&server, "/generate"),
        "test-key",
        RetryPolicy::zero_delay(3),
    );
    let err = converter.convert_to_latex("Find 1/2.").await.unwrap_err();

    assert_eq!(mock.hits_async().await, 3);
    match err {
        ExtractError::ConversionService(message) => {
            assert!(message.contains("503"), "message: {message}")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn embeddings_parse_values_and_send_task_type() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/embed")
                .query_param("key", "test-key")
                .json_body_partial(r#"{"taskType": "retrieval_query"}"#);
            then.status(200).json_body(json!({
                "embedding": { "values": [0.1, 0.2, 0.3] }
            }));
        })
        .await;

    let embeddings = GeminiEmbeddings::new(endpoint(&server, "/embed"), "test-key", 3);
    let vector = embeddings
        .embed("probability of a red ball", EmbeddingTask::Query)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(vector, vec![0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn embeddings_reject_wrong_dimension() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/embed");
            then.status(200).json_body(json!({
                "embedding": { "values": [0.1, 0.2] }
            }));
        })
        .await;

    let embeddings = GeminiEmbeddings::new(endpoint(&server, "/embed"), "test-key", 3);
    let err = embeddings
        .embed("anything", EmbeddingTask::Document)
        .await
        .unwrap_err();

    match err {
        ExtractError::EmbeddingService(message) => {
            assert!(message.contains("expected 3"), "message: {message}")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn embeddings_surface_http_failures() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/embed");
            then.status(500).body("internal");
        })
        .await;

    let embeddings = GeminiEmbeddings::new(endpoint(&server, "/embed"), "test-key", 3);
    let err = embeddings
        .embed("anything", EmbeddingTask::Document)
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::EmbeddingService(_)));
}
