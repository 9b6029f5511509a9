use rag_engine::{EmbedError, Embedder, GeminiEmbedder, GeminiSettings};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EMBED_PATH: &str = "/v1beta/models/text-embedding-004:batchEmbedContents";

fn settings(server: &MockServer) -> GeminiSettings {
    GeminiSettings {
        base_url: server.uri(),
        api_key: Some("test-key".into()),
        ..GeminiSettings::default()
    }
}

fn embeddings(vectors: &[[f32; 2]]) -> serde_json::Value {
    json!({
        "embeddings": vectors.iter().map(|v| json!({ "values": v })).collect::<Vec<_>>()
    })
}

#[tokio::test]
async fn documents_are_embedded_with_document_task_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "requests": [
                {
                    "model": "models/text-embedding-004",
                    "content": { "parts": [{ "text": "alpha" }] },
                    "taskType": "RETRIEVAL_DOCUMENT"
                },
                {
                    "model": "models/text-embedding-004",
                    "content": { "parts": [{ "text": "beta" }] },
                    "taskType": "RETRIEVAL_DOCUMENT"
                }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(embeddings(&[[0.1, 0.2], [0.3, 0.4]])))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = GeminiEmbedder::new(&settings(&server)).unwrap();
    let vectors = embedder
        .embed_documents(&["alpha".to_string(), "beta".to_string()])
        .await
        .unwrap();
    assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
}

#[tokio::test]
async fn query_uses_query_task_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .and(body_partial_json(json!({
            "requests": [{ "taskType": "RETRIEVAL_QUERY" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(embeddings(&[[1.0, 0.0]])))
        .mount(&server)
        .await;

    let embedder = GeminiEmbedder::new(&settings(&server)).unwrap();
    let vector = embedder.embed_query("what?").await.unwrap();
    assert_eq!(vector, vec![1.0, 0.0]);
}

#[tokio::test]
async fn large_inputs_are_split_into_batches() {
    let server = MockServer::start().await;
    let full: Vec<[f32; 2]> = vec![[0.5, 0.5]; 100];
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(move |req: &wiremock::Request| {
            let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
            let count = body["requests"].as_array().map(Vec::len).unwrap_or(0);
            ResponseTemplate::new(200).set_body_json(embeddings(&full[..count]))
        })
        .expect(2)
        .mount(&server)
        .await;

    let embedder = GeminiEmbedder::new(&settings(&server)).unwrap();
    let texts: Vec<String> = (0..150).map(|i| format!("text {i}")).collect();
    let vectors = embedder.embed_documents(&texts).await.unwrap();
    assert_eq!(vectors.len(), 150);
}

#[tokio::test]
async fn count_mismatch_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(embeddings(&[[0.1, 0.2]])))
        .mount(&server)
        .await;

    let embedder = GeminiEmbedder::new(&settings(&server)).unwrap();
    let err = embedder
        .embed_documents(&["a".to_string(), "b".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, EmbedError::Malformed(_)), "{err:?}");
}

#[tokio::test]
async fn error_status_carries_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&server)
        .await;

    let embedder = GeminiEmbedder::new(&settings(&server)).unwrap();
    let err = embedder.embed_query("q").await.unwrap_err();
    match err {
        EmbedError::Status { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body, "bad request");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn missing_api_key_is_reported_by_name() {
    let err = GeminiEmbedder::new(&GeminiSettings::default()).unwrap_err();
    assert_eq!(err.to_string(), "GOOGLE_API_KEY not set");
}
