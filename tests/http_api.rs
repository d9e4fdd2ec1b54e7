//! HTTP API integration tests.
//!
//! Spins the axum server up on an ephemeral port with wiremock standing in
//! for every remote provider, then drives the endpoints with a real HTTP
//! client to pin down the request/response contracts.

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use casegen::config::Config;
use casegen::server::{router, AppState};

const COLLECTION: &str = "testcase-generation";

struct TestApi {
    base_url: String,
    client: reqwest::Client,
    providers: MockServer,
    qdrant: MockServer,
}

async fn spawn_api() -> TestApi {
    let providers = MockServer::start().await;
    let qdrant = MockServer::start().await;

    let toml_str = format!(
        r#"
[chunking]
chunk_size = 1000
chunk_overlap = 200

[embedding]
provider = "ollama"
model = "nomic-embed-text"
dims = 4
url = "{}"
max_retries = 0
timeout_secs = 5

[index]
url = "{}"
collection = "{COLLECTION}"
timeout_secs = 5

[generation]
provider = "ollama"
model = "llama3"
url = "{}"
timeout_secs = 5

[server]
top_k = 3
"#,
        providers.uri(),
        qdrant.uri(),
        providers.uri(),
    );
    let config: Config = toml::from_str(&toml_str).unwrap();
    let state = AppState::from_config(config).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    TestApi {
        base_url: format!("http://{}", addr),
        client: reqwest::Client::new(),
        providers,
        qdrant,
    }
}

async fn mount_embedding(api: &TestApi) {
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.1, 0.2, 0.3, 0.4]]
        })))
        .mount(&api.providers)
        .await;
}

#[tokio::test]
async fn health_reports_version() {
    let api = spawn_api().await;

    let body: Value = api
        .client
        .get(format!("{}/health", api.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].as_str().is_some());
}

#[tokio::test]
async fn ingest_returns_document_identity() {
    let api = spawn_api().await;
    mount_embedding(&api).await;
    Mock::given(method("POST"))
        .and(path(format!("/collections/{}/points/delete", COLLECTION)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .mount(&api.qdrant)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/collections/{}/points", COLLECTION)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .mount(&api.qdrant)
        .await;

    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(b"The login page requires a username.".to_vec())
            .file_name("requirements.txt"),
    );

    let response = api
        .client
        .post(format!("{}/ingest", api.base_url))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["documentName"], "requirements.txt");
    assert!(body["documentId"].as_str().is_some());
}

#[tokio::test]
async fn ingest_without_file_is_bad_request() {
    let api = spawn_api().await;

    let form = reqwest::multipart::Form::new().text("comment", "no file here");
    let response = api
        .client
        .post(format!("{}/ingest", api.base_url))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "invalid_argument");
}

#[tokio::test]
async fn document_returns_null_when_collection_empty() {
    let api = spawn_api().await;
    Mock::given(method("POST"))
        .and(path(format!("/collections/{}/points/scroll", COLLECTION)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": { "points": [] } })),
        )
        .mount(&api.qdrant)
        .await;

    let response = api
        .client
        .get(format!("{}/document", api.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert!(body.is_null());
}

#[tokio::test]
async fn document_returns_current_pair() {
    let api = spawn_api().await;
    Mock::given(method("POST"))
        .and(path(format!("/collections/{}/points/scroll", COLLECTION)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "points": [{
                "id": "5d0a7f4e-9c1b-4f3a-b1de-2f0c4a6b8d9e",
                "payload": {
                    "text": "chunk text",
                    "metadata": {
                        "documentId": "7f8e24b4-32a5-4b84-8f7e-5a4b84327f8e",
                        "documentName": "spec.pdf"
                    }
                }
            }]}
        })))
        .mount(&api.qdrant)
        .await;

    let body: Value = api
        .client
        .get(format!("{}/document", api.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["documentName"], "spec.pdf");
}

#[tokio::test]
async fn retrieve_returns_ranked_results() {
    let api = spawn_api().await;
    mount_embedding(&api).await;
    Mock::given(method("POST"))
        .and(path(format!("/collections/{}/points/search", COLLECTION)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                { "id": 1, "score": 0.88, "payload": { "text": "first", "metadata": { "documentName": "spec.pdf" } } },
                { "id": 2, "score": 0.55, "payload": { "text": "second", "metadata": {} } },
            ]
        })))
        .mount(&api.qdrant)
        .await;

    let body: Value = api
        .client
        .post(format!("{}/retrieve", api.base_url))
        .json(&json!({ "prompt": "login feature" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["prompt"], "login feature");
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["index"], 1);
    assert_eq!(results[0]["text"], "first");
    assert_eq!(results[1]["index"], 2);
    assert!(results[0]["score"].as_f64() >= results[1]["score"].as_f64());
}

#[tokio::test]
async fn retrieve_empty_prompt_is_bad_request() {
    let api = spawn_api().await;

    let response = api
        .client
        .post(format!("{}/retrieve", api.base_url))
        .json(&json!({ "prompt": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "invalid_argument");
}

#[tokio::test]
async fn generate_returns_validated_json_string() {
    let api = spawn_api().await;
    let payload = json!([
        {
            "testcaseID": "TC-001",
            "description": "Login works",
            "steps": ["open", "type", "submit"],
            "expectedResults": "logged in",
            "priority": "High"
        },
        {
            "testcaseID": "TC-002",
            "description": "Login fails",
            "steps": ["open", "type wrong", "submit"],
            "expectedResults": "error shown",
            "priority": "Low"
        }
    ]);
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": format!("```json\n{}\n```", payload)
        })))
        .mount(&api.providers)
        .await;

    let body: Value = api
        .client
        .post(format!("{}/generate", api.base_url))
        .json(&json!({
            "prompt": "login feature",
            "contextItems": [{ "text": "snippet one" }, { "text": "snippet two" }],
            "count": 2
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // The UI contract is a JSON-encoded string, parsed client-side.
    let testcases: Value = serde_json::from_str(body["testcases"].as_str().unwrap()).unwrap();
    let testcases = testcases.as_array().unwrap();
    assert_eq!(testcases.len(), 2);
    assert_eq!(testcases[0]["testcaseID"], "TC-001");
    assert_eq!(testcases[1]["priority"], "Low");
}

#[tokio::test]
async fn generate_invalid_model_output_reports_indices() {
    let api = spawn_api().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": r#"[{ "testcaseID": "TC-001", "description": "missing fields" }]"#
        })))
        .mount(&api.providers)
        .await;

    let response = api
        .client
        .post(format!("{}/generate", api.base_url))
        .json(&json!({ "prompt": "login", "contextItems": [], "count": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "schema_validation");
    assert_eq!(body["error"]["indices"], json!([0]));
}

#[tokio::test]
async fn index_outage_maps_to_service_unavailable() {
    let api = spawn_api().await;
    mount_embedding(&api).await;
    Mock::given(method("POST"))
        .and(path(format!("/collections/{}/points/search", COLLECTION)))
        .respond_with(ResponseTemplate::new(500).set_body_string("node down"))
        .mount(&api.qdrant)
        .await;

    let response = api
        .client
        .post(format!("{}/retrieve", api.base_url))
        .json(&json!({ "prompt": "login" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 503);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "index_unavailable");
}
