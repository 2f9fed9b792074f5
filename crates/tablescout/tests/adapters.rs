//! Chat model and remote search backend against mock HTTP endpoints.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tablescout::backend::HttpSearchBackend;
use tablescout::config::{LlmConfig, SearchConfig};
use tablescout::llm::ChatModel;
use tablescout_core::models::{Candidate, ColumnSchema, TargetField};
use tablescout_core::planner::{PlanSource, SearchPlanner};
use tablescout_core::prompt::GroupBounds;
use tablescout_core::search::SearchBackend;
use tablescout_core::validator::FitnessJudge;

const PLAN_REPLY: &str = r#"{"groups": [
  {"conceptual_group": "live predictions",
   "search_query": "Weekly model predictions per game.",
   "target_fields": ["game_id", "predicted_spread"]},
  {"conceptual_group": "attendance",
   "search_query": "Stadium attendance per game.",
   "target_fields": ["GAME_ID", "attendance"]}
]}"#;

const FITNESS_REPLY: &str =
    "Here you go:\n```json\n{\"is_good_fit\": true, \"reasoning\": \"att holds attendance\"}\n```";

#[derive(Clone)]
struct Mock {
    hits: Arc<AtomicUsize>,
    /// Status to return for the first `fail_first` calls.
    fail_status: StatusCode,
    fail_first: usize,
}

impl Mock {
    fn new() -> Self {
        Self {
            hits: Arc::new(AtomicUsize::new(0)),
            fail_status: StatusCode::OK,
            fail_first: 0,
        }
    }

    fn failing(status: StatusCode, times: usize) -> Self {
        Self {
            fail_status: status,
            fail_first: times,
            ..Self::new()
        }
    }
}

fn chat_reply(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    })
}

async fn mock_chat(
    State(mock): State<Mock>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    let n = mock.hits.fetch_add(1, Ordering::SeqCst);
    if n < mock.fail_first {
        return (mock.fail_status, Json(serde_json::json!({ "error": "nope" })));
    }
    assert_eq!(body["response_format"]["type"], "json_object");
    let system = body["messages"][0]["content"].as_str().unwrap_or_default();
    let reply = if system.contains("is_good_fit") {
        FITNESS_REPLY
    } else {
        PLAN_REPLY
    };
    (StatusCode::OK, Json(chat_reply(reply)))
}

async fn mock_search(
    State(mock): State<Mock>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    mock.hits.fetch_add(1, Ordering::SeqCst);
    let page_size = body["page_size"].as_u64().unwrap_or(0) as usize;
    let results: Vec<serde_json::Value> = (0..page_size + 2)
        .map(|i| {
            serde_json::json!({
                "identity": format!("warehouse.t{}", i),
                "schema": [{"name": "game_id", "type": "STRING"}],
                "score": 1.0 - i as f64 * 0.1,
                "query": body["query"]
            })
        })
        .collect();
    Json(serde_json::json!({ "results": results }))
}

/// Serve `mock` on an ephemeral port and return the base URL.
async fn spawn_mock(mock: Mock) -> String {
    let app = Router::new()
        .route("/v1/chat/completions", post(mock_chat))
        .route("/search", post(mock_search))
        .with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}", addr)
}

fn llm_config(base_url: &str, max_retries: u32) -> LlmConfig {
    LlmConfig {
        provider: "openai".to_string(),
        model: Some("gpt-4o-mini".to_string()),
        base_url: format!("{}/v1", base_url),
        api_key_env: "TABLESCOUT_TEST_UNUSED_KEY".to_string(),
        temperature: 0.0,
        timeout_secs: 5,
        max_retries,
    }
}

fn fields() -> Vec<TargetField> {
    vec![
        TargetField::new("game_id", "STRING", ""),
        TargetField::new("predicted_spread", "FLOAT64", ""),
        TargetField::new("attendance", "INT64", ""),
    ]
}

#[tokio::test]
async fn test_chat_model_plan_is_resolved() {
    let mock = Mock::new();
    let url = spawn_mock(mock.clone()).await;
    let model = ChatModel::new(&llm_config(&url, 0)).unwrap().with_api_key("sk-test");

    let planner = SearchPlanner::new(Arc::new(model), GroupBounds::default());
    let outcome = planner.plan_with_source("Weekly review doc", &fields()).await;

    assert_eq!(outcome.source, PlanSource::Generated);
    let steps = outcome.plan.steps();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].conceptual_group, "live predictions");
    // Field references resolve to the caller's spelling.
    assert_eq!(steps[1].target_fields[0].name, "game_id");
    assert_eq!(steps[1].target_fields[1].name, "attendance");
    assert_eq!(mock.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_chat_model_judges_fenced_reply() {
    let url = spawn_mock(Mock::new()).await;
    let model = ChatModel::new(&llm_config(&url, 0)).unwrap().with_api_key("sk-test");

    let candidate = Candidate {
        table_identity: "ops.stadium.attendance".to_string(),
        description: None,
        schema: vec![ColumnSchema::new("att", "INT64", "attendance count")],
        relevance_score: 1.0,
    };
    let verdict = model
        .judge_fitness(&candidate, &fields()[2..], "attendance")
        .await
        .unwrap();
    assert!(verdict.is_good_fit);
    assert_eq!(verdict.reasoning, "att holds attendance");
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mock = Mock::failing(StatusCode::SERVICE_UNAVAILABLE, 1);
    let url = spawn_mock(mock.clone()).await;
    let model = ChatModel::new(&llm_config(&url, 1)).unwrap().with_api_key("sk-test");

    let steps = tablescout_core::planner::PlanGenerator::generate_plan(
        &model,
        "doc",
        &fields(),
        GroupBounds::default(),
    )
    .await
    .unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(mock.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let mock = Mock::failing(StatusCode::UNAUTHORIZED, 10);
    let url = spawn_mock(mock.clone()).await;
    let model = ChatModel::new(&llm_config(&url, 3)).unwrap().with_api_key("sk-bad");

    let planner = SearchPlanner::new(Arc::new(model), GroupBounds::default());
    let outcome = planner.plan_with_source("doc", &fields()).await;

    match outcome.source {
        PlanSource::Fallback { reason } => assert!(reason.contains("401"), "{}", reason),
        other => panic!("expected fallback, got {:?}", other),
    }
    assert_eq!(mock.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_api_key_errors_without_request() {
    let mock = Mock::new();
    let url = spawn_mock(mock.clone()).await;
    let model = ChatModel::new(&llm_config(&url, 0)).unwrap();

    let err = tablescout_core::planner::PlanGenerator::generate_plan(
        &model,
        "doc",
        &fields(),
        GroupBounds::default(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("TABLESCOUT_TEST_UNUSED_KEY not set"));
    assert_eq!(mock.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_http_search_backend() {
    let mock = Mock::new();
    let url = spawn_mock(mock.clone()).await;
    let backend = HttpSearchBackend::new(&SearchConfig {
        provider: "http".to_string(),
        endpoint: Some(format!("{}/search", url)),
        api_key_env: None,
        catalog_path: None,
        page_size: 3,
        timeout_secs: 5,
        max_retries: 0,
    })
    .unwrap();

    let candidates = backend.search("attendance per game", 3).await.unwrap();
    // The backend returns what the index sent; the executor truncates.
    assert_eq!(candidates.len(), 5);
    assert_eq!(candidates[0].table_identity, "warehouse.t0");
    assert_eq!(candidates[0].schema[0].name, "game_id");
    assert!(candidates[0].relevance_score > candidates[1].relevance_score);
    assert_eq!(mock.hits.load(Ordering::SeqCst), 1);
}
