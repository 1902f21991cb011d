//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::clients::{HttpDeliveryChannel, HttpDirectory, HttpSchedulerClient, HttpTaskStore};
use crate::config::Config;
use crate::dispatch::{DispatchOutcome, Dispatcher, FireRequest};
use crate::reconcile::{BatchReport, Reconciler};
use crate::task::ChangeBatch;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub reconciler: Reconciler,
    pub dispatcher: Dispatcher,
}

impl AppState {
    /// Wire the HTTP-backed collaborators described by `config`.
    pub fn from_config(config: Config, client: reqwest::Client) -> Self {
        let services = &config.services;
        let scheduler = Arc::new(HttpSchedulerClient::new(
            client.clone(),
            &services.scheduler,
            services.api_key.clone(),
            &config.target.group_name,
        ));
        let tasks = Arc::new(HttpTaskStore::new(
            client.clone(),
            &services.task_store,
            services.api_key.clone(),
            &config.table_name,
        ));
        let directory = Arc::new(HttpDirectory::new(
            client.clone(),
            &services.directory,
            services.api_key.clone(),
            &config.user_pool_id,
        ));
        let delivery = Arc::new(HttpDeliveryChannel::new(
            client,
            &services.delivery,
            services.api_key.clone(),
            &config.topic_arn,
        ));

        Self {
            reconciler: Reconciler::new(&config, scheduler),
            dispatcher: Dispatcher::new(&config, tasks, directory, delivery),
            config,
        }
    }
}

/// Build the router over prepared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/stream/records", post(ingest_records))
        .route("/api/reminders/fire", post(fire_reminder))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;
    let addr = config.bind_addr();
    let state = Arc::new(AppState::from_config(config, client));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Reconcile a change-feed batch. Per-record failures are reported in the
/// body; the status stays 200.
async fn ingest_records(
    State(state): State<Arc<AppState>>,
    Json(batch): Json<ChangeBatch>,
) -> Json<BatchReport> {
    Json(state.reconciler.reconcile_feed(&batch).await)
}

/// Dispatch a fired reminder.
async fn fire_reminder(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FireRequest>,
) -> Result<Json<DispatchOutcome>, (StatusCode, String)> {
    let Some(task_id) = request.task_id() else {
        tracing::warn!("Reminder fired without a taskId");
        return Err((StatusCode::BAD_REQUEST, "taskId is required".to_string()));
    };

    if !request.advisory.is_empty() {
        tracing::debug!(
            task_id = %task_id,
            fields = request.advisory.len(),
            "Ignoring advisory payload fields"
        );
    }

    Ok(Json(state.dispatcher.dispatch(task_id).await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::{DateTime, Utc};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::task::image_from_strings;
    use crate::testing::{
        fixed_clock, test_config, InMemoryDelivery, InMemoryDirectory, InMemoryScheduler,
        InMemoryTaskStore,
    };

    struct Fakes {
        scheduler: Arc<InMemoryScheduler>,
        tasks: Arc<InMemoryTaskStore>,
        directory: Arc<InMemoryDirectory>,
        delivery: Arc<InMemoryDelivery>,
    }

    fn app() -> (Router, Fakes) {
        let config = test_config();
        let fakes = Fakes {
            scheduler: Arc::new(InMemoryScheduler::new()),
            tasks: Arc::new(InMemoryTaskStore::new()),
            directory: Arc::new(InMemoryDirectory::new()),
            delivery: Arc::new(InMemoryDelivery::new()),
        };
        let now: DateTime<Utc> = "2025-05-01T08:00:00Z".parse().unwrap();
        let state = AppState {
            reconciler: Reconciler::new(&config, fakes.scheduler.clone())
                .with_clock(fixed_clock(now)),
            dispatcher: Dispatcher::new(
                &config,
                fakes.tasks.clone(),
                fakes.directory.clone(),
                fakes.delivery.clone(),
            ),
            config,
        };
        (router(Arc::new(state)), fakes)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_ingest_records() {
        let (app, fakes) = app();
        let batch = json!({
            "Records": [
                {
                    "eventID": "1",
                    "eventName": "INSERT",
                    "dynamodb": {
                        "NewImage": {
                            "taskId": {"S": "t1"},
                            "status": {"S": "active"},
                            "deadline": {"S": "2025-05-01T10:00:00+00:00"},
                            "assigneeId": {"S": "u1"}
                        }
                    }
                },
                {
                    "eventID": "2",
                    "eventName": "INSERT",
                    "dynamodb": {"NewImage": {"status": {"S": "active"}}}
                }
            ]
        });

        let response = app
            .oneshot(post_json("/api/stream/records", batch))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let report = body_json(response).await;
        assert_eq!(report["scheduled"], 1);
        assert_eq!(report["skipped"], 1);
        assert_eq!(report["failed"], 0);
        assert_eq!(report["records"][0]["outcome"]["outcome"], "scheduled");
        assert_eq!(report["records"][1]["outcome"]["reason"], "missing_task_id");
        assert!(fakes.scheduler.exists("TaskReminder_t1"));
    }

    #[tokio::test]
    async fn test_batch_failures_keep_status_ok() {
        let (app, fakes) = app();
        fakes.scheduler.fail_creates_for("TaskReminder_t1");
        let batch = json!({
            "Records": [{
                "eventName": "INSERT",
                "dynamodb": {"NewImage": {
                    "taskId": {"S": "t1"},
                    "status": {"S": "active"},
                    "deadline": {"S": "2025-05-01T10:00:00Z"}
                }}
            }]
        });

        let response = app
            .oneshot(post_json("/api/stream/records", batch))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let report = body_json(response).await;
        assert_eq!(report["failed"], 1);
        assert_eq!(report["records"][0]["outcome"]["error"]["operation"], "create");
    }

    #[tokio::test]
    async fn test_fire_reminder() {
        let (app, fakes) = app();
        fakes.tasks.insert(image_from_strings([
            ("taskId", "t1"),
            ("status", "active"),
            ("deadline", "2025-05-01T10:00:00+00:00"),
            ("assigneeId", "u1"),
        ]));
        fakes.directory.insert("u1", "u1@example.com");

        let response = app
            .oneshot(post_json(
                "/api/reminders/fire",
                json!({"taskId": "t1", "status": "completed"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let outcome = body_json(response).await;
        assert_eq!(outcome["outcome"], "sent");
        assert_eq!(outcome["address"], "u1@example.com");
        assert_eq!(fakes.delivery.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_fire_without_task_id_is_rejected() {
        let (app, fakes) = app();
        let response = app
            .oneshot(post_json("/api/reminders/fire", json!({"title": "x"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(fakes.delivery.sent().is_empty());
    }

    #[tokio::test]
    async fn test_bad_record_does_not_reject_batch() {
        let (app, fakes) = app();
        let batch = json!({
            "Records": [
                {
                    "eventID": "good",
                    "eventName": "INSERT",
                    "dynamodb": {"NewImage": {
                        "taskId": {"S": "t1"},
                        "status": {"S": "active"},
                        "deadline": {"S": "2025-05-01T10:00:00+00:00"},
                        "blob": {"BS": ["AAE="]}
                    }}
                },
                {
                    "eventID": "no-kind",
                    "dynamodb": {"NewImage": {"taskId": {"S": "t2"}}}
                },
                {
                    "eventID": "odd-type",
                    "eventName": "INSERT",
                    "dynamodb": {"NewImage": {
                        "taskId": {"S": "t3"},
                        "shape": {"XX": true}
                    }}
                }
            ]
        });

        let response = app
            .oneshot(post_json("/api/stream/records", batch))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let report = body_json(response).await;
        assert_eq!(report["scheduled"], 1);
        assert_eq!(report["skipped"], 2);
        assert_eq!(report["records"][1]["event_id"], "no-kind");
        assert_eq!(report["records"][1]["outcome"]["reason"], "malformed_record");
        assert_eq!(report["records"][1]["outcome"]["task_id"], "t2");
        assert_eq!(report["records"][2]["outcome"]["reason"], "malformed_record");

        let schedule = fakes.scheduler.schedule("TaskReminder_t1").unwrap();
        let payload = schedule.payload().unwrap();
        assert_eq!(payload["blob"], json!({"BS": ["AAE="]}));
    }

    #[tokio::test]
    async fn test_padded_task_id_round_trips_to_fire() {
        let (app, fakes) = app();
        let image = image_from_strings([
            ("taskId", " t1"),
            ("status", "active"),
            ("deadline", "2025-05-01T10:00:00+00:00"),
            ("assigneeId", "u1"),
        ]);
        fakes.tasks.insert(image.clone());
        fakes.directory.insert("u1", "u1@example.com");

        let record = crate::task::ChangeRecord::insert(image);
        let batch = json!({ "Records": [record] });
        let response = app
            .clone()
            .oneshot(post_json("/api/stream/records", batch))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["scheduled"], 1);

        // Fire with exactly the payload the schedule was created with.
        let schedule = fakes.scheduler.schedule("TaskReminder_ t1").unwrap();
        let payload = schedule.payload().unwrap();
        assert_eq!(payload["taskId"], " t1");
        let response = app
            .oneshot(post_json("/api/reminders/fire", payload))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let outcome = body_json(response).await;
        assert_eq!(outcome["outcome"], "sent");
        assert_eq!(outcome["task_id"], " t1");
        assert_eq!(fakes.delivery.sent().len(), 1);
    }
}
