//! `GET /sse/translation/{task_id}`: forwards `EventBus` events for one task
//! as Server-Sent-Events. The axum plumbing (`Sse::new(..).keep_alive(..)`,
//! the `async-stream`-based conversion of an async generator into
//! `axum::response::sse::Event`s) is grounded on `adk-server`'s `run_sse`
//! handler (`rest/controllers/runtime.rs`). The framing, heartbeat timeout
//! and terminal-event synthesis follow the original generator this runtime
//! was distilled from rather than inventing new behavior, routed through a
//! `TaskDirectory` so this module never reaches into orchestrator state.

use crate::directory::TaskDirectory;
use async_stream::stream;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use pdftrans_core::Event;
use pdftrans_eventbus::EventBus;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info_span, Instrument};

const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state for the SSE route: the process-wide event bus and the task
/// directory the workflow entry point keeps updated.
#[derive(Clone)]
pub struct SseState {
    pub bus: &'static EventBus,
    pub directory: Arc<dyn TaskDirectory>,
}

impl SseState {
    pub fn new(bus: &'static EventBus, directory: Arc<dyn TaskDirectory>) -> Self {
        Self { bus, directory }
    }
}

fn frame(event: &Event) -> SseEvent {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    SseEvent::default().data(payload)
}

/// Whatever the directory knows about a task that stopped producing events
/// without an explicit `complete`: a recorded failure is reported as
/// `{agent: "system", stage: "error", progress: -1}`; a recorded success, or
/// no record at all (an untracked task id), is reported as a synthesized
/// `complete` — mirrors the source generator, which only emits an error
/// event when it finds a stored failure and otherwise always closes with
/// `complete`.
fn synthesize_terminal_event(directory: &dyn TaskDirectory, task_id: &str) -> Event {
    use crate::directory::TaskOutcome;
    match directory.last_result(task_id) {
        Some(TaskOutcome::Failed(message)) => {
            Event::new("system", "error", -1).with_detail(serde_json::json!({ "message": message }))
        }
        Some(TaskOutcome::Success(_)) | None => Event::complete(),
    }
}

pub async fn stream_translation(
    State(state): State<SseState>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    let span = info_span!("sse_stream_translation", task_id = %task_id);
    let bus = state.bus;
    let directory = Arc::clone(&state.directory);
    let mut subscription = bus.subscribe(&task_id);
    let task_id_for_close = task_id.clone();

    let body = stream! {
        yield Ok::<SseEvent, Infallible>(frame(&Event::connected()));

        loop {
            match tokio::time::timeout(HEARTBEAT_TIMEOUT, subscription.recv()).await {
                Ok(Some(event)) => {
                    let done = event.is_complete();
                    yield Ok(frame(&event));
                    if done {
                        break;
                    }
                }
                Ok(None) => {
                    yield Ok(frame(&synthesize_terminal_event(directory.as_ref(), &task_id)));
                    break;
                }
                Err(_elapsed) => {
                    yield Ok(frame(&Event::heartbeat()));
                    if !directory.is_running(&task_id) {
                        yield Ok(frame(&synthesize_terminal_event(directory.as_ref(), &task_id)));
                        break;
                    }
                }
            }
        }

        bus.unsubscribe(&task_id_for_close, subscription.id());
    }
    .instrument(span);

    let sse = Sse::new(body).keep_alive(KeepAlive::default());
    let mut response = sse.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

/// Mounts `stream_translation` at `GET /sse/translation/{task_id}` behind a
/// permissive CORS layer and a request trace layer. Grounded on
/// `adk-server`'s `create_app()`.
pub fn create_router(state: SseState) -> Router {
    Router::new()
        .route("/sse/translation/{task_id}", get(stream_translation))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
