use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use mynah_core::RecorderConfig;
use serde::Deserialize;
use std::process::{Command, Stdio};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared state for the dispatch handlers.
#[derive(Clone)]
struct DispatchState {
    /// Geometry for the virtual display each recorder runs inside. Must
    /// match the recorder's capture resolution.
    resolution: Arc<String>,
}

pub fn execute(port: u16) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(serve(port))
}

async fn serve(port: u16) -> Result<()> {
    let state = DispatchState {
        resolution: Arc::new(RecorderConfig::default().resolution()),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/join", get(join))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Dispatch endpoint listening on port {}", port);

    axum::serve(listener, app).await.context("Server error")
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[derive(Debug, Deserialize)]
struct JoinParams {
    room: Option<String>,
}

/// Handle `GET /join?room=R`: spawn one detached recorder bound to the room
/// and return immediately; the dispatcher never waits for join or recording.
async fn join(
    State(state): State<DispatchState>,
    Query(params): Query<JoinParams>,
) -> impl IntoResponse {
    let room = match params.room.as_deref() {
        Some(room) if !room.is_empty() => room.to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                "Error: you must specify a room. Usage: /join?room=MyMeeting".to_string(),
            );
        }
    };

    info!("Dispatching recorder to room: {}", room);

    match spawn_recorder(&room, &state.resolution) {
        Ok(()) => (
            StatusCode::OK,
            format!("Recorder dispatched to: {} ({})", room, state.resolution),
        ),
        Err(e) => {
            error!("Failed to dispatch recorder: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to dispatch recorder: {}", e),
            )
        }
    }
}

/// Launch `mynah record <room>` under xvfb-run on a throwaway X server
/// whose screen matches the capture resolution, detached from this
/// process's lifetime.
fn spawn_recorder(room: &str, resolution: &str) -> std::io::Result<()> {
    let exe = std::env::current_exe()?;

    let child = Command::new("xvfb-run")
        .arg("--auto-servernum")
        .arg(format!("--server-args=-screen 0 {}x24", resolution))
        .arg(exe)
        .arg("record")
        .arg(room)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    // Reap the wrapper in the background so finished recorders don't pile
    // up as zombies under a long-lived dispatcher.
    tokio::task::spawn_blocking(move || {
        let mut child = child;
        let _ = child.wait();
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    fn state() -> DispatchState {
        DispatchState {
            resolution: Arc::new("1920x1080".to_string()),
        }
    }

    #[tokio::test]
    async fn test_join_rejects_missing_room() {
        let response = join(State(state()), Query(JoinParams { room: None }))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("Usage: /join?room="));
    }

    #[tokio::test]
    async fn test_join_rejects_empty_room() {
        let response = join(
            State(state()),
            Query(JoinParams {
                room: Some(String::new()),
            }),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_is_ok() {
        let response = health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
