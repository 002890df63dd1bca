use crate::telemetry_logic::config::Settings;
use crate::telemetry_logic::model::{ApiError, ClientCommand, ErrorBody, RangeQuery};
use crate::telemetry_logic::state::AppState;
use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderValue, Method},
    response::IntoResponse,
    routing::get,
};
use futures_util::StreamExt;
use lib_telemetry::TelemetryRecord;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::{Any, CorsLayer};

static NEXT_CLIENT_ID: AtomicUsize = AtomicUsize::new(1);

pub fn router(app_state: AppState, allowed_origin: &str) -> Router {
    let cors = match HeaderValue::from_str(allowed_origin) {
        Ok(origin) => CorsLayer::new().allow_origin(origin),
        Err(_) => {
            log::warn!("Invalid allowed origin '{}'; allowing any origin", allowed_origin);
            CorsLayer::new().allow_origin(Any)
        }
    }
    .allow_methods([Method::GET]);

    Router::new()
        .route("/history/{ids}/latest", get(latest_handler))
        .route("/history/{ids}", get(range_handler))
        .route("/realtime", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(app_state)
}

pub async fn run(settings: Settings, app_state: AppState, mut shutdown: broadcast::Receiver<()>) {
    let app = router(app_state, &settings.allowed_origin);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Failed to bind downstream server on {}: {}", addr, e);
            return;
        }
    };
    log::info!("History hosted at http://{}/history", addr);
    log::info!("Realtime hosted at ws://{}/realtime", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.recv().await.ok();
            log::info!("Downstream server shutting down.");
        })
        .await;
    if let Err(e) = served {
        log::error!("Downstream server error: {}", e);
    }
}

/// `a,b,c` into identifiers, skipping empty entries.
fn split_ids(ids: &str) -> Vec<&str> {
    ids.split(',').map(str::trim).filter(|id| !id.is_empty()).collect()
}

async fn latest_handler(
    State(state): State<AppState>,
    Path(ids): Path<String>,
) -> Result<Json<Vec<TelemetryRecord>>, ApiError> {
    Ok(Json(state.engine.latest(&split_ids(&ids))?))
}

async fn range_handler(
    State(state): State<AppState>,
    Path(ids): Path<String>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Vec<TelemetryRecord>>, ApiError> {
    Ok(Json(state.engine.range(&split_ids(&ids), range.start, range.end)?))
}

async fn health_handler() -> impl IntoResponse {
    (axum::http::StatusCode::OK, "OK")
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let client_id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
    log::info!("Realtime client {} connected", client_id);

    // The bus calls back synchronously; records cross into this task through
    // an unbounded channel.
    let subscribed: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let listener = {
        let subscribed = Arc::clone(&subscribed);
        state.engine.listen(move |record| {
            let wanted = subscribed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(record.id());
            if wanted {
                if let Ok(json) = serde_json::to_string(record) {
                    let _ = tx.send(json);
                }
            }
        })
    };

    loop {
        tokio::select! {
            incoming = socket.next() => {
                let Some(Ok(msg)) = incoming else {
                    break; // client disconnected
                };
                match msg {
                    Message::Text(text) => {
                        let reply = apply_command(&subscribed, text.as_str());
                        if let Some(reply) = reply {
                            if socket.send(Message::Text(reply.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(json) = rx.recv() => {
                if socket.send(Message::Text(json.into())).await.is_err() {
                    break; // client disconnected
                }
            }
        }
    }

    listener.unsubscribe();
    log::info!("Realtime client {} disconnected", client_id);
}

/// Applies one line of the realtime protocol. Returns an error payload to send
/// back when the line is not a command.
fn apply_command(subscribed: &Mutex<HashSet<String>>, line: &str) -> Option<String> {
    match line.parse::<ClientCommand>() {
        Ok(ClientCommand::Subscribe(id)) => {
            log::debug!("Realtime subscribe {}", id);
            subscribed.lock().unwrap_or_else(PoisonError::into_inner).insert(id);
            None
        }
        Ok(ClientCommand::Unsubscribe(id)) => {
            log::debug!("Realtime unsubscribe {}", id);
            subscribed.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
            None
        }
        Err(error) => serde_json::to_string(&ErrorBody { error }).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use lib_telemetry::{DecoderKind, EngineConfig, SyncMode};
    use serde_json::json;

    fn app_state() -> AppState {
        let config = EngineConfig::default().with_source("sens.batteryStatus", DecoderKind::FromId, SyncMode::PushImmediate);
        let state = AppState::new(config).unwrap();
        state.enable_all_sources();
        for (ts, charge) in [(10, 80), (20, 81), (30, 82)] {
            state
                .engine
                .deliver_at("sens.batteryStatus", &json!([48, 1, charge, 30, 1]), ts);
        }
        state
    }

    #[test]
    fn splits_identifier_lists() {
        assert_eq!(split_ids("a, b,,c"), vec!["a", "b", "c"]);
        assert!(split_ids("").is_empty());
    }

    #[tokio::test]
    async fn latest_returns_last_record() {
        let state = app_state();
        let Json(records) = latest_handler(State(state), Path("sens.batteryStatus".to_string()))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("value.charge"), Some(&json!(82)));
    }

    #[tokio::test]
    async fn range_is_exclusive() {
        let state = app_state();
        let Json(records) = range_handler(
            State(state),
            Path("sens.batteryStatus".to_string()),
            Query(RangeQuery { start: 10, end: 30 }),
        )
        .await
        .unwrap();
        let stamps: Vec<i64> = records.iter().map(TelemetryRecord::timestamp).collect();
        assert_eq!(stamps, vec![20]);
    }

    #[tokio::test]
    async fn unknown_identifier_is_not_found() {
        let state = app_state();
        let err = latest_handler(State(state), Path("sens.batteryStatus,nope".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn commands_update_subscriptions() {
        let subscribed = Mutex::new(HashSet::new());
        assert_eq!(apply_command(&subscribed, "subscribe ping"), None);
        assert!(subscribed.lock().unwrap().contains("ping"));
        assert_eq!(apply_command(&subscribed, "unsubscribe ping"), None);
        assert!(subscribed.lock().unwrap().is_empty());
        let reply = apply_command(&subscribed, "bogus").unwrap();
        assert!(reply.contains("Unrecognized command"));
    }
}
