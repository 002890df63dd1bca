use crate::telemetry_logic::config::Settings;
use crate::telemetry_logic::model::IngressMessage;
use crate::telemetry_logic::state::AppState;
use std::sync::atomic::Ordering;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;

const MAX_DATAGRAM: usize = 65_536;

pub async fn run(settings: Settings, app_state: AppState, mut shutdown: broadcast::Receiver<()>) {
    let socket = match UdpSocket::bind(settings.udp_addr).await {
        Ok(socket) => socket,
        Err(e) => {
            log::error!("Failed to bind UDP ingress on {}: {}", settings.udp_addr, e);
            return;
        }
    };
    log::info!("UDP ingress listening on {}", settings.udp_addr);

    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                log::info!("Upstream shutting down...");
                break;
            }
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, peer)) => {
                    if let Err(e) = handle_datagram(&app_state, &buf[..len]) {
                        log::warn!("Rejected datagram from {}: {}", peer, e);
                    }
                }
                Err(e) => log::warn!("UDP receive error: {}", e),
            }
        }
    }
}

/// Decodes one datagram and hands it to the engine.
pub fn handle_datagram(app_state: &AppState, bytes: &[u8]) -> anyhow::Result<()> {
    let stats = &app_state.stats;
    stats.datagrams.fetch_add(1, Ordering::Relaxed);

    let message = match serde_json::from_slice::<IngressMessage>(bytes) {
        Ok(message) => message,
        Err(e) => {
            stats.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(e.into());
        }
    };

    match message {
        IngressMessage::Sample { id, sample } => {
            stats.samples.fetch_add(1, Ordering::Relaxed);
            app_state.engine.deliver(&id, &sample);
        }
        IngressMessage::Point { id, value, timestamp } => {
            let timestamp = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
            if let Err(e) = app_state.engine.generate_telemetry(timestamp, value, &id) {
                stats.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(e.into());
            }
            stats.points.fetch_add(1, Ordering::Relaxed);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_telemetry::{DecoderKind, EngineConfig, SyncMode};
    use serde_json::json;

    fn app_state() -> AppState {
        let config = EngineConfig::default().with_source("sens.batteryStatus", DecoderKind::FromId, SyncMode::PushImmediate);
        let state = AppState::new(config).unwrap();
        state.enable_all_sources();
        state
    }

    #[test]
    fn samples_and_points_reach_the_engine() {
        let state = app_state();

        handle_datagram(&state, br#"{"id": "sens.batteryStatus", "sample": [48, 1, 90, 30, 1]}"#).unwrap();
        handle_datagram(&state, br#"{"id": "ping", "value": 3.5, "timestamp": 42}"#).unwrap();

        let latest = state.engine.latest(&["sens.batteryStatus", "ping"]).unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].get("value.charge"), Some(&json!(90)));
        assert_eq!(latest[1].get("value"), Some(&json!(3.5)));
        assert_eq!(state.stats.snapshot(), [2, 1, 1, 0]);
    }

    #[test]
    fn malformed_and_unknown_datagrams_are_rejected() {
        let state = app_state();
        assert!(handle_datagram(&state, b"not json").is_err());
        assert!(handle_datagram(&state, br#"{"id": "nope", "value": 1}"#).is_err());
        assert_eq!(state.stats.snapshot(), [2, 0, 0, 2]);
    }
}
