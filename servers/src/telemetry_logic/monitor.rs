use crate::telemetry_logic::config::Settings;
use crate::telemetry_logic::state::AppState;
use tokio::sync::broadcast;
use tokio::time::interval;

/// Periodically reports ingress counters and engine activity.
pub async fn run(settings: Settings, app_state: AppState, mut shutdown: broadcast::Receiver<()>) {
    let mut report_interval = interval(settings.monitor_interval);
    // The first tick completes immediately.
    report_interval.tick().await;
    let mut previous = app_state.stats.snapshot();

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                log::info!("Monitor service received shutdown signal.");
                break;
            }
            _ = report_interval.tick() => {
                let current = app_state.stats.snapshot();
                let [datagrams, samples, points, rejected] = current;
                if datagrams == previous[0] && !app_state.connector.connected().is_empty() {
                    log::warn!(
                        "No datagrams received in the last {:?} while sources are connected.",
                        settings.monitor_interval
                    );
                }
                log::info!(
                    "Ingress: {} datagrams ({} samples, {} points, {} rejected); {} realtime subscribers, notifier running: {}",
                    datagrams,
                    samples,
                    points,
                    rejected,
                    app_state.engine.subscriber_count(),
                    app_state.engine.is_notifier_running()
                );
                previous = current;
            }
        }
    }
}
