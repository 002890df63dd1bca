use anyhow::Result;
use tokio::signal;

mod telemetry_logic;
use telemetry_logic::{config, downstream, logger, monitor, state, upstream};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = config::load_config().into_settings()?;
    logger::setup_logging(&settings.log_dir, &settings.log_prefix, &settings.log_level)?;

    let engine_config = settings.engine_config()?;
    let app_state = state::AppState::new(engine_config)?;
    app_state.engine.start_notifier()?;
    app_state.enable_all_sources();

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);

    let upstream_handle = tokio::spawn(upstream::run(
        settings.clone(),
        app_state.clone(),
        shutdown_tx.subscribe(),
    ));

    let downstream_handle = tokio::spawn(downstream::run(
        settings.clone(),
        app_state.clone(),
        shutdown_tx.subscribe(),
    ));

    let monitor_handle = tokio::spawn(monitor::run(
        settings.clone(),
        app_state.clone(),
        shutdown_tx.subscribe(),
    ));

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut term_signal) => {
                        term_signal.recv().await;
                        log::info!("SIGTERM received, initiating shutdown.");
                    }
                    Err(e) => {
                        log::warn!("Cannot listen for SIGTERM: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }

    // Send shutdown signal to all components
    let _ = shutdown_tx.send(());
    app_state.engine.stop_notifier();
    app_state.disable_all_sources();

    // Wait for components to shut down
    let _ = tokio::try_join!(upstream_handle, downstream_handle, monitor_handle);

    log::info!("Shutdown complete.");
    Ok(())
}
