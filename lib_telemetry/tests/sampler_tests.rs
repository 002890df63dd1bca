//! The notifier task under tokio's paused clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use lib_telemetry::{DecoderKind, EngineConfig, SyncMode, TelemetryEngine, TelemetryRecord};
use serde_json::json;

fn clocked_engine() -> TelemetryEngine {
    let config = EngineConfig::default()
        .with_source("sens.batteryStatus", DecoderKind::FromId, SyncMode::SampledOnClock)
        .with_source("sens.legacyIMU", DecoderKind::FromId, SyncMode::SampledOnClock);
    TelemetryEngine::new(config).unwrap()
}

fn collect(engine: &TelemetryEngine) -> Arc<Mutex<Vec<TelemetryRecord>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine.listen(move |record| sink.lock().unwrap().push(record.clone()));
    seen
}

fn battery(charge: u32) -> serde_json::Value {
    json!([48, 1, charge, 30, 1])
}

#[tokio::test(start_paused = true)]
async fn each_tick_emits_pending_sources_once_with_a_shared_timestamp() {
    let engine = clocked_engine();
    let seen = collect(&engine);
    let _battery = engine.enable("sens.batteryStatus");
    let _imu = engine.enable("sens.legacyIMU");

    engine.start_notifier().unwrap();

    engine.deliver("sens.batteryStatus", &battery(80));
    engine.deliver("sens.batteryStatus", &battery(81));
    engine.deliver("sens.legacyIMU", &json!(vec![0; 12]));

    tokio::time::sleep(Duration::from_millis(15)).await;
    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].id(), "sens.batteryStatus");
        assert_eq!(seen[0].get("value.charge"), Some(&json!(81)));
        assert_eq!(seen[0].timestamp(), seen[1].timestamp());
    }

    // Idle ticks emit nothing.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(seen.lock().unwrap().len(), 2);

    engine.stop_notifier();
}

#[tokio::test(start_paused = true)]
async fn stop_prevents_further_emission() {
    let engine = clocked_engine();
    let seen = collect(&engine);
    let _battery = engine.enable("sens.batteryStatus");

    engine.start_notifier().unwrap();
    assert!(engine.is_notifier_running());
    engine.stop_notifier();
    assert!(!engine.is_notifier_running());

    engine.deliver("sens.batteryStatus", &battery(50));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(seen.lock().unwrap().is_empty());

    // The pending source is still emitted by a manual tick.
    assert_eq!(engine.notifier_tick(1), 1);
}

#[tokio::test(start_paused = true)]
async fn double_start_and_double_stop_are_harmless() {
    let engine = clocked_engine();
    let seen = collect(&engine);
    let _battery = engine.enable("sens.batteryStatus");

    engine.start_notifier().unwrap();
    engine.start_notifier().unwrap();

    engine.deliver("sens.batteryStatus", &battery(60));
    tokio::time::sleep(Duration::from_millis(15)).await;
    assert_eq!(seen.lock().unwrap().len(), 1);

    engine.stop_notifier();
    engine.stop_notifier();
    assert!(!engine.is_notifier_running());
}

#[test]
fn notifier_needs_a_runtime() {
    let engine = clocked_engine();
    assert!(matches!(
        engine.start_notifier(),
        Err(lib_telemetry::EngineError::NoRuntime)
    ));
}
