//! # Sampler
//!
//! The fixed-period notifier that emits clock-synchronized identifiers. It is
//! a tokio task driven by `tokio::time::interval` and stopped through a
//! `CancellationToken`.
//!
//! The sampler knows nothing about the engine: every tick it calls the
//! `on_tick` closure it was started with, which returns `false` once the
//! owner is gone.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::core::error::EngineError;

struct Running {
    token: CancellationToken,
    _task: JoinHandle<()>,
}

/// Start/stop state of the periodic notifier.
pub struct Sampler {
    period: Duration,
    running: Option<Running>,
}

impl Sampler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Spawns the tick task on the current tokio runtime. Starting a running
    /// sampler logs a warning and leaves it untouched.
    pub fn start<F>(&mut self, on_tick: F) -> Result<(), EngineError>
    where
        F: FnMut(&CancellationToken) -> bool + Send + 'static,
    {
        if self.running.is_some() {
            log::warn!("Notifier already running; start ignored");
            return Ok(());
        }

        let handle = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let token = CancellationToken::new();
        let task = handle.spawn(run(self.period, token.clone(), on_tick));

        log::info!("Notifier started (period {:?})", self.period);
        self.running = Some(Running { token, _task: task });
        Ok(())
    }

    /// Cancels the tick task. Returns `false` (and logs a warning) if it was
    /// not running.
    pub fn stop(&mut self) -> bool {
        match self.running.take() {
            Some(running) => {
                running.token.cancel();
                log::info!("Notifier stopped");
                true
            }
            None => {
                log::warn!("Notifier not running; stop ignored");
                false
            }
        }
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.token.cancel();
        }
    }
}

async fn run<F>(period: Duration, token: CancellationToken, mut on_tick: F)
where
    F: FnMut(&CancellationToken) -> bool + Send + 'static,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                if !on_tick(&token) {
                    break;
                }
            }
        }
    }
    log::debug!("Notifier task exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn ticks_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let mut sampler = Sampler::new(Duration::from_millis(10));
        sampler
            .start(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(35)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        assert!(sampler.stop());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert!(!sampler.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn double_start_keeps_one_task() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let mut sampler = Sampler::new(Duration::from_millis(10));
        for _ in 0..2 {
            let counter = Arc::clone(&ticks);
            sampler
                .start(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    true
                })
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn start_outside_runtime_fails() {
        let mut sampler = Sampler::new(Duration::from_millis(10));
        assert!(matches!(sampler.start(|_| true), Err(EngineError::NoRuntime)));
        assert!(!sampler.is_running());
    }
}
