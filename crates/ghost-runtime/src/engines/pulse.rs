//! Pulse engine: background heartbeat.
//!
//! Runs a periodic tick on the async runtime. Each tick emits a `pulse`
//! event and, on its own longer interval, autosaves the kernel session
//! record. A failing tick task is logged and skipped; the loop never dies
//! from one bad beat.

use ghost_kernel::{BootContext, Engine, EngineError, Kernel};
use parking_lot::Mutex;
use serde_json::json;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Event emitted on every heartbeat.
pub const EVENT_PULSE: &str = "pulse";

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Heartbeat and session autosave.
pub struct PulseEngine {
    tick_interval: Duration,
    autosave_interval: Duration,
    ticks: Arc<AtomicU64>,
    stop: Mutex<Option<watch::Sender<bool>>>,
}

impl PulseEngine {
    #[must_use]
    pub fn new(autosave_interval: Duration) -> Self {
        Self::with_tick(TICK_INTERVAL, autosave_interval)
    }

    /// Custom tick period. Mainly for tests that cannot wait out the
    /// production heartbeat.
    #[must_use]
    pub fn with_tick(tick_interval: Duration, autosave_interval: Duration) -> Self {
        Self {
            tick_interval,
            autosave_interval,
            ticks: Arc::new(AtomicU64::new(0)),
            stop: Mutex::new(None),
        }
    }

    /// Heartbeats since boot.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    async fn run(
        kernel: Weak<Kernel>,
        ticks: Arc<AtomicU64>,
        tick_interval: Duration,
        autosave_interval: Duration,
        mut stop: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // How many ticks make up one autosave window.
        let autosave_every = (autosave_interval.as_millis() / tick_interval.as_millis().max(1))
            .max(1) as u64;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = stop.changed() => {
                    debug!("pulse loop stopping");
                    return;
                }
            }

            let Some(kernel) = kernel.upgrade() else {
                debug!("kernel dropped, pulse loop stopping");
                return;
            };

            let n = ticks.fetch_add(1, Ordering::SeqCst) + 1;
            kernel.events().emit(EVENT_PULSE, &json!({ "tick": n }));

            if n % autosave_every == 0 {
                if let Err(e) = kernel.save_session() {
                    warn!(error = %e, "session autosave failed");
                }
            }
        }
    }
}

impl Engine for PulseEngine {
    fn name(&self) -> &str {
        "pulse"
    }

    fn init(&mut self, ctx: &BootContext) -> Result<(), EngineError> {
        let handle = tokio::runtime::Handle::try_current().map_err(EngineError::init)?;
        let (tx, rx) = watch::channel(false);
        *self.stop.lock() = Some(tx);

        handle.spawn(Self::run(
            Arc::downgrade(ctx.kernel()),
            Arc::clone(&self.ticks),
            self.tick_interval,
            self.autosave_interval,
            rx,
        ));
        debug!(tick_secs = self.tick_interval.as_secs_f64(), "pulse loop started");
        Ok(())
    }

    fn shutdown(&self) -> Result<(), EngineError> {
        if let Some(tx) = self.stop.lock().take() {
            let _ = tx.send(true);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghost_kernel::EngineDescriptor;

    #[tokio::test(flavor = "multi_thread")]
    async fn ticks_advance_and_stop_on_shutdown() {
        let dir = tempfile::tempdir().expect("tempdir");
        let kernel = Kernel::builder(dir.path())
            .factory("pulse", |_| {
                Ok(Box::new(PulseEngine::with_tick(
                    Duration::from_millis(20),
                    Duration::from_millis(100),
                )) as Box<dyn ghost_kernel::Engine>)
            })
            .build();

        kernel
            .boot(&[EngineDescriptor::new("pulse", "PulseEngine", false)])
            .expect("boot");

        tokio::time::sleep(Duration::from_millis(200)).await;
        let pulse: Arc<PulseEngine> = kernel.engine("pulse").expect("running");
        assert!(pulse.tick_count() > 0);

        kernel.shutdown();
        let after = pulse.tick_count();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(pulse.tick_count() <= after + 1, "loop kept beating past shutdown");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn heartbeat_emits_pulse_events() {
        let dir = tempfile::tempdir().expect("tempdir");
        let kernel = Kernel::builder(dir.path())
            .factory("pulse", |_| {
                Ok(Box::new(PulseEngine::with_tick(
                    Duration::from_millis(20),
                    Duration::from_secs(60),
                )) as Box<dyn ghost_kernel::Engine>)
            })
            .build();

        let hits = Arc::new(AtomicU64::new(0));
        {
            let hits = Arc::clone(&hits);
            kernel.events().on(EVENT_PULSE, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        kernel
            .boot(&[EngineDescriptor::new("pulse", "PulseEngine", false)])
            .expect("boot");
        tokio::time::sleep(Duration::from_millis(150)).await;
        kernel.shutdown();

        assert!(hits.load(Ordering::SeqCst) > 0);
    }
}
