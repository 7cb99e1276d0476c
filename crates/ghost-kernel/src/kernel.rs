//! The boot sequencer and engine registry.

use crate::descriptor::EngineDescriptor;
use crate::engine::{BootContext, Engine, EngineFactory};
use crate::error::{EngineError, KernelError};
use crate::eventbus::EventBus;
use crate::session::SessionRecord;
use crate::state::EngineState;
use crate::wrapper::EngineWrapper;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Event emitted once during kernel shutdown, after engines have stopped
/// and before the final session record is written.
pub const EVENT_SHUTDOWN: &str = "shutdown";

/// Outcome of a completed (possibly degraded) boot.
#[derive(Debug, Clone, Default)]
pub struct BootReport {
    pub degraded: bool,
    pub loaded: Vec<String>,
    pub failed: Vec<String>,
    pub disabled: Vec<String>,
}

/// One row of [`Kernel::health_report`].
#[derive(Debug, Clone)]
pub struct EngineHealth {
    pub name: String,
    pub state: EngineState,
    pub critical: bool,
    pub enabled: bool,
    pub restarts: u32,
    pub error_count: usize,
}

/// Engine orchestration kernel.
///
/// Owns the factory table, the wrapper registry, and the event bus. Engines
/// are registered as factories on the builder, then brought up in order by
/// [`Kernel::boot`]. The kernel itself is shared behind `Arc`; long-lived
/// engines keep a `Weak` back-reference.
pub struct Kernel {
    root: PathBuf,
    session_path: PathBuf,
    factories: HashMap<String, EngineFactory>,
    wrappers: RwLock<HashMap<String, EngineWrapper>>,
    boot_order: RwLock<Vec<String>>,
    degraded: AtomicBool,
    running: AtomicBool,
    events: EventBus,
    booted_at: RwLock<Option<DateTime<Utc>>>,
    commands: RwLock<Vec<String>>,
}

/// Builder collecting engine factories before the kernel is shared.
pub struct KernelBuilder {
    root: PathBuf,
    factories: HashMap<String, EngineFactory>,
}

impl KernelBuilder {
    /// Registers a factory under `key`. Descriptors reference it through
    /// their `engine_ref` field.
    #[must_use]
    pub fn factory<F>(mut self, key: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&BootContext) -> Result<Box<dyn Engine>, EngineError> + Send + Sync + 'static,
    {
        self.factories.insert(key.into(), Box::new(factory));
        self
    }

    #[must_use]
    pub fn build(self) -> Arc<Kernel> {
        let session_path = self.root.join("state").join("session.json");
        Arc::new(Kernel {
            root: self.root,
            session_path,
            factories: self.factories,
            wrappers: RwLock::new(HashMap::new()),
            boot_order: RwLock::new(Vec::new()),
            degraded: AtomicBool::new(false),
            running: AtomicBool::new(false),
            events: EventBus::new(),
            booted_at: RwLock::new(None),
            commands: RwLock::new(Vec::new()),
        })
    }
}

impl Kernel {
    #[must_use]
    pub fn builder(root: impl Into<PathBuf>) -> KernelBuilder {
        KernelBuilder {
            root: root.into(),
            factories: HashMap::new(),
        }
    }

    /// Boots the given sequence in order.
    ///
    /// A failed critical engine aborts the boot: engines already running are
    /// stopped in reverse and [`KernelError::CriticalEngine`] is returned.
    /// A failed non-critical engine only flips the kernel into degraded
    /// mode; the walk continues.
    pub fn boot(self: &Arc<Self>, sequence: &[EngineDescriptor]) -> Result<BootReport, KernelError> {
        let mut seen = HashSet::new();
        for descriptor in sequence {
            if !seen.insert(descriptor.name.as_str()) {
                return Err(KernelError::DuplicateEngine(descriptor.name.clone()));
            }
        }

        let boot_time = Utc::now();
        *self.booted_at.write() = Some(boot_time);
        let mut report = BootReport::default();

        for descriptor in sequence {
            let name = descriptor.name.clone();
            let mut wrapper = EngineWrapper::new(descriptor.clone());

            if !descriptor.enabled {
                info!(engine = %name, "engine disabled, skipping");
                report.disabled.push(name.clone());
                self.insert_wrapper(name.clone(), wrapper);
                continue;
            }

            let result = match self.factories.get(&descriptor.engine_ref) {
                Some(factory) => {
                    let ctx = BootContext::new(Arc::clone(self));
                    wrapper.load(factory, &ctx)
                }
                None => {
                    // Routed through load's failure path so the wrapper
                    // records the error like any other init fault.
                    let missing: EngineFactory = {
                        let key = descriptor.engine_ref.clone();
                        Box::new(move |_| Err(EngineError::UnknownFactory(key.clone())))
                    };
                    let ctx = BootContext::new(Arc::clone(self));
                    wrapper.load(&missing, &ctx)
                }
            };

            match result {
                Ok(()) => {
                    info!(engine = %name, "engine online");
                    report.loaded.push(name.clone());
                    self.insert_wrapper(name.clone(), wrapper);
                }
                Err(e) if descriptor.critical => {
                    error!(engine = %name, error = %e, "critical engine failed, aborting boot");
                    self.insert_wrapper(name.clone(), wrapper);
                    self.emergency_shutdown();
                    return Err(KernelError::CriticalEngine { name, source: e });
                }
                Err(e) => {
                    warn!(engine = %name, error = %e, "non-critical engine failed, continuing degraded");
                    report.failed.push(name.clone());
                    self.degraded.store(true, Ordering::SeqCst);
                    self.insert_wrapper(name.clone(), wrapper);
                }
            }
        }

        report.degraded = self.degraded.load(Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);

        if let Err(e) = self.save_session() {
            warn!(error = %e, "failed to persist session record");
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            degraded = report.degraded,
            "boot complete"
        );
        Ok(report)
    }

    fn insert_wrapper(&self, name: String, wrapper: EngineWrapper) {
        self.wrappers.write().insert(name.clone(), wrapper);
        self.boot_order.write().push(name);
    }

    /// Untyped lookup. Returns `Some` only while the engine is `Running`.
    #[must_use]
    pub fn get_engine(&self, name: &str) -> Option<Arc<dyn Engine>> {
        self.wrappers.read().get(name).and_then(EngineWrapper::instance)
    }

    /// Typed lookup via downcast. Returns `None` when the engine is absent,
    /// not running, or of a different concrete type.
    #[must_use]
    pub fn engine<T: Engine>(&self, name: &str) -> Option<Arc<T>> {
        self.get_engine(name)
            .and_then(|e| e.into_any().downcast::<T>().ok())
    }

    /// Restarts a failed engine through its registered factory.
    ///
    /// The wrapper is removed from the registry while the factory runs so
    /// the lock is never held across engine construction.
    pub fn restart_engine(self: &Arc<Self>, name: &str) -> Result<(), KernelError> {
        let mut wrapper = self
            .wrappers
            .write()
            .remove(name)
            .ok_or_else(|| KernelError::UnknownEngine(name.to_string()))?;

        let factory = match self.factories.get(&wrapper.descriptor().engine_ref) {
            Some(factory) => factory,
            None => {
                let key = wrapper.descriptor().engine_ref.clone();
                self.wrappers.write().insert(name.to_string(), wrapper);
                return Err(EngineError::UnknownFactory(key).into());
            }
        };

        let ctx = BootContext::new(Arc::clone(self));
        let result = wrapper.restart(factory, &ctx);
        self.wrappers.write().insert(name.to_string(), wrapper);
        self.recompute_degraded();
        result.map_err(KernelError::from)
    }

    fn recompute_degraded(&self) {
        let wrappers = self.wrappers.read();
        let any_failed = wrappers
            .values()
            .any(|w| w.descriptor().enabled && w.state() == EngineState::Failed);
        self.degraded.store(any_failed, Ordering::SeqCst);
    }

    /// Health of every tracked engine, in boot order.
    #[must_use]
    pub fn health_report(&self) -> Vec<EngineHealth> {
        let order = self.boot_order.read();
        let wrappers = self.wrappers.read();
        order
            .iter()
            .filter_map(|name| wrappers.get(name))
            .map(|w| EngineHealth {
                name: w.descriptor().name.clone(),
                state: w.state(),
                critical: w.descriptor().critical,
                enabled: w.descriptor().enabled,
                restarts: w.restart_attempts(),
                error_count: w.errors().len(),
            })
            .collect()
    }

    /// Stops every running engine in reverse boot order, then emits
    /// [`EVENT_SHUTDOWN`] and persists the final session record. Engine
    /// shutdown errors are logged, never escalated.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.stop_engines_reverse();
        self.events.emit(
            EVENT_SHUTDOWN,
            &serde_json::json!({ "at": Utc::now().to_rfc3339() }),
        );
        if let Err(e) = self.save_session() {
            warn!(error = %e, "failed to persist session record");
        }
        info!("kernel shutdown complete");
    }

    /// Reverse-order stop of running engines without the session write or
    /// the shutdown event. Used when a critical boot failure aborts startup.
    fn emergency_shutdown(&self) {
        warn!("emergency shutdown: reversing partial boot");
        self.stop_engines_reverse();
        self.running.store(false, Ordering::SeqCst);
    }

    fn stop_engines_reverse(&self) {
        let order: Vec<String> = self.boot_order.read().iter().rev().cloned().collect();
        let mut wrappers = self.wrappers.write();
        for name in order {
            if let Some(wrapper) = wrappers.get_mut(&name) {
                if wrapper.state().is_running() {
                    if let Err(e) = wrapper.shutdown() {
                        warn!(engine = %name, error = %e, "engine shutdown failed");
                    } else {
                        info!(engine = %name, "engine stopped");
                    }
                }
            }
        }
    }

    /// Records the active command names for the session snapshot.
    pub fn set_session_commands(&self, names: Vec<String>) {
        *self.commands.write() = names;
    }

    /// Writes the current session record to `<root>/state/session.json`.
    pub fn save_session(&self) -> Result<(), KernelError> {
        let boot_time = self.booted_at.read().unwrap_or_else(Utc::now);
        let mut record = SessionRecord::new(boot_time);
        for health in self.health_report() {
            match health.state {
                EngineState::Running => record.engines_loaded.push(health.name),
                EngineState::Failed => record.engines_failed.push(health.name),
                _ => {}
            }
        }
        record.commands = self.commands.read().clone();
        record.write_atomic(&self.session_path)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn booted_at(&self) -> Option<DateTime<Utc>> {
        *self.booted_at.read()
    }

    /// State of a single engine, if tracked.
    #[must_use]
    pub fn engine_state(&self, name: &str) -> Option<EngineState> {
        self.wrappers.read().get(name).map(EngineWrapper::state)
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("root", &self.root)
            .field("running", &self.is_running())
            .field("degraded", &self.is_degraded())
            .field("engines", &self.boot_order.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::sync::atomic::AtomicUsize;

    struct TagEngine {
        tag: &'static str,
    }

    impl Engine for TagEngine {
        fn name(&self) -> &str {
            self.tag
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    struct OtherEngine;

    impl Engine for OtherEngine {
        fn name(&self) -> &str {
            "other"
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    fn tag_factory(tag: &'static str) -> impl Fn(&BootContext) -> Result<Box<dyn Engine>, EngineError> {
        move |_| Ok(Box::new(TagEngine { tag }) as Box<dyn Engine>)
    }

    fn fail_factory() -> impl Fn(&BootContext) -> Result<Box<dyn Engine>, EngineError> {
        |_| Err(EngineError::Init("deliberate fault".into()))
    }

    fn root() -> tempfile::TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    #[test]
    fn full_boot_brings_everything_running() {
        let dir = root();
        let kernel = Kernel::builder(dir.path())
            .factory("core", tag_factory("core"))
            .factory("security", tag_factory("security"))
            .build();

        let report = kernel
            .boot(&[
                EngineDescriptor::new("core", "TagEngine", true),
                EngineDescriptor::new("security", "TagEngine", true),
            ])
            .expect("boot");

        assert!(!report.degraded);
        assert_eq!(report.loaded, vec!["core", "security"]);
        assert!(kernel.is_running());
        assert!(kernel.get_engine("core").is_some());
        assert!(kernel.get_engine("security").is_some());
    }

    #[test]
    fn noncritical_failure_degrades_but_boot_succeeds() {
        let dir = root();
        let kernel = Kernel::builder(dir.path())
            .factory("core", tag_factory("core"))
            .factory("security", tag_factory("security"))
            .factory("loader", fail_factory())
            .build();

        let report = kernel
            .boot(&[
                EngineDescriptor::new("core", "TagEngine", true),
                EngineDescriptor::new("security", "TagEngine", true),
                EngineDescriptor::new("loader", "LoaderEngine", false),
            ])
            .expect("degraded boot still succeeds");

        assert!(report.degraded);
        assert!(kernel.is_degraded());
        assert_eq!(report.failed, vec!["loader"]);
        assert!(kernel.get_engine("core").is_some());
        assert!(kernel.get_engine("loader").is_none());
        assert_eq!(kernel.engine_state("loader"), Some(EngineState::Failed));
    }

    #[test]
    fn critical_failure_aborts_and_reverses() {
        let dir = root();
        let kernel = Kernel::builder(dir.path())
            .factory("core", tag_factory("core"))
            .factory("security", fail_factory())
            .factory("pulse", tag_factory("pulse"))
            .build();

        let err = kernel
            .boot(&[
                EngineDescriptor::new("core", "TagEngine", true),
                EngineDescriptor::new("security", "SecurityEngine", true),
                EngineDescriptor::new("pulse", "PulseEngine", false),
            ])
            .unwrap_err();

        assert!(matches!(err, KernelError::CriticalEngine { ref name, .. } if name == "security"));
        assert!(!kernel.is_running());
        // core got stopped by the emergency reversal, pulse never loaded
        assert!(kernel.get_engine("core").is_none());
        assert_eq!(kernel.engine_state("core"), Some(EngineState::Shutdown));
        assert_eq!(kernel.engine_state("pulse"), None);
    }

    #[test]
    fn duplicate_names_are_rejected_before_any_load() {
        let dir = root();
        let loads = Arc::new(AtomicUsize::new(0));
        let loads2 = Arc::clone(&loads);
        let kernel = Kernel::builder(dir.path())
            .factory("core", move |_| {
                loads2.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(TagEngine { tag: "core" }) as Box<dyn Engine>)
            })
            .build();

        let err = kernel
            .boot(&[
                EngineDescriptor::new("core", "TagEngine", true),
                EngineDescriptor::new("core", "TagEngine", true),
            ])
            .unwrap_err();

        assert!(matches!(err, KernelError::DuplicateEngine(ref n) if n == "core"));
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn disabled_engine_is_parked_not_loaded() {
        let dir = root();
        let kernel = Kernel::builder(dir.path())
            .factory("core", tag_factory("core"))
            .factory("pulse", tag_factory("pulse"))
            .build();

        let report = kernel
            .boot(&[
                EngineDescriptor::new("core", "TagEngine", true),
                EngineDescriptor::new("pulse", "PulseEngine", false).disabled(),
            ])
            .expect("boot");

        assert_eq!(report.disabled, vec!["pulse"]);
        assert!(!report.degraded, "disabled is not degraded");
        assert!(kernel.get_engine("pulse").is_none());
        assert_eq!(kernel.engine_state("pulse"), Some(EngineState::Disabled));
    }

    #[test]
    fn missing_factory_is_a_load_failure() {
        let dir = root();
        let kernel = Kernel::builder(dir.path())
            .factory("core", tag_factory("core"))
            .build();

        let report = kernel
            .boot(&[
                EngineDescriptor::new("core", "TagEngine", true),
                EngineDescriptor::new("ghostly", "GhostlyEngine", false),
            ])
            .expect("non-critical missing factory degrades");

        assert!(report.degraded);
        assert_eq!(report.failed, vec!["ghostly"]);
    }

    #[test]
    fn typed_lookup_downcasts_or_returns_none() {
        let dir = root();
        let kernel = Kernel::builder(dir.path())
            .factory("core", tag_factory("core"))
            .build();
        kernel
            .boot(&[EngineDescriptor::new("core", "TagEngine", true)])
            .expect("boot");

        let typed: Option<Arc<TagEngine>> = kernel.engine("core");
        assert!(typed.is_some());
        let wrong: Option<Arc<OtherEngine>> = kernel.engine("core");
        assert!(wrong.is_none());
        let absent: Option<Arc<TagEngine>> = kernel.engine("absent");
        assert!(absent.is_none());
    }

    #[test]
    fn restart_recovers_a_failed_engine() {
        let dir = root();
        let healthy = Arc::new(AtomicBool::new(false));
        let healthy2 = Arc::clone(&healthy);
        let kernel = Kernel::builder(dir.path())
            .factory("flaky", move |_| {
                if healthy2.load(Ordering::SeqCst) {
                    Ok(Box::new(TagEngine { tag: "flaky" }) as Box<dyn Engine>)
                } else {
                    Err(EngineError::Init("cold start fault".into()))
                }
            })
            .build();

        let report = kernel
            .boot(&[EngineDescriptor::new("flaky", "FlakyEngine", false)])
            .expect("boot");
        assert!(report.degraded);

        healthy.store(true, Ordering::SeqCst);
        kernel.restart_engine("flaky").expect("restart");
        assert!(kernel.get_engine("flaky").is_some());
        assert!(!kernel.is_degraded(), "degraded clears once all engines recover");
    }

    #[test]
    fn restart_unknown_engine_fails() {
        let dir = root();
        let kernel = Kernel::builder(dir.path()).build();
        assert!(matches!(
            kernel.restart_engine("nope").unwrap_err(),
            KernelError::UnknownEngine(_)
        ));
    }

    #[test]
    fn shutdown_emits_event_and_stops_engines() {
        let dir = root();
        let kernel = Kernel::builder(dir.path())
            .factory("core", tag_factory("core"))
            .build();
        kernel
            .boot(&[EngineDescriptor::new("core", "TagEngine", true)])
            .expect("boot");

        let fired = Arc::new(AtomicBool::new(false));
        let engines_down_at_emit = Arc::new(AtomicBool::new(false));
        {
            let fired = Arc::clone(&fired);
            let engines_down = Arc::clone(&engines_down_at_emit);
            let observer = Arc::clone(&kernel);
            kernel.events().on(EVENT_SHUTDOWN, move |_| {
                fired.store(true, Ordering::SeqCst);
                engines_down.store(observer.get_engine("core").is_none(), Ordering::SeqCst);
                Ok(())
            });
        }

        kernel.shutdown();
        assert!(fired.load(Ordering::SeqCst));
        assert!(
            engines_down_at_emit.load(Ordering::SeqCst),
            "event must fire after engines stop"
        );
        assert!(!kernel.is_running());
        assert!(kernel.get_engine("core").is_none());

        // second shutdown is a no-op
        kernel.shutdown();
    }

    #[test]
    fn session_record_written_on_boot() {
        let dir = root();
        let kernel = Kernel::builder(dir.path())
            .factory("core", tag_factory("core"))
            .factory("loader", fail_factory())
            .build();
        kernel
            .boot(&[
                EngineDescriptor::new("core", "TagEngine", true),
                EngineDescriptor::new("loader", "LoaderEngine", false),
            ])
            .expect("boot");

        let record =
            SessionRecord::load(&dir.path().join("state").join("session.json")).expect("session");
        assert_eq!(record.engines_loaded, vec!["core"]);
        assert_eq!(record.engines_failed, vec!["loader"]);
    }

    #[test]
    fn health_report_preserves_boot_order() {
        let dir = root();
        let kernel = Kernel::builder(dir.path())
            .factory("core", tag_factory("core"))
            .factory("security", tag_factory("security"))
            .factory("pulse", tag_factory("pulse"))
            .build();
        kernel
            .boot(&[
                EngineDescriptor::new("core", "TagEngine", true),
                EngineDescriptor::new("security", "TagEngine", true),
                EngineDescriptor::new("pulse", "TagEngine", false),
            ])
            .expect("boot");

        let names: Vec<String> = kernel.health_report().into_iter().map(|h| h.name).collect();
        assert_eq!(names, vec!["core", "security", "pulse"]);
    }
}
