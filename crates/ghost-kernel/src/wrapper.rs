//! Per-engine state tracking and bounded restarts.

use crate::descriptor::EngineDescriptor;
use crate::engine::{BootContext, Engine, EngineFactory};
use crate::error::EngineError;
use crate::state::EngineState;
use std::sync::Arc;
use tracing::{info, warn};

/// Restart attempts allowed before an engine is permanently failed.
const MAX_RESTARTS: u32 = 3;

/// Wraps one engine with state tracking and health history.
///
/// The registry holds exactly one wrapper per declared engine name.
pub struct EngineWrapper {
    descriptor: EngineDescriptor,
    state: EngineState,
    instance: Option<Arc<dyn Engine>>,
    restart_attempts: u32,
    max_restarts: u32,
    errors: Vec<String>,
}

impl EngineWrapper {
    #[must_use]
    pub fn new(descriptor: EngineDescriptor) -> Self {
        let state = if descriptor.enabled {
            EngineState::Unloaded
        } else {
            EngineState::Disabled
        };
        Self {
            descriptor,
            state,
            instance: None,
            restart_attempts: 0,
            max_restarts: MAX_RESTARTS,
            errors: Vec::new(),
        }
    }

    /// Constructs and initializes the engine.
    ///
    /// On success the wrapper is `Running`; on failure the error is
    /// recorded and the wrapper is `Failed`. Disabled wrappers stay
    /// `Disabled` without attempting anything.
    pub fn load(&mut self, factory: &EngineFactory, ctx: &BootContext) -> Result<(), EngineError> {
        if !self.descriptor.enabled {
            self.state = EngineState::Disabled;
            return Ok(());
        }

        self.state = EngineState::Initializing;
        match factory(ctx).and_then(|mut engine| {
            engine.init(ctx)?;
            Ok(engine)
        }) {
            Ok(engine) => {
                self.instance = Some(Arc::from(engine));
                self.state = EngineState::Running;
                Ok(())
            }
            Err(e) => {
                self.errors.push(e.to_string());
                self.state = EngineState::Failed;
                self.instance = None;
                Err(e)
            }
        }
    }

    /// Attempts to restart a failed engine.
    ///
    /// Legal only from `Failed`. Once `restart_attempts` reaches the limit
    /// the wrapper stays permanently failed.
    pub fn restart(
        &mut self,
        factory: &EngineFactory,
        ctx: &BootContext,
    ) -> Result<(), EngineError> {
        if !self.state.can_restart() {
            return Err(EngineError::InvalidTransition {
                op: "restart",
                state: self.state,
            });
        }
        if self.restart_attempts >= self.max_restarts {
            return Err(EngineError::RestartLimit {
                attempts: self.restart_attempts,
                max: self.max_restarts,
            });
        }

        self.restart_attempts += 1;
        info!(
            engine = %self.descriptor.name,
            attempt = self.restart_attempts,
            max = self.max_restarts,
            "restarting engine"
        );
        self.load(factory, ctx)
    }

    /// Stops a running engine, invoking its optional cleanup hook.
    ///
    /// Hook errors are logged and swallowed; the wrapper always ends up in
    /// `Shutdown`.
    pub fn shutdown(&mut self) -> Result<(), EngineError> {
        if !self.state.is_running() {
            return Err(EngineError::InvalidTransition {
                op: "shutdown",
                state: self.state,
            });
        }
        if let Some(engine) = self.instance.take() {
            if let Err(e) = engine.shutdown() {
                warn!(engine = %self.descriptor.name, error = %e, "shutdown hook failed");
                self.errors.push(e.to_string());
            }
        }
        self.state = EngineState::Shutdown;
        Ok(())
    }

    /// The instance, only while `Running`.
    #[must_use]
    pub fn instance(&self) -> Option<Arc<dyn Engine>> {
        if self.state.is_running() {
            self.instance.clone()
        } else {
            None
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> &EngineDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    #[must_use]
    pub fn restart_attempts(&self) -> u32 {
        self.restart_attempts
    }

    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl std::fmt::Debug for EngineWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineWrapper")
            .field("name", &self.descriptor.name)
            .field("state", &self.state)
            .field("restarts", &self.restart_attempts)
            .field("errors", &self.errors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Kernel;
    use std::any::Any;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct NoopEngine;

    impl Engine for NoopEngine {
        fn name(&self) -> &str {
            "noop"
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    fn ok_factory() -> EngineFactory {
        Box::new(|_| Ok(Box::new(NoopEngine)))
    }

    fn failing_factory() -> EngineFactory {
        Box::new(|_| Err(EngineError::Init("boom".into())))
    }

    fn ctx() -> BootContext {
        BootContext::new(Kernel::builder(std::env::temp_dir()).build())
    }

    #[test]
    fn load_success_reaches_running() {
        let mut wrapper = EngineWrapper::new(EngineDescriptor::new("noop", "NoopEngine", false));
        wrapper.load(&ok_factory(), &ctx()).expect("load");
        assert_eq!(wrapper.state(), EngineState::Running);
        assert!(wrapper.instance().is_some());
    }

    #[test]
    fn load_failure_records_error() {
        let mut wrapper = EngineWrapper::new(EngineDescriptor::new("noop", "NoopEngine", false));
        assert!(wrapper.load(&failing_factory(), &ctx()).is_err());
        assert_eq!(wrapper.state(), EngineState::Failed);
        assert_eq!(wrapper.errors().len(), 1);
        assert!(wrapper.instance().is_none());
    }

    #[test]
    fn disabled_wrapper_never_loads() {
        let descriptor = EngineDescriptor::new("noop", "NoopEngine", false).disabled();
        let mut wrapper = EngineWrapper::new(descriptor);
        assert_eq!(wrapper.state(), EngineState::Disabled);
        wrapper.load(&ok_factory(), &ctx()).expect("no-op");
        assert_eq!(wrapper.state(), EngineState::Disabled);
        assert!(wrapper.instance().is_none());
    }

    #[test]
    fn restart_only_legal_from_failed() {
        let mut wrapper = EngineWrapper::new(EngineDescriptor::new("noop", "NoopEngine", false));
        wrapper.load(&ok_factory(), &ctx()).expect("load");
        let err = wrapper.restart(&ok_factory(), &ctx()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn restart_limit_is_enforced() {
        let mut wrapper = EngineWrapper::new(EngineDescriptor::new("noop", "NoopEngine", false));
        let failing = failing_factory();
        let context = ctx();
        assert!(wrapper.load(&failing, &context).is_err());

        for attempt in 1..=3 {
            assert!(wrapper.restart(&failing, &context).is_err());
            assert_eq!(wrapper.restart_attempts(), attempt);
        }
        let err = wrapper.restart(&failing, &context).unwrap_err();
        assert!(matches!(err, EngineError::RestartLimit { attempts: 3, max: 3 }));
    }

    #[test]
    fn restart_after_failure_can_recover() {
        let mut wrapper = EngineWrapper::new(EngineDescriptor::new("noop", "NoopEngine", false));
        let context = ctx();
        assert!(wrapper.load(&failing_factory(), &context).is_err());
        wrapper.restart(&ok_factory(), &context).expect("recover");
        assert_eq!(wrapper.state(), EngineState::Running);
    }

    #[test]
    fn shutdown_swallows_hook_errors() {
        struct BrokenHook(Arc<AtomicBool>);
        impl Engine for BrokenHook {
            fn name(&self) -> &str {
                "broken"
            }
            fn shutdown(&self) -> Result<(), EngineError> {
                self.0.store(true, Ordering::SeqCst);
                Err(EngineError::Shutdown("hook exploded".into()))
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
                self
            }
        }

        let called = Arc::new(AtomicBool::new(false));
        let called2 = Arc::clone(&called);
        let factory: EngineFactory =
            Box::new(move |_| Ok(Box::new(BrokenHook(Arc::clone(&called2)))));

        let mut wrapper = EngineWrapper::new(EngineDescriptor::new("broken", "BrokenHook", false));
        wrapper.load(&factory, &ctx()).expect("load");
        wrapper.shutdown().expect("shutdown succeeds despite hook");
        assert!(called.load(Ordering::SeqCst));
        assert_eq!(wrapper.state(), EngineState::Shutdown);
    }

    #[test]
    fn shutdown_only_legal_from_running() {
        let mut wrapper = EngineWrapper::new(EngineDescriptor::new("noop", "NoopEngine", false));
        assert!(wrapper.shutdown().is_err());
    }
}
