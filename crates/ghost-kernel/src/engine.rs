//! The [`Engine`] trait and boot-time context.

use crate::error::EngineError;
use crate::kernel::Kernel;
use std::any::Any;
use std::path::Path;
use std::sync::Arc;

/// A loaded subsystem component with a tracked lifecycle.
///
/// Engines are constructed by a factory during boot, initialized once, then
/// shared immutably behind `Arc`. Anything mutable after init lives behind
/// the engine's own interior locks.
///
/// Cross-engine access goes through [`Kernel::engine`]; constructors receive
/// a [`BootContext`] for lookups, never direct sibling references. An engine
/// may only look up engines that precede it in the boot sequence.
///
/// # Example
///
/// ```ignore
/// struct ClockEngine { started: DateTime<Utc> }
///
/// impl Engine for ClockEngine {
///     fn name(&self) -> &str { "clock" }
///     fn as_any(&self) -> &dyn Any { self }
///     fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> { self }
/// }
/// ```
pub trait Engine: Send + Sync + 'static {
    /// Stable engine name; must match its boot-sequence descriptor.
    fn name(&self) -> &str;

    /// Initialization hook, called once between construction and
    /// publication. Failure marks the wrapper `Failed`.
    fn init(&mut self, ctx: &BootContext) -> Result<(), EngineError> {
        let _ = ctx;
        Ok(())
    }

    /// Optional cleanup hook, called during the reverse shutdown walk.
    /// Errors are logged and swallowed so one broken hook cannot block the
    /// others.
    fn shutdown(&self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Borrowed downcast support.
    fn as_any(&self) -> &dyn Any;

    /// Owned downcast support for `Arc<dyn Engine> → Arc<T>`.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Factory producing an engine from its boot context.
pub type EngineFactory =
    Box<dyn Fn(&BootContext) -> Result<Box<dyn Engine>, EngineError> + Send + Sync>;

/// Context handed to engine factories and init hooks.
///
/// Carries a handle to the kernel so constructors can look up engines that
/// booted earlier and capture the handle for late-bound use (e.g. a
/// background worker reading kernel health).
pub struct BootContext {
    kernel: Arc<Kernel>,
}

impl BootContext {
    #[must_use]
    pub fn new(kernel: Arc<Kernel>) -> Self {
        Self { kernel }
    }

    /// The kernel handle. Engines that need it after boot should store a
    /// `Weak` obtained via [`Arc::downgrade`] to avoid a reference cycle
    /// through the registry.
    #[must_use]
    pub fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    /// Typed lookup of an already-booted engine.
    #[must_use]
    pub fn engine<T: Engine>(&self, name: &str) -> Option<Arc<T>> {
        self.kernel.engine::<T>(name)
    }

    /// Root directory of the shell installation.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.kernel.root()
    }
}
