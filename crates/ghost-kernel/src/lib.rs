//! Ghost Shell kernel - engine orchestration core.
//!
//! The kernel manages the lifecycle of pluggable subsystem components
//! ("engines"): a dependency-ordered boot sequence with fault isolation,
//! per-engine state machines with bounded restarts, a reverse-order
//! shutdown walk, and an event bus for cross-component notification.
//!
//! # Boot Semantics
//!
//! ```text
//! for descriptor in sequence (order matters):
//!     disabled        → wrapper parked in Disabled, continue
//!     load ok         → Running
//!     load failed     → Failed
//!         critical    → emergency reverse shutdown, boot aborts
//!         non-critical→ kernel enters degraded mode, continue
//! ```
//!
//! After a degraded boot the kernel stays usable; every consumer of
//! [`Kernel::get_engine`] must tolerate `None` for the missing engines.
//!
//! # Cross-Engine Access
//!
//! Engines never hold references to siblings. All lookups go through the
//! kernel by name, and only engines in the `Running` state are handed out:
//!
//! ```ignore
//! let root = kernel.engine::<RootEngine>("root");   // Option<Arc<RootEngine>>
//! ```
//!
//! # Modules
//!
//! - [`state`]: [`EngineState`] machine states
//! - [`descriptor`]: boot sequence entries and the engines.json override file
//! - [`engine`]: the [`Engine`] trait and [`BootContext`]
//! - [`wrapper`]: [`EngineWrapper`] state machine with restart limits
//! - [`kernel`]: the [`Kernel`] boot sequencer
//! - [`eventbus`]: name → listener registry with failure isolation
//! - [`session`]: persisted [`SessionRecord`] snapshots

pub mod descriptor;
pub mod engine;
pub mod error;
pub mod eventbus;
pub mod kernel;
pub mod session;
pub mod state;
pub mod wrapper;

pub use descriptor::{EngineDescriptor, EngineOverrides};
pub use engine::{BootContext, Engine, EngineFactory};
pub use error::{EngineError, KernelError};
pub use eventbus::EventBus;
pub use kernel::{BootReport, EngineHealth, Kernel, KernelBuilder, EVENT_SHUTDOWN};
pub use session::SessionRecord;
pub use state::EngineState;
pub use wrapper::EngineWrapper;
