//! Ghost Shell runtime.
//!
//! Builds on [`ghost_kernel`] to provide the concrete engines, the command
//! registry with hot reload, the alias table, and the dispatch chain that
//! turns a line of input into an executed command.
//!
//! # Dispatch Chain
//!
//! ```text
//! input line
//!   ├─ registered command?  → RBAC gate → execute
//!   ├─ alias?               → expand once → silent shell exec
//!   └─ fallthrough          → silent shell exec
//! ```
//!
//! A registered command always shadows an alias of the same name.
//!
//! # Engines
//!
//! | Name | Critical | Purpose |
//! |------|----------|---------|
//! | `core` | yes | host identity, data directories |
//! | `security` | yes | key-based auth and the RBAC gate |
//! | `root` | no | silent shell execution with timeout |
//! | `pulse` | no | background heartbeat and session autosave |

pub mod alias;
pub mod command;
pub mod config;
pub mod engines;
pub mod error;
pub mod shell;

pub use alias::AliasTable;
pub use command::{
    builtin, CommandContext, CommandHandler, CommandOutcome, CommandRegistry, ReloadReport,
    ScriptCommand,
};
pub use config::GhostConfig;
pub use engines::root::ExecResult;
pub use engines::{CoreEngine, PulseEngine, RootEngine, SecurityEngine};
pub use error::RuntimeError;
pub use shell::{boot_sequence, Shell};
