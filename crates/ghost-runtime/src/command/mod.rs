//! Commands: the handler trait, the hot-swappable registry, builtin
//! commands, and Lua script commands.

pub mod builtin;
pub mod handler;
pub mod registry;
pub mod script;

pub use handler::{CommandContext, CommandHandler, CommandOutcome};
pub use registry::{CommandRegistry, ReloadReport};
pub use script::ScriptCommand;
