//! Concrete engines managed by the kernel.

pub mod core;
pub mod pulse;
pub mod root;
pub mod security;

pub use core::CoreEngine;
pub use pulse::PulseEngine;
pub use root::RootEngine;
pub use security::SecurityEngine;
