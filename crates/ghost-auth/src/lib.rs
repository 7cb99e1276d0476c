//! Ghost Shell authentication and authorization.
//!
//! This crate implements the Gatekeeper: role hierarchy, silent
//! authentication, and key issuance/revocation. It only validates identity
//! and permissions; it never executes commands or touches the vault.
//!
//! # Key System
//!
//! - **God key**: full access, generated during first boot. There is at
//!   most one active god key, ever.
//! - **Admin keys**: standard access, issued by God.
//! - **Guest keys**: read-only, optionally time-limited (handy for lending
//!   a USB stick).
//!
//! # Key Storage
//!
//! ```text
//! data/keys/
//! ├── god.key        (the master key file)
//! ├── keyring.json   (metadata for all issued keys)
//! └── <key-id>.key   (issued admin/guest key files)
//! ```
//!
//! # Silent Authentication
//!
//! Startup authentication never prompts when a valid key file is present:
//!
//! 1. `god.key` exists → God.
//! 2. Any active, unexpired keyring entry whose key file exists → that role.
//! 3. Otherwise the first-boot flow collects a passphrase through the
//!    injected [`PassphrasePrompt`] and mints the god key.
//!
//! The presence checks are pure and unit-testable; prompting is the only
//! interactive step and lives behind a trait so headless callers can fail
//! it deterministically.

mod error;
mod gate;
mod key;
mod keyring;
mod role;

pub use error::AuthError;
pub use gate::{PassphrasePrompt, SecurityGate, GOD_KEY_ID, MIN_PASSPHRASE_LEN};
pub use key::{KeyFile, KeyRecord};
pub use keyring::Keyring;
pub use role::Role;
