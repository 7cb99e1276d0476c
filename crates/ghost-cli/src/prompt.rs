//! Passphrase prompt implementations for the binary.

use ghost_auth::{AuthError, PassphrasePrompt};
use std::io::{self, BufRead, Write};

/// Reads from the controlling terminal's stdin.
///
/// Used during first-boot provisioning only; normal sessions authenticate
/// silently from key material.
pub struct TerminalPrompt;

impl PassphrasePrompt for TerminalPrompt {
    fn read_passphrase(&self, prompt: &str) -> Result<String, AuthError> {
        let mut stderr = io::stderr();
        stderr
            .write_all(prompt.as_bytes())
            .and_then(|()| stderr.flush())
            .map_err(|e| AuthError::PromptFailed(e.to_string()))?;

        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| AuthError::PromptFailed(e.to_string()))?;
        if line.is_empty() {
            return Err(AuthError::PromptFailed("stdin closed".into()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn notify(&self, message: &str) {
        eprintln!("{message}");
    }
}

/// Refuses to prompt. First boot fails cleanly under `--headless`.
pub struct HeadlessPrompt;

impl PassphrasePrompt for HeadlessPrompt {
    fn read_passphrase(&self, _prompt: &str) -> Result<String, AuthError> {
        Err(AuthError::PromptFailed("headless session".into()))
    }
}
