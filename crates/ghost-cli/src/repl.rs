//! Interactive loop.
//!
//! `exit` and `quit` are handled here, before dispatch; they can never be
//! shadowed by a command or alias.

use ghost_auth::Role;
use ghost_runtime::Shell;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};

pub async fn run(shell: &Shell) -> anyhow::Result<()> {
    let config = Config::builder().auto_add_history(true).build();
    let mut editor: Editor<(), DefaultHistory> = Editor::with_config(config)?;

    let banner = match shell.current_role() {
        Some(Role::God) => "ghost shell | role: GOD",
        Some(Role::Admin) => "ghost shell | role: ADMIN",
        Some(Role::Guest) => "ghost shell | role: GUEST",
        None => "ghost shell | unauthenticated",
    };
    println!("{banner}");

    loop {
        match editor.readline("ghost> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    break;
                }
                match shell.dispatch(line).await {
                    Ok(outcome) => {
                        if !outcome.text.is_empty() {
                            println!("{}", outcome.text);
                        }
                    }
                    Err(e) => eprintln!("error: {e}"),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("(interrupted; type 'exit' to leave)");
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
