//! Keyboard input
//!
//! Stdin is read on a plain OS thread. A blocking read there cannot hold up
//! runtime shutdown, so the process exits as soon as `main` returns even
//! while the thread still waits for a line.

use crate::view::{self, ConsoleCommand};
use std::io::BufRead;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Forward parsed commands until input ends or the receiver is dropped
pub fn spawn_console_reader<R>(
    input: R,
    commands: mpsc::Sender<ConsoleCommand>,
) -> std::io::Result<thread::JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("console-input".into())
        .spawn(move || forward_commands(input, &commands))
}

fn forward_commands<R: BufRead>(input: R, commands: &mpsc::Sender<ConsoleCommand>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Console input failed");
                break;
            }
        };

        match view::parse_command(&line) {
            Some(command) => {
                if commands.blocking_send(command).is_err() {
                    break;
                }
            }
            None if line.trim().is_empty() => {}
            None => warn!(input = %line.trim(), "Unknown command (p, r, d, +, -, =, q)"),
        }
    }
    debug!("Console reader finished");
}
