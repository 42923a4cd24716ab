//! Line-oriented stdin console
//!
//! Stands in for a GPIO beam break: each line on stdin is a command.
//! An empty line is a trigger, so holding Enter works as a crude button.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    Trigger,
    Arm,
    Disarm,
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "" | "t" | "trigger" => Some(ConsoleCommand::Trigger),
            "a" | "arm" => Some(ConsoleCommand::Arm),
            "d" | "disarm" => Some(ConsoleCommand::Disarm),
            "q" | "quit" | "exit" => Some(ConsoleCommand::Quit),
            _ => None,
        }
    }
}

/// Read stdin until EOF, forwarding parsed commands. EOF is reported as `Quit`.
pub fn spawn_console(tx: mpsc::Sender<ConsoleCommand>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match ConsoleCommand::parse(&line) {
                    Some(command) => {
                        if tx.send(command).await.is_err() {
                            break;
                        }
                    }
                    None => tracing::warn!(%line, "unknown console command"),
                },
                Ok(None) => {
                    let _ = tx.send(ConsoleCommand::Quit).await;
                    break;
                }
                Err(e) => {
                    tracing::warn!("stdin read failed: {}", e);
                    let _ = tx.send(ConsoleCommand::Quit).await;
                    break;
                }
            }
        }
    })
}
