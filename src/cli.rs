//! Command-line interface and REPL
//!
//! The REPL runs on a blocking thread and talks to the tick only through
//! its queues, plus a shared copy of the latest render snapshot.

use crate::control::ControlEvent;
use crate::instrument::InstrumentMode;
use crate::session::{LocalCommand, RenderSnapshot};
use anyhow::Result;
use colored::*;
use crossbeam::channel::Sender;
use parking_lot::RwLock;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;

/// Parsed REPL input
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Mode(InstrumentMode),
    Control(String),
    State,
    Help,
    Quit,
}

impl ReplCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        match head {
            "mode" | "m" => InstrumentMode::from_str(rest)
                .map(ReplCommand::Mode)
                .ok_or_else(|| format!("unknown mode '{}'", rest)),
            "note" | "n" => {
                let event = ControlEvent::parse(&format!("NoteOn/{}", rest)).map_err(|e| e.to_string())?;
                Ok(ReplCommand::Control(event.to_address()))
            }
            "raw" => {
                if rest.is_empty() {
                    Err("raw needs a message".to_string())
                } else {
                    Ok(ReplCommand::Control(rest.to_string()))
                }
            }
            "state" | "s" => Ok(ReplCommand::State),
            "help" | "?" => Ok(ReplCommand::Help),
            "quit" | "exit" | "q" => Ok(ReplCommand::Quit),
            // Bare hotkeys switch mode directly
            key if rest.is_empty() => {
                let mut chars = key.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => InstrumentMode::from_hotkey(c)
                        .map(ReplCommand::Mode)
                        .ok_or_else(|| format!("unknown command '{}'", key)),
                    _ => Err(format!("unknown command '{}'", key)),
                }
            }
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

/// Run the interactive console until `quit` or end of input
pub fn run_repl(
    commands: Sender<LocalCommand>,
    control: Sender<String>,
    snapshot: Arc<RwLock<RenderSnapshot>>,
) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    print_help();

    loop {
        let line = match rl.readline("jam> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        if line.trim().is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line.as_str());

        match ReplCommand::parse(&line) {
            Ok(ReplCommand::Mode(mode)) => {
                commands.send(LocalCommand::SetMode(mode))?;
                println!("{} {}", "→ requested mode".green(), mode.to_string().bold());
            }
            Ok(ReplCommand::Control(message)) => {
                println!("{} {}", "→".green(), message);
                control.send(message)?;
            }
            Ok(ReplCommand::State) => {
                let json = serde_json::to_string_pretty(&*snapshot.read())?;
                println!("{}", json);
            }
            Ok(ReplCommand::Help) => print_help(),
            Ok(ReplCommand::Quit) => break,
            Err(e) => println!("{} {}", "✗".red(), e),
        }
    }

    Ok(())
}

fn print_help() {
    println!("\n{}", "=== jam-sync console ===".bold().cyan());
    println!("  {}  switch instrument (hands/keyboard/drum/guitar, h/k/d/g or 0-3)", "mode <m>".yellow());
    println!("  {}  inject a control event", "note <ch> <note> <vel>".yellow());
    println!("  {}  inject raw bridge text", "raw <text>".yellow());
    println!("  {}  print the render snapshot as JSON", "state".yellow());
    println!("  {}  leave", "quit".yellow());
    println!();
}
