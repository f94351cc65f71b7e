// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Line-oriented console front end. Each input line is one interaction for the
// configured console user; progress lines are printed as they arrive.

use std::path::PathBuf;

use printdesk_core::error::Result;
use printdesk_core::{IncomingArtifact, PrintMode, UserId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::services::desk::{PrintDesk, Reply, ScanKind};
use crate::session::{Choice, SessionEvent};

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Upload(PathBuf),
    Event(SessionEvent),
    Scan(ScanKind),
    Help,
    Quit,
    /// Known command, bad argument; carries the usage line.
    Usage(&'static str),
}

/// Parse one input line. Blank lines yield `None`; anything that is not a
/// command is page-range text.
pub fn parse_line(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "upload" if rest.is_empty() => Command::Usage("upload <path>"),
        "upload" => Command::Upload(PathBuf::from(rest)),
        "mode" => match rest.to_ascii_lowercase().as_str() {
            "normal" => Command::Event(SessionEvent::ChooseMode(PrintMode::Normal)),
            "duplex" => Command::Event(SessionEvent::ChooseMode(PrintMode::Duplex)),
            "booklet" => Command::Event(SessionEvent::ChooseMode(PrintMode::Booklet)),
            _ => Command::Usage("mode normal|duplex|booklet"),
        },
        "all" => Command::Event(SessionEvent::PrintAll),
        "custom" => Command::Event(SessionEvent::CustomRange),
        "back" => Command::Event(SessionEvent::Back),
        "cancel" => Command::Event(SessionEvent::Cancel),
        "scan" => match rest.to_ascii_lowercase().as_str() {
            "single" => Command::Scan(ScanKind::Single),
            "batch" => Command::Scan(ScanKind::Batch),
            _ => Command::Usage("scan single|batch"),
        },
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Event(SessionEvent::RangeText(line.to_string())),
    };
    Some(command)
}

/// Console keyword for a choice, with its label.
fn choice_line(choice: Choice) -> (&'static str, &'static str) {
    match choice {
        Choice::Mode(PrintMode::Normal) => ("mode normal", "one-sided"),
        Choice::Mode(PrintMode::Duplex) => ("mode duplex", "double-sided"),
        Choice::Mode(PrintMode::Booklet) => ("mode booklet", "booklet"),
        Choice::PrintAll => ("all", "all pages"),
        Choice::CustomRange => ("custom", "choose pages"),
        Choice::Back => ("back", "back to the mode menu"),
        Choice::Cancel => ("cancel", "cancel"),
    }
}

pub fn render(reply: &Reply) -> String {
    let mut out = reply.text.clone();
    for choice in &reply.choices {
        let (keyword, label) = choice_line(*choice);
        out.push_str(&format!("\n  [{keyword}] {label}"));
    }
    out
}

fn help_text(desk: &PrintDesk) -> String {
    format!(
        "Printdesk on printer {printer}\n\
         Commands:\n\
         \x20 upload <path>     convert a file and choose how to print it\n\
         \x20 scan single       scan one page from the flatbed\n\
         \x20 scan batch        scan everything in the document feeder\n\
         \x20 mode normal|duplex|booklet, all, custom, back, cancel\n\
         \x20 help, quit\n\
         While pages are asked for, type a range such as 1-3,5 or /cancel.\n\n{booklet}",
        printer = desk.config().printer_name,
        booklet = desk.booklet_help(),
    )
}

/// Read commands from stdin until EOF or `quit`.
pub async fn run(desk: &PrintDesk) -> Result<()> {
    let user = UserId(desk.config().console_user_id);
    let (status_tx, mut status_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let printer = tokio::spawn(async move {
        while let Some(line) = status_rx.recv().await {
            println!("... {line}");
        }
    });

    println!("{}", help_text(desk));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = parse_line(&line) else {
            continue;
        };
        debug!(?command, "console command");

        let reply = match command {
            Command::Quit => break,
            Command::Help => {
                println!("{}", help_text(desk));
                continue;
            }
            Command::Usage(usage) => {
                println!("Usage: {usage}");
                continue;
            }
            Command::Upload(path) => match std::fs::metadata(&path) {
                Ok(meta) => {
                    let incoming = IncomingArtifact::from_path(path, meta.len());
                    desk.accept_upload(user, incoming, &status_tx).await
                }
                Err(e) => {
                    println!("Cannot read {}: {e}", path.display());
                    continue;
                }
            },
            Command::Event(event) => desk.handle_event(user, event, &status_tx).await,
            Command::Scan(kind) => desk.scan(user, kind, &status_tx).await,
        };

        if !reply.is_silent() {
            println!("{}", render(&reply));
        }
    }

    drop(status_tx);
    let _ = printer.await;
    info!("console closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse() {
        assert_eq!(
            parse_line("upload /tmp/a b.pdf"),
            Some(Command::Upload(PathBuf::from("/tmp/a b.pdf")))
        );
        assert_eq!(
            parse_line("MODE Booklet"),
            Some(Command::Event(SessionEvent::ChooseMode(PrintMode::Booklet)))
        );
        assert_eq!(parse_line("scan batch"), Some(Command::Scan(ScanKind::Batch)));
        assert_eq!(parse_line("all"), Some(Command::Event(SessionEvent::PrintAll)));
        assert_eq!(parse_line("   "), None);
    }

    #[test]
    fn bad_arguments_give_usage() {
        assert!(matches!(parse_line("mode sideways"), Some(Command::Usage(_))));
        assert!(matches!(parse_line("scan"), Some(Command::Usage(_))));
        assert!(matches!(parse_line("upload"), Some(Command::Usage(_))));
    }

    #[test]
    fn other_text_is_range_input() {
        assert_eq!(
            parse_line(" 1-3,5 "),
            Some(Command::Event(SessionEvent::RangeText("1-3,5".into())))
        );
        assert_eq!(
            parse_line("/cancel"),
            Some(Command::Event(SessionEvent::RangeText("/cancel".into())))
        );
    }

    #[test]
    fn choices_render_as_commands() {
        let reply = Reply {
            text: "Which pages?".into(),
            choices: vec![Choice::PrintAll, Choice::Back],
        };
        assert_eq!(
            render(&reply),
            "Which pages?\n  [all] all pages\n  [back] back to the mode menu"
        );
    }
}
