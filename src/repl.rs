use chat_core::config::AppConfig;
use chat_core::conversation::{ConversationLoop, DisplaySink};
use chat_core::session::{Frame, Session};
use chat_core::types::{Role, Turn};
use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::{Config as RlConfig, DefaultEditor};
use std::io::Write;
use std::sync::Arc;

const BANNER: &str = concat!(
    "\n  search-chat v",
    env!("CARGO_PKG_VERSION"),
    r#"
  An AI agent that can search the web

  Ask a question and press Enter.
  Commands:
    /history   Show the conversation so far
    /help      Show this help
    /exit      Quit
"#
);

/// Draws frames on the terminal. Human turns are already on screen as the
/// line the user typed, so only new AI turns, the busy line and the error
/// banner are printed.
#[derive(Default)]
struct TerminalDisplay {
    shown: usize,
    thinking_shown: bool,
}

impl DisplaySink for TerminalDisplay {
    fn render(&mut self, frame: &Frame) {
        let mut out = std::io::stdout().lock();
        if self.thinking_shown && !frame.thinking {
            // Clear the busy line.
            let _ = write!(out, "\r\x1b[2K");
            self.thinking_shown = false;
        }
        for turn in frame.turns.iter().skip(self.shown) {
            if turn.role() == Role::Ai {
                let _ = writeln!(out, "{}", format_turn(turn));
            }
        }
        self.shown = frame.turns.len();
        if frame.thinking && !self.thinking_shown {
            let _ = write!(out, "\x1b[2mThe agent is thinking...\x1b[0m");
            self.thinking_shown = true;
        }
        if let Some(error) = &frame.error {
            let _ = writeln!(out, "\x1b[0;31mError: {}\x1b[0m", error);
        }
        let _ = out.flush();
    }
}

fn format_turn(turn: &Turn) -> String {
    match turn.role() {
        Role::Human => format!("\x1b[1;32m{}\x1b[0m: {}", turn.role().label(), turn.content()),
        Role::Ai => format!("\x1b[1;33m{}\x1b[0m: {}", turn.role().label(), turn.content()),
    }
}

/// Run the interactive REPL for a single session.
pub async fn run(config: &AppConfig, conversation: Arc<ConversationLoop>) -> Result<()> {
    println!("{}", BANNER);
    println!(
        "  Model: {}  |  Endpoint: {}",
        config.provider.model, config.provider.api_base
    );
    println!();

    let mut session = Session::new();
    let mut display = TerminalDisplay::default();

    let rl_config = RlConfig::builder().auto_add_history(true).build();
    let history_path = AppConfig::data_dir().join("repl_history.txt");
    let mut rl = DefaultEditor::with_config(rl_config)?;
    let _ = rl.load_history(&history_path);

    let prompt = "\x1b[1;32mHuman\x1b[0m \x1b[1;36m❯\x1b[0m ";

    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }

                match input {
                    "/exit" | "/quit" | "/q" => {
                        println!("Goodbye!");
                        break;
                    }
                    "/help" | "/?" => {
                        println!("  /history   Show the conversation so far");
                        println!("  /help      Show this help");
                        println!("  /exit      Quit");
                        continue;
                    }
                    "/history" => {
                        let frame = session.render();
                        if frame.turns.is_empty() {
                            println!("  No messages yet.");
                        }
                        for turn in &frame.turns {
                            println!("{}", format_turn(turn));
                        }
                        continue;
                    }
                    _ => {}
                }

                conversation.submit(&mut session, &line, &mut display).await;
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = rl.save_history(&history_path);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_tracks_printed_turns() {
        let mut display = TerminalDisplay::default();
        display.render(&Frame {
            turns: vec![Turn::human("Hello")],
            thinking: true,
            error: None,
        });
        assert_eq!(display.shown, 1);
        assert!(display.thinking_shown);

        display.render(&Frame {
            turns: vec![Turn::human("Hello"), Turn::ai("Hi!")],
            thinking: false,
            error: None,
        });
        assert_eq!(display.shown, 2);
        assert!(!display.thinking_shown);
    }

    #[test]
    fn test_banner_names_package_version() {
        assert!(BANNER.contains(&format!("search-chat v{}", env!("CARGO_PKG_VERSION"))));
    }

    #[test]
    fn test_format_turn_labels() {
        assert!(format_turn(&Turn::human("hi")).contains("Human"));
        assert!(format_turn(&Turn::ai("hello")).contains("AI"));
    }
}
