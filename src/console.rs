//! Interactive console: reads lines from stdin, runs them through a
//! [`ConversationSession`], prints each reply with its cognitive readout.
//!
//! Runs until the `shutdown` token is cancelled (Ctrl-C), stdin is closed,
//! or the user types `/quit`.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::conversation::{ConversationError, ConversationSession, Message};
use crate::error::AppError;

const HELP: &str = "\
Commands:
  /help          show this help
  /probe         re-check whether an API key is available
  /key <value>   set the API key for this session
  /reset         forget the API key
  /stats         session averages
  /quit          leave
Anything else is sent to DAEDALUS.";

/// One parsed console line.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Help,
    Probe,
    Key(&'a str),
    Reset,
    Stats,
    Quit,
    Say(&'a str),
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    /// `None` for blank lines.
    pub fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if !line.starts_with('/') {
            return Some(Command::Say(line));
        }
        let (name, arg) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        Some(match name {
            "/help" | "/?" => Command::Help,
            "/probe" => Command::Probe,
            "/key" => Command::Key(arg.trim()),
            "/reset" => Command::Reset,
            "/stats" => Command::Stats,
            "/quit" | "/exit" => Command::Quit,
            other => Command::Unknown(other),
        })
    }
}

/// Format an assistant reply and its cognitive state for the terminal.
pub fn render_reply(message: &Message) -> String {
    let mut out = format!("DAEDALUS: {}", message.content());
    if let Some(s) = message.cognitive_state() {
        out.push_str(&format!(
            "\n  [{}] depth {:.1} · empathy {:.0}% · consciousness {:.0}%",
            s.reasoning_mode(),
            s.recursion_depth(),
            s.empathy_level(),
            s.consciousness_level(),
        ));
        if !s.emergent_patterns().is_empty() {
            out.push_str(&format!("\n  patterns: {}", s.emergent_patterns().join(" · ")));
        }
    }
    out
}

pub async fn run(mut session: ConversationSession, shutdown: CancellationToken) -> Result<(), AppError> {
    info!("console started");
    println!("─────────────────────────────────");
    println!(" DAEDALUS console  (/help, Ctrl-C to quit)");
    println!("─────────────────────────────────");

    let state = session.check_configuration().await;
    if !state.is_configured() {
        println!("[not configured] set LLM_API_KEY or use /key <value>");
    }
    println!("{}", render_reply(&Message::greeting()));

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        print!("> ");
        use std::io::Write as _;
        let _ = std::io::stdout().flush();

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                println!();
                info!("console shutting down");
                break;
            }

            line = lines.next_line() => {
                let line = match line {
                    Err(e) => {
                        warn!("console read error: {e}");
                        break;
                    }
                    Ok(None) => {
                        info!("console stdin closed");
                        break;
                    }
                    Ok(Some(line)) => line,
                };
                let Some(command) = Command::parse(&line) else { continue };
                debug!(?command, "console command");
                if !handle(&mut session, command).await {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Returns `false` when the console should exit.
async fn handle(session: &mut ConversationSession, command: Command<'_>) -> bool {
    match command {
        Command::Help => println!("{HELP}"),
        Command::Quit => return false,
        Command::Probe => {
            let state = session.check_configuration().await;
            match session.probe().last_cause().await {
                Some(cause) if !state.is_configured() => println!("{state:?} ({cause})"),
                _ => println!("{state:?}"),
            }
        }
        Command::Key("") => println!("usage: /key <value>"),
        Command::Key(key) => println!("{:?}", session.set_api_key(key).await),
        Command::Reset => {
            session.reset().await;
            println!("API key cleared");
        }
        Command::Stats => {
            let stats = session.stats();
            println!(
                "turns {} · avg empathy {:.1}% · avg recursion depth {:.1} · window {}/{}",
                stats.turns,
                stats.avg_empathy,
                stats.avg_recursion_depth,
                session.context().len(),
                session.context().cap(),
            );
        }
        Command::Unknown(name) => println!("unknown command {name}; try /help"),
        Command::Say(text) => match session.send_turn(text).await {
            Ok(turn) => {
                if let Some(cause) = &turn.failure {
                    println!("[relay failure] {cause}");
                }
                println!("{}", render_reply(&turn.reply));
            }
            Err(ConversationError::NotReady) => {
                println!("[not configured] set an API key with /key <value>, then /probe");
            }
            Err(e) => println!("[error] {e}"),
        },
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::message::FALLBACK_REPLY;

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("   "), None);
        assert_eq!(Command::parse("/help"), Some(Command::Help));
        assert_eq!(Command::parse("/key  gsk_abc "), Some(Command::Key("gsk_abc")));
        assert_eq!(Command::parse("/key"), Some(Command::Key("")));
        assert_eq!(Command::parse("/exit"), Some(Command::Quit));
        assert_eq!(Command::parse("/dance"), Some(Command::Unknown("/dance")));
        assert_eq!(Command::parse(" why am I here? "), Some(Command::Say("why am I here?")));
    }

    #[test]
    fn render_includes_mode_and_patterns() {
        let text = render_reply(&Message::fallback());
        assert!(text.contains(FALLBACK_REPLY));
        assert!(text.contains("[Error Recovery]"));
        assert!(text.contains("System recovery active"));
    }

    #[test]
    fn render_user_message_has_no_readout() {
        let text = render_reply(&Message::user("hi"));
        assert_eq!(text, "DAEDALUS: hi");
    }
}
