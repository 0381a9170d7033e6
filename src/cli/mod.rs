//! # CLI Adapter
//!
//! A line-based front-end. Reads stdin on the tokio runtime, translates each
//! line into a core [`Action`], and prints the transcript through an observer
//! as it changes. Input is accepted while a response is still streaming, which
//! is how follow-ups get merged into the pending turn.
//!
//! ## Commands
//!
//! - plain text: send (or fold into the unanswered message)
//! - `#N`: send quick-reply option N from the latest response
//! - `/cancel`: stop the current response
//! - `/clear`: start over
//! - `/quit`: exit

mod render;

pub use render::Printer;

use std::io::{self, Write, stdout};

use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::controller::{Controller, build_app};
use crate::core::action::{Action, Effect};
use crate::core::config::ResolvedConfig;
use crate::core::tools::{ToolName, ToolPayload};
use crate::core::transcript::{Role, Turn};

/// One parsed line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Send(String),
    /// 1-based quick-reply option.
    Pick(usize),
    Cancel,
    Clear,
    Quit,
}

pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    match trimmed {
        "/quit" | "/exit" => Command::Quit,
        "/clear" => Command::Clear,
        "/cancel" => Command::Cancel,
        _ => match trimmed.strip_prefix('#').and_then(|n| n.parse::<usize>().ok()) {
            Some(n) if n > 0 => Command::Pick(n),
            _ => Command::Send(line.trim_end_matches(['\r', '\n']).to_string()),
        },
    }
}

/// Quick-reply option `number` from the newest assistant response, if any.
pub fn quick_reply(turns: &[Turn], number: usize) -> Option<String> {
    let turn = turns.iter().rev().find(|t| t.role == Role::Assistant)?;
    turn.tool_invocations
        .iter()
        .rev()
        .filter(|inv| inv.tool_name == ToolName::Respond)
        .find_map(|inv| match ToolPayload::parse(inv.tool_name, inv.payload()?) {
            Ok(ToolPayload::Response(message)) => message.option(number).map(str::to_string),
            _ => None,
        })
}

pub async fn run(config: ResolvedConfig) -> io::Result<()> {
    let app = build_app(&config).map_err(|e| {
        error!("Failed to build provider: {}", e);
        io::Error::other(e.to_string())
    })?;
    info!(
        "Starting session: provider={:?}, model={}",
        config.provider, app.model_name
    );

    let mut controller = Controller::new(app);
    let mut printer = Printer::new();
    controller.app_mut().transcript.subscribe(move |turns| {
        if let Err(e) = printer.render(turns, &mut stdout().lock()) {
            warn!("Failed to render transcript: {}", e);
        }
    });

    println!(
        "{} (model {}). Type to chat; /cancel, /clear, /quit.",
        controller.app().status_message,
        controller.app().model_name
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let effect = tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("stdin closed");
                    break;
                };
                match parse_command(&line) {
                    Command::Send(text) => controller.dispatch(Action::Submit(text)),
                    Command::Pick(n) => match quick_reply(controller.app().transcript.turns(), n) {
                        Some(text) => {
                            println!("> {}", text);
                            controller.dispatch(Action::Submit(text))
                        }
                        None => {
                            println!("No quick reply #{}.", n);
                            Effect::None
                        }
                    },
                    Command::Cancel => controller.dispatch(Action::Cancel),
                    Command::Clear => controller.dispatch(Action::Clear),
                    Command::Quit => controller.dispatch(Action::Quit),
                }
            }
            Some(action) = controller.next_action() => controller.dispatch(action),
        };

        if let Some(notice) = controller.app().notice.clone() {
            eprintln!("\n! {}", notice);
            controller.dispatch(Action::DismissNotice);
        }
        if effect == Effect::Quit {
            break;
        }
        stdout().flush()?;
    }

    info!("Session ended with {} turns", controller.app().transcript.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transcript::{InvocationState, InvocationUpdate, TranscriptStore};
    use serde_json::json;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert_eq!(parse_command(" /clear "), Command::Clear);
        assert_eq!(parse_command("/cancel"), Command::Cancel);
        assert_eq!(parse_command("#2"), Command::Pick(2));
        assert_eq!(parse_command("#0"), Command::Send("#0".into()));
        assert_eq!(parse_command("#hashtag"), Command::Send("#hashtag".into()));
        assert_eq!(parse_command("hello there"), Command::Send("hello there".into()));
    }

    #[test]
    fn test_quick_reply_uses_latest_response() {
        let mut store = TranscriptStore::new();
        let turn = store.begin_assistant_turn();
        store
            .upsert_tool_invocation(
                turn,
                InvocationUpdate {
                    call_id: "r1".into(),
                    tool_name: Some(ToolName::Respond),
                    arguments: None,
                    state: InvocationState::Result(json!({
                        "messages": ["Pick one"],
                        "options": ["Mornings", "Evenings"]
                    })),
                },
            )
            .unwrap();
        store.complete_turn(turn).unwrap();

        assert_eq!(quick_reply(store.turns(), 2).as_deref(), Some("Evenings"));
        assert_eq!(quick_reply(store.turns(), 3), None);

        store.append_user_turn("Evenings").unwrap();
        let plain = store.begin_assistant_turn();
        store.append_text_delta(plain, "No options here").unwrap();
        assert_eq!(quick_reply(store.turns(), 1), None);
    }
}
