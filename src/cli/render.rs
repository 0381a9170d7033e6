//! Incremental transcript printer.
//!
//! Subscribed to the [`TranscriptStore`](crate::core::transcript::TranscriptStore),
//! it receives the full turn list after every mutation and prints only what is
//! new since the previous call: text deltas, tool cards, quick replies.

use std::io::{self, Write};

use crate::core::tools::{ToolName, ToolPayload};
use crate::core::transcript::{Role, ToolInvocation, Turn, TurnId};

/// How much of one turn has already been printed.
#[derive(Debug, Clone, PartialEq)]
struct Printed {
    id: TurnId,
    text_len: usize,
    /// (call_id, result shown) per invocation, arrival order.
    invocations: Vec<(String, bool)>,
    complete: bool,
}

#[derive(Debug, Default)]
pub struct Printer {
    printed: Vec<Printed>,
}

impl Printer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, turns: &[Turn], out: &mut impl Write) -> io::Result<()> {
        if turns.len() < self.printed.len()
            || self
                .printed
                .iter()
                .zip(turns)
                .any(|(printed, turn)| printed.id != turn.id)
        {
            self.printed.clear();
            writeln!(out, "\n-- transcript cleared --")?;
        }

        for (idx, turn) in turns.iter().enumerate() {
            if idx == self.printed.len() {
                self.printed.push(Printed {
                    id: turn.id,
                    text_len: 0,
                    invocations: Vec::new(),
                    complete: false,
                });
                if turn.role == Role::Assistant {
                    write!(out, "ara> ")?;
                }
            }
            // User input is already on screen, including merged follow-ups.
            if turn.role == Role::User {
                continue;
            }
            render_assistant(&mut self.printed[idx], turn, out)?;
        }
        out.flush()
    }
}

fn render_assistant(printed: &mut Printed, turn: &Turn, out: &mut impl Write) -> io::Result<()> {
    if turn.text.len() > printed.text_len {
        write!(out, "{}", &turn.text[printed.text_len..])?;
        printed.text_len = turn.text.len();
    }

    for inv in &turn.tool_invocations {
        let pos = printed
            .invocations
            .iter()
            .position(|(call_id, _)| *call_id == inv.call_id);
        let shown_result = match pos {
            Some(i) => printed.invocations[i].1,
            None => {
                if !inv.state.is_result() {
                    write_pending(inv, out)?;
                }
                printed.invocations.push((inv.call_id.clone(), false));
                false
            }
        };
        if inv.state.is_result() && !shown_result {
            write_result(inv, out)?;
            if let Some(entry) = printed
                .invocations
                .iter_mut()
                .find(|(call_id, _)| *call_id == inv.call_id)
            {
                entry.1 = true;
            }
        }
    }

    if turn.is_complete() && !printed.complete {
        printed.complete = true;
        writeln!(out)?;
    }
    Ok(())
}

fn write_pending(inv: &ToolInvocation, out: &mut impl Write) -> io::Result<()> {
    match inv.tool_name {
        ToolName::DisplayWeather => {
            let location = inv.arguments["location"].as_str().unwrap_or("somewhere");
            write!(out, "\n  [checking the weather in {}...]", location)
        }
        // The response tool is the reply itself; nothing to show until it resolves.
        ToolName::Respond => Ok(()),
    }
}

fn write_result(inv: &ToolInvocation, out: &mut impl Write) -> io::Result<()> {
    let Some(payload) = inv.payload() else {
        return Ok(());
    };
    match ToolPayload::parse(inv.tool_name, payload) {
        Ok(ToolPayload::Weather(report)) => write!(
            out,
            "\n  [{}: {}, {}°F]",
            report.location, report.weather, report.temperature
        ),
        Ok(ToolPayload::Response(message)) => {
            for text in &message.messages {
                write!(out, "\n{}", text)?;
            }
            for (i, option) in message.options.iter().flatten().enumerate() {
                write!(out, "\n  #{} {}", i + 1, option)?;
            }
            Ok(())
        }
        Err(_) => {
            let reason = payload["error"].as_str().unwrap_or("unexpected output");
            write!(out, "\n  [{} failed: {}]", inv.tool_name, reason)
        }
    }
}
