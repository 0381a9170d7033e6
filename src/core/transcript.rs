//! # Transcript Store
//!
//! The ordered list of conversation turns plus the small mutation contract
//! the stream consumer is allowed to use.
//!
//! ```text
//! TranscriptStore
//! ├── turns: Vec<Turn>                  // strictly ordered by creation
//! │   └── Turn
//! │       ├── id / role                 // fixed at creation
//! │       ├── text                      // append-only while in progress
//! │       ├── tool_invocations          // arrival order, unique call_id
//! │       └── status                    // InProgress → Complete
//! └── observers                         // notified after every mutation
//! ```
//!
//! Every successful mutation notifies subscribed observers synchronously,
//! before the mutating call returns, so a renderer never sees a stale snapshot.

use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::core::tools::ToolName;

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque, stable identifier of a turn.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnId(uuid::Uuid);

impl TurnId {
    fn new() -> Self {
        TurnId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle returned by [`TranscriptStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(usize);

// ============================================================================
// Turns
// ============================================================================

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum TurnStatus {
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "complete")]
    Complete,
}

/// Lifecycle of a tool invocation. The payload only exists once resolved.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum InvocationState {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "result")]
    Result(serde_json::Value),
}

impl InvocationState {
    pub fn is_result(&self) -> bool {
        matches!(self, InvocationState::Result(_))
    }
}

/// A structured side effect the assistant requested mid-stream.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub tool_name: ToolName,
    pub call_id: String,
    /// Arguments the model passed (`Null` if the transport never sent them).
    pub arguments: serde_json::Value,
    pub state: InvocationState,
}

impl ToolInvocation {
    pub fn payload(&self) -> Option<&serde_json::Value> {
        match &self.state {
            InvocationState::Result(payload) => Some(payload),
            InvocationState::Pending => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Turn {
    pub id: TurnId,
    pub role: Role,
    pub text: String,
    pub tool_invocations: Vec<ToolInvocation>,
    pub status: TurnStatus,
}

impl Turn {
    fn new(role: Role, text: String, status: TurnStatus) -> Self {
        Self {
            id: TurnId::new(),
            role,
            text,
            tool_invocations: Vec::new(),
            status,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == TurnStatus::Complete
    }

    pub fn invocation(&self, call_id: &str) -> Option<&ToolInvocation> {
        self.tool_invocations.iter().find(|inv| inv.call_id == call_id)
    }
}

/// One tool event to fold into a turn.
///
/// `tool_name` may be absent on a bare result event; in that case the
/// invocation must already exist.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationUpdate {
    pub call_id: String,
    pub tool_name: Option<ToolName>,
    pub arguments: Option<serde_json::Value>,
    pub state: InvocationState,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptError {
    /// Submitted text was empty after trimming.
    EmptyInput,
    UnknownTurn(TurnId),
    /// The turn is complete and no longer accepts tool events.
    TurnComplete(TurnId),
    /// A result arrived for a call that was never announced.
    UnknownCallId { turn: TurnId, call_id: String },
    /// A follow-up was offered but the last turn is not the user's.
    NoPendingUserTurn,
}

impl fmt::Display for TranscriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptError::EmptyInput => write!(f, "message is empty"),
            TranscriptError::UnknownTurn(id) => write!(f, "unknown turn {id}"),
            TranscriptError::TurnComplete(id) => write!(f, "turn {id} is already complete"),
            TranscriptError::UnknownCallId { turn, call_id } => {
                write!(f, "tool result for unknown call_id {call_id} on turn {turn}")
            }
            TranscriptError::NoPendingUserTurn => write!(f, "last turn is not a user turn"),
        }
    }
}

impl std::error::Error for TranscriptError {}

// ============================================================================
// Store
// ============================================================================

type Observer = Box<dyn FnMut(&[Turn])>;

#[derive(Default)]
pub struct TranscriptStore {
    turns: Vec<Turn>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: usize,
}

impl fmt::Debug for TranscriptStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscriptStore")
            .field("turns", &self.turns)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn get(&self, id: TurnId) -> Option<&Turn> {
        self.turns.iter().find(|t| t.id == id)
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// True if the newest turn was authored by the user (the assistant has not replied yet).
    pub fn awaiting_reply(&self) -> bool {
        matches!(self.turns.last(), Some(t) if t.role == Role::User)
    }

    /// Registers an observer that is called with the full turn list after every mutation.
    pub fn subscribe(&mut self, observer: impl FnMut(&[Turn]) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.observers.retain(|(sub, _)| *sub != id);
    }

    fn notify(&mut self) {
        for (_, observer) in self.observers.iter_mut() {
            observer(&self.turns);
        }
    }

    fn turn_mut(&mut self, id: TurnId) -> Result<&mut Turn, TranscriptError> {
        self.turns
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(TranscriptError::UnknownTurn(id))
    }

    pub fn append_user_turn(&mut self, text: &str) -> Result<TurnId, TranscriptError> {
        if text.trim().is_empty() {
            return Err(TranscriptError::EmptyInput);
        }
        let turn = Turn::new(Role::User, text.to_string(), TurnStatus::Complete);
        let id = turn.id;
        self.turns.push(turn);
        debug!("Appended user turn {}", id);
        self.notify();
        Ok(id)
    }

    pub fn begin_assistant_turn(&mut self) -> TurnId {
        let turn = Turn::new(Role::Assistant, String::new(), TurnStatus::InProgress);
        let id = turn.id;
        self.turns.push(turn);
        debug!("Began assistant turn {}", id);
        self.notify();
        id
    }

    /// Appends a text delta to an in-progress turn.
    ///
    /// Late deltas for a completed turn are logged and ignored.
    pub fn append_text_delta(&mut self, id: TurnId, delta: &str) -> Result<(), TranscriptError> {
        let turn = self.turn_mut(id)?;
        if turn.is_complete() {
            warn!("Dropping late text delta ({} bytes) for completed turn {}", delta.len(), id);
            return Ok(());
        }
        turn.text.push_str(delta);
        self.notify();
        Ok(())
    }

    /// Creates or advances the invocation identified by `update.call_id`.
    pub fn upsert_tool_invocation(
        &mut self,
        id: TurnId,
        update: InvocationUpdate,
    ) -> Result<(), TranscriptError> {
        let turn = self.turn_mut(id)?;
        if turn.is_complete() {
            warn!(
                "Rejecting tool event for call_id={} on completed turn {}",
                update.call_id, id
            );
            return Err(TranscriptError::TurnComplete(id));
        }

        let existing = turn
            .tool_invocations
            .iter()
            .position(|inv| inv.call_id == update.call_id);

        match (existing, update.state) {
            (Some(idx), InvocationState::Result(payload)) => {
                let inv = &mut turn.tool_invocations[idx];
                if inv.state.is_result() {
                    debug!("Duplicate result for call_id={}, overwriting payload", inv.call_id);
                }
                inv.state = InvocationState::Result(payload);
            }
            (Some(idx), InvocationState::Pending) => {
                let inv = &mut turn.tool_invocations[idx];
                debug!("Duplicate call event for call_id={}", inv.call_id);
                if let Some(arguments) = update.arguments {
                    inv.arguments = arguments;
                }
            }
            (None, state) => {
                let tool_name = match update.tool_name {
                    Some(name) => name,
                    None => {
                        warn!(
                            "Tool result for unknown call_id={} on turn {}, dropping",
                            update.call_id, id
                        );
                        return Err(TranscriptError::UnknownCallId {
                            turn: id,
                            call_id: update.call_id,
                        });
                    }
                };
                turn.tool_invocations.push(ToolInvocation {
                    tool_name,
                    call_id: update.call_id,
                    arguments: update.arguments.unwrap_or(serde_json::Value::Null),
                    state,
                });
            }
        }

        self.notify();
        Ok(())
    }

    pub fn complete_turn(&mut self, id: TurnId) -> Result<(), TranscriptError> {
        let turn = self.turn_mut(id)?;
        if turn.is_complete() {
            return Ok(());
        }
        turn.status = TurnStatus::Complete;
        debug!("Completed turn {} ({} bytes)", id, turn.text.len());
        self.notify();
        Ok(())
    }

    /// Folds a follow-up into the newest turn when it is still the user's.
    pub fn merge_followup_into_last_user_turn(
        &mut self,
        text: &str,
    ) -> Result<TurnId, TranscriptError> {
        if text.trim().is_empty() {
            return Err(TranscriptError::EmptyInput);
        }
        let turn = match self.turns.last_mut() {
            Some(turn) if turn.role == Role::User => turn,
            _ => return Err(TranscriptError::NoPendingUserTurn),
        };
        turn.text.push('\n');
        turn.text.push_str(text);
        let id = turn.id;
        debug!("Merged follow-up into user turn {}", id);
        self.notify();
        Ok(id)
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.notify();
    }
}
