//! # Actions
//!
//! Everything that can happen in Ara becomes an `Action`.
//! User presses Enter? That's `Action::Submit(text)`.
//! The model streams a token? That's `Action::Stream { request, event }`.
//!
//! The `update()` function takes the current state and an action,
//! mutates the state, and returns an `Effect` describing the I/O the
//! driver must perform. No side effects here. I/O happens elsewhere.
//!
//! ```text
//! State + Action  →  update()  →  New State + Effect
//! ```
//!
//! Every stream action carries the [`RequestId`] of the task that produced
//! it. Only the active request may touch the transcript; anything else is a
//! leftover from a superseded or cancelled task and is dropped.

use log::{debug, info, warn};

use crate::core::state::{App, RequestId, RequestPhase};
use crate::core::transcript::{InvocationState, InvocationUpdate, TurnId};
use crate::inference::{ProviderError, StreamEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// User submitted a line of input.
    Submit(String),
    /// One decoded event from the request's stream.
    Stream {
        request: RequestId,
        event: StreamEvent,
    },
    /// The request's transport failed or timed out.
    StreamFailed {
        request: RequestId,
        error: ProviderError,
    },
    /// User stopped the in-flight response.
    Cancel,
    /// Start over with an empty transcript.
    Clear,
    DismissNotice,
    Quit,
}

/// I/O the driver performs after `update()` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Start a task for this request.
    SpawnRequest(RequestId),
    /// Abort the in-flight task, then start one for this request.
    ReplaceRequest(RequestId),
    /// Abort the in-flight task.
    AbortRequest,
    Quit,
}

pub fn update(app: &mut App, action: Action) -> Effect {
    match action {
        Action::Submit(text) => submit(app, text),
        Action::Stream { request, event } => {
            if !app.phase.is_active(request) {
                debug!("Dropping stale event from request {}: {:?}", request, event);
                return Effect::None;
            }
            apply_event(app, request, event);
            Effect::None
        }
        Action::StreamFailed { request, error } => {
            if !app.phase.is_active(request) {
                debug!("Dropping stale failure from request {}: {}", request, error);
                return Effect::None;
            }
            warn!("Request {} failed: {}", request, error);
            let turn = assistant_turn(app, request);
            if let Err(e) = app.transcript.complete_turn(turn) {
                warn!("Failed to finalize turn {}: {}", turn, e);
            }
            app.phase = RequestPhase::Settled;
            app.notice = Some(format!("Response failed: {}", error));
            app.status_message = String::from("Response failed");
            Effect::None
        }
        Action::Cancel => {
            let Some(request) = app.phase.in_flight() else {
                return Effect::None;
            };
            info!("Cancelling request {}", request);
            finalize_partial_turn(app);
            app.phase = RequestPhase::Settled;
            app.status_message = String::from("Cancelled");
            Effect::AbortRequest
        }
        Action::Clear => {
            let was_loading = app.is_loading();
            app.transcript.clear();
            app.phase = RequestPhase::Idle;
            app.notice = None;
            app.status_message = String::from("Cleared");
            if was_loading {
                Effect::AbortRequest
            } else {
                Effect::None
            }
        }
        Action::DismissNotice => {
            app.notice = None;
            Effect::None
        }
        Action::Quit => Effect::Quit,
    }
}

fn submit(app: &mut App, text: String) -> Effect {
    if text.trim().is_empty() {
        app.notice = Some(String::from("Type a message before sending."));
        return Effect::None;
    }
    app.notice = None;

    let superseded = app.phase.in_flight();
    if superseded.is_some() || app.transcript.awaiting_reply() {
        // Type-while-waiting: fold into the unanswered turn, or close out the partial reply.
        if app.transcript.awaiting_reply() {
            if let Err(e) = app.transcript.merge_followup_into_last_user_turn(&text) {
                warn!("Failed to merge follow-up: {}", e);
                return Effect::None;
            }
        } else {
            // Input while streaming: the partial reply stays as-is and the input opens a new user turn.
            finalize_partial_turn(app);
            if let Err(e) = app.transcript.append_user_turn(&text) {
                warn!("Failed to append user turn: {}", e);
                return Effect::None;
            }
        }
        let request = app.start_request();
        app.status_message = String::from("Thinking...");
        return match superseded {
            Some(old) => {
                info!("Request {} superseded by {}", old, request);
                Effect::ReplaceRequest(request)
            }
            None => Effect::SpawnRequest(request),
        };
    }

    if let Err(e) = app.transcript.append_user_turn(&text) {
        warn!("Failed to append user turn: {}", e);
        return Effect::None;
    }
    let request = app.start_request();
    app.status_message = String::from("Thinking...");
    Effect::SpawnRequest(request)
}

/// The assistant turn for `request`, begun on the first event.
fn assistant_turn(app: &mut App, request: RequestId) -> TurnId {
    if let RequestPhase::Streaming { turn, .. } = app.phase {
        return turn;
    }
    let turn = app.transcript.begin_assistant_turn();
    app.phase = RequestPhase::Streaming { request, turn };
    turn
}

/// Completes the streaming assistant turn as-is, if there is one.
fn finalize_partial_turn(app: &mut App) {
    if let RequestPhase::Streaming { turn, .. } = app.phase
        && let Err(e) = app.transcript.complete_turn(turn)
    {
        warn!("Failed to finalize turn {}: {}", turn, e);
    }
}

fn apply_event(app: &mut App, request: RequestId, event: StreamEvent) {
    // No assistant turn yet means no call was announced, so a bare result has nothing to resolve.
    if let (
        RequestPhase::Sent(_),
        StreamEvent::ToolResult {
            call_id,
            tool_name: None,
            ..
        },
    ) = (&app.phase, &event)
    {
        warn!(
            "Dropping tool result for unknown call_id={} on request {}",
            call_id, request
        );
        return;
    }
    let turn = assistant_turn(app, request);
    let result = match event {
        StreamEvent::TextDelta(delta) => app.transcript.append_text_delta(turn, &delta),
        StreamEvent::ToolCall {
            call_id,
            tool_name,
            arguments,
        } => {
            debug!("Tool call {} ({}) on turn {}", call_id, tool_name, turn);
            app.transcript.upsert_tool_invocation(
                turn,
                InvocationUpdate {
                    call_id,
                    tool_name: Some(tool_name),
                    arguments: Some(arguments),
                    state: InvocationState::Pending,
                },
            )
        }
        StreamEvent::ToolResult {
            call_id,
            tool_name,
            payload,
        } => app.transcript.upsert_tool_invocation(
            turn,
            InvocationUpdate {
                call_id,
                tool_name,
                arguments: None,
                state: InvocationState::Result(payload),
            },
        ),
        StreamEvent::End => {
            info!("Request {} finished", request);
            app.phase = RequestPhase::Settled;
            app.status_message = String::from("Ready");
            app.transcript.complete_turn(turn)
        }
    };
    if let Err(e) = result {
        warn!("Dropping event for request {}: {}", request, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tools::ToolName;
    use crate::core::transcript::{Role, TurnStatus};
    use crate::test_support::test_app;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn spawned(effect: Effect) -> RequestId {
        match effect {
            Effect::SpawnRequest(id) | Effect::ReplaceRequest(id) => id,
            other => panic!("expected a request to start, got {:?}", other),
        }
    }

    fn stream(request: RequestId, event: StreamEvent) -> Action {
        Action::Stream { request, event }
    }

    #[test]
    fn test_submit_appends_user_turn_and_spawns() {
        let mut app = test_app();
        let effect = update(&mut app, Action::Submit("Hello".into()));
        let request = spawned(effect);
        assert!(matches!(effect, Effect::SpawnRequest(_)));
        assert_eq!(app.phase, RequestPhase::Sent(request));
        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript.turns()[0].role, Role::User);
        assert_eq!(app.transcript.turns()[0].text, "Hello");
    }

    #[test]
    fn test_empty_submit_is_rejected_without_mutation() {
        let mut app = test_app();
        let effect = update(&mut app, Action::Submit("   \n".into()));
        assert_eq!(effect, Effect::None);
        assert!(app.transcript.is_empty());
        assert_eq!(app.phase, RequestPhase::Idle);
        assert!(app.notice.is_some());
    }

    #[test]
    fn test_followup_before_first_event_merges() {
        let mut app = test_app();
        let first = spawned(update(&mut app, Action::Submit("What's the weather".into())));
        let effect = update(&mut app, Action::Submit("in Boston?".into()));

        let second = match effect {
            Effect::ReplaceRequest(id) => id,
            other => panic!("expected ReplaceRequest, got {:?}", other),
        };
        assert_ne!(first, second);
        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript.turns()[0].text, "What's the weather\nin Boston?");
    }

    #[test]
    fn test_followup_while_streaming_completes_partial_and_appends() {
        let mut app = test_app();
        let first = spawned(update(&mut app, Action::Submit("Tell me a story".into())));
        update(&mut app, stream(first, StreamEvent::TextDelta("Once upon".into())));

        let effect = update(&mut app, Action::Submit("actually, a poem".into()));
        let second = spawned(effect);
        assert!(matches!(effect, Effect::ReplaceRequest(_)));

        let turns = app.transcript.turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].text, "Once upon");
        assert_eq!(turns[1].status, TurnStatus::Complete);
        assert_eq!(turns[2].role, Role::User);
        assert_eq!(app.phase, RequestPhase::Sent(second));
    }

    #[test]
    fn test_stale_events_are_dropped() {
        let mut app = test_app();
        let first = spawned(update(&mut app, Action::Submit("A".into())));
        let second = spawned(update(&mut app, Action::Submit("B".into())));

        update(&mut app, stream(first, StreamEvent::TextDelta("old".into())));
        update(
            &mut app,
            Action::StreamFailed {
                request: first,
                error: ProviderError::Network("aborted".into()),
            },
        );
        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.phase, RequestPhase::Sent(second));
        assert!(app.notice.is_none());

        update(&mut app, stream(second, StreamEvent::TextDelta("new".into())));
        update(&mut app, stream(second, StreamEvent::End));
        let turns = app.transcript.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].text, "new");
        assert!(turns[1].is_complete());
    }

    #[test]
    fn test_weather_exchange_end_to_end() {
        let mut app = test_app();
        let request = spawned(update(
            &mut app,
            Action::Submit("What's the weather in Boston?".into()),
        ));
        let events = [
            StreamEvent::TextDelta("Let me check".into()),
            StreamEvent::ToolCall {
                call_id: "c1".into(),
                tool_name: ToolName::DisplayWeather,
                arguments: json!({ "location": "Boston" }),
            },
            StreamEvent::ToolResult {
                call_id: "c1".into(),
                tool_name: None,
                payload: json!({ "weather": "Sunny", "temperature": 75, "location": "Boston" }),
            },
            StreamEvent::End,
        ];
        for event in events {
            assert_eq!(update(&mut app, stream(request, event)), Effect::None);
        }

        let turns = app.transcript.turns();
        assert_eq!(turns.len(), 2);
        let reply = &turns[1];
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.text, "Let me check");
        assert!(reply.is_complete());
        assert_eq!(reply.tool_invocations.len(), 1);
        let inv = &reply.tool_invocations[0];
        assert_eq!(inv.tool_name, ToolName::DisplayWeather);
        assert_eq!(inv.payload().unwrap()["temperature"], 75);
        assert_eq!(app.phase, RequestPhase::Settled);
    }

    #[test]
    fn test_unknown_call_id_as_first_event_leaves_session_unchanged() {
        let mut app = test_app();
        let request = spawned(update(&mut app, Action::Submit("Hi".into())));
        let before = app.transcript.turns().to_vec();
        update(
            &mut app,
            stream(
                request,
                StreamEvent::ToolResult {
                    call_id: "unannounced".into(),
                    tool_name: None,
                    payload: json!({}),
                },
            ),
        );
        assert_eq!(app.transcript.turns(), before.as_slice());
        assert_eq!(app.phase, RequestPhase::Sent(request));

        // The user's turn is still last, so a follow-up merges into it.
        let effect = update(&mut app, Action::Submit("B".into()));
        assert!(matches!(effect, Effect::ReplaceRequest(_)));
        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript.turns()[0].text, "Hi\nB");
    }

    #[test]
    fn test_unknown_call_id_mid_stream_leaves_turn_unchanged() {
        let mut app = test_app();
        let request = spawned(update(&mut app, Action::Submit("Hi".into())));
        update(&mut app, stream(request, StreamEvent::TextDelta("Hel".into())));
        let before = app.transcript.turns().to_vec();
        update(
            &mut app,
            stream(
                request,
                StreamEvent::ToolResult {
                    call_id: "unannounced".into(),
                    tool_name: None,
                    payload: json!({}),
                },
            ),
        );
        assert_eq!(app.transcript.turns(), before.as_slice());
        assert!(app.is_loading());
    }

    #[test]
    fn test_result_with_tool_name_as_first_event_is_recorded() {
        let mut app = test_app();
        let request = spawned(update(&mut app, Action::Submit("Hi".into())));
        update(
            &mut app,
            stream(
                request,
                StreamEvent::ToolResult {
                    call_id: "r1".into(),
                    tool_name: Some(ToolName::Respond),
                    payload: json!({ "messages": ["Hello"] }),
                },
            ),
        );
        let reply = app.transcript.last().unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert!(reply.invocation("r1").unwrap().state.is_result());
    }

    #[test]
    fn test_failure_keeps_partial_content_and_sets_notice() {
        let mut app = test_app();
        let request = spawned(update(&mut app, Action::Submit("Hi".into())));
        update(&mut app, stream(request, StreamEvent::TextDelta("Hel".into())));
        let effect = update(
            &mut app,
            Action::StreamFailed {
                request,
                error: ProviderError::Timeout(std::time::Duration::from_secs(30)),
            },
        );

        assert_eq!(effect, Effect::None);
        let reply = app.transcript.last().unwrap();
        assert_eq!(reply.text, "Hel");
        assert!(reply.is_complete());
        assert_eq!(app.phase, RequestPhase::Settled);
        assert!(app.notice.as_deref().unwrap().contains("timed out"));

        update(&mut app, Action::DismissNotice);
        assert!(app.notice.is_none());
    }

    #[test]
    fn test_failure_before_any_event_closes_exchange() {
        let mut app = test_app();
        let request = spawned(update(&mut app, Action::Submit("Hi".into())));
        update(
            &mut app,
            Action::StreamFailed {
                request,
                error: ProviderError::Network("refused".into()),
            },
        );
        let turns = app.transcript.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].text, "");
        assert!(turns[1].is_complete());

        // The next submission starts a fresh exchange rather than merging.
        let effect = update(&mut app, Action::Submit("Hello?".into()));
        assert!(matches!(effect, Effect::SpawnRequest(_)));
        assert_eq!(app.transcript.len(), 3);
    }

    #[test]
    fn test_cancel_mid_stream() {
        let mut app = test_app();
        let request = spawned(update(&mut app, Action::Submit("Hi".into())));
        update(&mut app, stream(request, StreamEvent::TextDelta("Hel".into())));

        assert_eq!(update(&mut app, Action::Cancel), Effect::AbortRequest);
        assert!(app.transcript.last().unwrap().is_complete());
        assert!(!app.is_loading());

        // Late events from the aborted task are ignored.
        update(&mut app, stream(request, StreamEvent::TextDelta("lo".into())));
        assert_eq!(app.transcript.last().unwrap().text, "Hel");
    }

    #[test]
    fn test_cancel_before_first_event_then_followup_merges() {
        let mut app = test_app();
        spawned(update(&mut app, Action::Submit("A".into())));
        assert_eq!(update(&mut app, Action::Cancel), Effect::AbortRequest);
        assert_eq!(app.transcript.len(), 1);

        let effect = update(&mut app, Action::Submit("B".into()));
        assert!(matches!(effect, Effect::SpawnRequest(_)));
        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript.turns()[0].text, "A\nB");
    }

    #[test]
    fn test_cancel_when_idle_is_noop() {
        let mut app = test_app();
        assert_eq!(update(&mut app, Action::Cancel), Effect::None);
    }

    #[test]
    fn test_clear_aborts_and_empties() {
        let mut app = test_app();
        let request = spawned(update(&mut app, Action::Submit("Hi".into())));
        update(&mut app, stream(request, StreamEvent::TextDelta("Hel".into())));

        assert_eq!(update(&mut app, Action::Clear), Effect::AbortRequest);
        assert!(app.transcript.is_empty());
        assert_eq!(app.phase, RequestPhase::Idle);
        assert_eq!(update(&mut app, Action::Clear), Effect::None);
    }

    #[test]
    fn test_observer_sees_every_mutation() {
        let mut app = test_app();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        app.transcript.subscribe(move |turns| {
            sink.borrow_mut()
                .push(turns.last().map(|t| t.text.clone()).unwrap_or_default());
        });

        let request = spawned(update(&mut app, Action::Submit("Hi".into())));
        update(&mut app, stream(request, StreamEvent::TextDelta("He".into())));
        update(&mut app, stream(request, StreamEvent::TextDelta("llo".into())));
        update(&mut app, stream(request, StreamEvent::End));

        // user turn, begin, two deltas, complete
        assert_eq!(*seen.borrow(), vec!["Hi", "", "He", "Hello", "Hello"]);
    }

    #[test]
    fn test_quit() {
        let mut app = test_app();
        assert_eq!(update(&mut app, Action::Quit), Effect::Quit);
    }
}
