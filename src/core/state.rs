//! # Application State
//!
//! Core business state for Ara. This module contains domain logic only,
//! no front-end types. Rendering lives in the `cli` module.
//!
//! ```text
//! App
//! ├── provider: Arc<dyn CompletionProvider>  // completion service
//! ├── transcript: TranscriptStore   // the session's turns + observers
//! ├── phase: RequestPhase           // Idle / Sent / Streaming / Settled
//! ├── model_name: String            // current model
//! ├── persona: Persona              // system instruction + timezone
//! ├── registry: Arc<ToolRegistry>   // tool registry
//! ├── notice: Option<String>        // transient error notice
//! ├── status_message: String        // status line text
//! ├── max_output_tokens: Option<u32>
//! ├── max_duration: Duration        // per-request deadline
//! └── next_request: u64             // request id generator
//! ```
//!
//! State changes only happen through `update(state, action)` in action.rs.
//! This keeps things predictable, so no surprise mutations.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::core::config::{DEFAULT_MAX_DURATION_SECS, ResolvedConfig};
use crate::core::persona::Persona;
use crate::core::tools::{DEFAULT_WEATHER_DELAY, ToolRegistry, default_registry};
use crate::core::transcript::{TranscriptStore, TurnId};
use crate::inference::{CompletionProvider, ToolDefinition};

/// Generation counter tagging every action sent by one network task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where the current exchange stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestPhase {
    /// Nothing submitted yet, or the session was cleared.
    #[default]
    Idle,
    /// Request dispatched, no event received yet.
    Sent(RequestId),
    /// At least one event received; `turn` is the assistant turn being filled.
    Streaming { request: RequestId, turn: TurnId },
    /// The last request ended, failed, or was cancelled.
    Settled,
}

impl RequestPhase {
    /// The request currently allowed to mutate the transcript, if any.
    pub fn in_flight(&self) -> Option<RequestId> {
        match *self {
            RequestPhase::Sent(id) => Some(id),
            RequestPhase::Streaming { request, .. } => Some(request),
            RequestPhase::Idle | RequestPhase::Settled => None,
        }
    }

    pub fn is_active(&self, id: RequestId) -> bool {
        self.in_flight() == Some(id)
    }
}

pub struct App {
    pub provider: Arc<dyn CompletionProvider>,
    pub transcript: TranscriptStore,
    pub phase: RequestPhase,
    pub model_name: String,
    pub persona: Persona,
    pub registry: Arc<ToolRegistry>,
    /// Transient notice shown until the next submit or an explicit dismiss.
    pub notice: Option<String>,
    pub status_message: String,
    pub max_output_tokens: Option<u32>,
    pub max_duration: Duration,
    next_request: u64,
}

impl App {
    pub fn new(provider: Arc<dyn CompletionProvider>, model_name: String) -> Self {
        Self {
            provider,
            transcript: TranscriptStore::new(),
            phase: RequestPhase::Idle,
            model_name,
            persona: Persona::default(),
            registry: Arc::new(default_registry(DEFAULT_WEATHER_DELAY)),
            notice: None,
            status_message: String::from("Welcome to Ara!"),
            max_output_tokens: None,
            max_duration: Duration::from_secs(DEFAULT_MAX_DURATION_SECS),
            next_request: 0,
        }
    }

    pub fn from_config(
        provider: Arc<dyn CompletionProvider>,
        registry: Arc<ToolRegistry>,
        config: &ResolvedConfig,
    ) -> Self {
        Self {
            persona: config.persona.clone(),
            registry,
            max_output_tokens: Some(config.max_output_tokens),
            max_duration: config.max_duration,
            ..Self::new(provider, config.model_name.clone())
        }
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    pub fn system_prompt(&self) -> String {
        self.persona.system_prompt(Utc::now())
    }

    pub fn is_loading(&self) -> bool {
        self.phase.in_flight().is_some()
    }

    /// Allocates the next request id and marks it as sent.
    pub fn start_request(&mut self) -> RequestId {
        self.next_request += 1;
        let id = RequestId(self.next_request);
        self.phase = RequestPhase::Sent(id);
        id
    }
}
