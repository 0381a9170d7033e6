//! # Controller
//!
//! Drives the reducer. Owns the [`App`], the single ordered action queue that
//! every network task reports through, and the abort handle of the one task
//! allowed to be alive at a time.
//!
//! ```text
//! front-end ──dispatch(Action)──► update() ──Effect──► spawn / abort task
//!                                    ▲                        │
//!                                    └──── Action::Stream ────┘
//!                                          (mpsc, in order)
//! ```
//!
//! Front-ends never touch tokio tasks directly: they call [`Controller::dispatch`]
//! for user input and feed [`Controller::next_action`] back into it.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::AbortHandle;

use crate::Provider;
use crate::core::action::{Action, Effect, update};
use crate::core::config::ResolvedConfig;
use crate::core::state::{App, RequestId};
use crate::core::tools::{ToolRegistry, default_registry};
use crate::inference::{
    ChatRoute, CompletionProvider, CompletionRequest, DataStreamProvider, OpenAiProvider,
    ProviderError, StreamEvent,
};

pub struct Controller {
    app: App,
    tx: UnboundedSender<Action>,
    rx: UnboundedReceiver<Action>,
    in_flight: Option<(RequestId, AbortHandle)>,
}

impl Controller {
    pub fn new(app: App) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            app,
            tx,
            rx,
            in_flight: None,
        }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut App {
        &mut self.app
    }

    /// A handle for injecting actions from outside the controller.
    pub fn sender(&self) -> UnboundedSender<Action> {
        self.tx.clone()
    }

    /// The request whose task is currently alive, if any.
    pub fn in_flight(&self) -> Option<RequestId> {
        self.in_flight.as_ref().map(|(id, _)| *id)
    }

    /// Applies one action and performs the effect it asks for.
    pub fn dispatch(&mut self, action: Action) -> Effect {
        let effect = update(&mut self.app, action);
        match effect {
            Effect::SpawnRequest(request) | Effect::ReplaceRequest(request) => {
                self.abort_in_flight();
                let handle = spawn_request(&self.app, request, self.tx.clone());
                self.in_flight = Some((request, handle));
            }
            Effect::AbortRequest => self.abort_in_flight(),
            Effect::None | Effect::Quit => {}
        }
        // A settled request's task exits on its own.
        if !self.app.is_loading() {
            self.in_flight = None;
        }
        effect
    }

    /// Waits for the next action queued by a network task.
    pub async fn next_action(&mut self) -> Option<Action> {
        self.rx.recv().await
    }

    /// Dispatches queued actions until no request is in flight.
    pub async fn run_until_settled(&mut self) {
        while self.app.is_loading() {
            match self.rx.recv().await {
                Some(action) => {
                    self.dispatch(action);
                }
                None => break,
            }
        }
    }

    fn abort_in_flight(&mut self) {
        if let Some((request, handle)) = self.in_flight.take() {
            info!("Aborting request {}", request);
            handle.abort();
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.abort_in_flight();
    }
}

/// Runs one request on a tokio task, reporting every event back as an action.
///
/// The task always ends with exactly one terminal action: the provider's `End`,
/// a synthesized `End` if the provider returned without one, or `StreamFailed`.
fn spawn_request(app: &App, request: RequestId, tx: UnboundedSender<Action>) -> AbortHandle {
    info!(
        "Spawning request {} ({} turns, provider={})",
        request,
        app.transcript.len(),
        app.provider.name()
    );

    // Clone what we need for the async task
    let provider = app.provider.clone();
    let turns = app.transcript.turns().to_vec();
    let system_prompt = app.system_prompt();
    let model = app.model_name.clone();
    let tools = app.tool_definitions();
    let max_output_tokens = app.max_output_tokens;
    let max_duration = app.max_duration;

    let handle = tokio::spawn(async move {
        let (event_tx, mut event_rx) = mpsc::channel::<StreamEvent>(100);

        let stream = async {
            let completion = CompletionRequest {
                system_prompt: &system_prompt,
                turns: &turns,
                model: &model,
                tools: &tools,
                max_output_tokens,
            };
            match tokio::time::timeout(max_duration, provider.stream_completion(completion, event_tx))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(max_duration)),
            }
        };

        let forward = async {
            let mut forwarded = 0usize;
            let mut saw_end = false;
            while let Some(event) = event_rx.recv().await {
                forwarded += 1;
                saw_end |= event.is_end();
                if tx.send(Action::Stream { request, event }).is_err() {
                    warn!("Failed to forward event for request {}: receiver dropped", request);
                    break;
                }
            }
            debug!("Request {} forwarded {} events", request, forwarded);
            saw_end
        };

        let (result, saw_end) = tokio::join!(stream, forward);

        let terminal = match result {
            Err(error) => {
                info!("Request {} failed: {}", request, error);
                Some(Action::StreamFailed { request, error })
            }
            Ok(()) if !saw_end => {
                debug!("Request {} finished without an end event, synthesizing one", request);
                Some(Action::Stream {
                    request,
                    event: StreamEvent::End,
                })
            }
            Ok(()) => None,
        };
        if let Some(action) = terminal
            && tx.send(action).is_err()
        {
            warn!("Failed to send terminal action for request {}: receiver dropped", request);
        }
    });

    handle.abort_handle()
}

/// Build a provider from a resolved config's provider choice and credentials.
pub fn build_provider(
    config: &ResolvedConfig,
    registry: Arc<ToolRegistry>,
) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
    match config.provider {
        Provider::OpenAi => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                ProviderError::Config(
                    "OpenAI API key must be set (config file, OPENAI_API_KEY env var, or --provider route)"
                        .to_string(),
                )
            })?;
            let model = Arc::new(OpenAiProvider::new(
                api_key,
                Some(config.openai_base_url.clone()),
            ));
            Ok(Arc::new(ChatRoute::new(model, registry)))
        }
        Provider::Route => Ok(Arc::new(DataStreamProvider::new(config.route_url.clone()))),
    }
}

/// Builds a ready-to-run [`App`] from the resolved config.
pub fn build_app(config: &ResolvedConfig) -> Result<App, ProviderError> {
    let registry = Arc::new(default_registry(config.weather_delay));
    let provider = build_provider(config, registry.clone())?;
    Ok(App::from_config(provider, registry, config))
}
