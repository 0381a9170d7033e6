//! # Chat Route
//!
//! The server-side half of a chat request. Wraps a model provider, resolves
//! every tool call it emits through the [`ToolRegistry`], and produces the
//! full event grammar: text deltas, tool calls, tool results, end.
//!
//! ```text
//! model provider ──► ChatRoute ──► consumer
//!   TextDelta          forwarded
//!   ToolCall           forwarded, resolution started concurrently
//!                      ToolResult emitted as each resolution finishes
//!   End                held until every started resolution was emitted
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use log::{debug, info};
use tokio::sync::mpsc::{self, Sender};

use crate::core::tools::ToolRegistry;
use crate::inference::provider::emit;
use crate::inference::{CompletionProvider, CompletionRequest, ProviderError, StreamEvent};

pub struct ChatRoute {
    model: Arc<dyn CompletionProvider>,
    registry: Arc<ToolRegistry>,
}

impl ChatRoute {
    pub fn new(model: Arc<dyn CompletionProvider>, registry: Arc<ToolRegistry>) -> Self {
        Self { model, registry }
    }
}

#[async_trait]
impl CompletionProvider for ChatRoute {
    fn name(&self) -> &str {
        self.model.name()
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest<'_>,
        sender: Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        let (model_tx, mut model_rx) = mpsc::channel::<StreamEvent>(100);
        let model = self.model.stream_completion(request, model_tx);
        tokio::pin!(model);

        let mut resolving = FuturesUnordered::new();
        let mut model_done = false;
        let mut model_closed = false;
        let mut saw_end = false;
        let mut failure: Option<ProviderError> = None;

        loop {
            // A failed model forfeits outstanding tool calls once its buffered output is out.
            if failure.is_some() && model_closed {
                break;
            }
            tokio::select! {
                biased;

                event = model_rx.recv(), if !model_closed => match event {
                    Some(StreamEvent::ToolCall { call_id, tool_name, arguments }) => {
                        emit(&sender, StreamEvent::ToolCall {
                            call_id: call_id.clone(),
                            tool_name,
                            arguments: arguments.clone(),
                        })
                        .await?;
                        let registry = self.registry.clone();
                        resolving.push(async move {
                            let payload = registry
                                .execute(tool_name, arguments)
                                .await
                                .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }));
                            (call_id, payload)
                        });
                    }
                    Some(StreamEvent::End) => {
                        debug!("Model finished; {} tool call(s) still resolving", resolving.len());
                        saw_end = true;
                    }
                    Some(event) => emit(&sender, event).await?,
                    None => model_closed = true,
                },
                Some((call_id, payload)) = resolving.next(), if !resolving.is_empty() => {
                    debug!("Tool call resolved: call_id={}", call_id);
                    emit(&sender, StreamEvent::ToolResult { call_id, tool_name: None, payload }).await?;
                }
                result = &mut model, if !model_done => {
                    model_done = true;
                    failure = result.err();
                }
                else => break,
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        if saw_end {
            info!("Route finished: all tool calls resolved");
            emit(&sender, StreamEvent::End).await?;
        }
        Ok(())
    }
}
