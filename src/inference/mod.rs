pub mod provider;
pub mod providers;
pub mod route;
pub mod types;

pub use provider::{CompletionProvider, CompletionRequest, ProviderError};
pub use providers::{DataStreamProvider, OpenAiProvider};
pub use route::ChatRoute;
pub use types::{StreamEvent, ToolDefinition};
