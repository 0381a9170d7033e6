//! Ara library exports for the binary and integration tests

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub mod cli;
pub mod controller;
pub mod core;
pub mod inference;

#[cfg(test)]
pub mod test_support;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Call the OpenAI Responses API directly; tools are resolved in-process.
    #[default]
    #[value(name = "openai")]
    OpenAi,
    /// POST to a chat route that streams the data-stream protocol.
    Route,
}
