//! # Core Application Logic
//!
//! This module contains Ara's business logic.
//! It knows nothing about any specific front-end technology.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • Transcript (turns)   │
//!                    │  • State (app data)     │
//!                    │  • Action (events)      │
//!                    │  • update() (reducer)   │
//!                    │                         │
//!                    │  No network. No UI.     │
//!                    └───────────┬─────────────┘
//!                                │
//!                    ┌───────────┴───────────┐
//!                    ▼                       ▼
//!             ┌────────────┐          ┌────────────┐
//!             │ Controller │          │    CLI     │
//!             │  (tokio    │          │  (line     │
//!             │   tasks)   │          │   REPL)    │
//!             └────────────┘          └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`transcript`]: `TranscriptStore`, the ordered turns and their mutation contract
//! - [`state`]: The `App` struct, all session state in one place
//! - [`action`]: The `Action` enum and the `update()` reducer
//! - [`tools`]: Typed tools and the registry that dispatches them
//! - [`config`]: `~/.ara/config.toml` loading and resolution
//! - [`persona`]: The system instruction

pub mod action;
pub mod config;
pub mod persona;
pub mod state;
pub mod tools;
pub mod transcript;
