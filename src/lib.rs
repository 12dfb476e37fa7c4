//! # backbuffer
//!
//! Double-buffered context-window reduction for LLM chat histories —
//! non-blocking checkpoint summarization with atomic buffer swap, inspired by
//! graphics double-buffering and WAL checkpoint replay.
//!
//! ## How it works
//!
//! The conversation lives in an append-only **active buffer**. As it grows,
//! a periodic [`reduce()`](DoubleBufferReducer::reduce) check drives two
//! thresholds relative to a target message count:
//!
//! - **Checkpoint** (default 70%): a background task snapshots the log,
//!   summarizes the older half into one tagged message, and publishes a
//!   candidate **back buffer** (carried summaries + new summary + recent
//!   tail). Messages appended meanwhile are mirrored into both buffers.
//! - **Swap** (default 95%): the back buffer atomically replaces the active
//!   buffer. If the checkpoint is still running, the swap waits up to a
//!   timeout, then cancels it and falls back to an inline checkpoint; in the
//!   worst case the conversation simply continues unreduced.
//!
//! Nested summary-of-summary generations are bounded by an optional renewal
//! policy: dump every summary, or collapse them into one meta-summary.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use backbuffer::{
//!     DoubleBufferReducer, Message, ReducerConfig, ReducerResult, Summarizer,
//! };
//!
//! struct HeadlineSummarizer;
//!
//! #[async_trait::async_trait]
//! impl Summarizer for HeadlineSummarizer {
//!     async fn summarize(
//!         &self,
//!         messages: &[Message],
//!         _instructions: &str,
//!         _settings: &serde_json::Value,
//!     ) -> ReducerResult<Option<Message>> {
//!         // A real implementation calls a text-generation service here.
//!         Ok(Some(Message::assistant(format!(
//!             "[{} earlier messages]",
//!             messages.len()
//!         ))))
//!     }
//! }
//!
//! # async fn demo() -> ReducerResult<()> {
//! let config = ReducerConfig::new(40);
//! let mut reducer = DoubleBufferReducer::new(config, Arc::new(HeadlineSummarizer))?;
//!
//! reducer.append(Message::user("Explain Rust async")).await;
//! reducer.append(Message::assistant("Rust async uses tokio...")).await;
//! reducer.reduce().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`types`] | `Message`, `Role`, `ContentBlock`, reserved summary metadata |
//! | [`log`] | `MessageLog`: active buffer, back buffer, mirrored writes |
//! | [`summarizer`] | `Summarizer` trait — the external collaborator boundary |
//! | [`reducer`] | configuration, checkpoint engine, swap controller, renewal |
//! | [`error`] | `ReducerError` with thiserror |

mod boundary;
pub mod error;
pub mod log;
pub mod reducer;
pub mod summarizer;
pub mod types;

pub use error::{ReducerError, ReducerResult};
pub use log::MessageLog;
pub use reducer::{
    CheckpointOutcome, DoubleBufferReducer, ReduceOutcome, ReducerConfig, ReducerEvent,
    RenewalPolicy,
};
pub use summarizer::{Summarizer, DEFAULT_SUMMARIZATION_INSTRUCTIONS};
pub use types::*;
