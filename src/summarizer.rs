use crate::error::ReducerResult;
use crate::types::Message;

/// Default instruction handed to the summarizer with each checkpoint.
pub const DEFAULT_SUMMARIZATION_INSTRUCTIONS: &str = "\
Provide a concise and complete summarization of the entire dialog that does not exceed 5 sentences.

This summary must always:
- Consider both user and assistant interactions
- Maintain continuity for the purpose of further dialog
- Include details from any existing summary
- Focus on the most significant aspects of the dialog

This summary must never:
- Critique, correct, interpret, presume, or assume
- Identify faults, mistakes, misunderstanding, or correctness
- Analyze what has not occurred
- Exclude details from any existing summary";

/// The external summarization collaborator — the reducer's only outward
/// boundary.
///
/// Given an ordered slice of messages and an instruction, produce zero or one
/// summary message (assistant role). `settings` is a caller-supplied execution
/// configuration the reducer passes through without interpreting; `Value::Null`
/// when the caller supplied none.
///
/// Returning `Ok(None)` means "no summary available" and aborts the checkpoint
/// without error; returning `Err` marks the checkpoint as failed.
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        messages: &[Message],
        instructions: &str,
        settings: &serde_json::Value,
    ) -> ReducerResult<Option<Message>>;
}
