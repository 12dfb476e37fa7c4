//! Cut-point selection for checkpoint summarization.
//!
//! A checkpoint summarizes the range `[boundary, cut)` of a log snapshot and
//! keeps everything from `cut` onward verbatim. The cut may never orphan a
//! tool-call/tool-result pair: a cut index is safe only when every tool call
//! before it has its result before it. When a candidate cut is unsafe the
//! kept tail is extended leftward one message at a time until a safe index is
//! found or the boundary is reached (in which case the checkpoint is skipped).

use std::collections::HashSet;

use crate::types::Message;

/// Index of the first non-summary message.
///
/// Leading summaries are carried forward verbatim and never re-summarized by
/// an ordinary checkpoint. If every message is already a summary the boundary
/// falls back to 0, so the whole log becomes summarizable again.
pub(crate) fn summarization_boundary(messages: &[Message]) -> usize {
    messages
        .iter()
        .position(|m| !m.is_summary())
        .unwrap_or(0)
}

/// Find the cut index for a checkpoint over `messages`.
///
/// Starts from `len - keep_count` and walks left past any index that would
/// split a tool-call/tool-result pair. Returns `None` when no index strictly
/// above `boundary` is safe — there is nothing worth summarizing yet.
pub(crate) fn safe_cut_index(
    messages: &[Message],
    boundary: usize,
    keep_count: usize,
) -> Option<usize> {
    let len = messages.len();
    let mut cut = len.saturating_sub(keep_count);
    while cut > boundary && !cut_is_safe(messages, cut) {
        cut -= 1;
    }
    if cut > boundary {
        Some(cut)
    } else {
        None
    }
}

/// A cut is safe when the prefix before it contains no dangling tool call:
/// every call issued in `messages[..cut]` is answered in `messages[..cut]`.
fn cut_is_safe(messages: &[Message], cut: usize) -> bool {
    let mut pending: HashSet<&str> = HashSet::new();
    for msg in &messages[..cut] {
        for id in msg.tool_call_ids() {
            pending.insert(id);
        }
        for id in msg.tool_result_ids() {
            pending.remove(id);
        }
    }
    pending.is_empty()
}

/// Remove tool-call and tool-result content from the summarization input.
///
/// Filtering happens at the block level, so both halves of a call/result pair
/// disappear together; a message left with no content is dropped entirely.
pub(crate) fn strip_tool_content(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .filter_map(|msg| {
            let content: Vec<_> = msg
                .content
                .iter()
                .filter(|block| !block.is_tool_content())
                .cloned()
                .collect();
            if content.is_empty() {
                None
            } else {
                let mut kept = msg.clone();
                kept.content = content;
                Some(kept)
            }
        })
        .collect()
}
