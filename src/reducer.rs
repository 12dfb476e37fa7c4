//! Double-buffered context-window reduction.
//!
//! The reducer owns an append-only message log (the active buffer). A caller
//! drives it cooperatively: append messages, then call [`reduce`] after each
//! turn. When the log crosses the checkpoint threshold, a background task
//! summarizes the older half into a single tagged message and assembles a
//! candidate replacement log (the back buffer). When the log crosses the swap
//! threshold, the back buffer atomically replaces the active buffer. Callers
//! are never blocked by summarization except at swap time, where waiting is
//! bounded by a timeout and degrades to a synchronous checkpoint attempt.
//!
//! [`reduce`]: DoubleBufferReducer::reduce

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::boundary::{safe_cut_index, strip_tool_content, summarization_boundary};
use crate::error::{ReducerError, ReducerResult};
use crate::log::MessageLog;
use crate::summarizer::{Summarizer, DEFAULT_SUMMARIZATION_INSTRUCTIONS};
use crate::types::Message;

// ─── Configuration ──────────────────────────────────────────────────────────

/// What to do when `max_generations` nested summaries have accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenewalPolicy {
    /// Discard every summary message, keep originals.
    Dump,
    /// Collapse all summaries into one meta-summary; falls back to Dump when
    /// the meta-summarization fails or returns nothing.
    Recurse,
}

/// Construction-time configuration for [`DoubleBufferReducer`].
#[derive(Debug, Clone)]
pub struct ReducerConfig {
    /// Capacity in messages; threshold math is relative to this.
    pub target_count: usize,
    /// No checkpoint runs while the post-boundary message count is at or
    /// below this floor.
    pub threshold_count: usize,
    /// Fraction of `target_count` at which a background checkpoint starts.
    pub checkpoint_threshold: f64,
    /// Fraction of `target_count` at which the back buffer is swapped in.
    /// Must exceed `checkpoint_threshold`.
    pub swap_threshold: f64,
    /// Cap on nested summary generations; `None` = unlimited.
    pub max_generations: Option<u64>,
    pub renewal_policy: RenewalPolicy,
    pub summarization_instructions: String,
    /// When true, a failed checkpoint surfaces as an error from `reduce()`;
    /// when false it is logged and swallowed.
    pub fail_on_error: bool,
    /// When false, tool calls and results are stripped from the summarizer
    /// input (pair-atomically).
    pub include_function_content_in_summary: bool,
    /// How long the swap path waits for an in-flight checkpoint before
    /// cancelling it.
    pub checkpoint_timeout: Duration,
    /// Opaque execution settings handed to the summarizer untouched.
    pub execution_settings: serde_json::Value,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            target_count: 40,
            threshold_count: 0,
            checkpoint_threshold: 0.7,
            swap_threshold: 0.95,
            max_generations: None,
            renewal_policy: RenewalPolicy::Recurse,
            summarization_instructions: DEFAULT_SUMMARIZATION_INSTRUCTIONS.into(),
            fail_on_error: true,
            include_function_content_in_summary: false,
            checkpoint_timeout: Duration::from_secs(120),
            execution_settings: serde_json::Value::Null,
        }
    }
}

impl ReducerConfig {
    pub fn new(target_count: usize) -> Self {
        Self {
            target_count,
            ..Default::default()
        }
    }

    fn validate(&self) -> ReducerResult<()> {
        if self.target_count == 0 {
            return Err(ReducerError::Config("target_count must be positive".into()));
        }
        if self.checkpoint_threshold <= 0.0 || self.checkpoint_threshold > 1.0 {
            return Err(ReducerError::Config(format!(
                "checkpoint_threshold must be in (0, 1], got {}",
                self.checkpoint_threshold
            )));
        }
        if self.swap_threshold <= 0.0 || self.swap_threshold > 1.0 {
            return Err(ReducerError::Config(format!(
                "swap_threshold must be in (0, 1], got {}",
                self.swap_threshold
            )));
        }
        if self.swap_threshold <= self.checkpoint_threshold {
            return Err(ReducerError::Config(format!(
                "swap_threshold ({}) must exceed checkpoint_threshold ({})",
                self.swap_threshold, self.checkpoint_threshold
            )));
        }
        Ok(())
    }

    /// Message count at which a background checkpoint starts
    pub fn checkpoint_trigger(&self) -> usize {
        (self.target_count as f64 * self.checkpoint_threshold) as usize
    }

    /// Message count at which the swap controller runs
    pub fn swap_trigger(&self) -> usize {
        (self.target_count as f64 * self.swap_threshold) as usize
    }
}

// ─── Outcomes & Events ──────────────────────────────────────────────────────

/// What a call to [`DoubleBufferReducer::reduce`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOutcome {
    /// Below every threshold; nothing happened.
    Unchanged,
    /// A background checkpoint task was spawned.
    CheckpointStarted,
    /// The back buffer replaced the active buffer.
    Swapped,
    /// The swap threshold was reached but no back buffer could be produced;
    /// the history stays unreduced.
    ContinuedUnreduced,
}

/// Result of one checkpoint attempt (background or inline).
#[derive(Debug)]
pub enum CheckpointOutcome {
    /// A back buffer was published; `summarized` messages were folded into
    /// the new summary.
    Created { summarized: usize },
    /// Nothing to do yet (too few messages, no safe cut, or the summarizer
    /// returned no result).
    Skipped,
    Failed(ReducerError),
}

/// Events emitted during reduction when an event channel is installed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReducerEvent {
    CheckpointStarted {
        log_len: usize,
    },
    CheckpointPublished {
        back_buffer_len: usize,
        summarized: usize,
    },
    CheckpointSkipped,
    CheckpointFailed {
        message: String,
    },
    Swapped {
        generation: u64,
        messages_after: usize,
    },
    SwapTimeout,
    RenewalPerformed {
        policy: RenewalPolicy,
        dropped_summaries: usize,
    },
}

// ─── Checkpoint Engine ──────────────────────────────────────────────────────

/// Everything a checkpoint needs, moved into the background task.
struct CheckpointEngine {
    shared: Arc<Mutex<MessageLog>>,
    summarizer: Arc<dyn Summarizer>,
    config: Arc<ReducerConfig>,
    events: Option<mpsc::UnboundedSender<ReducerEvent>>,
}

impl CheckpointEngine {
    fn emit(&self, event: ReducerEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// One checkpoint attempt. Never mutates the active buffer (renewal
    /// aside); its only publication is the back buffer, so cancelling the
    /// surrounding task cannot tear the log.
    async fn run(&self) -> CheckpointOutcome {
        if let Some(max) = self.config.max_generations {
            let due = self.shared.lock().await.generation() >= max;
            if due {
                self.renew().await;
            }
        }

        let (snapshot, generation) = {
            let log = self.shared.lock().await;
            (log.snapshot(), log.generation())
        };

        let boundary = summarization_boundary(&snapshot);
        let post_boundary = snapshot.len() - boundary;
        if post_boundary <= self.config.threshold_count {
            self.emit(ReducerEvent::CheckpointSkipped);
            return CheckpointOutcome::Skipped;
        }

        let keep_count = std::cmp::max(1, post_boundary / 2);
        let cut = match safe_cut_index(&snapshot, boundary, keep_count) {
            Some(cut) => cut,
            None => {
                debug!("no safe cut index; skipping checkpoint");
                self.emit(ReducerEvent::CheckpointSkipped);
                return CheckpointOutcome::Skipped;
            }
        };

        let material = if self.config.include_function_content_in_summary {
            snapshot[boundary..cut].to_vec()
        } else {
            strip_tool_content(&snapshot[boundary..cut])
        };
        if material.is_empty() {
            self.emit(ReducerEvent::CheckpointSkipped);
            return CheckpointOutcome::Skipped;
        }

        let summary = match self
            .summarizer
            .summarize(
                &material,
                &self.config.summarization_instructions,
                &self.config.execution_settings,
            )
            .await
        {
            Ok(Some(summary)) => summary,
            Ok(None) => {
                debug!("summarizer returned no result; skipping checkpoint");
                self.emit(ReducerEvent::CheckpointSkipped);
                return CheckpointOutcome::Skipped;
            }
            Err(err) => {
                self.emit(ReducerEvent::CheckpointFailed {
                    message: err.to_string(),
                });
                return CheckpointOutcome::Failed(err);
            }
        };

        let summary = summary.into_summary(generation + 1);
        let summarized = cut - boundary;

        let mut log = self.shared.lock().await;
        let mut back = Vec::with_capacity(snapshot.len() - summarized + 1);
        back.extend_from_slice(&snapshot[..boundary]);
        back.push(summary);
        back.extend_from_slice(&snapshot[cut..]);
        // Messages appended while the summarizer ran went only to the active
        // buffer; fold them in before the candidate becomes visible.
        back.extend_from_slice(log.active().get(snapshot.len()..).unwrap_or(&[]));
        let back_buffer_len = back.len();
        log.publish_back(back);
        drop(log);

        debug!(back_buffer_len, summarized, "published back buffer");
        self.emit(ReducerEvent::CheckpointPublished {
            back_buffer_len,
            summarized,
        });
        CheckpointOutcome::Created { summarized }
    }

    /// Bound summary-of-summary accumulation: dump or meta-summarize every
    /// summary message and reset the generation counter.
    async fn renew(&self) {
        let policy = self.config.renewal_policy;
        let summaries: Vec<Message> = {
            let log = self.shared.lock().await;
            log.active().iter().filter(|m| m.is_summary()).cloned().collect()
        };
        if summaries.is_empty() {
            self.shared.lock().await.reset_generation();
            return;
        }

        let meta = match policy {
            RenewalPolicy::Dump => None,
            RenewalPolicy::Recurse => {
                match self
                    .summarizer
                    .summarize(
                        &summaries,
                        &self.config.summarization_instructions,
                        &self.config.execution_settings,
                    )
                    .await
                {
                    Ok(Some(meta)) => Some(meta.into_summary(0)),
                    Ok(None) => {
                        warn!("meta-summarization returned no result; dumping summaries");
                        None
                    }
                    Err(err) => {
                        warn!("meta-summarization failed; dumping summaries: {err}");
                        None
                    }
                }
            }
        };

        let mut log = self.shared.lock().await;
        let dropped_summaries = log.active().iter().filter(|m| m.is_summary()).count();
        let mut renewed: Vec<Message> = Vec::with_capacity(log.len());
        if let Some(meta) = meta {
            renewed.push(meta);
        }
        renewed.extend(log.active().iter().filter(|m| !m.is_summary()).cloned());
        log.replace(renewed);
        log.reset_generation();
        drop(log);

        info!(?policy, dropped_summaries, "renewed history, generation reset");
        self.emit(ReducerEvent::RenewalPerformed {
            policy,
            dropped_summaries,
        });
    }
}

// ─── Reducer ────────────────────────────────────────────────────────────────

/// Non-blocking, checkpoint-based compaction for a growing chat history.
///
/// Single-owner discipline: all mutating entry points take `&mut self`, and
/// the only spawned unit of work is the one checkpoint task, guarded by a
/// compare-and-swap flag so at most one is ever in flight.
pub struct DoubleBufferReducer {
    config: Arc<ReducerConfig>,
    shared: Arc<Mutex<MessageLog>>,
    summarizer: Arc<dyn Summarizer>,
    checkpoint_in_progress: Arc<AtomicBool>,
    checkpoint: Option<JoinHandle<CheckpointOutcome>>,
    events: Option<mpsc::UnboundedSender<ReducerEvent>>,
}

impl DoubleBufferReducer {
    pub fn new(config: ReducerConfig, summarizer: Arc<dyn Summarizer>) -> ReducerResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            shared: Arc::new(Mutex::new(MessageLog::new())),
            summarizer,
            checkpoint_in_progress: Arc::new(AtomicBool::new(false)),
            checkpoint: None,
            events: None,
        })
    }

    /// Install an event channel; send failures are ignored.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<ReducerEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Append a message to the history (mirrored into the back buffer while
    /// one exists).
    pub async fn append(&self, message: Message) {
        self.shared.lock().await.append(message);
    }

    /// Point-in-time copy of the active history.
    pub async fn messages(&self) -> Vec<Message> {
        self.shared.lock().await.snapshot()
    }

    pub async fn len(&self) -> usize {
        self.shared.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.shared.lock().await.is_empty()
    }

    pub async fn has_back_buffer(&self) -> bool {
        self.shared.lock().await.has_back_buffer()
    }

    /// Point-in-time copy of the back buffer, if one is published.
    pub async fn back_buffer(&self) -> Option<Vec<Message>> {
        self.shared.lock().await.back().map(|b| b.to_vec())
    }

    pub async fn current_generation(&self) -> u64 {
        self.shared.lock().await.generation()
    }

    pub fn checkpoint_in_progress(&self) -> bool {
        self.checkpoint_in_progress.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &ReducerConfig {
        &self.config
    }

    /// Periodic reduction check; call after appends (or on a timer).
    ///
    /// The only error this ever returns is
    /// [`ReducerError::CheckpointFailed`] under `fail_on_error = true`; every
    /// other condition degrades gracefully.
    pub async fn reduce(&mut self) -> ReducerResult<ReduceOutcome> {
        self.reap_finished_checkpoint().await?;

        let len = self.shared.lock().await.len();
        if len >= self.config.swap_trigger() {
            return self.run_swap().await;
        }
        if len >= self.config.checkpoint_trigger() {
            return self.maybe_start_checkpoint(len).await;
        }
        Ok(ReduceOutcome::Unchanged)
    }

    /// Join the in-flight checkpoint task, if any, and report its outcome.
    /// A failed checkpoint propagates per `fail_on_error`.
    pub async fn wait_for_checkpoint(&mut self) -> ReducerResult<CheckpointOutcome> {
        match self.checkpoint.take() {
            None => Ok(CheckpointOutcome::Skipped),
            Some(handle) => match handle.await {
                Ok(outcome) => self.absorb_outcome(outcome),
                Err(err) => {
                    warn!("checkpoint task aborted or panicked: {err}");
                    self.checkpoint_in_progress.store(false, Ordering::Release);
                    Ok(CheckpointOutcome::Skipped)
                }
            },
        }
    }

    fn emit(&self, event: ReducerEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn engine(&self) -> CheckpointEngine {
        CheckpointEngine {
            shared: self.shared.clone(),
            summarizer: self.summarizer.clone(),
            config: self.config.clone(),
            events: self.events.clone(),
        }
    }

    /// Spawn a background checkpoint unless one is in flight or a back
    /// buffer already exists.
    async fn maybe_start_checkpoint(&mut self, len: usize) -> ReducerResult<ReduceOutcome> {
        if self.shared.lock().await.has_back_buffer() {
            return Ok(ReduceOutcome::Unchanged);
        }
        if self
            .checkpoint_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(ReduceOutcome::Unchanged);
        }

        debug!(log_len = len, "starting background checkpoint");
        self.emit(ReducerEvent::CheckpointStarted { log_len: len });

        let engine = self.engine();
        let in_progress = self.checkpoint_in_progress.clone();
        self.checkpoint = Some(tokio::spawn(async move {
            let outcome = engine.run().await;
            in_progress.store(false, Ordering::Release);
            outcome
        }));
        Ok(ReduceOutcome::CheckpointStarted)
    }

    /// Swap path: wait (bounded) for the in-flight checkpoint, swap if a back
    /// buffer is available, otherwise fall back to an inline checkpoint.
    async fn run_swap(&mut self) -> ReducerResult<ReduceOutcome> {
        if let Some(mut handle) = self.checkpoint.take() {
            match tokio::time::timeout(self.config.checkpoint_timeout, &mut handle).await {
                Ok(Ok(outcome)) => {
                    self.absorb_outcome(outcome)?;
                }
                Ok(Err(err)) => {
                    warn!("checkpoint task aborted or panicked: {err}");
                    self.checkpoint_in_progress.store(false, Ordering::Release);
                }
                Err(_) => {
                    warn!(
                        timeout_ms = self.config.checkpoint_timeout.as_millis() as u64,
                        "checkpoint did not finish before swap; cancelling it"
                    );
                    handle.abort();
                    self.checkpoint_in_progress.store(false, Ordering::Release);
                    self.emit(ReducerEvent::SwapTimeout);
                }
            }
        }

        if let Some(outcome) = self.swap_if_ready().await {
            return Ok(outcome);
        }

        // Stop-the-world fallback: run the checkpoint inline.
        debug!("no back buffer at swap time; running synchronous checkpoint");
        let outcome = self.engine().run().await;
        self.absorb_outcome(outcome)?;

        if let Some(outcome) = self.swap_if_ready().await {
            return Ok(outcome);
        }
        warn!("swap threshold reached but no back buffer available; continuing unreduced");
        Ok(ReduceOutcome::ContinuedUnreduced)
    }

    async fn swap_if_ready(&self) -> Option<ReduceOutcome> {
        let mut log = self.shared.lock().await;
        if log.swap() {
            let generation = log.generation();
            let messages_after = log.len();
            drop(log);
            info!(generation, messages_after, "swapped back buffer into active history");
            self.emit(ReducerEvent::Swapped {
                generation,
                messages_after,
            });
            Some(ReduceOutcome::Swapped)
        } else {
            None
        }
    }

    /// Collect a finished background checkpoint so its failure (if any)
    /// surfaces on the next call into the reducer.
    async fn reap_finished_checkpoint(&mut self) -> ReducerResult<()> {
        let finished = self
            .checkpoint
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(false);
        if !finished {
            return Ok(());
        }
        if let Some(handle) = self.checkpoint.take() {
            match handle.await {
                Ok(outcome) => {
                    self.absorb_outcome(outcome)?;
                }
                Err(err) => {
                    warn!("checkpoint task aborted or panicked: {err}");
                    self.checkpoint_in_progress.store(false, Ordering::Release);
                }
            }
        }
        Ok(())
    }

    /// Apply the failure policy to a checkpoint outcome.
    fn absorb_outcome(&self, outcome: CheckpointOutcome) -> ReducerResult<CheckpointOutcome> {
        if let CheckpointOutcome::Failed(err) = outcome {
            if self.config.fail_on_error {
                return Err(ReducerError::CheckpointFailed(Box::new(err)));
            }
            warn!("checkpoint failed, continuing with unreduced history: {err}");
            return Ok(CheckpointOutcome::Failed(err));
        }
        Ok(outcome)
    }
}
