use crate::types::Message;

/// Owns the canonical conversation history (the active buffer) plus the
/// optional compaction candidate (the back buffer).
///
/// The log itself is not synchronized; the reducer keeps it behind a single
/// mutex and never holds that lock across a suspension point. Insertion order
/// is significant and never reordered — the only whole-buffer mutations are
/// [`replace`](Self::replace) and [`swap`](Self::swap).
#[derive(Debug, Default)]
pub struct MessageLog {
    active: Vec<Message>,
    back: Option<Vec<Message>>,
    generation: u64,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the active buffer. While a back buffer exists the message is
    /// mirrored into it, so nothing appended mid-checkpoint is lost at swap
    /// time.
    pub fn append(&mut self, message: Message) {
        if let Some(back) = self.back.as_mut() {
            back.push(message.clone());
        }
        self.active.push(message);
    }

    /// Point-in-time copy of the active buffer. The checkpoint engine works
    /// from this copy and tolerates the live buffer growing afterwards.
    pub fn snapshot(&self) -> Vec<Message> {
        self.active.clone()
    }

    /// Atomic replacement of the active buffer. Used only by swap and
    /// renewal.
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.active = messages;
    }

    /// Publish a candidate back buffer. Any earlier candidate is discarded.
    pub fn publish_back(&mut self, messages: Vec<Message>) {
        self.back = Some(messages);
    }

    /// Promote the back buffer to be the active buffer, bumping the
    /// generation. Returns false when no back buffer exists.
    pub fn swap(&mut self) -> bool {
        match self.back.take() {
            Some(back) => {
                self.active = back;
                self.generation += 1;
                true
            }
            None => false,
        }
    }

    /// Reset the generation counter (renewal).
    pub fn reset_generation(&mut self) {
        self.generation = 0;
    }

    pub fn active(&self) -> &[Message] {
        &self.active
    }

    pub fn back(&self) -> Option<&[Message]> {
        self.back.as_deref()
    }

    pub fn has_back_buffer(&self) -> bool {
        self.back.is_some()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
