//! Rolling context window: the bounded history sent to the LLM for grounding.
//!
//! Truncation is purely positional: once the cap is exceeded the oldest
//! entries are dropped first. Content is never inspected. The system prompt
//! is not stored here; the relay prepends it fresh on every call.

use tracing::{debug, trace};

use super::message::Message;
use crate::llm::Role;

/// Default number of non-system messages kept.
pub const DEFAULT_CONTEXT_CAP: usize = 8;

#[derive(Debug, Clone)]
pub struct ContextWindow {
    cap: usize,
    messages: Vec<Message>,
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_CAP)
    }
}

impl ContextWindow {
    /// A cap of zero is raised to one so the latest message always survives.
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self { cap, messages: Vec::with_capacity(cap + 1) }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Add `message` at the tail and evict from the head until `len <= cap`.
    ///
    /// System messages are ignored.
    pub fn append(&mut self, message: Message) -> &mut Self {
        if message.role() == Role::System {
            debug!("context window ignores system messages");
            return self;
        }
        self.messages.push(message);
        let excess = self.messages.len().saturating_sub(self.cap);
        if excess > 0 {
            self.messages.drain(..excess);
            trace!(evicted = excess, cap = self.cap, "context window truncated");
        }
        self
    }

    /// The current capped view, oldest first.
    pub fn windowed(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
