//! Bounded conversation memory, scoped per session.
//!
//! Each session keeps an ordered deque of question/answer turns. Appending
//! past the configured bound evicts the oldest turns first; eviction never
//! reorders what remains. Memory lives for the process lifetime only.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// One question/answer exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

/// Ordered, bounded turn history for one session.
///
/// State machine: empty → active on first append, back to empty on
/// [`clear`](Self::clear); no other transitions.
#[derive(Debug)]
pub struct ConversationMemory {
    turns: VecDeque<Turn>,
    max_turns: usize,
}

impl ConversationMemory {
    /// Create an empty memory bounded to `max_turns` retained turns.
    #[must_use]
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_turns.min(64)),
            max_turns,
        }
    }

    /// Append a completed turn, evicting the oldest turns past the bound.
    pub fn append(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push_back(Turn {
            question: question.into(),
            answer: answer.into(),
        });
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }

    /// The retained turns, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    /// Number of retained turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// `true` when no turns are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Remove all turns. Idempotent.
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// Per-session memories behind per-session locks.
///
/// Concurrent calls within the same session serialize on that session's lock,
/// preserving turn order; different sessions never contend.
pub struct SessionStore {
    max_turns: usize,
    sessions: Mutex<FxHashMap<String, Arc<Mutex<ConversationMemory>>>>,
}

impl SessionStore {
    /// Create a store whose sessions retain at most `max_turns` turns.
    #[must_use]
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns,
            sessions: Mutex::new(FxHashMap::default()),
        }
    }

    /// The memory for `session_id`, created empty on first use.
    pub fn session(&self, session_id: &str) -> Arc<Mutex<ConversationMemory>> {
        let mut sessions = self.sessions.lock();
        sessions
            .entry(session_id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(ConversationMemory::new(self.max_turns))))
            .clone()
    }

    /// Clear the memory of `session_id`. A no-op for unknown sessions.
    pub fn reset(&self, session_id: &str) {
        let memory = {
            let sessions = self.sessions.lock();
            sessions.get(session_id).cloned()
        };
        if let Some(memory) = memory {
            memory.lock().clear();
            tracing::info!(session = session_id, "conversation history cleared");
        }
    }

    /// Number of sessions seen so far.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}
