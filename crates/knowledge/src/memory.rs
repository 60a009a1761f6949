//! Bounded conversation log.

use std::collections::VecDeque;

use chrono::Utc;

use crate::types::{ConversationTurn, Role};

/// Turns included when rendering prompt context.
pub const CONTEXT_TURNS: usize = 6;

/// Characters kept from each turn when rendering prompt context.
pub const CONTEXT_TURN_CHARS: usize = 200;

/// FIFO log holding at most `2 * max_history_turns` turns.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
}

impl ConversationMemory {
    pub fn new(max_history_turns: usize) -> Self {
        let capacity = max_history_turns.saturating_mul(2).max(1);
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Push a timestamped turn, evicting the oldest beyond capacity.
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push_back(ConversationTurn {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
        while self.turns.len() > self.capacity {
            self.turns.pop_front();
        }
    }

    /// Append a user question and the assistant reply as adjacent turns.
    pub fn append_exchange(&mut self, question: &str, answer: &str) {
        self.append(Role::User, question);
        self.append(Role::Assistant, answer);
    }

    /// Transcript of the last few turns for prompt context; empty if no turns.
    pub fn render_context(&self) -> String {
        if self.turns.is_empty() {
            return String::new();
        }

        let start = self.turns.len().saturating_sub(CONTEXT_TURNS);
        let mut context = String::from("Previous conversation:\n");
        for turn in self.turns.iter().skip(start) {
            let content: String = turn.content.chars().take(CONTEXT_TURN_CHARS).collect();
            context.push_str(turn.role.label());
            context.push_str(": ");
            context.push_str(&content);
            context.push('\n');
        }
        context
    }

    /// Snapshot of all retained turns, oldest first.
    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
