use std::collections::BTreeSet;

use nb_core::{Category, Message, Role, Tokenizer};
use uuid::Uuid;

pub const SYSTEM_PROMPT: &str = "You are helpful assistant with news articles.";

/// Conversation state for one process lifetime. Owned by the caller and handed to
/// every turn by `&mut`.
#[derive(Debug, Clone)]
pub struct SessionState {
    id: Uuid,
    used_categories: BTreeSet<Category>,
    history: Vec<Message>,
    token_total: u64,
}

/// Restore point taken before a turn starts mutating the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    history_len: usize,
    token_total: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::with_system_prompt(SYSTEM_PROMPT)
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            used_categories: BTreeSet::new(),
            history: vec![Message::system(prompt)],
            token_total: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn used_categories(&self) -> &BTreeSet<Category> {
        &self.used_categories
    }

    pub fn is_used(&self, category: Category) -> bool {
        self.used_categories.contains(&category)
    }

    pub fn token_total(&self) -> u64 {
        self.token_total
    }

    pub fn push(&mut self, message: Message) {
        self.history.push(message);
    }

    pub fn append_turn(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.history.push(Message::user(user));
        self.history.push(Message::assistant(assistant));
    }

    /// Units across the whole stored history, as counted by `tokenizer`.
    pub fn total_tokens(&self, tokenizer: &dyn Tokenizer) -> usize {
        self.history.iter().map(|m| tokenizer.count(&m.content)).sum()
    }

    pub fn mark_used<I: IntoIterator<Item = Category>>(&mut self, categories: I) {
        self.used_categories.extend(categories);
    }

    pub fn record_tokens(&mut self, tokens: u64) {
        self.token_total = self.token_total.saturating_add(tokens);
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            history_len: self.history.len(),
            token_total: self.token_total,
        }
    }

    /// Drops everything pushed and recorded since `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.history.truncate(checkpoint.history_len.max(1));
        self.token_total = checkpoint.token_total;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// How much history accompanies a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryWindow {
    /// The system message plus the `n` most recent messages.
    Last(usize),
    Unbounded,
}

impl Default for HistoryWindow {
    fn default() -> Self {
        HistoryWindow::Last(40)
    }
}

impl HistoryWindow {
    /// `0` means no limit.
    pub fn from_limit(limit: usize) -> Self {
        if limit == 0 {
            HistoryWindow::Unbounded
        } else {
            HistoryWindow::Last(limit)
        }
    }

    /// The slice of `history` to send. Messages from `turn_start` on belong to the
    /// current turn and are always included, even past the limit.
    pub fn select(&self, history: &[Message], turn_start: usize) -> Vec<Message> {
        let limit = match self {
            HistoryWindow::Unbounded => return history.to_vec(),
            HistoryWindow::Last(limit) => *limit,
        };

        let body_start = match history.first() {
            Some(message) if message.role == Role::System => 1,
            _ => 0,
        };
        let tail_start = history
            .len()
            .saturating_sub(limit)
            .min(turn_start)
            .max(body_start);

        history[..body_start]
            .iter()
            .chain(&history[tail_start..])
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nb_core::WordCounter;

    fn contents(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn test_new_session_is_seeded() {
        let session = SessionState::new();
        assert_eq!(session.history(), &[Message::system(SYSTEM_PROMPT)]);
        assert!(session.used_categories().is_empty());
        assert_eq!(session.token_total(), 0);
        assert_ne!(session.id(), SessionState::new().id());
    }

    #[test]
    fn test_append_and_count() {
        let mut session = SessionState::with_system_prompt("be brief");
        session.append_turn("what happened in sports", "nothing much");
        assert_eq!(contents(session.history()), vec!["be brief", "what happened in sports", "nothing much"]);
        assert_eq!(session.history()[1].role, Role::User);
        assert_eq!(session.history()[2].role, Role::Assistant);
        assert_eq!(session.total_tokens(&WordCounter), 8);
    }

    #[test]
    fn test_mark_used_accumulates() {
        let mut session = SessionState::new();
        session.mark_used([Category::Sports]);
        session.mark_used(vec![Category::Business, Category::Sports]);
        assert!(session.is_used(Category::Business));
        assert_eq!(session.used_categories().len(), 2);
    }

    #[test]
    fn test_rollback_restores_history_and_tokens() {
        let mut session = SessionState::new();
        session.append_turn("q1", "a1");
        session.record_tokens(10);
        let checkpoint = session.checkpoint();

        session.push(Message::user("q2 chunk 1"));
        session.push(Message::user("q2 chunk 2"));
        session.record_tokens(25);
        session.rollback(checkpoint);

        assert_eq!(session.history().len(), 3);
        assert_eq!(session.token_total(), 10);
    }

    #[test]
    fn test_window_keeps_system_and_tail() {
        let mut session = SessionState::new();
        for i in 0..5 {
            session.append_turn(format!("q{}", i), format!("a{}", i));
        }
        let history = session.history();
        let window = HistoryWindow::Last(3).select(history, history.len());
        assert_eq!(contents(&window), vec![SYSTEM_PROMPT, "a3", "q4", "a4"]);

        let everything = HistoryWindow::Unbounded.select(history, history.len());
        assert_eq!(everything.len(), 11);
    }

    #[test]
    fn test_window_never_splits_current_turn() {
        let mut session = SessionState::new();
        session.append_turn("q0", "a0");
        let turn_start = session.history().len();
        for i in 0..4 {
            session.push(Message::user(format!("chunk {}", i)));
        }
        let window = HistoryWindow::Last(2).select(session.history(), turn_start);
        assert_eq!(contents(&window), vec![SYSTEM_PROMPT, "chunk 0", "chunk 1", "chunk 2", "chunk 3"]);
    }

    #[test]
    fn test_window_larger_than_history() {
        let session = SessionState::new();
        let window = HistoryWindow::default().select(session.history(), 1);
        assert_eq!(contents(&window), vec![SYSTEM_PROMPT]);
        assert_eq!(HistoryWindow::from_limit(0), HistoryWindow::Unbounded);
        assert_eq!(HistoryWindow::from_limit(40), HistoryWindow::default());
    }
}
