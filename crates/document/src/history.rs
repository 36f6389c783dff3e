use crate::command::{Command, Inverse};

/// One applied command paired with the state that rolls it back.
#[derive(Debug, Clone)]
pub(crate) struct HistoryEntry {
    pub command: Command,
    pub inverse: Inverse,
}

/// Two-stack undo/redo history, strict last-in-first-out.
///
/// Scoped to one document; separate documents keep independent histories.
#[derive(Debug, Default)]
pub struct History {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly applied command, invalidating the redo branch.
    pub(crate) fn push(&mut self, entry: HistoryEntry) {
        self.undo.push(entry);
        self.redo.clear();
    }

    /// Re-populate the undo stack during a redo without touching the
    /// remaining redo entries.
    pub(crate) fn push_undo_only(&mut self, entry: HistoryEntry) {
        self.undo.push(entry);
    }

    pub(crate) fn pop_undo(&mut self) -> Option<HistoryEntry> {
        self.undo.pop()
    }

    pub(crate) fn push_redo(&mut self, entry: HistoryEntry) {
        self.redo.push(entry);
    }

    pub(crate) fn pop_redo(&mut self) -> Option<HistoryEntry> {
        self.redo.pop()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }
}
