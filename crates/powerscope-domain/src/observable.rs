//! Observable record
//!
//! Every entity whose fields are individually observable embeds one
//! [`ChangeRecorder`]. Field assignments append to an in-flight batch; a
//! single [`ChangeRecorder::emit`] flushes the batch as one [`ChangeEvent`] on
//! a broadcast channel and resets it.

use crate::extra::ExtraAttribs;
use crate::range::Range;
use crate::value::FieldValue;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::broadcast;

/// Capacity of each recorder's notification channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Field name → new value for one mutation batch
pub type ChangeRecord = BTreeMap<String, ChangeValue>;

/// New value of a changed field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChangeValue {
    /// Numeric field
    Number(f64),
    /// Flag field
    Flag(bool),
    /// Text field
    Text(String),
    /// Range-valued field
    Range(Range),
    /// Collection-valued field: ordered structural edits
    Collection(Vec<CollectionChange>),
    /// Field was unset
    Cleared,
}

impl From<&FieldValue> for ChangeValue {
    fn from(value: &FieldValue) -> Self {
        match value {
            FieldValue::Flag(v) => ChangeValue::Flag(*v),
            FieldValue::Number(v) => ChangeValue::Number(*v),
            FieldValue::Text(v) => ChangeValue::Text(v.clone()),
        }
    }
}

/// Structural edit of a collection-valued field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionChange {
    /// Element pushed at the end
    Append {
        /// Appended element
        value: ExtraAttribs,
    },
    /// Element removed
    Remove {
        /// Former position
        index: usize,
    },
    /// Element swapped for another
    Replace {
        /// Position
        index: usize,
        /// New element
        value: ExtraAttribs,
    },
    /// Change emitted by the element itself
    Forward {
        /// Position of the emitting element
        index: usize,
        /// The element's own change record
        change: ChangeRecord,
    },
}

/// One batched notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    /// Every field changed in the batch
    pub changes: ChangeRecord,
    /// Set when the batch echoes a solver result rather than a user edit
    pub recalculation: bool,
}

impl ChangeEvent {
    /// Whether this batch came from the user rather than a solver echo
    pub fn is_user_initiated(&self) -> bool {
        !self.recalculation
    }
}

/// Per-field change tracking with a batched notification channel
#[derive(Debug)]
pub struct ChangeRecorder {
    pending: ChangeRecord,
    previous: ChangeRecord,
    suppressed: bool,
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeRecorder {
    /// Create a recorder with an empty batch and no subscribers
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self {
            pending: ChangeRecord::new(),
            previous: ChangeRecord::new(),
            suppressed: false,
            sender,
        }
    }

    /// Subscribe to batched notifications; dropping the receiver unsubscribes
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Append `{field: value}` to the in-flight batch unless suppressed
    pub fn record(&mut self, field: impl Into<String>, value: ChangeValue) {
        if self.suppressed {
            return;
        }
        self.pending.insert(field.into(), value);
    }

    /// Append a structural edit to a collection-valued field
    pub fn record_collection(&mut self, field: impl Into<String>, change: CollectionChange) {
        if self.suppressed {
            return;
        }
        let entry = self
            .pending
            .entry(field.into())
            .or_insert_with(|| ChangeValue::Collection(Vec::new()));
        match entry {
            ChangeValue::Collection(list) => list.push(change),
            other => *other = ChangeValue::Collection(vec![change]),
        }
    }

    /// Stop recording (bulk construction or replacement)
    pub fn suppress(&mut self) {
        self.suppressed = true;
    }

    /// Resume recording
    pub fn resume(&mut self) {
        self.suppressed = false;
    }

    /// Whether recording is currently suppressed
    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// Discard the in-flight batch without notifying
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// In-flight batch
    pub fn pending(&self) -> &ChangeRecord {
        &self.pending
    }

    /// Last batch that was emitted
    pub fn previous(&self) -> &ChangeRecord {
        &self.previous
    }

    /// Flush the batch as one notification
    ///
    /// Returns the emitted event, or `None` when the batch was empty or
    /// recording is suppressed. Having no live subscriber is not an error.
    pub fn emit(&mut self, recalculation: bool) -> Option<ChangeEvent> {
        if self.suppressed || self.pending.is_empty() {
            return None;
        }
        let changes = std::mem::take(&mut self.pending);
        let event = ChangeEvent {
            changes: changes.clone(),
            recalculation,
        };
        self.previous = changes;
        let _ = self.sender.send(event.clone());
        Some(event)
    }
}

impl Default for ChangeRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ChangeRecorder {
    /// A clone is a separate entity: it keeps the batch but gets its own channel
    fn clone(&self) -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self {
            pending: self.pending.clone(),
            previous: self.previous.clone(),
            suppressed: self.suppressed,
            sender,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_notification_per_batch() {
        let mut recorder = ChangeRecorder::new();
        let mut rx = recorder.subscribe();

        recorder.record("alpha", ChangeValue::Number(0.05));
        recorder.record("power", ChangeValue::Number(0.9));
        recorder.record("n", ChangeValue::Number(40.0));
        recorder.emit(false);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.changes.len(), 3);
        assert!(event.changes.contains_key("alpha"));
        assert!(event.changes.contains_key("power"));
        assert!(event.changes.contains_key("n"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_empty_emit_is_noop() {
        let mut recorder = ChangeRecorder::new();
        let mut rx = recorder.subscribe();
        assert!(recorder.emit(false).is_none());

        recorder.record("n", ChangeValue::Number(1.0));
        recorder.emit(false);
        assert!(recorder.emit(false).is_none());

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_suppressed_records_nothing() {
        let mut recorder = ChangeRecorder::new();
        recorder.suppress();
        recorder.record("n", ChangeValue::Number(1.0));
        recorder.resume();
        assert!(recorder.pending().is_empty());
    }

    #[test]
    fn test_clear_discards_batch() {
        let mut recorder = ChangeRecorder::new();
        let mut rx = recorder.subscribe();
        recorder.record("n", ChangeValue::Number(1.0));
        recorder.clear();
        assert!(recorder.emit(false).is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_previous_changes_retained() {
        let mut recorder = ChangeRecorder::new();
        recorder.record("delta", ChangeValue::Number(5.0));
        recorder.emit(true);
        assert!(recorder.previous().contains_key("delta"));
        assert!(recorder.pending().is_empty());
    }

    #[test]
    fn test_collection_changes_accumulate() {
        let mut recorder = ChangeRecorder::new();
        recorder.record_collection("extra", CollectionChange::Remove { index: 0 });
        recorder.record_collection("extra", CollectionChange::Remove { index: 1 });
        match &recorder.pending()["extra"] {
            ChangeValue::Collection(list) => assert_eq!(list.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_recalculation_flag() {
        let mut recorder = ChangeRecorder::new();
        recorder.record("n", ChangeValue::Number(2.0));
        let event = recorder.emit(true).unwrap();
        assert!(event.recalculation);
        assert!(!event.is_user_initiated());
    }
}
