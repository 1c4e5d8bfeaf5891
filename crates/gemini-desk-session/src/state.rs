use std::collections::BTreeMap;

use gemini_desk_types::{ConversationId, Message, StreamEvent, StreamUpdate};

use crate::backend::ChatRequest;
use crate::view::BubbleId;

/// Where a session is in its send lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    AwaitingResponse,
    Streaming,
}

/// Monotonic turn counter. Replies tagged with an older turn belong to an
/// abandoned send and are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TurnId(pub u64);

impl TurnId {
    pub fn next(self) -> Self {
        TurnId(self.0 + 1)
    }
}

/// Bumped whenever the session switches to another conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversationEpoch(pub u64);

impl ConversationEpoch {
    pub fn next(self) -> Self {
        ConversationEpoch(self.0 + 1)
    }
}

/// What a save sends, tagged with the conversation it was taken from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSnapshot {
    pub epoch: ConversationEpoch,
    pub conversation_id: Option<ConversationId>,
    pub title: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnMode {
    Unary,
    Stream,
}

/// A send accepted by the session, waiting for the controller to issue it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    pub turn: TurnId,
    pub mode: TurnMode,
    pub request: ChatRequest,
}

/// Accumulated output of the turn currently streaming
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamState {
    pub accumulated_text: String,
    /// Bubble receiving the text, created on the first chunk
    pub target: Option<BubbleId>,
}

/// Restores emission order for realtime payloads that carry a `seq`
/// number. Sequence numbers count from zero within a turn; payloads
/// without one are applied as they arrive.
#[derive(Debug, Default)]
pub struct ChunkSequencer {
    next: u64,
    pending: BTreeMap<u64, Vec<StreamEvent>>,
}

impl ChunkSequencer {
    pub fn reset(&mut self) {
        self.next = 0;
        self.pending.clear();
    }

    /// Number of payloads held back waiting for a gap to fill
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Events now ready to apply, in order
    pub fn accept(&mut self, update: StreamUpdate) -> Vec<StreamEvent> {
        let seq = match update.seq {
            None => return update.events,
            Some(seq) => seq,
        };

        if seq < self.next || self.pending.contains_key(&seq) {
            log::warn!("Dropping duplicate stream payload seq={}", seq);
            return Vec::new();
        }

        self.pending.insert(seq, update.events);

        let mut ready = Vec::new();
        while let Some(events) = self.pending.remove(&self.next) {
            ready.extend(events);
            self.next += 1;
        }
        if !self.pending.is_empty() {
            log::debug!(
                "Holding {} stream payloads until seq={} arrives",
                self.pending.len(),
                self.next
            );
        }
        ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(seq: Option<u64>, text: &str) -> StreamUpdate {
        StreamUpdate {
            seq,
            events: vec![StreamEvent::Chunk(text.to_string())],
        }
    }

    fn texts(events: Vec<StreamEvent>) -> Vec<String> {
        events
            .into_iter()
            .filter_map(|e| match e {
                StreamEvent::Chunk(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_unsequenced_passes_through() {
        let mut seq = ChunkSequencer::default();
        assert_eq!(texts(seq.accept(chunk(None, "a"))), vec!["a"]);
        assert_eq!(texts(seq.accept(chunk(None, "b"))), vec!["b"]);
    }

    #[test]
    fn test_out_of_order_is_buffered() {
        let mut seq = ChunkSequencer::default();
        assert!(seq.accept(chunk(Some(1), "lo, ")).is_empty());
        assert!(seq.accept(chunk(Some(2), "world")).is_empty());
        assert_eq!(seq.buffered(), 2);
        assert_eq!(
            texts(seq.accept(chunk(Some(0), "Hel"))),
            vec!["Hel", "lo, ", "world"]
        );
        assert_eq!(seq.buffered(), 0);
    }

    #[test]
    fn test_duplicates_dropped() {
        let mut seq = ChunkSequencer::default();
        assert_eq!(texts(seq.accept(chunk(Some(0), "a"))), vec!["a"]);
        assert!(seq.accept(chunk(Some(0), "a")).is_empty());
    }

    #[test]
    fn test_reset_restarts_numbering() {
        let mut seq = ChunkSequencer::default();
        seq.accept(chunk(Some(0), "a"));
        seq.accept(chunk(Some(5), "z"));
        seq.reset();
        assert_eq!(seq.buffered(), 0);
        assert_eq!(texts(seq.accept(chunk(Some(0), "b"))), vec!["b"]);
    }
}
