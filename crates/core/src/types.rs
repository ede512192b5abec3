use serde::{Deserialize, Serialize};

/// Stable identifier of a trigger word (the `trigger_word.id` column).
pub type TriggerId = i64;

/// A monitored word and its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerWord {
    pub id: TriggerId,
    /// Lowercased, trimmed text.
    pub word: String,
}

impl TriggerWord {
    /// Normalize user input into the stored trigger form.
    ///
    /// Returns `None` when nothing is left after trimming.
    pub fn normalize(raw: &str) -> Option<String> {
        let word = raw.trim().to_lowercase();
        if word.is_empty() {
            None
        } else {
            Some(word)
        }
    }
}

/// Immutable view of the trigger table at one point in time.
///
/// A snapshot is never patched in place; a reload builds a new one and swaps
/// it in, so every reader sees either the old set or the new set in full.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerSnapshot {
    words: Vec<TriggerWord>,
}

impl TriggerSnapshot {
    pub fn new(mut words: Vec<TriggerWord>) -> Self {
        words.sort_by_key(|w| w.id);
        Self { words }
    }

    pub fn words(&self) -> &[TriggerWord] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn id_of(&self, word: &str) -> Option<TriggerId> {
        self.words.iter().find(|w| w.word == word).map(|w| w.id)
    }
}

/// A chat message, either delivered live or read back from a channel archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Platform message id; also the paging cursor for archive reads.
    pub id: String,
    pub space_id: String,
    pub channel_id: String,
    pub author_id: String,
    pub content: String,
    /// Unix timestamp in seconds.
    pub ts: i64,
}

/// A message that matched at least one trigger, ready for storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedMessage {
    pub author_id: String,
    pub space_id: String,
    pub content: String,
    /// Matched trigger ids in storage order. Never empty once persisted.
    pub trigger_ids: Vec<TriggerId>,
    pub ts: i64,
}

/// Channel types the backfill distinguishes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    /// Plain guild text channel; the only kind that is scanned.
    Text,
    /// Voice, category, thread, forum and anything else.
    Other(u8),
}

impl ChannelKind {
    /// Map a Discord channel type code.
    pub fn from_discord(code: u8) -> Self {
        match code {
            0 => ChannelKind::Text,
            other => ChannelKind::Other(other),
        }
    }
}

/// A channel inside a space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub kind: ChannelKind,
}

/// Lifecycle of a space in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpaceState {
    /// No registry row.
    Unknown,
    /// Row inserted, backfill not finished.
    Registering,
    /// Backfill finished.
    Known,
}

impl SpaceState {
    /// Value stored in the `space.status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            SpaceState::Unknown => "unknown",
            SpaceState::Registering => "registering",
            SpaceState::Known => "known",
        }
    }

    pub fn from_status(status: &str) -> Self {
        match status {
            "registering" => SpaceState::Registering,
            "known" => SpaceState::Known,
            _ => SpaceState::Unknown,
        }
    }
}
