//! Atomic storage of flagged messages.

use crate::database::{with_timeout, Repository};
use crate::error::{IngestError, IngestResult};
use dirtonyou_core::constants::ZERO_WIDTH_SPACE;
use dirtonyou_core::FlaggedMessage;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Break every `@` mention so stored content can be echoed back without
/// pinging anyone.
pub fn defang_mentions(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for ch in content.chars() {
        out.push(ch);
        if ch == '@' {
            out.push(ZERO_WIDTH_SPACE);
        }
    }
    out
}

/// Writes flagged messages and their trigger links as one unit.
#[derive(Clone)]
pub struct MessagePersister {
    repo: Arc<Repository>,
    op_timeout: Duration,
}

impl MessagePersister {
    pub fn new(repo: Arc<Repository>, op_timeout: Duration) -> Self {
        Self { repo, op_timeout }
    }

    /// Store `msg`, returning the new row id.
    ///
    /// The message row and every trigger link commit together or not at all.
    /// A message without triggers is rejected before touching the database.
    /// Failures are returned as-is; nothing is retried.
    pub async fn persist(&self, msg: &FlaggedMessage) -> IngestResult<i64> {
        if msg.trigger_ids.is_empty() {
            return Err(IngestError::validation(
                "refusing to persist a message with no matched triggers",
            ));
        }

        let stored = FlaggedMessage {
            content: defang_mentions(&msg.content),
            ..msg.clone()
        };

        let id = with_timeout(
            self.op_timeout,
            "persist flagged message",
            self.repo.insert_flagged_message(&stored),
        )
        .await?;

        debug!(
            message_id = id,
            author = %stored.author_id,
            space = %stored.space_id,
            triggers = stored.trigger_ids.len(),
            "flagged message stored"
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentions_get_a_zero_width_space() {
        assert_eq!(defang_mentions("hi @everyone"), "hi @\u{200B}everyone");
        assert_eq!(defang_mentions("@a @b"), "@\u{200B}a @\u{200B}b");
    }

    #[test]
    fn content_without_mentions_is_untouched() {
        assert_eq!(defang_mentions("I love FOOtball"), "I love FOOtball");
        assert_eq!(defang_mentions(""), "");
    }
}
