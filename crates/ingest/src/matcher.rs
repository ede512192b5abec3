//! Substring matching of message text against a trigger snapshot.

use dirtonyou_core::{TriggerId, TriggerSnapshot};
use std::collections::BTreeSet;

/// Ids of every trigger contained in any whitespace-separated token of `text`.
///
/// Matching is case-insensitive substring containment: the trigger
/// "assassin" matches the token "assassinate". A `None` snapshot means the
/// trigger table has not been loaded yet and yields an empty set.
pub fn match_triggers(text: &str, snapshot: Option<&TriggerSnapshot>) -> BTreeSet<TriggerId> {
    let mut matched = BTreeSet::new();
    let Some(snapshot) = snapshot else {
        return matched;
    };
    if snapshot.is_empty() {
        return matched;
    }

    let lowered = text.to_lowercase();
    for token in lowered.split_whitespace() {
        for trigger in snapshot.words() {
            if token.contains(trigger.word.as_str()) {
                matched.insert(trigger.id);
            }
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirtonyou_core::TriggerWord;

    fn snapshot(words: &[(TriggerId, &str)]) -> TriggerSnapshot {
        TriggerSnapshot::new(
            words
                .iter()
                .map(|(id, word)| TriggerWord {
                    id: *id,
                    word: word.to_string(),
                })
                .collect(),
        )
    }

    #[test]
    fn matching_ignores_case() {
        let triggers = snapshot(&[(1, "hello")]);
        let upper = match_triggers("HELLO", Some(&triggers));
        let lower = match_triggers("hello", Some(&triggers));
        assert_eq!(upper, lower);
        assert_eq!(upper.into_iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn trigger_may_be_part_of_a_token() {
        let triggers = snapshot(&[(7, "assassin")]);
        assert!(!match_triggers("assassinate", Some(&triggers)).is_empty());
        assert!(match_triggers("assign", Some(&triggers)).is_empty());
    }

    #[test]
    fn unloaded_snapshot_matches_nothing() {
        assert!(match_triggers("anything at all", None).is_empty());
        assert!(match_triggers("anything", Some(&TriggerSnapshot::default())).is_empty());
    }

    #[test]
    fn any_trigger_in_any_token_is_reported_once() {
        let triggers = snapshot(&[(1, "foo"), (2, "bar"), (3, "qux")]);
        let matched = match_triggers("FOObar and foo again\tBAR", Some(&triggers));
        assert_eq!(matched.into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn trigger_spanning_whitespace_never_matches() {
        let triggers = snapshot(&[(1, "ab")]);
        assert!(match_triggers("a b", Some(&triggers)).is_empty());
    }

    #[test]
    fn identical_input_gives_identical_output() {
        let triggers = snapshot(&[(4, "spam"), (2, "eggs")]);
        let text = "Spam, eggs, SPAMMY eggs";
        assert_eq!(
            match_triggers(text, Some(&triggers)),
            match_triggers(text, Some(&triggers))
        );
    }
}
