mod common;

use common::{message, setup_harness};
use dirtonyou_ingest::{AddOutcome, IngestError, IngestOutcome, RemoveOutcome};

#[tokio::test]
async fn test_snapshot_absent_until_first_load() -> Result<(), Box<dyn std::error::Error>> {
    let h = setup_harness(None).await?;
    h.repo.insert_trigger_word("football").await?;

    assert!(!h.triggers.is_loaded());
    let outcome = h
        .ingestor
        .ingest(&message("m1", "space-1", "u1", "football", 1))
        .await;
    assert_eq!(outcome, IngestOutcome::NotReady);

    assert_eq!(h.triggers.reload().await?, 1);
    assert!(h.triggers.is_loaded());
    Ok(())
}

#[tokio::test]
async fn test_empty_table_loads_empty_snapshot() -> Result<(), Box<dyn std::error::Error>> {
    let h = setup_harness(None).await?;

    assert_eq!(h.triggers.reload().await?, 0);
    let snapshot = h.triggers.snapshot().expect("loaded");
    assert!(snapshot.is_empty());

    let outcome = h
        .ingestor
        .ingest(&message("m1", "space-1", "u1", "anything at all", 1))
        .await;
    assert_eq!(outcome, IngestOutcome::NoMatch);
    Ok(())
}

#[tokio::test]
async fn test_add_then_flag_then_remove() -> Result<(), Box<dyn std::error::Error>> {
    let h = setup_harness(None).await?;
    h.triggers.reload().await?;

    assert_eq!(h.triggers.add("FOO").await?, AddOutcome::Added);
    assert_eq!(h.triggers.add("foo").await?, AddOutcome::AlreadyExists);

    let snapshot = h.triggers.snapshot().expect("loaded");
    let id = snapshot.id_of("foo").expect("foo present");

    let outcome = h
        .ingestor
        .ingest(&message("m1", "space-1", "u1", "I love FOOtball", 10))
        .await;
    match outcome {
        IngestOutcome::Flagged {
            message_id,
            trigger_ids,
        } => {
            assert_eq!(trigger_ids, vec![id]);
            assert_eq!(h.repo.trigger_ids_for_message(message_id).await?, vec![id]);
        }
        other => panic!("expected a flagged message, got {:?}", other),
    }
    let stored = h.repo.list_flagged_messages(Some("space-1"), 10).await?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "I love FOOtball");

    assert_eq!(h.triggers.remove("Foo").await?, RemoveOutcome::Removed);
    assert_eq!(h.triggers.remove("foo").await?, RemoveOutcome::NotFound);

    let outcome = h
        .ingestor
        .ingest(&message("m2", "space-1", "u1", "I love FOOtball", 11))
        .await;
    assert_eq!(outcome, IngestOutcome::NoMatch);
    assert_eq!(h.repo.count_flagged_messages().await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_one_message_many_triggers() -> Result<(), Box<dyn std::error::Error>> {
    let h = setup_harness(None).await?;
    h.triggers.add("assassin").await?;
    h.triggers.add("sin").await?;
    h.triggers.add("unused").await?;

    let snapshot = h.triggers.snapshot().expect("loaded");
    let assassin = snapshot.id_of("assassin").expect("assassin");
    let sin = snapshot.id_of("sin").expect("sin");

    let outcome = h
        .ingestor
        .ingest(&message("m1", "space-1", "u1", "they will ASSASSINATE him", 1))
        .await;
    let IngestOutcome::Flagged {
        message_id,
        trigger_ids,
    } = outcome
    else {
        panic!("expected a flagged message");
    };

    let mut expected = vec![assassin, sin];
    expected.sort();
    assert_eq!(trigger_ids, expected);
    assert_eq!(h.repo.trigger_ids_for_message(message_id).await?, expected);
    Ok(())
}

#[tokio::test]
async fn test_own_messages_are_ignored() -> Result<(), Box<dyn std::error::Error>> {
    let h = setup_harness(Some("bot")).await?;
    h.triggers.add("football").await?;

    let outcome = h
        .ingestor
        .ingest(&message("m1", "space-1", "bot", "football", 1))
        .await;
    assert_eq!(outcome, IngestOutcome::OwnMessage);
    assert_eq!(h.repo.count_flagged_messages().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_snapshot() -> Result<(), Box<dyn std::error::Error>> {
    let h = setup_harness(None).await?;
    h.triggers.add("football").await?;
    assert_eq!(h.triggers.snapshot().expect("loaded").len(), 1);

    h.pool.close().await;

    assert!(h.triggers.reload().await.is_err());
    let snapshot = h.triggers.snapshot().expect("still loaded");
    assert!(snapshot.id_of("football").is_some());
    Ok(())
}

#[tokio::test]
async fn test_blank_word_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let h = setup_harness(None).await?;

    assert!(matches!(
        h.triggers.add("   ").await,
        Err(IngestError::Validation(_))
    ));
    assert!(matches!(
        h.triggers.remove("").await,
        Err(IngestError::Validation(_))
    ));
    assert!(h.triggers.list().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_undecodable_row_is_skipped_on_reload() -> Result<(), Box<dyn std::error::Error>> {
    let h = setup_harness(None).await?;
    h.repo.insert_trigger_word("football").await?;
    // a blob that is not valid UTF-8 cannot decode as a word
    sqlx::query("INSERT INTO trigger_word (word, created_at) VALUES (X'FF00FE', 0)")
        .execute(&*h.pool)
        .await?;

    assert_eq!(h.triggers.reload().await?, 1);
    let snapshot = h.triggers.snapshot().expect("loaded");
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.id_of("football").is_some());

    let outcome = h
        .ingestor
        .ingest(&message("m1", "space-1", "u1", "football tonight", 1))
        .await;
    assert!(outcome.is_flagged());
    Ok(())
}

#[tokio::test]
async fn test_concurrent_adds_leave_every_word_in_snapshot(
) -> Result<(), Box<dyn std::error::Error>> {
    let h = setup_harness(None).await?;
    h.triggers.reload().await?;

    let words: Vec<String> = (0..8).map(|n| format!("word{}", n)).collect();
    let mut handles = Vec::new();
    for word in words.clone() {
        let triggers = h.triggers.clone();
        handles.push(tokio::spawn(async move { triggers.add(&word).await }));
    }
    for handle in handles {
        assert_eq!(handle.await??, AddOutcome::Added);
    }

    let snapshot = h.triggers.snapshot().expect("loaded");
    assert_eq!(snapshot.len(), words.len());
    for word in &words {
        assert!(snapshot.id_of(word).is_some(), "{} missing from snapshot", word);
    }
    Ok(())
}
