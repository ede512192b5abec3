#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dirtonyou_core::{Channel, ChannelKind, ChatMessage};
use dirtonyou_ingest::database::MIGRATOR;
use dirtonyou_ingest::{
    ArchiveSource, IngestError, IngestResult, Ingestor, MessagePersister, OperatorNotifier,
    Repository, SpaceRegistry, TriggerStore,
};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub const OP_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn setup_pool() -> Result<Arc<SqlitePool>, Box<dyn std::error::Error>> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    MIGRATOR.run(&pool).await?;
    Ok(Arc::new(pool))
}

/// Every pipeline component wired to one in-memory database.
pub struct Harness {
    pub pool: Arc<SqlitePool>,
    pub repo: Arc<Repository>,
    pub triggers: TriggerStore,
    pub persister: MessagePersister,
    pub registry: SpaceRegistry,
    pub ingestor: Ingestor,
}

pub async fn setup_harness(self_id: Option<&str>) -> Result<Harness, Box<dyn std::error::Error>> {
    let pool = setup_pool().await?;
    let repo = Arc::new(Repository::new(pool.clone()));
    let triggers = TriggerStore::new(repo.clone(), OP_TIMEOUT);
    let persister = MessagePersister::new(repo.clone(), OP_TIMEOUT);
    let registry = SpaceRegistry::new(repo.clone(), OP_TIMEOUT);
    let ingestor = Ingestor::new(
        triggers.clone(),
        persister.clone(),
        self_id.map(str::to_string),
    );
    Ok(Harness {
        pool,
        repo,
        triggers,
        persister,
        registry,
        ingestor,
    })
}

pub fn message(id: &str, space: &str, author: &str, content: &str, ts: i64) -> ChatMessage {
    ChatMessage {
        id: id.to_string(),
        space_id: space.to_string(),
        channel_id: "chan".to_string(),
        author_id: author.to_string(),
        content: content.to_string(),
        ts,
    }
}

pub fn text_channel(id: &str, name: &str) -> Channel {
    Channel {
        id: id.to_string(),
        name: name.to_string(),
        kind: ChannelKind::Text,
    }
}

/// `count` messages for `channel` with ids `{channel}-{start}..`, every
/// tenth one containing "football".
pub fn page(channel: &str, space: &str, start: usize, count: usize) -> Vec<ChatMessage> {
    (start..start + count)
        .map(|n| {
            let content = if n % 10 == 0 {
                format!("message {} about football", n)
            } else {
                format!("message {} about nothing", n)
            };
            ChatMessage {
                id: format!("{}-{}", channel, n),
                space_id: space.to_string(),
                channel_id: channel.to_string(),
                author_id: format!("user-{}", n % 3),
                content,
                ts: 1_700_000_000 - n as i64,
            }
        })
        .collect()
}

/// Archive backed by scripted pages; every fetch is recorded.
#[derive(Default)]
pub struct FakeArchive {
    pub name: String,
    pub channels: Vec<Channel>,
    pub pages: Mutex<HashMap<String, VecDeque<Result<Vec<ChatMessage>, String>>>>,
    pub fetch_log: Mutex<Vec<(String, Option<String>)>>,
    pub name_calls: AtomicUsize,
    pub fail_name: bool,
    /// When set, every fetch waits this long and returns a full page forever.
    pub endless_delay: Option<Duration>,
    pub endless_counter: AtomicUsize,
}

impl FakeArchive {
    pub fn new(name: &str, channels: Vec<Channel>) -> Self {
        Self {
            name: name.to_string(),
            channels,
            ..Self::default()
        }
    }

    pub fn with_pages(self, channel: &str, pages: Vec<Result<Vec<ChatMessage>, String>>) -> Self {
        if let Ok(mut guard) = self.pages.lock() {
            guard.insert(channel.to_string(), pages.into_iter().collect());
        }
        self
    }

    pub fn fetches(&self) -> Vec<(String, Option<String>)> {
        self.fetch_log.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ArchiveSource for FakeArchive {
    async fn space_name(&self, _space_id: &str) -> IngestResult<String> {
        self.name_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_name {
            return Err(IngestError::archive("guild lookup failed"));
        }
        Ok(self.name.clone())
    }

    async fn channels(&self, _space_id: &str) -> IngestResult<Vec<Channel>> {
        Ok(self.channels.clone())
    }

    async fn fetch_page(
        &self,
        space_id: &str,
        channel_id: &str,
        limit: usize,
        before: Option<&str>,
    ) -> IngestResult<Vec<ChatMessage>> {
        self.fetch_log
            .lock()
            .expect("fetch log")
            .push((channel_id.to_string(), before.map(str::to_string)));

        if let Some(delay) = self.endless_delay {
            tokio::time::sleep(delay).await;
            let start = self.endless_counter.fetch_add(limit, Ordering::SeqCst);
            return Ok(page(channel_id, space_id, start, limit));
        }

        let next = self
            .pages
            .lock()
            .expect("pages")
            .get_mut(channel_id)
            .and_then(|queue| queue.pop_front());
        match next {
            Some(Ok(page)) => Ok(page),
            Some(Err(reason)) => Err(IngestError::archive(reason)),
            None => Ok(Vec::new()),
        }
    }
}

/// Notifier that keeps every message it was asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl OperatorNotifier for RecordingNotifier {
    async fn notify(&self, text: &str) -> IngestResult<()> {
        self.sent.lock().expect("notifier").push(text.to_string());
        Ok(())
    }
}
