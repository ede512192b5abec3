//! Application constants and configuration defaults.

/// Number of archived messages requested per page during a backfill.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Largest page the Discord archive endpoint accepts.
pub const MAX_PAGE_SIZE: usize = 100;

/// Upper bound applied to every single database operation, in seconds.
pub const DEFAULT_DB_OPERATION_TIMEOUT_SECS: u64 = 5;

/// Default database connection pool size.
pub const DEFAULT_DB_POOL_SIZE: u32 = 10;

/// Maximum length of one Discord message body, in characters.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Default Discord REST API base URL.
pub const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// How many times a rate-limited Discord request is retried.
pub const DEFAULT_RATE_LIMIT_RETRIES: u32 = 5;

/// Inserted after every `@` in stored content so redisplay cannot ping.
pub const ZERO_WIDTH_SPACE: char = '\u{200B}';

/// Reply sent to anyone other than the admin issuing an admin command.
pub const UNAUTHORIZED_REPLY: &str = "Skill issue";
