//! tubecore - recurring yt-dlp subscriptions
//!
//! Everything except the HTTP surface: the subscription store, the yt-dlp
//! invoker, enrichment and discovery, the on-disk reconciler and the
//! periodic scheduler.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, persisted options, process helpers
//! - `storage`: SQLite pool and embedded migrations
//! - `subscriptions`: the data model, URL classification and queries
//! - `ytdlp`: the `Downloader` trait and the real binary behind it
//! - `scanner`: reconciles the data root against known videos
//! - `enrich`, `thumbnail`: channel resolution, posters, video discovery
//! - `events`: broadcast bus for browser push updates
//! - `scheduler`, `service`: the periodic job and the facade tying it together

pub mod core;
pub mod enrich;
pub mod events;
pub mod scanner;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod subscriptions;
pub mod testing;
pub mod thumbnail;
pub mod ytdlp;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use events::{Event, EventBus, Namespace};
pub use scanner::{ChannelStats, VideoRecord, VideoStatus};
pub use scheduler::{run_cycle, start_scheduler, CycleReport};
pub use service::{SubscriptionService, SubscriptionView};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
pub use subscriptions::{classify_url, Subscription, SubscriptionKind};
pub use ytdlp::{Downloader, YtDlp};
