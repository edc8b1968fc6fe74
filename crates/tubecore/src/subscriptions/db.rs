//! Database operations for subscriptions, channels, discovered videos and
//! download runs.

use rusqlite::{params, Connection, OptionalExtension};
use std::str::FromStr;

use super::{Channel, DownloadRun, KnownVideo, NewVideo, Subscription, SubscriptionKind};
use crate::core::error::{AppError, AppResult};
use crate::ytdlp::{FailureKind, RunOutcome};

const SUBSCRIPTION_COLUMNS: &str = "s.id, s.url, s.kind, s.channel_id, c.name, s.created_at";

fn parse_subscription(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subscription> {
    let kind: String = row.get(2)?;
    let kind = SubscriptionKind::from_str(&kind)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e)))?;
    Ok(Subscription {
        id: row.get(0)?,
        url: row.get(1)?,
        kind,
        channel_id: row.get(3)?,
        channel_name: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn parse_video(row: &rusqlite::Row<'_>) -> rusqlite::Result<KnownVideo> {
    Ok(KnownVideo {
        video_id: row.get(0)?,
        title: row.get(1)?,
        expected_filename: row.get(2)?,
        expected_size: row.get::<_, Option<i64>>(3)?.map(|v| v.max(0) as u64),
        channel_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn parse_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<DownloadRun> {
    Ok(DownloadRun {
        id: row.get(0)?,
        subscription_url: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        exit_code: row.get(4)?,
        success: row.get::<_, i32>(5)? != 0,
        failure_kind: row.get(6)?,
        message: row.get(7)?,
    })
}

// ── subscriptions ───────────────────────────────────────────────────────────

/// Insert a new subscription.
///
/// Fails with [`AppError::Duplicate`] when the URL is already tracked; the
/// existing row is left untouched.
pub fn insert_subscription(
    conn: &Connection,
    url: &str,
    kind: SubscriptionKind,
    channel_id: Option<&str>,
) -> AppResult<Subscription> {
    if get_subscription(conn, url)?.is_some() {
        return Err(AppError::Duplicate(url.to_string()));
    }

    let inserted = conn.execute(
        "INSERT INTO subscriptions (url, kind, channel_id) VALUES (?1, ?2, ?3)",
        params![url, kind.as_ref(), channel_id],
    );

    match inserted {
        Ok(_) => {}
        // Lost a race with a concurrent add of the same URL
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            return Err(AppError::Duplicate(url.to_string()));
        }
        Err(e) => return Err(e.into()),
    }

    get_subscription(conn, url)?.ok_or_else(|| AppError::NotFound(url.to_string()))
}

/// Get a subscription by URL.
pub fn get_subscription(conn: &Connection, url: &str) -> AppResult<Option<Subscription>> {
    let sql = format!(
        "SELECT {} FROM subscriptions s LEFT JOIN channels c ON c.channel_id = s.channel_id WHERE s.url = ?1",
        SUBSCRIPTION_COLUMNS
    );
    Ok(conn.query_row(&sql, params![url], parse_subscription).optional()?)
}

/// All subscriptions, newest first.
pub fn list_subscriptions(conn: &Connection) -> AppResult<Vec<Subscription>> {
    let sql = format!(
        "SELECT {} FROM subscriptions s LEFT JOIN channels c ON c.channel_id = s.channel_id
         ORDER BY s.created_at DESC, s.id DESC",
        SUBSCRIPTION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], parse_subscription)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Delete a subscription and its run history.
///
/// Returns `false` when no such subscription exists. Channels and videos
/// are kept: another subscription may point at the same channel.
pub fn delete_subscription(conn: &Connection, url: &str) -> AppResult<bool> {
    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute("DELETE FROM subscriptions WHERE url = ?1", params![url])?;
    tx.execute("DELETE FROM download_runs WHERE subscription_url = ?1", params![url])?;
    tx.commit()?;
    Ok(removed > 0)
}

/// Link a subscription to its channel. Only succeeds once per subscription.
pub fn attach_channel(conn: &Connection, url: &str, channel_id: &str) -> AppResult<bool> {
    let updated = conn.execute(
        "UPDATE subscriptions SET channel_id = ?2 WHERE url = ?1 AND channel_id IS NULL",
        params![url, channel_id],
    )?;
    Ok(updated > 0)
}

// ── channels ────────────────────────────────────────────────────────────────

/// Create a channel or refresh its name.
pub fn upsert_channel(conn: &Connection, channel_id: &str, name: &str) -> AppResult<()> {
    conn.execute(
        "INSERT INTO channels (channel_id, name) VALUES (?1, ?2)
         ON CONFLICT(channel_id) DO UPDATE SET name = ?2",
        params![channel_id, name],
    )?;
    Ok(())
}

pub fn get_channel(conn: &Connection, channel_id: &str) -> AppResult<Option<Channel>> {
    Ok(conn
        .query_row(
            "SELECT channel_id, name, poster_path, created_at FROM channels WHERE channel_id = ?1",
            params![channel_id],
            |row| {
                Ok(Channel {
                    channel_id: row.get(0)?,
                    name: row.get(1)?,
                    poster_path: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()?)
}

pub fn set_channel_poster(conn: &Connection, channel_id: &str, poster_path: &str) -> AppResult<()> {
    conn.execute(
        "UPDATE channels SET poster_path = ?2 WHERE channel_id = ?1",
        params![channel_id, poster_path],
    )?;
    Ok(())
}

// ── videos ──────────────────────────────────────────────────────────────────

/// Record a discovered video. Returns `false` if it was already known.
pub fn insert_video(conn: &Connection, video: &NewVideo) -> AppResult<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO videos (video_id, title, expected_filename, expected_size, channel_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            video.video_id,
            video.title,
            video.expected_filename,
            video.expected_size.map(|v| v as i64),
            video.channel_id
        ],
    )?;
    Ok(inserted > 0)
}

pub fn video_exists(conn: &Connection, video_id: &str) -> AppResult<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM videos WHERE video_id = ?1)",
        params![video_id],
        |row| row.get::<_, bool>(0),
    )?)
}

/// Videos of a channel in discovery order.
pub fn videos_for_channel(conn: &Connection, channel_id: &str) -> AppResult<Vec<KnownVideo>> {
    let mut stmt = conn.prepare(
        "SELECT video_id, title, expected_filename, expected_size, channel_id, created_at
         FROM videos WHERE channel_id = ?1
         ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![channel_id], parse_video)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

// ── download runs ───────────────────────────────────────────────────────────

/// Open a run record. Returns its id.
pub fn start_run(conn: &Connection, subscription_url: &str) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO download_runs (subscription_url) VALUES (?1)",
        params![subscription_url],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Close a run record with the invocation's outcome.
pub fn finish_run(conn: &Connection, run_id: i64, outcome: &RunOutcome) -> AppResult<()> {
    conn.execute(
        "UPDATE download_runs
         SET finished_at = CURRENT_TIMESTAMP,
             exit_code = ?2,
             success = ?3,
             failure_kind = ?4,
             message = ?5
         WHERE id = ?1",
        params![
            run_id,
            outcome.exit_code,
            outcome.success,
            outcome.failure_kind.map(|k| k.to_string()),
            outcome.message
        ],
    )?;
    Ok(())
}

/// Closes runs left open by a process that died mid-download.
///
/// Only safe while nothing is downloading, i.e. at startup. Returns how many
/// runs were closed.
pub fn close_interrupted_runs(conn: &Connection) -> AppResult<usize> {
    Ok(conn.execute(
        "UPDATE download_runs
         SET finished_at = CURRENT_TIMESTAMP,
             success = 0,
             failure_kind = ?1,
             message = 'Interrupted before finishing'
         WHERE finished_at IS NULL",
        params![FailureKind::Unknown.to_string()],
    )?)
}

/// Most recent run for a subscription.
pub fn latest_run(conn: &Connection, subscription_url: &str) -> AppResult<Option<DownloadRun>> {
    Ok(conn
        .query_row(
            "SELECT id, subscription_url, started_at, finished_at, exit_code, success, failure_kind, message
             FROM download_runs WHERE subscription_url = ?1
             ORDER BY id DESC LIMIT 1",
            params![subscription_url],
            parse_run,
        )
        .optional()?)
}

/// Most recent finished run across all subscriptions linked to a channel.
///
/// Runs still in flight are skipped so they don't mask an earlier failure.
pub fn latest_run_for_channel(conn: &Connection, channel_id: &str) -> AppResult<Option<DownloadRun>> {
    Ok(conn
        .query_row(
            "SELECT r.id, r.subscription_url, r.started_at, r.finished_at, r.exit_code, r.success,
                    r.failure_kind, r.message
             FROM download_runs r
             JOIN subscriptions s ON s.url = r.subscription_url
             WHERE s.channel_id = ?1 AND r.finished_at IS NOT NULL
             ORDER BY r.id DESC LIMIT 1",
            params![channel_id],
            parse_run,
        )
        .optional()?)
}
