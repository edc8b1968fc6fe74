//! Background scheduler that periodically downloads every subscription.
//!
//! Runs as a `tokio::spawn`ed task. Cycles never overlap: each one walks the
//! subscription list sequentially, and a slow cycle simply delays the next
//! tick.

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use crate::core::error::AppResult;
use crate::events::{Event, Namespace};
use crate::service::SubscriptionService;

/// Summary of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Start the download scheduler background task.
///
/// The first cycle fires one full `period` after start.
pub fn start_scheduler(service: Arc<SubscriptionService>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!("Download scheduler started (interval: {} min)", period.as_secs() / 60);

        loop {
            ticker.tick().await;

            match run_cycle(&service).await {
                Ok(report) => log::info!(
                    "Download cycle finished: {} attempted, {} succeeded, {} failed",
                    report.attempted,
                    report.succeeded,
                    report.failed
                ),
                Err(e) => log::error!("Download cycle failed: {}", e),
            }
        }
    })
}

/// Run one cycle: invoke the downloader for every subscription in turn.
///
/// A failing subscription is recorded and skipped; only a failure to read
/// the subscription list aborts the cycle.
pub async fn run_cycle(service: &SubscriptionService) -> AppResult<CycleReport> {
    let subscriptions = service.list()?;
    let mut report = CycleReport::default();

    if subscriptions.is_empty() {
        log::debug!("Download cycle: no subscriptions");
        return Ok(report);
    }

    log::info!("Download cycle: {} subscription(s)", subscriptions.len());
    service.events().emit(Event::new(
        Namespace::System,
        "cycle_started",
        json!({ "subscriptions": subscriptions.len() }),
    ));

    for subscription in &subscriptions {
        report.attempted += 1;
        match service.process_subscription(&subscription.url).await {
            Ok(outcome) if outcome.success => report.succeeded += 1,
            Ok(_) => report.failed += 1,
            Err(e) => {
                // Removed mid-cycle, or the store is unavailable
                log::warn!("Skipping {}: {}", subscription.url, e);
                report.failed += 1;
            }
        }
    }

    service
        .events()
        .emit(Event::new(Namespace::System, "cycle_complete", json!(report)));
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::options::{Options, OptionsStore};
    use crate::events::EventBus;
    use crate::storage::create_pool;
    use crate::testing::MockDownloader;
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};

    fn service_with(mock: MockDownloader) -> (Arc<SubscriptionService>, Arc<MockDownloader>, TempDir) {
        let dir = tempdir().unwrap();
        let pool = create_pool(dir.path().join("app.db")).unwrap();
        let mock = Arc::new(mock);
        let service = SubscriptionService::new(
            pool,
            mock.clone(),
            Arc::new(OptionsStore::in_memory(Options {
                parameters: "-f best".into(),
            })),
            EventBus::new(64),
            dir.path().join("data"),
        )
        .unwrap();
        (Arc::new(service), mock, dir)
    }

    #[tokio::test]
    async fn test_cycle_continues_past_failures() {
        let mock = MockDownloader::new().with_download_failure("https://youtu.be/aaaaaaaaaaa", "ERROR: Video unavailable");
        let (service, mock, _dir) = service_with(mock);
        for url in ["https://youtu.be/aaaaaaaaaaa", "https://youtu.be/bbbbbbbbbbb"] {
            service.add(url).await.unwrap();
        }

        let report = run_cycle(&service).await.unwrap();

        assert_eq!(
            report,
            CycleReport {
                attempted: 2,
                succeeded: 1,
                failed: 1
            }
        );
        assert_eq!(mock.downloaded_urls().len(), 2);
        assert_eq!(mock.last_parameters().as_deref(), Some("-f best"));
    }

    #[tokio::test]
    async fn test_empty_cycle() {
        let (service, mock, _dir) = service_with(MockDownloader::new());
        assert_eq!(run_cycle(&service).await.unwrap(), CycleReport::default());
        assert!(mock.downloaded_urls().is_empty());
    }

    #[tokio::test]
    async fn test_downloads_never_overlap() {
        let mock = MockDownloader::new().with_download_delay(Duration::from_millis(50));
        let (service, mock, _dir) = service_with(mock);
        service.add("https://youtu.be/aaaaaaaaaaa").await.unwrap();
        service.add("https://youtu.be/bbbbbbbbbbb").await.unwrap();

        // A manual update racing a scheduled cycle
        let manual = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.process_subscription("https://youtu.be/aaaaaaaaaaa").await })
        };
        run_cycle(&service).await.unwrap();
        manual.await.unwrap().unwrap();

        assert_eq!(mock.downloaded_urls().len(), 3);
        assert_eq!(mock.max_concurrent_downloads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_waits_one_interval() {
        let (service, mock, _dir) = service_with(MockDownloader::new());
        service.add("https://youtu.be/aaaaaaaaaaa").await.unwrap();

        let handle = start_scheduler(Arc::clone(&service), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(mock.downloaded_urls().is_empty());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(mock.downloaded_urls().len(), 1);

        handle.abort();
    }
}
