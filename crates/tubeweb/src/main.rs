use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;

use tubecore::core::{init_logger, log_startup_configuration, OptionsStore};
use tubecore::{config, create_pool, run_cycle, start_scheduler, Downloader, EventBus, SubscriptionService, YtDlp};
use tubeweb::cli::{Cli, Commands};
use tubeweb::{serve, AppState};

/// Entry point for the `tubewatch` binary
///
/// Parses CLI arguments and dispatches to the matching subcommand; with no
/// subcommand the web server runs.
///
/// # Errors
/// Returns an error if start-up fails (logging, database, options file, bind).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Log panics from spawned tasks instead of losing them on stderr
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // .env must be loaded before any config static is touched
    let _ = dotenv();

    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run { port, host }) => run_server(host, port).await,
        Some(Commands::Sync) => run_sync().await,
        Some(Commands::Stats) => run_stats(),
        Some(Commands::YtdlpVersion) => run_ytdlp_version().await,
        None => {
            log::info!("No command specified, running web server");
            run_server(None, None).await
        }
    }
}

/// Wires the store, options, downloader and event bus together.
fn build_service() -> Result<Arc<SubscriptionService>> {
    let pool = create_pool(&*config::DATABASE_PATH)
        .map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?;
    let options = Arc::new(
        OptionsStore::load(config::OPTIONS_PATH.as_path())
            .map_err(|e| anyhow::anyhow!("Failed to load options: {}", e))?,
    );
    let downloader = Arc::new(YtDlp::from_config());

    let service = SubscriptionService::new(
        pool,
        downloader,
        options,
        EventBus::default(),
        config::DATA_DIR.as_path(),
    )?;
    Ok(Arc::new(service))
}

/// Run the web server with the download scheduler in the background
async fn run_server(host: Option<String>, port: Option<u16>) -> Result<()> {
    log_startup_configuration();
    let service = build_service()?;
    service.close_interrupted_runs()?;

    match service.ytdlp_version().await {
        Ok(version) => log::info!("yt-dlp version: {}", version),
        Err(e) => log::warn!("yt-dlp not usable yet ({}), downloads will fail until it is installed", e),
    }

    let scheduler = start_scheduler(Arc::clone(&service), config::scheduler::interval());

    let host = host.unwrap_or_else(|| config::web::HOST.to_string());
    let port = port.unwrap_or(*config::web::PORT);
    let result = serve(AppState::new(service), &host, port).await;

    scheduler.abort();
    result
}

/// Run one download cycle and exit
async fn run_sync() -> Result<()> {
    let service = build_service()?;
    let report = run_cycle(&service).await?;
    println!(
        "{} attempted, {} succeeded, {} failed",
        report.attempted, report.succeeded, report.failed
    );
    Ok(())
}

/// Print every subscription with its stats
fn run_stats() -> Result<()> {
    let service = build_service()?;
    let views = service.list_with_stats()?;

    if views.is_empty() {
        println!("No subscriptions");
        return Ok(());
    }

    for view in views {
        let sub = &view.subscription;
        let last_run = match &view.last_run {
            None => "never run".to_string(),
            Some(run) if run.finished_at.is_none() => "running".to_string(),
            Some(run) if run.success => "last run ok".to_string(),
            Some(run) => format!("last run failed ({})", run.failure_kind.as_deref().unwrap_or("unknown")),
        };
        println!("{} [{}] {}", sub.display_name(), sub.kind, sub.url);
        println!(
            "    {} downloaded, {} pending, {} partial, {} failed, {} of {}, {}",
            view.stats.progress(),
            view.stats.pending,
            view.stats.partial,
            view.stats.failed,
            view.stats.downloaded_size_human(),
            view.stats.expected_size_human(),
            last_run
        );
    }
    Ok(())
}

/// Print the configured yt-dlp binary's version
async fn run_ytdlp_version() -> Result<()> {
    let version = YtDlp::from_config()
        .version()
        .await
        .map_err(|e| anyhow::anyhow!("{} is not usable: {}", *config::YTDL_BIN, e))?;
    println!("{}", version);
    Ok(())
}
