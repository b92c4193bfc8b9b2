//! Implementations of the `goldfeed` subcommands.

use crate::rest;
use crate::scheduler;
use anyhow::Context;
use goldfeed::{
    FeedConfig, FeedStatus, FileStore, FreshnessController, HttpFetcher, Series, SeriesKind,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Notify;

/// The production controller: HTTP fetcher over the file store.
pub type Controller = FreshnessController<HttpFetcher, FileStore>;

pub fn build_controller(config: &FeedConfig) -> anyhow::Result<Arc<Controller>> {
    let store = FileStore::open(&config.data_dir)
        .with_context(|| format!("cannot open data directory {}", config.data_dir.display()))?;
    let fetcher = HttpFetcher::new(config.fetch_timeout);
    Ok(Arc::new(FreshnessController::new(fetcher, store, config)))
}

/// Warm both caches, then serve the API (and the scheduler) until Ctrl-C.
pub async fn serve(config: &FeedConfig, addr: SocketAddr, schedule: bool) -> anyhow::Result<()> {
    let controller = build_controller(config)?;
    tracing::info!(
        data_dir = %config.data_dir.display(),
        source = %config.source.daily_url,
        "starting goldfeed server"
    );

    for kind in SeriesKind::ALL {
        if let Err(e) = controller.ensure_fresh(kind).await {
            tracing::warn!(%kind, "startup refresh failed, will retry on demand: {e}");
        }
    }

    let shutdown = Arc::new(Notify::new());
    let scheduler = schedule.then(|| {
        scheduler::spawn(
            Arc::clone(&controller),
            config.schedule.clone(),
            Arc::clone(&shutdown),
        )
    });

    rest::serve(addr, controller, shutdown_signal()).await?;

    shutdown.notify_one();
    if let Some(handle) = scheduler {
        let _ = handle.await;
    }
    tracing::info!("goldfeed server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

/// Refresh the given kinds now. Fails if any refresh failed.
pub async fn refresh(config: &FeedConfig, kinds: &[SeriesKind], json: bool) -> anyhow::Result<()> {
    let controller = build_controller(config)?;
    let mut report = Vec::with_capacity(kinds.len());
    let mut failed = 0usize;

    for &kind in kinds {
        match controller.refresh(kind).await {
            Ok(series) => {
                if !json {
                    println!(
                        "{kind}: {} entries, latest {}",
                        series.len(),
                        latest_summary(&series)
                    );
                }
                report.push(serde_json::json!({
                    "kind": kind,
                    "ok": true,
                    "entry_count": series.len(),
                }));
            }
            Err(e) => {
                failed += 1;
                if !json {
                    eprintln!("{kind}: refresh failed: {e}");
                }
                report.push(serde_json::json!({
                    "kind": kind,
                    "ok": false,
                    "error": e.to_string(),
                }));
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} refresh(es) failed", kinds.len());
    }
    Ok(())
}

/// Print the (freshened) series, newest first.
pub async fn show(
    config: &FeedConfig,
    kind: SeriesKind,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let controller = build_controller(config)?;
    let mut series = controller.ensure_fresh(kind).await?;
    if let Some(n) = limit {
        series.observations.truncate(n);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&series)?);
        return Ok(());
    }

    let m = &series.metadata;
    println!(
        "{} {} ({} {}), generated {}",
        m.source,
        m.kind,
        m.currency,
        m.unit,
        m.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    for obs in &series.observations {
        println!("  {}  {:>12.2}  {}", obs.date, obs.price, obs.original_price_token);
    }
    Ok(())
}

/// Print cache status for both kinds.
pub fn status(config: &FeedConfig, json: bool) -> anyhow::Result<()> {
    let controller = build_controller(config)?;
    let status = controller.status();
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print!("{}", render_status(&status));
    }
    Ok(())
}

fn latest_summary(series: &Series) -> String {
    series
        .latest()
        .map(|o| format!("{} @ {}", o.date, o.price))
        .unwrap_or_else(|| "none".to_string())
}

fn render_status(status: &FeedStatus) -> String {
    let mut out = format!(
        "{} ({})\nstaleness window: {}h\n",
        status.source, status.url, status.staleness_hours
    );
    for k in &status.kinds {
        let refreshed = k
            .last_refreshed_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        let latest = k
            .latest_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "  {:<7} {:<10} entries={:<4} latest={latest} refreshed={refreshed}\n",
            k.kind.as_str(),
            format!("{:?}", k.state).to_lowercase(),
            k.entry_count,
        ));
    }
    out
}
