//! Wall-clock refresh scheduler.
//!
//! Sleeps until the next configured local time of day, force-refreshes both
//! series, and repeats until shutdown is signaled.

use chrono::{Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime};
use goldfeed::{FreshnessController, PageFetcher, SeriesKind, SeriesStore};
use std::sync::Arc;
use tokio::sync::Notify;

/// Force-refresh every kind in order, returning each outcome.
pub async fn refresh_all<F: PageFetcher, S: SeriesStore>(
    controller: &FreshnessController<F, S>,
) -> Vec<(SeriesKind, bool)> {
    let mut results = Vec::with_capacity(SeriesKind::ALL.len());
    for kind in SeriesKind::ALL {
        results.push((kind, controller.force_refresh(kind).await));
    }
    results
}

/// The first scheduled instant strictly after `now`, or `None` when no
/// times are configured.
pub fn next_run(now: NaiveDateTime, times: &[NaiveTime]) -> Option<NaiveDateTime> {
    let today = now.date();
    let later_today = times
        .iter()
        .map(|t| today.and_time(*t))
        .filter(|at| *at > now)
        .min();
    later_today.or_else(|| {
        let tomorrow = today + ChronoDuration::days(1);
        times.iter().map(|t| tomorrow.and_time(*t)).min()
    })
}

/// Spawn the scheduler until `shutdown` is notified.
pub fn spawn<F, S>(
    controller: Arc<FreshnessController<F, S>>,
    times: Vec<NaiveTime>,
    shutdown: Arc<Notify>,
) -> tokio::task::JoinHandle<()>
where
    F: PageFetcher + 'static,
    S: SeriesStore + 'static,
{
    tokio::spawn(async move {
        if times.is_empty() {
            tracing::info!("no refresh times configured, scheduler idle");
            shutdown.notified().await;
            return;
        }

        let listed: Vec<String> = times.iter().map(|t| t.format("%H:%M").to_string()).collect();
        tracing::info!("refresh scheduler started: times={}", listed.join(","));

        loop {
            let now = Local::now().naive_local();
            let Some(next) = next_run(now, &times) else {
                break;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::debug!(%next, wait_secs = wait.as_secs(), "next scheduled refresh");

            tokio::select! {
                _ = shutdown.notified() => {
                    tracing::info!("refresh scheduler stopping");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    let results = refresh_all(&controller).await;
                    let failed = results.iter().filter(|(_, ok)| !ok).count();
                    if failed == 0 {
                        tracing::info!("scheduled refresh complete");
                    } else {
                        tracing::warn!(failed, "scheduled refresh finished with failures");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 8, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn times() -> Vec<NaiveTime> {
        vec![
            NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        ]
    }

    #[test]
    fn test_next_run_later_today() {
        assert_eq!(next_run(at(14, 7, 30), &times()), Some(at(14, 9, 0)));
        assert_eq!(next_run(at(14, 12, 0), &times()), Some(at(14, 18, 0)));
    }

    #[test]
    fn test_next_run_is_strictly_after_now() {
        assert_eq!(next_run(at(14, 9, 0), &times()), Some(at(14, 18, 0)));
    }

    #[test]
    fn test_next_run_rolls_to_tomorrow() {
        assert_eq!(next_run(at(14, 18, 0), &times()), Some(at(15, 9, 0)));
        assert_eq!(next_run(at(31, 23, 59), &times()), Some(
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap().and_hms_opt(9, 0, 0).unwrap()
        ));
    }

    #[test]
    fn test_next_run_without_times() {
        assert_eq!(next_run(at(14, 9, 0), &[]), None);
    }
}
