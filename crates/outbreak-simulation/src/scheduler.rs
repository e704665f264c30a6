//! The day-cycle background task.

use std::sync::Weak;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::service::EpidemicService;

enum Wake {
    Due,
    Rescheduled,
    Shutdown,
}

/// Sleep until `next_cycle`, run the cycle, repeat.
///
/// Dormant while no cycle is scheduled. Exits when shutdown is signalled or
/// the service is dropped; a cycle already running is allowed to finish, so
/// its save is never cut short. A failed cycle is retried after the
/// configured delay.
pub(crate) async fn run(
    service: Weak<EpidemicService>,
    mut schedule: watch::Receiver<Option<DateTime<Utc>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("day-cycle scheduler started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        let due = *schedule.borrow_and_update();
        let wait = match due {
            None => None,
            Some(due) => {
                let Some(service) = service.upgrade() else {
                    break;
                };
                Some((due - service.now()).to_std().unwrap_or(Duration::ZERO))
            }
        };
        debug!(wait = ?wait, "scheduler waiting");

        let wake = tokio::select! {
            _ = shutdown.changed() => Wake::Shutdown,
            changed = schedule.changed() => match changed {
                Ok(()) => Wake::Rescheduled,
                Err(_) => Wake::Shutdown,
            },
            () = sleep_for(wait) => Wake::Due,
        };
        match wake {
            Wake::Shutdown => break,
            Wake::Rescheduled => continue,
            Wake::Due => {}
        }

        let Some(service) = service.upgrade() else {
            break;
        };
        match service.run_due_cycle().await {
            Ok(Some(report)) => debug!(next_cycle = ?report.next_cycle, "scheduled cycle ran"),
            Ok(None) => {}
            Err(e) => {
                let retry = service.config().cycle_retry();
                drop(service);
                error!(error = %e, retry_in = ?retry, "day cycle failed");
                tokio::select! {
                    _ = shutdown.changed() => break,
                    () = tokio::time::sleep(retry) => {}
                }
            }
        }
    }
    info!("day-cycle scheduler stopped");
}

async fn sleep_for(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{TEST_CATALOG, at, fixture};
    use chrono::Duration as Days;
    use std::time::Duration;

    #[tokio::test]
    async fn overdue_cycle_fires_exactly_once() {
        let f = fixture(TEST_CATALOG, |c| c).await;
        f.service.begin_epidemic().await.unwrap();
        f.clock.advance(Days::days(3));

        let mut cycles = f.service.subscribe_cycles();
        f.service.start_scheduler();
        tokio::time::timeout(Duration::from_secs(5), cycles.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*cycles.borrow_and_update(), 1);
        assert_eq!(f.service.next_cycle(), Some(at("2020-02-14T00:00:00Z")));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*cycles.borrow(), 1);
        f.service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn dormant_until_started_and_stops_promptly() {
        let f = fixture(TEST_CATALOG, |c| c).await;
        f.service.start_scheduler();
        f.service.start_scheduler();
        f.service.begin_epidemic().await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*f.service.subscribe_cycles().borrow(), 0);

        tokio::time::timeout(Duration::from_secs(5), f.service.shutdown())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn rescheduling_wakes_the_scheduler() {
        let f = fixture(TEST_CATALOG, |c| c).await;
        f.service.begin_epidemic().await.unwrap();
        let mut cycles = f.service.subscribe_cycles();
        f.service.start_scheduler();

        // Scheduler is asleep until midnight. Jump past it and force a
        // schedule change so it re-reads the clock.
        tokio::time::sleep(Duration::from_millis(50)).await;
        f.clock.set(at("2020-02-11T08:00:00Z"));
        let due = f.service.next_cycle();
        f.service.schedule.send_replace(due);

        tokio::time::timeout(Duration::from_secs(5), cycles.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(f.service.next_cycle(), Some(at("2020-02-12T00:00:00Z")));
        f.service.shutdown().await.unwrap();
    }
}
