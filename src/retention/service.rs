use std::time::Duration;

use chrono::Utc;
use tokio::time;
use tracing::{error, info};

use crate::{
    sensors::{PruneReport, ReadingService},
    store::StoreError,
};

/// Periodically deletes readings older than `max_age`.
pub struct RetentionService {
    readings: ReadingService,
    max_age: chrono::Duration,
    interval: Duration,
}

impl RetentionService {
    pub fn new(readings: ReadingService, max_age_days: u32, interval_secs: u64) -> Self {
        Self {
            readings,
            max_age: chrono::Duration::days(i64::from(max_age_days)),
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    /// Runs the sweep loop indefinitely.
    /// Spawn this via `tokio::spawn`.
    pub async fn run(self) {
        info!(
            interval_secs = self.interval.as_secs(),
            max_age_days = self.max_age.num_days(),
            "Retention sweeper started"
        );
        let mut ticker = time::interval(self.interval);

        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                error!(error = %e, "Retention sweep failed");
            }
        }
    }

    async fn run_once(&self) -> Result<PruneReport, StoreError> {
        let cutoff = Utc::now() - self.max_age;
        let report = self.readings.prune_before(cutoff).await?;

        if report.readings_removed > 0 || report.devices_evicted > 0 {
            info!(
                cutoff = %cutoff,
                readings_removed = report.readings_removed,
                devices_evicted = report.devices_evicted,
                "Retention sweep completed"
            );
        }
        Ok(report)
    }
}
