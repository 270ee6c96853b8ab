//! Scheduled Jobs
//!
//! Background maintenance: expired provider sessions and idle cache entries.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::interval;

use crate::cache::QueryCache;
use crate::identity::{IdentityError, IdentityProvider};

// =========================================================================
// Expired Session Purge
// =========================================================================

/// Delete provider sessions past their expiry
pub async fn purge_expired_sessions(identity: &dyn IdentityProvider) -> Result<u64, JobError> {
    let rows_deleted = identity.purge_expired_sessions().await?;

    if rows_deleted > 0 {
        tracing::info!(rows_deleted = rows_deleted, "Purged expired sessions");
    }

    Ok(rows_deleted)
}

// =========================================================================
// Idle Cache Eviction
// =========================================================================

/// Drop cache entries nobody has refreshed within `max_age`
pub fn evict_idle_cache_entries(cache: &QueryCache, max_age: Duration) -> usize {
    let evicted = cache.evict_older_than(max_age);

    if evicted > 0 {
        tracing::debug!(evicted = evicted, remaining = cache.key_count(), "Evicted idle cache entries");
    }

    evicted
}

// =========================================================================
// Job Scheduler
// =========================================================================

/// Configuration for job scheduler
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Interval for the session purge (default: 1 hour)
    pub session_purge_interval: Duration,
    /// Interval for cache eviction (default: 5 minutes)
    pub cache_eviction_interval: Duration,
    /// Age after which a cache entry counts as idle (default: 10 minutes)
    pub cache_max_age: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            session_purge_interval: Duration::from_secs(3600),
            cache_eviction_interval: Duration::from_secs(300),
            cache_max_age: Duration::from_secs(600),
        }
    }
}

/// Job Scheduler - runs periodic maintenance tasks
pub struct JobScheduler {
    identity: Arc<dyn IdentityProvider>,
    cache: Arc<QueryCache>,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    pub fn new(identity: Arc<dyn IdentityProvider>, cache: Arc<QueryCache>) -> Self {
        Self {
            identity,
            cache,
            config: JobSchedulerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: JobSchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Start the job scheduler in the background
    /// Returns a handle that can be used to abort the scheduler
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        tracing::info!("Job scheduler started");

        let mut session_interval = interval(self.config.session_purge_interval);
        let mut cache_interval = interval(self.config.cache_eviction_interval);

        loop {
            tokio::select! {
                _ = session_interval.tick() => {
                    if let Err(e) = purge_expired_sessions(self.identity.as_ref()).await {
                        tracing::error!(error = %e, "Session purge failed");
                    }
                }
                _ = cache_interval.tick() => {
                    evict_idle_cache_entries(&self.cache, self.config.cache_max_age);
                }
            }
        }
    }

    /// Run all maintenance jobs once (for manual trigger or testing)
    pub async fn run_all_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match purge_expired_sessions(self.identity.as_ref()).await {
            Ok(count) => report.sessions_purged = count,
            Err(e) => report.errors.push(format!("Session purge: {}", e)),
        }

        report.cache_entries_evicted = evict_idle_cache_entries(&self.cache, self.config.cache_max_age);

        report.completed_at = Utc::now();
        report
    }
}

/// Report from running maintenance jobs
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub sessions_purged: u64,
    pub cache_entries_evicted: usize,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Identity provider error: {0}")]
    Identity(#[from] IdentityError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::QueryKey;
    use crate::identity::MemoryIdentityProvider;

    #[test]
    fn test_job_scheduler_config_default() {
        let config = JobSchedulerConfig::default();
        assert_eq!(config.session_purge_interval, Duration::from_secs(3600));
        assert_eq!(config.cache_eviction_interval, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_run_all_once_purges_expired_sessions() {
        let identity = Arc::new(MemoryIdentityProvider::new(chrono::Duration::milliseconds(1)));
        identity
            .create_identity("a@example.com", "password123", "A")
            .await
            .unwrap();
        identity.create_session("a@example.com", "password123").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let cache = Arc::new(QueryCache::new());
        cache.insert(QueryKey::new(["events"]), 1u32).await;

        let scheduler = JobScheduler::new(identity.clone(), cache.clone()).with_config(JobSchedulerConfig {
            cache_max_age: Duration::from_secs(60),
            ..Default::default()
        });
        let report = scheduler.run_all_once().await;

        assert_eq!(report.sessions_purged, 1);
        assert_eq!(report.cache_entries_evicted, 0);
        assert!(report.errors.is_empty());
        assert_eq!(identity.session_count().await, 0);
        assert_eq!(cache.key_count(), 1);
    }

    #[test]
    fn test_maintenance_report_default() {
        let report = MaintenanceReport::default();
        assert_eq!(report.sessions_purged, 0);
        assert_eq!(report.errors.len(), 0);
    }
}
