use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::pipeline::{CatalogPipeline, PassReport};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulerStats {
    pub running: bool,
    pub interval_secs: u64,
    pub passes_completed: u64,
    pub records_created: u64,
    pub aborted_walks: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub last_pass: Option<PassReport>,
}

/// Runs the catalog pipeline in a background loop: one pass, then a fixed sleep, forever.
pub struct PipelineScheduler {
    pipeline: Arc<CatalogPipeline>,
    interval: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<RwLock<SchedulerStats>>,
}

impl PipelineScheduler {
    pub fn new(pipeline: Arc<CatalogPipeline>, interval: Duration) -> Self {
        let stats = SchedulerStats {
            running: false,
            interval_secs: interval.as_secs(),
            passes_completed: 0,
            records_created: 0,
            aborted_walks: 0,
            started_at: None,
            last_run: None,
            next_run: None,
            last_pass: None,
        };

        Self {
            pipeline,
            interval,
            handle: Mutex::new(None),
            stats: Arc::new(RwLock::new(stats)),
        }
    }

    /// Starts the loop unless it is already running. Safe to call any number of times.
    pub async fn ensure_running(&self) -> StartOutcome {
        let mut handle = self.handle.lock().await;
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::debug!("Pipeline loop already running");
            return StartOutcome::AlreadyRunning;
        }

        {
            let mut stats = self.stats.write().await;
            stats.running = true;
            stats.started_at = Some(Utc::now());
        }

        let pipeline = Arc::clone(&self.pipeline);
        let stats = Arc::clone(&self.stats);
        let interval = self.interval;
        *handle = Some(tokio::spawn(async move {
            Self::run_loop(pipeline, stats, interval).await;
        }));

        tracing::info!(interval_secs = interval.as_secs(), "Pipeline loop started");
        StartOutcome::Started
    }

    async fn run_loop(pipeline: Arc<CatalogPipeline>, stats: Arc<RwLock<SchedulerStats>>, interval: Duration) {
        loop {
            let report = pipeline.run_pass().await;
            Self::record_pass(&stats, report, Some(interval)).await;
            tokio::time::sleep(interval).await;
        }
    }

    async fn record_pass(stats: &RwLock<SchedulerStats>, report: PassReport, interval: Option<Duration>) {
        let mut stats = stats.write().await;
        stats.passes_completed += 1;
        stats.records_created += report.summary.inserted as u64;
        if report.aborted.is_some() {
            stats.aborted_walks += 1;
        }
        stats.last_run = Some(report.finished_at);
        if let Some(interval) = interval {
            stats.next_run = chrono::Duration::from_std(interval)
                .ok()
                .map(|interval| report.finished_at + interval);
        }
        stats.last_pass = Some(report);
    }

    /// Runs a single pass right now, outside the loop.
    pub async fn run_pass(&self) -> PassReport {
        let report = self.pipeline.run_pass().await;
        Self::record_pass(&self.stats, report.clone(), None).await;
        report
    }

    pub async fn is_running(&self) -> bool {
        let handle = self.handle.lock().await;
        handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub async fn stats(&self) -> SchedulerStats {
        let mut stats = self.stats.read().await.clone();
        stats.running = self.is_running().await;
        stats
    }

    /// Stops the loop. A pass in progress is abandoned.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            handle.abort();
            tracing::info!("Pipeline loop stopped");
        }
        let mut stats = self.stats.write().await;
        stats.running = false;
        stats.next_run = None;
    }
}
