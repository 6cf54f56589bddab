// =============================================================================
// Central Application State — last rendered chart + refresh status
// =============================================================================
//
// AppState is the renderer the refresh cycle hands bundles to.  It keeps the
// last successfully rendered bundle for the HTTP/WebSocket surface and a
// small status record describing how the cycle is doing.
//
// Thread safety:
//   - Atomic counters for lock-free version tracking.
//   - parking_lot::RwLock for the bundle and status records.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::refresh::{ChartBundle, RefreshError, Renderer};

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// A recorded pass failure.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub pass: u64,
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Serialisable view of refresh health.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshStatus {
    pub state_version: u64,
    pub last_rendered_pass: Option<u64>,
    pub last_success_at: Option<String>,
    pub consecutive_failures: u32,
    pub skipped_ticks: u64,
    pub recent_errors: Vec<ErrorRecord>,
    pub uptime_secs: u64,
}

/// Shared across the refresh cycle and the API via `Arc<AppState>`.
pub struct AppState {
    /// Bumped whenever a new bundle is published or status changes; the
    /// WebSocket feed pushes on change.
    pub state_version: AtomicU64,

    latest: RwLock<Option<Arc<ChartBundle>>>,
    last_success_at: RwLock<Option<String>>,
    consecutive_failures: RwLock<u32>,
    skipped_ticks: AtomicU64,
    recent_errors: RwLock<Vec<ErrorRecord>>,

    pub start_time: std::time::Instant,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            state_version: AtomicU64::new(1),
            latest: RwLock::new(None),
            last_success_at: RwLock::new(None),
            consecutive_failures: RwLock::new(0),
            skipped_ticks: AtomicU64::new(0),
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Chart ───────────────────────────────────────────────────────────

    /// The last successfully rendered bundle, if any pass has succeeded yet.
    pub fn latest_bundle(&self) -> Option<Arc<ChartBundle>> {
        self.latest.read().clone()
    }

    // ── Status ──────────────────────────────────────────────────────────

    pub fn status(&self) -> RefreshStatus {
        RefreshStatus {
            state_version: self.current_state_version(),
            last_rendered_pass: self.latest.read().as_ref().map(|b| b.pass),
            last_success_at: self.last_success_at.read().clone(),
            consecutive_failures: *self.consecutive_failures.read(),
            skipped_ticks: self.skipped_ticks.load(Ordering::Relaxed),
            recent_errors: self.recent_errors.read().clone(),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    fn push_error(&self, pass: u64, message: String) {
        let mut errors = self.recent_errors.write();
        errors.push(ErrorRecord {
            pass,
            message,
            at: Utc::now().to_rfc3339(),
        });
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
    }
}

impl Renderer for AppState {
    fn render(&self, bundle: ChartBundle) {
        *self.latest.write() = Some(Arc::new(bundle));
        *self.last_success_at.write() = Some(Utc::now().to_rfc3339());
        *self.consecutive_failures.write() = 0;
        self.increment_version();
    }

    fn pass_failed(&self, pass: u64, error: &RefreshError) {
        self.push_error(pass, error.to_string());
        *self.consecutive_failures.write() += 1;
        self.increment_version();
    }

    fn tick_skipped(&self) {
        self.skipped_ticks.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::BandPair;
    use crate::market_data::FeedError;

    fn bundle(pass: u64) -> ChartBundle {
        ChartBundle::assemble("T", pass, 25, &[], vec![], BandPair::default(), vec![])
    }

    #[test]
    fn render_publishes_and_bumps_version() {
        let state = AppState::new();
        assert!(state.latest_bundle().is_none());
        let v0 = state.current_state_version();

        state.render(bundle(1));
        assert_eq!(state.latest_bundle().unwrap().pass, 1);
        assert!(state.current_state_version() > v0);
        assert!(state.status().last_success_at.is_some());
    }

    #[test]
    fn failure_keeps_last_bundle() {
        let state = AppState::new();
        state.render(bundle(1));
        state.pass_failed(2, &RefreshError::Feed(FeedError::Fetch("down".into())));
        state.pass_failed(3, &RefreshError::Feed(FeedError::Fetch("down".into())));

        assert_eq!(state.latest_bundle().unwrap().pass, 1);
        let status = state.status();
        assert_eq!(status.consecutive_failures, 2);
        assert_eq!(status.recent_errors.len(), 2);
        assert_eq!(status.recent_errors[0].pass, 2);
        assert_eq!(status.last_rendered_pass, Some(1));

        state.render(bundle(4));
        assert_eq!(state.status().consecutive_failures, 0);
    }

    #[test]
    fn error_log_is_capped() {
        let state = AppState::new();
        for pass in 0..(MAX_RECENT_ERRORS as u64 + 10) {
            state.pass_failed(pass, &RefreshError::Timeout(std::time::Duration::from_secs(1)));
        }
        let errors = state.status().recent_errors;
        assert_eq!(errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(errors[0].pass, 10);
    }

    #[test]
    fn skipped_ticks_are_counted() {
        let state = AppState::new();
        state.tick_skipped();
        state.tick_skipped();
        assert_eq!(state.status().skipped_ticks, 2);
    }
}
