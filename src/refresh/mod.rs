// =============================================================================
// Refresh Cycle — periodic fetch → compute → render
// =============================================================================
//
// State machine per pass:
//
//   Idle → Fetching → Computing → Rendering → Idle
//             │           │
//             └───────────┴──→ Idle   (failure: nothing is rendered)
//
// At most one pass is in flight.  `tick` does a test-and-set on a single
// flag; a tick that finds the flag raised is skipped, never queued.  The two
// fetches run concurrently and share one deadline; on expiry the pass is
// abandoned as a fetch failure.  A failed pass never touches the renderer,
// so the previous frame stays on screen and the schedule carries on.
// =============================================================================

pub mod bundle;

pub use bundle::ChartBundle;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::indicators::{self, IndicatorError};
use crate::market_data::{FeedError, OrderFeed, SeriesSource};
use crate::types::{OrderAnnotation, PassPhase, PriceBar};

/// Why a pass was abandoned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("indicator computation failed: {0}")]
    Compute(#[from] IndicatorError),
}

impl RefreshError {
    /// Data-source trouble that the next tick may clear. Compute failures
    /// mean the cycle itself is misconfigured.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Compute(_))
    }
}

/// Consumer of finished bundles (the chart widget, or whatever publishes to
/// it). Only successful passes call `render`.
pub trait Renderer: Send + Sync {
    fn render(&self, bundle: ChartBundle);

    /// A pass was abandoned; the previously rendered bundle stays current.
    fn pass_failed(&self, _pass: u64, _error: &RefreshError) {}

    /// A tick fired while a pass was still in flight.
    fn tick_skipped(&self) {}
}

/// Result of one completed (or abandoned) pass.
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    Rendered {
        pass: u64,
        bars: usize,
        annotations: usize,
    },
    Abandoned {
        pass: u64,
        error: RefreshError,
    },
}

/// Result of a timer tick.
#[derive(Debug)]
pub enum TickOutcome {
    Started(JoinHandle<PassOutcome>),
    Skipped,
}

/// Parameters fixed for the lifetime of a cycle.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub title: String,
    pub window: i64,
    pub band_std: f64,
    pub fetch_timeout: Duration,
}

pub struct RefreshCycle {
    series: Arc<dyn SeriesSource>,
    orders: Arc<dyn OrderFeed>,
    renderer: Arc<dyn Renderer>,
    settings: CycleSettings,
    in_flight: AtomicBool,
    phase: RwLock<PassPhase>,
    pass_counter: AtomicU64,
}

/// Lowers the in-flight flag when the pass finishes, panics included.
struct InFlightGuard(Arc<RefreshCycle>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        *self.0.phase.write() = PassPhase::Idle;
        self.0.in_flight.store(false, Ordering::Release);
    }
}

impl RefreshCycle {
    /// Build a cycle. Indicator parameters are checked up front so a bad
    /// window fails at startup rather than on every tick.
    pub fn new(
        series: Arc<dyn SeriesSource>,
        orders: Arc<dyn OrderFeed>,
        renderer: Arc<dyn Renderer>,
        settings: CycleSettings,
    ) -> Result<Self, IndicatorError> {
        indicators::bollinger_bands_with(&[], settings.window, settings.band_std)?;

        Ok(Self {
            series,
            orders,
            renderer,
            settings,
            in_flight: AtomicBool::new(false),
            phase: RwLock::new(PassPhase::Idle),
            pass_counter: AtomicU64::new(0),
        })
    }

    pub fn phase(&self) -> PassPhase {
        *self.phase.read()
    }

    #[cfg(test)]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Number of passes started so far.
    pub fn passes_started(&self) -> u64 {
        self.pass_counter.load(Ordering::Relaxed)
    }

    /// Handle one timer tick: start a pass unless one is already running.
    pub fn tick(self: &Arc<Self>) -> TickOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(phase = %self.phase(), "refresh tick skipped: previous pass still in flight");
            self.renderer.tick_skipped();
            return TickOutcome::Skipped;
        }

        let guard = InFlightGuard(Arc::clone(self));
        let cycle = Arc::clone(self);
        TickOutcome::Started(tokio::spawn(async move {
            let _guard = guard;
            cycle.execute_pass().await
        }))
    }

    /// Tick forever at `every`. The first tick fires immediately.
    pub async fn run(self: Arc<Self>, every: Duration) {
        info!(
            interval_secs = every.as_secs_f64(),
            window = self.settings.window,
            "refresh cycle started"
        );

        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let TickOutcome::Started(handle) = self.tick() {
                self.supervise(handle);
            }
        }
    }

    /// Outcomes are reported by the pass itself; only a panic is left to log.
    fn supervise(self: &Arc<Self>, handle: JoinHandle<PassOutcome>) {
        let cycle = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                error!(
                    error = %e,
                    passes_started = cycle.passes_started(),
                    "refresh pass task died; the next tick starts a fresh pass"
                );
            }
        });
    }

    async fn execute_pass(&self) -> PassOutcome {
        let pass = self.pass_counter.fetch_add(1, Ordering::Relaxed) + 1;

        self.set_phase(PassPhase::Fetching);
        let (bars, annotations) = match self.fetch_all().await {
            Ok(fetched) => fetched,
            Err(e) => return self.abandon(pass, e),
        };

        self.set_phase(PassPhase::Computing);
        let bundle = match self.compute(pass, &bars, annotations) {
            Ok(bundle) => bundle,
            Err(e) => return self.abandon(pass, e),
        };
        let annotation_count = bundle.annotations.len();

        self.set_phase(PassPhase::Rendering);
        self.renderer.render(bundle);
        self.set_phase(PassPhase::Idle);

        debug!(
            pass,
            bars = bars.len(),
            annotations = annotation_count,
            "refresh pass rendered"
        );
        PassOutcome::Rendered {
            pass,
            bars: bars.len(),
            annotations: annotation_count,
        }
    }

    async fn fetch_all(&self) -> Result<(Vec<PriceBar>, Vec<OrderAnnotation>), RefreshError> {
        let timeout = self.settings.fetch_timeout;
        let both = async {
            tokio::try_join!(self.series.fetch_series(), self.orders.fetch_orders())
        };

        match tokio::time::timeout(timeout, both).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(RefreshError::Timeout(timeout)),
        }
    }

    fn compute(
        &self,
        pass: u64,
        bars: &[PriceBar],
        annotations: Vec<OrderAnnotation>,
    ) -> Result<ChartBundle, RefreshError> {
        let window = self.settings.window;
        let moving_average = indicators::moving_average(bars, window)?;
        let bands = indicators::bollinger_bands_with(bars, window, self.settings.band_std)?;

        Ok(ChartBundle::assemble(
            &self.settings.title,
            pass,
            window,
            bars,
            moving_average,
            bands,
            annotations,
        ))
    }

    fn abandon(&self, pass: u64, error: RefreshError) -> PassOutcome {
        self.set_phase(PassPhase::Idle);
        if error.is_transient() {
            warn!(pass, error = %error, "refresh pass abandoned; keeping previous chart");
        } else {
            error!(pass, error = %error, "refresh pass failed: cycle misconfigured");
        }
        self.renderer.pass_failed(pass, &error);
        PassOutcome::Abandoned { pass, error }
    }

    fn set_phase(&self, phase: PassPhase) {
        *self.phase.write() = phase;
    }
}
