//! Background work throttling and timing samples.
//!
//! Refresh loops ask two questions before every tick:
//!
//! 1. [`LifecycleThrottle::should_run_work`]: may this app issue remote I/O now?
//! 2. [`LifecycleThrottle::throttle_ms`]: how long until the next tick?
//!
//! Both read the live lifecycle map on every call. Loops must not cache the
//! answer across ticks, because the app may have been suspended or closed in
//! between. Suspending or closing an app is the cancellation signal: work
//! already in flight finishes, but no further tick is scheduled.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::clock::Clock;
use crate::config::{ProfilerConfig, DEFAULT_SAMPLE_LIMIT};
use crate::lifecycle::{LifecycleManager, LifecycleState};

/// Base intervals below this are raised to it before the multiplier applies.
pub const MIN_BASE_INTERVAL_MS: u64 = 1_000;

/// Multiplier in tenths, so 2.5x stays exact in integer math.
fn multiplier_tenths(state: LifecycleState) -> u64 {
    match state {
        LifecycleState::Foreground => 10,
        LifecycleState::Background => 25,
        LifecycleState::Error => 40,
        LifecycleState::Suspended => 60,
        LifecycleState::Closed => 80,
    }
}

/// Multiplier applied to the base interval for `state`.
pub fn throttle_multiplier(state: LifecycleState) -> f64 {
    multiplier_tenths(state) as f64 / 10.0
}

/// `max(1000, base_ms) * multiplier(state)`, rounded half-up to whole ms.
pub fn resolve_lifecycle_throttle_ms(base_ms: u64, state: LifecycleState) -> u64 {
    let base = base_ms.max(MIN_BASE_INTERVAL_MS);
    base.saturating_mul(multiplier_tenths(state)).saturating_add(5) / 10
}

/// Suspended and closed apps must not start new work.
pub fn should_run_lifecycle_work(state: LifecycleState) -> bool {
    !matches!(state, LifecycleState::Suspended | LifecycleState::Closed)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Profiler
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSample {
    pub id: String,
    pub label: String,
    pub app_id: String,
    pub state: LifecycleState,
    pub duration_ms: f64,
    pub captured_at: DateTime<Utc>,
}

/// Aggregate over the retained samples of one app.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleSummary {
    pub app_id: String,
    pub count: usize,
    pub mean_ms: f64,
    pub max_ms: f64,
    pub slow_count: usize,
}

type SlowSampleHandler = Box<dyn Fn(&PerformanceSample) + Send + Sync>;

/// Times units of work and keeps the most recent samples in a ring buffer.
pub struct Profiler {
    config: ProfilerConfig,
    clock: Arc<dyn Clock>,
    samples: Mutex<VecDeque<PerformanceSample>>,
    on_slow_sample: SlowSampleHandler,
}

impl Profiler {
    /// Slow samples are logged at `warn` until a handler is installed.
    pub fn new(config: ProfilerConfig, clock: Arc<dyn Clock>) -> Self {
        let config = config.normalized();
        Self {
            samples: Mutex::new(VecDeque::with_capacity(config.sample_limit.min(DEFAULT_SAMPLE_LIMIT))),
            config,
            clock,
            on_slow_sample: Box::new(log_slow_sample),
        }
    }

    pub fn with_slow_sample_handler(
        mut self,
        handler: impl Fn(&PerformanceSample) + Send + Sync + 'static,
    ) -> Self {
        self.on_slow_sample = Box::new(handler);
        self
    }

    /// Swaps the slow-sample callback in place. Retained samples are kept.
    pub fn set_slow_sample_handler(&mut self, handler: impl Fn(&PerformanceSample) + Send + Sync + 'static) {
        self.on_slow_sample = Box::new(handler);
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn profile_sync<T>(
        &self,
        label: &str,
        app_id: &str,
        state: LifecycleState,
        work: impl FnOnce() -> T,
    ) -> T {
        if !self.config.enabled {
            return work();
        }
        let started = self.clock.monotonic();
        let output = work();
        self.record(label, app_id, state, started);
        output
    }

    pub async fn profile_async<F>(
        &self,
        label: &str,
        app_id: &str,
        state: LifecycleState,
        work: F,
    ) -> F::Output
    where
        F: Future,
    {
        if !self.config.enabled {
            return work.await;
        }
        let started = self.clock.monotonic();
        let output = work.await;
        self.record(label, app_id, state, started);
        output
    }

    /// Retained samples, oldest first.
    pub fn recent_samples(&self) -> Vec<PerformanceSample> {
        self.lock_samples().iter().cloned().collect()
    }

    pub fn samples_for(&self, app_id: &str) -> Vec<PerformanceSample> {
        self.lock_samples()
            .iter()
            .filter(|sample| sample.app_id == app_id)
            .cloned()
            .collect()
    }

    pub fn summary_for(&self, app_id: &str) -> Option<SampleSummary> {
        let samples = self.lock_samples();
        let durations: Vec<f64> = samples
            .iter()
            .filter(|sample| sample.app_id == app_id)
            .map(|sample| sample.duration_ms)
            .collect();
        if durations.is_empty() {
            return None;
        }
        let total: f64 = durations.iter().sum();
        let max_ms = durations.iter().copied().fold(0.0, f64::max);
        let slow_count = durations
            .iter()
            .filter(|duration| **duration >= self.config.slow_threshold_ms)
            .count();
        Some(SampleSummary {
            app_id: app_id.to_string(),
            count: durations.len(),
            mean_ms: total / durations.len() as f64,
            max_ms,
            slow_count,
        })
    }

    pub fn clear_samples(&self) {
        self.lock_samples().clear();
    }

    fn record(&self, label: &str, app_id: &str, state: LifecycleState, started: std::time::Duration) {
        let elapsed = self.clock.monotonic().saturating_sub(started);
        let sample = PerformanceSample {
            id: ulid::Ulid::new().to_string(),
            label: label.to_string(),
            app_id: app_id.to_string(),
            state,
            duration_ms: elapsed.as_secs_f64() * 1_000.0,
            captured_at: self.clock.now(),
        };

        {
            let mut samples = self.lock_samples();
            while samples.len() >= self.config.sample_limit {
                samples.pop_front();
            }
            samples.push_back(sample.clone());
        }

        // Handler runs outside the buffer lock so it may read samples itself.
        if sample.duration_ms >= self.config.slow_threshold_ms {
            (self.on_slow_sample)(&sample);
        }
    }

    fn lock_samples(&self) -> std::sync::MutexGuard<'_, VecDeque<PerformanceSample>> {
        // Sample history is diagnostic only; recover from poisoning.
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Profiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profiler")
            .field("config", &self.config)
            .field("samples", &self.lock_samples().len())
            .finish()
    }
}

fn log_slow_sample(sample: &PerformanceSample) {
    warn!(
        label = %sample.label,
        app_id = %sample.app_id,
        state = %sample.state,
        duration_ms = sample.duration_ms,
        "Slow lifecycle work sample"
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Lifecycle-aware facade
// ═══════════════════════════════════════════════════════════════════════════════

/// Throttle queries bound to a borrowed lifecycle map.
///
/// Cheap to build; construct one per tick rather than storing it.
/// Unknown app ids resolve as `closed`.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleThrottle<'a> {
    lifecycle: &'a LifecycleManager,
    profiler: &'a Profiler,
}

impl<'a> LifecycleThrottle<'a> {
    pub fn new(lifecycle: &'a LifecycleManager, profiler: &'a Profiler) -> Self {
        Self {
            lifecycle,
            profiler,
        }
    }

    fn state(&self, app_id: &str) -> LifecycleState {
        self.lifecycle
            .state_of(app_id)
            .unwrap_or(LifecycleState::Closed)
    }

    pub fn throttle_ms(&self, app_id: &str, base_ms: u64) -> u64 {
        resolve_lifecycle_throttle_ms(base_ms, self.state(app_id))
    }

    pub fn should_run_work(&self, app_id: &str) -> bool {
        should_run_lifecycle_work(self.state(app_id))
    }

    pub fn profile_sync<T>(&self, label: &str, app_id: &str, work: impl FnOnce() -> T) -> T {
        self.profiler
            .profile_sync(label, app_id, self.state(app_id), work)
    }

    pub async fn profile_async<F: Future>(&self, label: &str, app_id: &str, work: F) -> F::Output {
        let state = self.state(app_id);
        self.profiler.profile_async(label, app_id, state, work).await
    }

    pub fn recent_samples(&self) -> Vec<PerformanceSample> {
        self.profiler.recent_samples()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::MAX_SAMPLE_LIMIT;
    use std::time::Duration;

    fn profiler(config: ProfilerConfig) -> (Profiler, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (Profiler::new(config, clock.clone()), clock)
    }

    #[test]
    fn test_throttle_table_for_minute_base() {
        assert_eq!(resolve_lifecycle_throttle_ms(60_000, LifecycleState::Foreground), 60_000);
        assert_eq!(resolve_lifecycle_throttle_ms(60_000, LifecycleState::Background), 150_000);
        assert_eq!(resolve_lifecycle_throttle_ms(60_000, LifecycleState::Suspended), 360_000);
        assert_eq!(resolve_lifecycle_throttle_ms(60_000, LifecycleState::Error), 240_000);
        assert_eq!(resolve_lifecycle_throttle_ms(60_000, LifecycleState::Closed), 480_000);
    }

    #[test]
    fn test_throttle_never_below_base() {
        for base in [0, 1, 999, 1_000, 1_001, 4_321, 60_000] {
            for state in LifecycleState::ALL {
                assert!(resolve_lifecycle_throttle_ms(base, state) >= base);
            }
        }
    }

    #[test]
    fn test_throttle_floor_applies_before_multiplier() {
        assert_eq!(resolve_lifecycle_throttle_ms(200, LifecycleState::Foreground), 1_000);
        assert_eq!(resolve_lifecycle_throttle_ms(0, LifecycleState::Background), 2_500);
    }

    #[test]
    fn test_throttle_rounds_half_up() {
        assert_eq!(resolve_lifecycle_throttle_ms(1_001, LifecycleState::Background), 2_503);
    }

    #[test]
    fn test_multiplier_ordering() {
        let ordered = [
            LifecycleState::Foreground,
            LifecycleState::Background,
            LifecycleState::Error,
            LifecycleState::Suspended,
            LifecycleState::Closed,
        ];
        let multipliers: Vec<f64> = ordered.iter().map(|s| throttle_multiplier(*s)).collect();
        assert_eq!(multipliers, vec![1.0, 2.5, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_run_gate_blocks_only_suspended_and_closed() {
        assert!(!should_run_lifecycle_work(LifecycleState::Suspended));
        assert!(!should_run_lifecycle_work(LifecycleState::Closed));
        assert!(should_run_lifecycle_work(LifecycleState::Foreground));
        assert!(should_run_lifecycle_work(LifecycleState::Background));
        assert!(should_run_lifecycle_work(LifecycleState::Error));
    }

    #[test]
    fn test_profile_sync_records_duration() {
        let (profiler, clock) = profiler(ProfilerConfig::default());
        let value = profiler.profile_sync("refresh", "map", LifecycleState::Foreground, || {
            clock.advance(Duration::from_millis(12));
            42
        });

        assert_eq!(value, 42);
        let samples = profiler.recent_samples();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].label, "refresh");
        assert_eq!(samples[0].app_id, "map");
        assert_eq!(samples[0].state, LifecycleState::Foreground);
        assert!((samples[0].duration_ms - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let config = ProfilerConfig {
            sample_limit: 6,
            ..ProfilerConfig::default()
        };
        let (profiler, _) = profiler(config);
        for index in 0..10 {
            profiler.profile_sync(&format!("tick-{index}"), "map", LifecycleState::Background, || ());
        }

        let labels: Vec<_> = profiler
            .recent_samples()
            .into_iter()
            .map(|sample| sample.label)
            .collect();
        assert_eq!(labels, vec!["tick-4", "tick-5", "tick-6", "tick-7", "tick-8", "tick-9"]);
    }

    #[test]
    fn test_sample_limit_clamped_to_minimum() {
        let config = ProfilerConfig {
            sample_limit: 2,
            ..ProfilerConfig::default()
        };
        let (profiler, _) = profiler(config);
        for _ in 0..8 {
            profiler.profile_sync("tick", "map", LifecycleState::Foreground, || ());
        }
        assert_eq!(profiler.recent_samples().len(), 6);
    }

    #[test]
    fn test_sample_limit_clamped_to_maximum() {
        let config = ProfilerConfig {
            sample_limit: usize::MAX,
            ..ProfilerConfig::default()
        };
        let (profiler, _) = profiler(config);
        assert_eq!(profiler.config().sample_limit, MAX_SAMPLE_LIMIT);

        profiler.profile_sync("tick", "map", LifecycleState::Foreground, || ());
        assert_eq!(profiler.recent_samples().len(), 1);
    }

    #[test]
    fn test_set_slow_sample_handler_keeps_samples() {
        let (mut profiler, clock) = profiler(ProfilerConfig::default());
        profiler.profile_sync("warmup", "map", LifecycleState::Foreground, || ());

        let slow = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&slow);
        profiler.set_slow_sample_handler(move |_| *counter.lock().unwrap() += 1);
        profiler.profile_sync("heavy", "map", LifecycleState::Foreground, || {
            clock.advance(Duration::from_millis(30));
        });

        assert_eq!(*slow.lock().unwrap(), 1);
        assert_eq!(profiler.recent_samples().len(), 2);
    }

    #[test]
    fn test_slow_sample_handler_fires_at_threshold() {
        let clock = Arc::new(ManualClock::default());
        let slow = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&slow);
        let profiler = Profiler::new(ProfilerConfig::default(), clock.clone())
            .with_slow_sample_handler(move |sample| sink.lock().unwrap().push(sample.label.clone()));

        profiler.profile_sync("fast", "map", LifecycleState::Foreground, || {
            clock.advance(Duration::from_millis(17));
        });
        profiler.profile_sync("edge", "map", LifecycleState::Foreground, || {
            clock.advance(Duration::from_millis(18));
        });

        assert_eq!(*slow.lock().unwrap(), vec!["edge".to_string()]);
    }

    #[test]
    fn test_disabled_profiler_is_passthrough() {
        let config = ProfilerConfig {
            enabled: false,
            ..ProfilerConfig::default()
        };
        let (profiler, _) = profiler(config);
        let value = profiler.profile_sync("refresh", "map", LifecycleState::Foreground, || "ok");
        let async_value = futures::executor::block_on(profiler.profile_async(
            "refresh",
            "map",
            LifecycleState::Foreground,
            async { 7 },
        ));

        assert_eq!(value, "ok");
        assert_eq!(async_value, 7);
        assert!(profiler.recent_samples().is_empty());
    }

    #[test]
    fn test_profile_async_records_sample() {
        let (profiler, clock) = profiler(ProfilerConfig::default());
        let result = futures::executor::block_on(profiler.profile_async(
            "fetch",
            "chat",
            LifecycleState::Background,
            async {
                clock.advance(Duration::from_millis(30));
                "done"
            },
        ));

        assert_eq!(result, "done");
        let samples = profiler.samples_for("chat");
        assert_eq!(samples.len(), 1);
        assert!((samples[0].duration_ms - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_for_app() {
        let (profiler, clock) = profiler(ProfilerConfig::default());
        for ms in [10, 20, 30] {
            profiler.profile_sync("tick", "map", LifecycleState::Foreground, || {
                clock.advance(Duration::from_millis(ms));
            });
        }
        profiler.profile_sync("tick", "chat", LifecycleState::Background, || ());

        let summary = profiler.summary_for("map").unwrap();
        assert_eq!(summary.count, 3);
        assert!((summary.mean_ms - 20.0).abs() < 1e-9);
        assert!((summary.max_ms - 30.0).abs() < 1e-9);
        assert_eq!(summary.slow_count, 2);
        assert!(profiler.summary_for("ghost").is_none());

        profiler.clear_samples();
        assert!(profiler.recent_samples().is_empty());
    }

    #[test]
    fn test_facade_reads_live_state() {
        let clock = Arc::new(ManualClock::default());
        let mut lifecycle = LifecycleManager::new(clock.clone());
        lifecycle.initialize(["map"]);
        let profiler = Profiler::new(ProfilerConfig::default(), clock.clone());

        assert!(!LifecycleThrottle::new(&lifecycle, &profiler).should_run_work("map"));

        lifecycle.mark_foreground("map");
        let throttle = LifecycleThrottle::new(&lifecycle, &profiler);
        assert!(throttle.should_run_work("map"));
        assert_eq!(throttle.throttle_ms("map", 60_000), 60_000);

        lifecycle.mark_background("map");
        let throttle = LifecycleThrottle::new(&lifecycle, &profiler);
        assert_eq!(throttle.throttle_ms("map", 60_000), 150_000);
    }

    #[test]
    fn test_facade_treats_unknown_apps_as_closed() {
        let clock = Arc::new(ManualClock::default());
        let lifecycle = LifecycleManager::new(clock.clone());
        let profiler = Profiler::new(ProfilerConfig::default(), clock);
        let throttle = LifecycleThrottle::new(&lifecycle, &profiler);

        assert!(!throttle.should_run_work("ghost"));
        assert_eq!(throttle.throttle_ms("ghost", 60_000), 480_000);
        throttle.profile_sync("tick", "ghost", || ());
        assert_eq!(throttle.recent_samples()[0].state, LifecycleState::Closed);
    }
}
