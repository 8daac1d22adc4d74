//! Time sources for sampling and record timestamps.
//!
//! Durations come from [`Clock::monotonic`], which never decreases. Record
//! timestamps (`updatedAt`, `capturedAt`, `createdAt`) come from
//! [`Clock::now`].

use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    /// Elapsed time since a fixed, arbitrary origin. Never decreases.
    fn monotonic(&self) -> Duration;

    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall-clock fallback for hosts without a usable monotonic source.
///
/// Readings are clamped to the highest value seen so far, so a wall-clock
/// step backwards yields a zero-length interval instead of a negative one.
#[derive(Debug, Default)]
pub struct CoarseClock {
    high_water: Mutex<Duration>,
}

impl CoarseClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for CoarseClock {
    fn monotonic(&self) -> Duration {
        let reading = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let mut high_water = self
            .high_water
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if reading > *high_water {
            *high_water = reading;
        }
        *high_water
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug)]
struct ManualState {
    elapsed: Duration,
    wall: DateTime<Utc>,
}

/// Deterministic clock advanced by hand. Used by tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

impl ManualClock {
    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(ManualState {
                elapsed: Duration::ZERO,
                wall,
            }),
        }
    }

    /// Moves both the monotonic reading and the wall clock forward.
    pub fn advance(&self, by: Duration) {
        let mut state = self.lock();
        state.elapsed += by;
        state.wall += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
    }

    /// Jumps the wall clock without touching the monotonic reading.
    pub fn set_wall(&self, wall: DateTime<Utc>) {
        self.lock().wall = wall;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(Utc::now())
    }
}

impl Clock for ManualClock {
    fn monotonic(&self) -> Duration {
        self.lock().elapsed
    }

    fn now(&self) -> DateTime<Utc> {
        self.lock().wall
    }
}
