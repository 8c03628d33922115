use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::pool::ClientPool;

/// How long the pool is presumed saturated after the first rate-limit hit.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

/// Source of the current time, injectable so cooldown expiry can be tested
/// without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Saturation state of the credential pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CooldownState {
    /// Deadline after which the pool is presumed usable again.
    pub active_until: Option<Instant>,
    /// Rotations attempted during the current saturation episode.
    pub consecutive_rotations: usize,
}

/// Tracks whether every credential has been tried while the pool is
/// rate-limited.
pub struct RateLimitTracker {
    state: Mutex<CooldownState>,
    pool_size: usize,
    cooldown: Duration,
    clock: Arc<dyn Clock>,
}

impl RateLimitTracker {
    pub fn new(pool_size: usize, cooldown: Duration) -> Self {
        Self::with_clock(pool_size, cooldown, Arc::new(SystemClock))
    }

    /// Tracker sized to `pool`, so the exhaustion ceiling matches the number
    /// of credentials that can be rotated through.
    pub fn for_pool(pool: &ClientPool, cooldown: Duration) -> Self {
        Self::new(pool.size(), cooldown)
    }

    pub fn with_clock(pool_size: usize, cooldown: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(CooldownState::default()),
            pool_size,
            cooldown,
            clock,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn state(&self) -> CooldownState {
        *self.lock()
    }

    /// True while a cooldown is active and every credential has already been
    /// rotated through in this episode.
    pub fn is_exhausted(&self) -> bool {
        let state = self.lock();
        self.cooling_down(&state) && state.consecutive_rotations >= self.pool_size
    }

    /// Record a rate-limit failure. Starts a new cooldown episode if none is
    /// running; otherwise only counts the rotation and keeps the deadline.
    pub fn mark_saturated(&self) {
        let mut state = self.lock();
        if self.cooling_down(&state) {
            state.consecutive_rotations += 1;
            debug!(
                "pool still saturated, rotation {}/{}",
                state.consecutive_rotations, self.pool_size
            );
        } else {
            state.active_until = Some(self.clock.now() + self.cooldown);
            state.consecutive_rotations = 1;
            warn!(
                "credential pool saturated, cooling down for {:?}",
                self.cooldown
            );
        }
    }

    /// Clear the cooldown after any successful call.
    pub fn reset(&self) {
        let mut state = self.lock();
        if state.active_until.is_some() || state.consecutive_rotations > 0 {
            info!(
                "credential pool recovered after {} rotations",
                state.consecutive_rotations
            );
        }
        *state = CooldownState::default();
    }

    fn cooling_down(&self, state: &CooldownState) -> bool {
        state
            .active_until
            .is_some_and(|deadline| self.clock.now() < deadline)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CooldownState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
