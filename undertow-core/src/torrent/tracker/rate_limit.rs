//! Fixed-window budget for outgoing UDP tracker checks.
//!
//! Unlike a classic token bucket there is no incremental refill: the whole
//! budget is restored at once when the window rolls over.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

static PROCESS_WIDE: OnceLock<Arc<UdpRateLimiter>> = OnceLock::new();

#[derive(Debug)]
struct Window {
    remaining: u32,
    started: Instant,
}

/// Hard-reset rate limiter gating UDP handshakes.
#[derive(Debug)]
pub struct UdpRateLimiter {
    budget: u32,
    window: Duration,
    state: Mutex<Window>,
}

impl UdpRateLimiter {
    /// Creates a limiter allowing `budget` checks per `window`.
    pub fn new(budget: u32, window: Duration) -> Self {
        Self {
            budget,
            window,
            state: Mutex::new(Window {
                remaining: budget,
                started: Instant::now(),
            }),
        }
    }

    /// The limiter shared by every validator in the process.
    ///
    /// The first caller's `budget` and `window` win; later arguments are
    /// ignored.
    pub fn process_wide(budget: u32, window: Duration) -> Arc<Self> {
        Arc::clone(PROCESS_WIDE.get_or_init(|| Arc::new(Self::new(budget, window))))
    }

    /// Takes one token if available. Never waits.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        self.roll_window(&mut state);

        if state.remaining == 0 {
            return false;
        }
        state.remaining -= 1;
        true
    }

    /// Tokens left in the current window.
    pub fn remaining(&self) -> u32 {
        let mut state = self.state.lock();
        self.roll_window(&mut state);
        state.remaining
    }

    fn roll_window(&self, state: &mut Window) {
        let now = Instant::now();
        if now.duration_since(state.started) >= self.window {
            state.remaining = self.budget;
            state.started = now;
        }
    }
}
