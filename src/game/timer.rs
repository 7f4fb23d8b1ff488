//! Round Timing
//!
//! Window sizing and round scheduling. All timestamps are milliseconds on the
//! caller's clock; nothing here reads the system time.

use serde::{Deserialize, Serialize};

/// Lead time between announcing a round and the round going live, so block
/// devices receive the command before their window opens.
pub const TRANSMISSION_BUFFER_MS: u64 = 500;

/// Timing parameters chosen when a game starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingParams {
    /// Window for the first round.
    pub initial_window_ms: u32,
    /// Amount the window shrinks after each round.
    pub decay_ms: u32,
    /// Floor the window never drops below.
    pub min_window_ms: u32,
}

impl Default for TimingParams {
    fn default() -> Self {
        Self {
            initial_window_ms: 2500,
            decay_ms: 150,
            min_window_ms: 800,
        }
    }
}

/// Tracks the current window and the live round's start and deadline.
///
/// Invariants: `deadline_ms >= round_start_ms` and
/// `window_ms >= params.min_window_ms`.
#[derive(Clone, Debug)]
pub struct RoundTimer {
    params: TimingParams,
    window_ms: u32,
    round_start_ms: u64,
    deadline_ms: u64,
}

impl Default for RoundTimer {
    fn default() -> Self {
        Self::new(TimingParams::default())
    }
}

impl RoundTimer {
    /// Create a timer with the window at its initial value.
    pub fn new(params: TimingParams) -> Self {
        Self {
            params,
            window_ms: params.initial_window_ms.max(params.min_window_ms),
            round_start_ms: 0,
            deadline_ms: 0,
        }
    }

    /// Replace the parameters and restore the window to the new initial value.
    ///
    /// An initial window below the floor starts at the floor.
    pub fn configure(&mut self, params: TimingParams) {
        self.params = params;
        self.restore();
    }

    /// Put the window back to the configured initial value.
    pub fn restore(&mut self) {
        self.window_ms = self.params.initial_window_ms.max(self.params.min_window_ms);
    }

    /// Schedule a round announced at `now_ms`.
    pub fn mark_round(&mut self, now_ms: u64) {
        self.round_start_ms = now_ms + TRANSMISSION_BUFFER_MS;
        self.deadline_ms = self.round_start_ms + u64::from(self.window_ms);
    }

    /// Shrink the window after a round and return the new value.
    ///
    /// A decay at least as large as the window drops straight to the floor.
    pub fn shrink(&mut self) -> u32 {
        let TimingParams { decay_ms, min_window_ms, .. } = self.params;
        let next = if self.window_ms > decay_ms {
            self.window_ms - decay_ms
        } else {
            min_window_ms
        };
        self.window_ms = next.max(min_window_ms);
        self.window_ms
    }

    /// Whether the live round's deadline has passed at `now_ms`.
    pub fn expired(&self, now_ms: u64) -> bool {
        now_ms >= self.deadline_ms
    }

    /// Current parameters.
    pub fn params(&self) -> TimingParams {
        self.params
    }

    /// Current round window.
    pub fn window_ms(&self) -> u32 {
        self.window_ms
    }

    /// When the live round opens.
    pub fn round_start_ms(&self) -> u64 {
        self.round_start_ms
    }

    /// When the live round closes.
    pub fn deadline_ms(&self) -> u64 {
        self.deadline_ms
    }
}
