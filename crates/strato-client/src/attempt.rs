//! Retry/backoff policy.
//!
//! An [`AttemptStrategy`] bounds how often and for how long an operation is
//! tried; an [`Attempt`] is the cursor over one sequence of tries. The
//! strategy never looks at results: the caller decides whether a failure is
//! worth another try and asks the cursor whether one is allowed.
//!
//! ```
//! use std::time::Duration;
//! use strato_client::attempt::AttemptStrategy;
//!
//! # tokio_test::block_on(async {
//! let strategy = AttemptStrategy::new(3, Duration::ZERO, Duration::ZERO);
//! let mut attempt = strategy.start();
//! let mut tries = 0;
//! while attempt.next().await {
//!     tries += 1;
//! }
//! assert_eq!(tries, 3);
//! # });
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Minimum attempt count, total time budget and delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptStrategy {
    /// Attempts always allowed regardless of elapsed time.
    pub min: u32,
    /// Budget after which no attempt starts once `min` is reached.
    pub total: Duration,
    /// Delay between the start of consecutive attempts.
    pub delay: Duration,
}

impl Default for AttemptStrategy {
    fn default() -> Self {
        Self {
            min: 5,
            total: Duration::from_secs(5),
            delay: Duration::from_millis(200),
        }
    }
}

impl AttemptStrategy {
    /// Create a strategy.
    #[must_use]
    pub fn new(min: u32, total: Duration, delay: Duration) -> Self {
        Self { min, total, delay }
    }

    /// Begin a new attempt sequence. The clock starts now.
    #[must_use]
    pub fn start(&self) -> Attempt {
        let now = Instant::now();
        Attempt {
            strategy: *self,
            last: now,
            end: now + self.total,
            count: 0,
            force: false,
        }
    }
}

/// Cursor over one attempt sequence.
#[derive(Debug)]
pub struct Attempt {
    strategy: AttemptStrategy,
    last: Instant,
    end: Instant,
    count: u32,
    force: bool,
}

impl Attempt {
    /// Wait for the next attempt and report whether it may proceed.
    ///
    /// The first call never sleeps. Later calls sleep for whatever is left of
    /// the delay since the previous attempt.
    pub async fn next(&mut self) -> bool {
        let now = Instant::now();
        let sleep = self.next_sleep(now);
        if !self.force && now + sleep >= self.end && self.strategy.min <= self.count {
            return false;
        }
        self.force = false;
        let now = if !sleep.is_zero() && self.count > 0 {
            tokio::time::sleep(sleep).await;
            Instant::now()
        } else {
            now
        };
        self.count += 1;
        self.last = now;
        true
    }

    /// Whether another attempt would be allowed, without waiting.
    ///
    /// A `true` answer is binding: the following [`next`](Self::next) proceeds
    /// even if the deadline passes in between.
    pub fn has_next(&mut self) -> bool {
        if self.force || self.strategy.min > self.count {
            return true;
        }
        let now = Instant::now();
        if now + self.next_sleep(now) < self.end {
            self.force = true;
            return true;
        }
        false
    }

    /// Attempts started so far.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    fn next_sleep(&self, now: Instant) -> Duration {
        self.strategy
            .delay
            .saturating_sub(now.saturating_duration_since(self.last))
    }
}
