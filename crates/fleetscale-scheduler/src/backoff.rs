//! Exponential backoff for backend calls.
//!
//! An explicit `Idle → Waiting → Idle` state machine. [`Backoff::start`]
//! arms a timer task that signals a single-slot channel when it fires; the
//! owner polls or awaits that signal from its own task. The timer never
//! touches anything but the channel.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::BackoffError;

#[derive(Debug)]
enum State {
    Idle,
    Waiting {
        timer: JoinHandle<()>,
        expired: oneshot::Receiver<()>,
    },
}

/// Attempt counter plus a cancellable wait.
///
/// The wait for attempt `n` is `min * factor^n`.
#[derive(Debug)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    factor: u32,
    attempt: u32,
    state: State,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration, factor: u32) -> Self {
        Self {
            min,
            max,
            factor: factor.max(1),
            attempt: 0,
            state: State::Idle,
        }
    }

    /// Number of waits computed since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Wait for the current attempt, then move to the next attempt.
    pub fn duration(&mut self) -> Duration {
        let d = self.peek();
        self.attempt = self.attempt.saturating_add(1);
        d
    }

    fn peek(&self) -> Duration {
        let multiplier = self.factor.saturating_pow(self.attempt);
        self.min.saturating_mul(multiplier)
    }

    /// Clear the attempt counter after a successful call.
    pub fn reset(&mut self) {
        if self.attempt > 0 {
            debug!(attempts = self.attempt, "backoff succeeded");
        }
        if self.is_waiting() {
            warn!("backoff reset while still waiting");
        }
        self.attempt = 0;
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.state, State::Waiting { .. })
    }

    /// Arm the timer for the next attempt.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<Duration, BackoffError> {
        if self.is_waiting() {
            return Err(BackoffError::AlreadyWaiting);
        }

        let next = self.peek();
        if next > self.max {
            return Err(BackoffError::Exhausted {
                next,
                max: self.max,
            });
        }
        let wait = self.duration();

        let (tx, rx) = oneshot::channel();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let _ = tx.send(());
        });
        debug!(?wait, attempt = self.attempt, "backing off");

        self.state = State::Waiting {
            timer,
            expired: rx,
        };
        Ok(wait)
    }

    /// Returns `true` (and goes back to idle) once the timer has fired.
    /// Idle counts as expired.
    pub fn poll_expired(&mut self) -> bool {
        let State::Waiting { expired, .. } = &mut self.state else {
            return true;
        };
        match expired.try_recv() {
            Err(oneshot::error::TryRecvError::Empty) => false,
            _ => {
                debug!("backoff expired");
                self.state = State::Idle;
                true
            }
        }
    }

    /// Wait until the timer fires. Returns immediately when idle.
    pub async fn wait(&mut self) {
        if let State::Waiting { expired, .. } = &mut self.state {
            let _ = expired.await;
            debug!("backoff expired");
        }
        self.state = State::Idle;
    }

    /// Stop a pending timer without waiting for it.
    pub fn cancel(&mut self) {
        if let State::Waiting { timer, .. } = std::mem::replace(&mut self.state, State::Idle) {
            timer.abort();
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(60), 2)
    }
}

impl Drop for Backoff {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_grow_by_factor() {
        let mut b = Backoff::new(Duration::from_millis(100), Duration::from_secs(10), 2);
        assert_eq!(b.duration(), Duration::from_millis(100));
        assert_eq!(b.duration(), Duration::from_millis(200));
        assert_eq!(b.duration(), Duration::from_millis(400));
        assert_eq!(b.attempt(), 3);

        b.reset();
        assert_eq!(b.attempt(), 0);
        assert_eq!(b.duration(), Duration::from_millis(100));
    }

    #[test]
    fn factor_below_one_is_constant() {
        let mut b = Backoff::new(Duration::from_millis(50), Duration::from_secs(1), 0);
        assert_eq!(b.duration(), Duration::from_millis(50));
        assert_eq!(b.duration(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn start_then_expire() {
        let mut b = Backoff::new(Duration::from_millis(100), Duration::from_secs(10), 2);
        assert!(b.poll_expired());

        assert_eq!(b.start().unwrap(), Duration::from_millis(100));
        assert!(b.is_waiting());
        assert_eq!(b.attempt(), 1);
        assert_eq!(b.start(), Err(BackoffError::AlreadyWaiting));

        b.wait().await;
        assert!(!b.is_waiting());

        assert_eq!(b.start().unwrap(), Duration::from_millis(200));
        tokio::time::sleep(Duration::from_millis(250)).await;
        tokio::task::yield_now().await;
        assert!(b.poll_expired());
        assert!(!b.is_waiting());
    }

    #[tokio::test(start_paused = true)]
    async fn poll_before_timer_fires_is_false() {
        let mut b = Backoff::new(Duration::from_secs(5), Duration::from_secs(60), 2);
        b.start().unwrap();
        assert!(!b.poll_expired());
        assert!(b.is_waiting());
    }

    #[tokio::test]
    async fn exhausted_when_next_wait_exceeds_max() {
        let mut b = Backoff::new(Duration::from_millis(400), Duration::from_millis(500), 2);
        b.duration();
        let err = b.start().unwrap_err();
        assert_eq!(
            err,
            BackoffError::Exhausted {
                next: Duration::from_millis(800),
                max: Duration::from_millis(500),
            }
        );
        assert!(!b.is_waiting());
        assert_eq!(b.attempt(), 1);
    }

    #[tokio::test]
    async fn cancel_returns_to_idle() {
        let mut b = Backoff::new(Duration::from_secs(30), Duration::from_secs(60), 2);
        b.start().unwrap();
        b.cancel();
        assert!(!b.is_waiting());
        assert!(b.poll_expired());
        b.wait().await;
    }
}
