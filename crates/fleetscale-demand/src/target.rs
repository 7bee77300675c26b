//! Target policies — turn a metric reading into a container delta.

use std::fmt;

/// Scaling strategy owned by a task.
///
/// `delta` must be deterministic for a given reading and target state.
pub trait Target: Send + Sync + fmt::Debug {
    /// Signed adjustment to the running count implied by `current`.
    fn delta(&self, current: i32) -> i32;

    /// Whether this task soaks up whatever capacity is left over.
    fn is_remainder(&self) -> bool {
        false
    }
}

/// Keep a queue (or any backlog-like reading) at `length`.
///
/// Each pass moves by at most `step` containers in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLengthTarget {
    length: i32,
    step: i32,
}

impl QueueLengthTarget {
    pub fn new(length: i32, step: i32) -> Self {
        Self {
            length,
            step: step.max(1),
        }
    }
}

impl Target for QueueLengthTarget {
    fn delta(&self, current: i32) -> i32 {
        current
            .saturating_sub(self.length)
            .clamp(-self.step, self.step)
    }
}

/// Best-effort target: always wants up to `max` more containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemainderTarget {
    max: i32,
}

impl RemainderTarget {
    pub fn new(max: i32) -> Self {
        Self { max: max.max(0) }
    }
}

impl Target for RemainderTarget {
    fn delta(&self, _current: i32) -> i32 {
        self.max
    }

    fn is_remainder(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_target_steps_toward_length() {
        let t = QueueLengthTarget::new(10, 3);
        assert_eq!(t.delta(10), 0);
        assert_eq!(t.delta(12), 2);
        assert_eq!(t.delta(50), 3);
        assert_eq!(t.delta(9), -1);
        assert_eq!(t.delta(0), -3);
    }

    #[test]
    fn queue_target_step_is_at_least_one() {
        let t = QueueLengthTarget::new(0, 0);
        assert_eq!(t.delta(100), 1);
        assert_eq!(t.delta(-100), -1);
    }

    #[test]
    fn queue_target_does_not_overflow() {
        let t = QueueLengthTarget::new(-5, 2);
        assert_eq!(t.delta(i32::MAX), 2);
    }

    #[test]
    fn remainder_always_asks_for_max() {
        let t = RemainderTarget::new(9);
        assert!(t.is_remainder());
        assert_eq!(t.delta(0), 9);
        assert_eq!(t.delta(1000), 9);
        assert!(!QueueLengthTarget::new(1, 1).is_remainder());
    }
}
