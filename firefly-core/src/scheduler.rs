//! Flush scheduling
//!
//! Decides WHEN the queue should be drained and delivered. Two states:
//! `Idle` (no pending deadline) and `TimerArmed` (a deadline is set for
//! `time_limit` past the first enqueue since the last flush). The pipeline
//! task sleeps on the armed deadline; there is no background polling.

use tokio::time::{Duration, Instant};

/// Outcome of consulting the scheduler on the enqueue path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushDecision {
    /// Keep buffering; a timer may have been armed.
    Wait,
    /// The size threshold was reached, flush immediately.
    FlushNow,
}

/// Why a flush happened, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// Queue length reached `batch_limit`
    Size,
    /// The armed timer fired
    Timer,
    /// Page hidden / unload signal from the host
    Lifecycle,
    /// Explicit flush or shutdown
    Forced,
}

impl FlushReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushReason::Size => "size",
            FlushReason::Timer => "timer",
            FlushReason::Lifecycle => "lifecycle",
            FlushReason::Forced => "forced",
        }
    }
}

/// Idle/TimerArmed state machine driving flush timing.
#[derive(Debug)]
pub struct FlushScheduler {
    batch_limit: usize,
    time_limit: Duration,
    deadline: Option<Instant>,
}

impl FlushScheduler {
    pub fn new(batch_limit: usize, time_limit: Duration) -> Self {
        Self {
            batch_limit,
            time_limit,
            deadline: None,
        }
    }

    /// Consult the scheduler after an event was enqueued.
    ///
    /// The first event since the last flush arms the deadline; reaching the
    /// size threshold demands an immediate flush instead.
    pub fn on_enqueue(&mut self, queue_len: usize) -> FlushDecision {
        if queue_len >= self.batch_limit {
            return FlushDecision::FlushNow;
        }
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.time_limit);
        }
        FlushDecision::Wait
    }

    /// The armed deadline, if any, for the pipeline task to sleep on.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Disarm the timer. Idempotent: disarming an unarmed, already-fired,
    /// or already-cancelled timer is a no-op.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Record that a flush happened; clears any armed deadline so the same
    /// window cannot fire twice.
    pub fn on_flush(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> FlushScheduler {
        FlushScheduler::new(3, Duration::from_millis(5000))
    }

    #[test]
    fn test_first_enqueue_arms_timer() {
        let mut s = scheduler();
        assert!(!s.is_armed());

        assert_eq!(s.on_enqueue(1), FlushDecision::Wait);
        assert!(s.is_armed());

        // Second enqueue does not re-arm (deadline stays put)
        let deadline = s.deadline().unwrap();
        assert_eq!(s.on_enqueue(2), FlushDecision::Wait);
        assert_eq!(s.deadline(), Some(deadline));
    }

    #[test]
    fn test_size_threshold_forces_flush() {
        let mut s = scheduler();
        assert_eq!(s.on_enqueue(1), FlushDecision::Wait);
        assert_eq!(s.on_enqueue(2), FlushDecision::Wait);
        assert_eq!(s.on_enqueue(3), FlushDecision::FlushNow);
    }

    #[test]
    fn test_flush_disarms_timer() {
        let mut s = scheduler();
        s.on_enqueue(1);
        assert!(s.is_armed());

        s.on_flush();
        assert!(!s.is_armed());

        // Next enqueue starts a fresh window
        s.on_enqueue(1);
        assert!(s.is_armed());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut s = scheduler();
        s.on_enqueue(1);

        s.cancel();
        s.cancel();
        assert!(!s.is_armed());

        // Cancelling after a flush already cleared it is also a no-op
        s.on_enqueue(1);
        s.on_flush();
        s.cancel();
        assert!(!s.is_armed());
    }
}
