use std::fmt;

/// Why a session is shutting down. Exactly one reason wins; everything that
/// fires afterwards is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A chat message containing the stop token was seen in the meeting.
    ChatCommand,
    /// The stop hook was invoked from inside the page.
    StopHook,
    /// The absolute session cap elapsed with no other signal.
    SafetyTimeout,
    /// The capture process exited before it was told to stop.
    CaptureExited,
}

impl StopReason {
    /// Fatal reasons exit the controller with a failure status; the others
    /// are orderly shutdowns.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StopReason::CaptureExited)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::ChatCommand => write!(f, "stop command in chat"),
            StopReason::StopHook => write!(f, "external stop call"),
            StopReason::SafetyTimeout => write!(f, "safety timeout"),
            StopReason::CaptureExited => write!(f, "capture process exited early"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Stopping,
    Stopped,
}

/// Shutdown state machine for one session.
///
/// Transitions are one-way: RUNNING → STOPPING → STOPPED. `begin_stop` is
/// the transition guard the watchers race through; only the first caller
/// gets `true` and owns teardown. That makes the stop path safe against a
/// chat command and the safety timer firing in the same tick.
#[derive(Debug)]
pub struct TerminationMonitor {
    phase: Phase,
    reason: Option<StopReason>,
}

impl TerminationMonitor {
    pub fn new() -> Self {
        Self {
            phase: Phase::Running,
            reason: None,
        }
    }

    /// Request shutdown. Returns `true` exactly once, for the signal that
    /// won the race; later signals are recorded as no-ops.
    pub fn begin_stop(&mut self, reason: StopReason) -> bool {
        match self.phase {
            Phase::Running => {
                tracing::info!("Shutting down: {}", reason);
                self.phase = Phase::Stopping;
                self.reason = Some(reason);
                true
            }
            Phase::Stopping | Phase::Stopped => {
                tracing::debug!("Ignoring {} while already shutting down", reason);
                false
            }
        }
    }

    /// Mark teardown complete. Only valid after `begin_stop` won; calling it
    /// again is a no-op.
    pub fn finish_stop(&mut self) {
        if self.phase == Phase::Stopping {
            self.phase = Phase::Stopped;
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn is_stopped(&self) -> bool {
        self.phase == Phase::Stopped
    }

    /// The signal that won the shutdown race, once one has.
    pub fn reason(&self) -> Option<StopReason> {
        self.reason
    }
}

impl Default for TerminationMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_signal_wins() {
        let mut monitor = TerminationMonitor::new();
        assert!(monitor.is_running());

        assert!(monitor.begin_stop(StopReason::ChatCommand));
        assert!(!monitor.is_running());
        assert_eq!(monitor.reason(), Some(StopReason::ChatCommand));
    }

    #[test]
    fn test_second_signal_is_ignored() {
        let mut monitor = TerminationMonitor::new();

        assert!(monitor.begin_stop(StopReason::ChatCommand));
        // Timer firing while teardown is in flight must not re-enter it.
        assert!(!monitor.begin_stop(StopReason::SafetyTimeout));
        assert_eq!(monitor.reason(), Some(StopReason::ChatCommand));
    }

    #[test]
    fn test_signals_after_stopped_are_noops() {
        let mut monitor = TerminationMonitor::new();

        assert!(monitor.begin_stop(StopReason::SafetyTimeout));
        monitor.finish_stop();
        assert!(monitor.is_stopped());

        assert!(!monitor.begin_stop(StopReason::StopHook));
        assert!(monitor.is_stopped());
    }

    #[test]
    fn test_racing_watchers_produce_one_teardown_owner() {
        let mut monitor = TerminationMonitor::new();
        let signals = [
            StopReason::ChatCommand,
            StopReason::SafetyTimeout,
            StopReason::CaptureExited,
        ];

        let winners: Vec<bool> = signals.iter().map(|&r| monitor.begin_stop(r)).collect();
        assert_eq!(winners, vec![true, false, false]);
        assert_eq!(monitor.reason(), Some(StopReason::ChatCommand));
    }

    #[test]
    fn test_finish_without_begin_is_noop() {
        let mut monitor = TerminationMonitor::new();
        monitor.finish_stop();
        assert!(monitor.is_running());
    }

    #[test]
    fn test_only_capture_exit_is_fatal() {
        assert!(StopReason::CaptureExited.is_fatal());
        assert!(!StopReason::ChatCommand.is_fatal());
        assert!(!StopReason::StopHook.is_fatal());
        assert!(!StopReason::SafetyTimeout.is_fatal());
    }
}
