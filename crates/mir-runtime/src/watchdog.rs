//! [`StallWatchdog`] – flags a submitted mission that never finishes.
//!
//! The orchestrator waits for as long as the remote tail stays non-terminal.
//! Feed every [`AdvanceOutcome`] to [`StallWatchdog::observe`] and poll
//! [`StallWatchdog::check`] from the same loop to notice a mission that has
//! been outstanding longer than the configured timeout.

use std::time::{Duration, Instant};

use mir_types::MissionId;
use tracing::warn;

use crate::orchestrator::AdvanceOutcome;

/// A mission that exceeded its deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct Stall {
    pub mission_id: MissionId,
    pub elapsed: Duration,
}

struct Armed {
    mission_id: MissionId,
    since: Instant,
}

/// Deadline tracker for the single outstanding mission.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use mir_runtime::watchdog::StallWatchdog;
/// use mir_types::MissionId;
///
/// let mut wd = StallWatchdog::new(Duration::from_secs(60));
/// wd.arm(MissionId::new("m-1"));
///
/// assert!(wd.check().is_none());
/// ```
pub struct StallWatchdog {
    timeout: Duration,
    armed: Option<Armed>,
}

impl StallWatchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            armed: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start the deadline for `mission_id`.  Re-arming resets it.
    pub fn arm(&mut self, mission_id: MissionId) {
        self.armed = Some(Armed {
            mission_id,
            since: Instant::now(),
        });
    }

    pub fn disarm(&mut self) {
        self.armed = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Arm on submission, disarm once the orchestrator reports idle.
    ///
    /// Waiting outcomes leave the deadline running.
    pub fn observe(&mut self, outcome: &AdvanceOutcome) {
        match outcome {
            AdvanceOutcome::Advanced { mission_id, .. } => self.arm(mission_id.clone()),
            AdvanceOutcome::Idle => self.disarm(),
            AdvanceOutcome::Waiting(_) => {}
        }
    }

    /// The stalled mission, if the deadline has passed.
    pub fn check(&self) -> Option<Stall> {
        let armed = self.armed.as_ref()?;
        let elapsed = armed.since.elapsed();
        if elapsed <= self.timeout {
            return None;
        }
        warn!(mission_id = %armed.mission_id, elapsed_secs = elapsed.as_secs(), "mission stalled");
        Some(Stall {
            mission_id: armed.mission_id.clone(),
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::WaitReason;
    use mir_types::{Intent, MissionState, PendingIntent};
    use std::thread;

    fn advanced(id: &str) -> AdvanceOutcome {
        AdvanceOutcome::Advanced {
            intent: PendingIntent::new(Intent::Scream {
                sound: "beep".into(),
            }),
            mission_id: MissionId::new(id),
        }
    }

    #[test]
    fn disarmed_watchdog_never_reports() {
        let wd = StallWatchdog::new(Duration::ZERO);
        assert!(!wd.is_armed());
        assert!(wd.check().is_none());
    }

    #[test]
    fn stall_reported_after_timeout() {
        let mut wd = StallWatchdog::new(Duration::from_millis(20));
        wd.arm(MissionId::new("m-1"));
        assert!(wd.check().is_none());
        thread::sleep(Duration::from_millis(30));
        let stall = wd.check().unwrap();
        assert_eq!(stall.mission_id.as_str(), "m-1");
        assert!(stall.elapsed >= Duration::from_millis(20));
    }

    #[test]
    fn new_submission_resets_deadline() {
        let mut wd = StallWatchdog::new(Duration::from_millis(20));
        wd.observe(&advanced("m-1"));
        thread::sleep(Duration::from_millis(30));
        wd.observe(&advanced("m-2"));
        assert!(wd.check().is_none());
    }

    #[test]
    fn waiting_keeps_deadline_and_idle_disarms() {
        let mut wd = StallWatchdog::new(Duration::from_millis(20));
        wd.observe(&advanced("m-1"));
        thread::sleep(Duration::from_millis(30));
        wd.observe(&AdvanceOutcome::Waiting(WaitReason::InFlight(
            MissionState::Executing,
        )));
        assert!(wd.check().is_some());

        wd.observe(&AdvanceOutcome::Idle);
        assert!(!wd.is_armed());
        assert!(wd.check().is_none());
    }
}
