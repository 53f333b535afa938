//! [`QueueOrchestrator`] – feeds queued intents to the robot one at a time.
//!
//! The robot's execution queue is treated as a single slot: a new mission is
//! only submitted once the most recent history entry is terminal.  The caller
//! drives progress by calling [`QueueOrchestrator::advance`] from its own
//! polling loop; the orchestrator never sleeps or spawns threads.
//!
//! ```text
//!            advance(): tail terminal, head built + submitted
//!   Idle ─────────────────────────────────────────────► AwaitingCompletion
//!    ▲                                                          │
//!    └──────────── advance(): tail terminal, FIFO empty ◄───────┘
//! ```

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use mir_client::{RemoteInterface, RobotApi};
use mir_types::{
    Intent, MirError, MissionHistoryEntry, MissionId, MissionState, OperationalState,
    PendingIntent, QueueEntry,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::mission_builder::MissionBuilder;

/// Priority of every queue submission.
pub const QUEUE_PRIORITY: i64 = 0;

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// What the orchestrator believes about the remote slot.
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorState {
    Idle,
    AwaitingCompletion {
        mission_id: MissionId,
        intent: PendingIntent,
        submitted_at: DateTime<Utc>,
    },
}

/// Why an [`advance`](QueueOrchestrator::advance) call did not submit.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitReason {
    /// The most recent mission is still in this non-terminal state.
    InFlight(MissionState),
    /// A remote call or build step failed; the head intent is still queued.
    Failed(MirError),
}

/// Result of one [`advance`](QueueOrchestrator::advance) step.
#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    /// The head intent was built and submitted.
    Advanced {
        intent: PendingIntent,
        mission_id: MissionId,
    },
    /// Nothing outstanding and nothing pending.
    Idle,
    Waiting(WaitReason),
}

// ────────────────────────────────────────────────────────────────────────────
// QueueOrchestrator
// ────────────────────────────────────────────────────────────────────────────

/// A queue POST whose outcome the client never saw.
///
/// The request may still have reached the robot, so the head intent stays
/// queued until the history shows whether it landed.
#[derive(Debug, Clone, PartialEq)]
struct UnconfirmedSubmission {
    intent_id: Uuid,
    mission_id: MissionId,
    /// History tail id observed right before the POST.
    history_mark: Option<u64>,
}

/// Local FIFO of intents plus the single-slot submission policy.
///
/// # Example
///
/// ```
/// use mir_client::{CatalogResolver, SimRemote};
/// use mir_runtime::mission_builder::{MissionBuilder, MissionTemplates};
/// use mir_runtime::orchestrator::{AdvanceOutcome, QueueOrchestrator};
/// use mir_types::Intent;
///
/// let sim = SimRemote::demo();
/// let builder = MissionBuilder::new(CatalogResolver::new(&sim), MissionTemplates::default());
/// let mut orchestrator = QueueOrchestrator::new(builder);
///
/// orchestrator.enqueue(Intent::MoveTo { name: "Home".into() });
/// assert!(matches!(orchestrator.advance(), AdvanceOutcome::Advanced { .. }));
/// ```
pub struct QueueOrchestrator<R> {
    builder: MissionBuilder<R>,
    pending: VecDeque<PendingIntent>,
    state: OrchestratorState,
    unconfirmed: Option<UnconfirmedSubmission>,
}

impl<R: RemoteInterface> QueueOrchestrator<R> {
    pub fn new(builder: MissionBuilder<R>) -> Self {
        Self {
            builder,
            pending: VecDeque::new(),
            state: OrchestratorState::Idle,
            unconfirmed: None,
        }
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    /// Intents not yet submitted, head first.
    pub fn pending(&self) -> &VecDeque<PendingIntent> {
        &self.pending
    }

    /// Append `intent` to the tail of the FIFO and return its id.
    pub fn enqueue(&mut self, intent: Intent) -> Uuid {
        let pending = PendingIntent::new(intent);
        let id = pending.id;
        debug!(%id, intent = %pending.intent, depth = self.pending.len() + 1, "intent enqueued");
        self.pending.push_back(pending);
        id
    }

    /// Drop every intent not yet submitted.  Returns how many were dropped.
    pub fn clear_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.unconfirmed = None;
        if dropped > 0 {
            info!(dropped, "pending intents cleared");
        }
        dropped
    }

    /// Take one scheduling step.
    ///
    /// Never fails: remote and build errors are reported as
    /// [`WaitReason::Failed`] and leave the FIFO untouched, so the next call
    /// retries the same head intent.  A queue POST that failed after it may
    /// have reached the robot is checked against the history first, so the
    /// head is submitted at most once.
    #[instrument(skip(self), fields(pending = self.pending.len()))]
    pub fn advance(&mut self) -> AdvanceOutcome {
        match self.try_advance() {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, retryable = err.is_retryable(), "advance failed");
                AdvanceOutcome::Waiting(WaitReason::Failed(err))
            }
        }
    }

    fn try_advance(&mut self) -> Result<AdvanceOutcome, MirError> {
        let history = self.builder.remote().mission_history()?;

        if let Some(unconfirmed) = self.unconfirmed.take()
            && let Some(outcome) = self.reconcile(unconfirmed, &history)
        {
            return Ok(outcome);
        }

        let tail = history.last();
        if let Some(entry) = tail
            && !entry.state.is_terminal()
        {
            return Ok(AdvanceOutcome::Waiting(WaitReason::InFlight(entry.state)));
        }

        if let OrchestratorState::AwaitingCompletion { mission_id, .. } = &self.state {
            let state = tail.map(|e| e.state).unwrap_or(MissionState::Done);
            info!(%mission_id, %state, "mission finished");
            self.state = OrchestratorState::Idle;
        }

        let Some(head) = self.pending.front().cloned() else {
            return Ok(AdvanceOutcome::Idle);
        };

        let mission_id = self.builder.build(&head.intent)?;
        let entry = QueueEntry {
            mission_id: mission_id.clone(),
            priority: QUEUE_PRIORITY,
        };
        let created = match self.builder.remote().enqueue_mission(&entry) {
            Ok(created) => created,
            Err(err) => {
                self.unconfirmed = Some(UnconfirmedSubmission {
                    intent_id: head.id,
                    mission_id,
                    history_mark: tail.map(|e| e.id),
                });
                return Err(err);
            }
        };
        let queue_id = serde_json::from_value::<MissionHistoryEntry>(created)
            .ok()
            .map(|e| e.id);

        info!(%mission_id, ?queue_id, intent = %head.intent, remaining = self.pending.len() - 1, "mission submitted");
        Ok(self.mark_submitted(mission_id))
    }

    /// Settle an earlier POST whose response was lost.
    ///
    /// Returns `Some` if the history shows the mission was queued after the
    /// recorded mark; the head is then consumed without a second POST.
    fn reconcile(
        &mut self,
        unconfirmed: UnconfirmedSubmission,
        history: &[MissionHistoryEntry],
    ) -> Option<AdvanceOutcome> {
        if self.pending.front().map(|p| p.id) != Some(unconfirmed.intent_id) {
            return None;
        }
        let landed = history.iter().rev().find(|e| {
            unconfirmed.history_mark.is_none_or(|mark| e.id > mark)
                && e.mission_id.as_ref() == Some(&unconfirmed.mission_id)
        })?;
        info!(
            mission_id = %unconfirmed.mission_id,
            queue_id = landed.id,
            "earlier submission found in history"
        );
        Some(self.mark_submitted(unconfirmed.mission_id))
    }

    /// Pop the head intent and await `mission_id`.
    fn mark_submitted(&mut self, mission_id: MissionId) -> AdvanceOutcome {
        let Some(head) = self.pending.pop_front() else {
            return AdvanceOutcome::Idle;
        };
        self.state = OrchestratorState::AwaitingCompletion {
            mission_id: mission_id.clone(),
            intent: head.clone(),
            submitted_at: Utc::now(),
        };
        AdvanceOutcome::Advanced {
            intent: head,
            mission_id,
        }
    }

    /// Put the robot in `Ready` so it works through its queue.
    pub fn start_draining(&self) -> Result<(), MirError> {
        self.builder.remote().request_state(OperationalState::Ready)
    }

    /// Put the robot in `Pause`; the running mission halts in place.
    pub fn pause_draining(&self) -> Result<(), MirError> {
        self.builder.remote().request_state(OperationalState::Pause)
    }

    /// See [`RobotApi::request_state_id`].
    pub fn request_state_id(&self, state_id: u32) -> Result<OperationalState, MirError> {
        self.builder.remote().request_state_id(state_id)
    }

    pub fn builder(&self) -> &MissionBuilder<R> {
        &self.builder
    }

    pub fn builder_mut(&mut self) -> &mut MissionBuilder<R> {
        &mut self.builder
    }

    pub fn remote(&self) -> &R {
        self.builder.remote()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission_builder::MissionTemplates;
    use mir_client::remote::paths;
    use mir_client::sim::WriteMethod;
    use mir_client::{CatalogResolver, SimRemote};
    use serde_json::{Value, json};
    use std::cell::Cell;

    fn orchestrator(sim: &SimRemote) -> QueueOrchestrator<&SimRemote> {
        QueueOrchestrator::new(MissionBuilder::new(
            CatalogResolver::new(sim),
            MissionTemplates::default(),
        ))
    }

    /// A small site without auto-progress so tests control the history tail.
    fn manual_demo() -> SimRemote {
        use mir_types::{Action, ActionId, ActionParameter};
        let action = |id: &str, kind: &str, param: &str| Action {
            id: ActionId::new(id),
            action_type: kind.to_string(),
            parameters: vec![ActionParameter {
                id: param.to_string(),
                value: json!(""),
            }],
            priority: 1,
        };
        SimRemote::new()
            .with_position("p-home", "Home", 0)
            .with_position("p-shelfa", "shelfA", 11)
            .with_mission("m-move-to", "move_to", vec![action("a-move", "move", "position")])
            .with_mission("m-dock-to", "dock_to", vec![action("a-dock", "docking", "marker")])
            .with_mission(
                "m-scream-beep",
                "scream_beep",
                vec![action("a-sound", "play_sound", "sound")],
            )
    }

    #[test]
    fn starts_idle_and_empty() {
        let sim = manual_demo();
        let mut orch = orchestrator(&sim);
        assert_eq!(orch.state(), &OrchestratorState::Idle);
        assert!(orch.pending().is_empty());
        assert_eq!(orch.advance(), AdvanceOutcome::Idle);
        assert!(sim.writes().is_empty());
    }

    #[test]
    fn move_then_scream_end_to_end() {
        let sim = manual_demo();
        let mut orch = orchestrator(&sim);
        orch.enqueue(Intent::MoveTo {
            name: "Home".into(),
        });
        orch.enqueue(Intent::Scream {
            sound: "beep".into(),
        });

        let first = orch.advance();
        assert!(matches!(
            &first,
            AdvanceOutcome::Advanced { mission_id, .. } if mission_id.as_str() == "m-move-to"
        ));
        let pending: Vec<_> = orch.pending().iter().map(|p| p.intent.clone()).collect();
        assert_eq!(
            pending,
            vec![Intent::Scream {
                sound: "beep".into()
            }]
        );
        let writes = sim.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].method, WriteMethod::Put);
        assert_eq!(writes[0].path, "missions/m-move-to/actions/a-move");
        assert_eq!(
            writes[0].body,
            json!({"priority": 100, "parameters": [{"id": "position", "value": "p-home"}]})
        );
        assert_eq!(writes[1].method, WriteMethod::Post);
        assert_eq!(writes[1].path, paths::MISSION_QUEUE);
        assert_eq!(writes[1].body, json!({"mission_id": "m-move-to", "priority": 0}));
        assert!(matches!(
            orch.state(),
            OrchestratorState::AwaitingCompletion { mission_id, .. } if mission_id.as_str() == "m-move-to"
        ));

        sim.set_tail_state(MissionState::Executing);
        assert_eq!(
            orch.advance(),
            AdvanceOutcome::Waiting(WaitReason::InFlight(MissionState::Executing))
        );
        assert_eq!(sim.submissions().len(), 1);

        sim.set_tail_state(MissionState::Done);
        let second = orch.advance();
        assert!(matches!(
            &second,
            AdvanceOutcome::Advanced { mission_id, .. } if mission_id.as_str() == "m-scream-beep"
        ));
        assert!(orch.pending().is_empty());
        // Sound missions are queued without patching.
        assert_eq!(sim.writes().len(), 3);

        sim.set_tail_state(MissionState::Done);
        assert_eq!(orch.advance(), AdvanceOutcome::Idle);
        assert_eq!(orch.state(), &OrchestratorState::Idle);
    }

    #[test]
    fn at_most_one_mission_outstanding() {
        let sim = manual_demo();
        let mut orch = orchestrator(&sim);
        for _ in 0..3 {
            orch.enqueue(Intent::MoveTo {
                name: "Home".into(),
            });
        }
        assert!(matches!(orch.advance(), AdvanceOutcome::Advanced { .. }));
        for _ in 0..5 {
            assert_eq!(
                orch.advance(),
                AdvanceOutcome::Waiting(WaitReason::InFlight(MissionState::Pending))
            );
        }
        assert_eq!(sim.submissions().len(), 1);
        assert_eq!(orch.pending().len(), 2);
    }

    #[test]
    fn aborted_and_failed_tails() {
        let sim = manual_demo();
        let mut orch = orchestrator(&sim);
        orch.enqueue(Intent::MoveTo {
            name: "Home".into(),
        });
        orch.enqueue(Intent::MoveTo {
            name: "Home".into(),
        });
        orch.advance();

        sim.set_tail_state(MissionState::Failed);
        assert_eq!(
            orch.advance(),
            AdvanceOutcome::Waiting(WaitReason::InFlight(MissionState::Failed))
        );

        sim.set_tail_state(MissionState::Aborted);
        assert!(matches!(orch.advance(), AdvanceOutcome::Advanced { .. }));
        assert_eq!(sim.submissions().len(), 2);
    }

    #[test]
    fn intents_are_submitted_in_fifo_order() {
        let sim = manual_demo();
        let mut orch = orchestrator(&sim);
        orch.enqueue(Intent::Scream {
            sound: "beep".into(),
        });
        orch.enqueue(Intent::DockTo {
            name: "shelfA".into(),
        });
        orch.enqueue(Intent::MoveTo {
            name: "Home".into(),
        });

        let mut submitted = Vec::new();
        while let AdvanceOutcome::Advanced { mission_id, .. } = orch.advance() {
            submitted.push(mission_id.as_str().to_string());
            sim.set_tail_state(MissionState::Done);
        }
        assert_eq!(submitted, vec!["m-scream-beep", "m-dock-to", "m-move-to"]);
    }

    #[test]
    fn failed_build_keeps_head_in_place() {
        let sim = manual_demo();
        let mut orch = orchestrator(&sim);
        let head = orch.enqueue(Intent::MoveTo {
            name: "Nowhere".into(),
        });
        orch.enqueue(Intent::Scream {
            sound: "beep".into(),
        });

        for _ in 0..2 {
            let outcome = orch.advance();
            assert!(matches!(
                outcome,
                AdvanceOutcome::Waiting(WaitReason::Failed(MirError::NotFound { kind: "position", .. }))
            ));
            assert_eq!(orch.pending().len(), 2);
            assert_eq!(orch.pending()[0].id, head);
        }
        assert!(sim.submissions().is_empty());
        assert_eq!(orch.state(), &OrchestratorState::Idle);
    }

    #[test]
    fn failed_catalog_read_retries_same_intent() {
        let sim = manual_demo();
        let mut orch = orchestrator(&sim);
        let head = orch.enqueue(Intent::Scream {
            sound: "beep".into(),
        });

        sim.fail_path(paths::MISSIONS);
        let outcome = orch.advance();
        assert!(matches!(
            outcome,
            AdvanceOutcome::Waiting(WaitReason::Failed(MirError::Transport { status: Some(500), .. }))
        ));
        assert_eq!(orch.pending()[0].id, head);
        assert!(sim.submissions().is_empty());

        sim.heal_path(paths::MISSIONS);
        match orch.advance() {
            AdvanceOutcome::Advanced { intent, .. } => assert_eq!(intent.id, head),
            other => panic!("expected submission, got {other:?}"),
        }
        assert!(orch.pending().is_empty());
    }

    /// Forwards to the sim but can fail queue POSTs, either before they
    /// reach the robot or after (a lost response).
    struct FlakyQueue<'a> {
        sim: &'a SimRemote,
        rejected: Cell<usize>,
        lost: Cell<usize>,
    }

    impl<'a> FlakyQueue<'a> {
        fn new(sim: &'a SimRemote) -> Self {
            Self {
                sim,
                rejected: Cell::new(0),
                lost: Cell::new(0),
            }
        }

        fn timeout(path: &str) -> MirError {
            MirError::Transport {
                path: path.to_string(),
                status: None,
                message: "operation timed out".into(),
            }
        }

        fn take(counter: &Cell<usize>) -> bool {
            let n = counter.get();
            if n > 0 {
                counter.set(n - 1);
            }
            n > 0
        }
    }

    impl RemoteInterface for FlakyQueue<'_> {
        fn fetch(&self, path: &str) -> Result<Value, MirError> {
            self.sim.fetch(path)
        }

        fn submit(&self, path: &str, body: &Value) -> Result<Value, MirError> {
            if path == paths::MISSION_QUEUE && Self::take(&self.rejected) {
                return Err(Self::timeout(path));
            }
            let created = self.sim.submit(path, body)?;
            if path == paths::MISSION_QUEUE && Self::take(&self.lost) {
                return Err(Self::timeout(path));
            }
            Ok(created)
        }

        fn update(&self, path: &str, body: &Value) -> Result<Value, MirError> {
            self.sim.update(path, body)
        }
    }

    fn flaky_orchestrator<'a>(remote: &'a FlakyQueue<'a>) -> QueueOrchestrator<&'a FlakyQueue<'a>> {
        QueueOrchestrator::new(MissionBuilder::new(
            CatalogResolver::new(remote),
            MissionTemplates::default(),
        ))
    }

    #[test]
    fn lost_submit_response_is_not_resubmitted() {
        let sim = SimRemote::demo();
        let remote = FlakyQueue::new(&sim);
        remote.lost.set(1);
        let mut orch = flaky_orchestrator(&remote);
        let head = orch.enqueue(Intent::Scream {
            sound: "beep".into(),
        });

        assert!(matches!(
            orch.advance(),
            AdvanceOutcome::Waiting(WaitReason::Failed(MirError::Transport { status: None, .. }))
        ));
        assert_eq!(sim.submissions().len(), 1);
        assert_eq!(orch.pending().len(), 1);

        match orch.advance() {
            AdvanceOutcome::Advanced { intent, mission_id } => {
                assert_eq!(intent.id, head);
                assert_eq!(mission_id.as_str(), "m-scream-beep");
            }
            other => panic!("expected the earlier submission, got {other:?}"),
        }
        assert!(orch.pending().is_empty());

        for _ in 0..6 {
            if orch.advance() == AdvanceOutcome::Idle {
                break;
            }
        }
        assert_eq!(orch.advance(), AdvanceOutcome::Idle);
        assert_eq!(sim.submissions().len(), 1);
    }

    #[test]
    fn rejected_submit_is_retried_once() {
        let sim = manual_demo();
        let remote = FlakyQueue::new(&sim);
        let mut orch = flaky_orchestrator(&remote);
        orch.enqueue(Intent::Scream {
            sound: "beep".into(),
        });
        let second = orch.enqueue(Intent::Scream {
            sound: "beep".into(),
        });

        assert!(matches!(orch.advance(), AdvanceOutcome::Advanced { .. }));
        sim.set_tail_state(MissionState::Done);

        // An older entry for the same mission sits before the mark and must
        // not be mistaken for this submission.
        remote.rejected.set(1);
        assert!(matches!(
            orch.advance(),
            AdvanceOutcome::Waiting(WaitReason::Failed(_))
        ));
        assert_eq!(sim.submissions().len(), 1);
        assert_eq!(orch.pending()[0].id, second);

        match orch.advance() {
            AdvanceOutcome::Advanced { intent, .. } => assert_eq!(intent.id, second),
            other => panic!("expected a fresh submission, got {other:?}"),
        }
        assert_eq!(sim.submissions().len(), 2);
        assert!(orch.pending().is_empty());
    }

    #[test]
    fn clear_pending_forgets_unconfirmed_submission() {
        let sim = manual_demo();
        let remote = FlakyQueue::new(&sim);
        remote.lost.set(1);
        let mut orch = flaky_orchestrator(&remote);
        orch.enqueue(Intent::MoveTo {
            name: "Home".into(),
        });
        assert!(matches!(orch.advance(), AdvanceOutcome::Waiting(WaitReason::Failed(_))));
        assert_eq!(orch.clear_pending(), 1);

        assert_eq!(
            orch.advance(),
            AdvanceOutcome::Waiting(WaitReason::InFlight(MissionState::Pending))
        );
        sim.set_tail_state(MissionState::Done);
        assert_eq!(orch.advance(), AdvanceOutcome::Idle);
        assert_eq!(sim.submissions().len(), 1);
    }

    #[test]
    fn unreachable_history_is_reported_not_dropped() {
        let sim = manual_demo();
        let mut orch = orchestrator(&sim);
        orch.enqueue(Intent::MoveTo {
            name: "Home".into(),
        });
        sim.fail_path(paths::MISSION_QUEUE);
        let outcome = orch.advance();
        match outcome {
            AdvanceOutcome::Waiting(WaitReason::Failed(err)) => assert!(err.is_retryable()),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(orch.pending().len(), 1);
    }

    #[test]
    fn clear_pending_drops_local_queue_only() {
        let sim = manual_demo();
        let mut orch = orchestrator(&sim);
        orch.enqueue(Intent::MoveTo {
            name: "Home".into(),
        });
        orch.enqueue(Intent::MoveTo {
            name: "Home".into(),
        });
        assert_eq!(orch.clear_pending(), 2);
        assert_eq!(orch.clear_pending(), 0);
        assert_eq!(orch.advance(), AdvanceOutcome::Idle);
    }

    #[test]
    fn draining_toggles_operational_state() {
        let sim = manual_demo();
        let orch = orchestrator(&sim);
        orch.pause_draining().unwrap();
        assert_eq!(sim.robot_state(), OperationalState::Pause.id());
        orch.start_draining().unwrap();
        assert_eq!(sim.robot_state(), OperationalState::Ready.id());
    }

    #[test]
    fn invalid_state_id_makes_no_remote_write() {
        let sim = manual_demo();
        let orch = orchestrator(&sim);
        assert_eq!(
            orch.request_state_id(99).unwrap_err(),
            MirError::InvalidStateRequest(99)
        );
        assert!(sim.writes().is_empty());
        assert_eq!(
            orch.request_state_id(4).unwrap(),
            OperationalState::Pause
        );
    }

    #[test]
    fn demo_site_runs_to_idle_with_auto_progress() {
        let sim = SimRemote::demo();
        let mut orch = orchestrator(&sim);
        orch.enqueue(Intent::MoveTo {
            name: "Home".into(),
        });
        orch.enqueue(Intent::MoveFor { distance: 2.0 });
        orch.enqueue(Intent::Scream {
            sound: "end".into(),
        });

        let mut advanced = 0;
        for _ in 0..20 {
            match orch.advance() {
                AdvanceOutcome::Advanced { .. } => advanced += 1,
                AdvanceOutcome::Idle => break,
                AdvanceOutcome::Waiting(WaitReason::InFlight(_)) => {}
                AdvanceOutcome::Waiting(WaitReason::Failed(err)) => panic!("{err}"),
            }
        }
        assert_eq!(advanced, 3);
        assert_eq!(orch.state(), &OrchestratorState::Idle);
    }
}
