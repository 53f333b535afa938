//! In-process fleet controller for tests and dry runs without a robot.
//!
//! [`SimRemote`] implements [`RemoteInterface`] over an in-memory catalog,
//! execution queue, status record, and register bank.  It records every
//! accepted write so tests can assert on exactly what would have reached the
//! robot, and individual paths can be made to fail to exercise transport
//! errors.
//!
//! # Example
//!
//! ```rust
//! use mir_client::{RobotApi, SimRemote};
//! use mir_types::{MissionId, MissionState, QueueEntry};
//!
//! let sim = SimRemote::new();
//! sim.enqueue_mission(&QueueEntry { mission_id: MissionId::new("m-1"), priority: 0 })
//!     .unwrap();
//! sim.set_tail_state(MissionState::Done);
//!
//! assert_eq!(sim.latest_history_entry().unwrap().unwrap().state, MissionState::Done);
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use mir_types::{
    Action, ActionId, ActionParameter, ActionPatch, MirError, MissionHistoryEntry, MissionId,
    MissionState, MissionSummary, OperationalState, Position, PositionId, QueueEntry, Register,
    RobotStatus, StateChange, Velocity,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::remote::{RemoteInterface, decode, encode, paths};

/// Verb of a recorded write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMethod {
    Post,
    Put,
}

/// One accepted POST or PUT.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    pub method: WriteMethod,
    pub path: String,
    pub body: Value,
}

struct SimState {
    positions: Vec<Position>,
    missions: Vec<MissionSummary>,
    actions: HashMap<MissionId, Vec<Action>>,
    history: Vec<MissionHistoryEntry>,
    status: RobotStatus,
    registers: BTreeMap<u32, f64>,
    writes: Vec<RecordedWrite>,
    fetches: HashMap<String, usize>,
    failing: HashSet<String>,
    auto_progress: bool,
}

/// Simulated MiR REST API.
pub struct SimRemote {
    state: RefCell<SimState>,
}

impl Default for SimRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRemote {
    /// An empty fleet: no catalog, no history, robot in `Ready`.
    pub fn new() -> Self {
        Self {
            state: RefCell::new(SimState {
                positions: Vec::new(),
                missions: Vec::new(),
                actions: HashMap::new(),
                history: Vec::new(),
                status: RobotStatus {
                    state_id: OperationalState::Ready.id(),
                    state_text: "Ready".to_string(),
                    battery_percentage: 100.0,
                    distance_to_next_target: 0.0,
                    velocity: Velocity::default(),
                    mission_text: String::new(),
                },
                registers: BTreeMap::new(),
                writes: Vec::new(),
                fetches: HashMap::new(),
                failing: HashSet::new(),
                auto_progress: false,
            }),
        }
    }

    /// A small pre-populated site for dry runs: a `Home` waypoint, a
    /// `shelfA` L-marker, and the default mission templates.
    pub fn demo() -> Self {
        Self::new()
            .with_position("p-home", "Home", 0)
            .with_position("p-shelfa-entry", "shelfA", 12)
            .with_position("p-shelfa", "shelfA", 11)
            .with_mission(
                "m-move-to",
                "move_to",
                vec![demo_action(
                    "a-move",
                    "move",
                    &[("position", json!("")), ("retries", json!(10))],
                )],
            )
            .with_mission(
                "m-dock-to",
                "dock_to",
                vec![demo_action("a-dock", "docking", &[("marker", json!(""))])],
            )
            .with_mission(
                "m-move-for",
                "move_for",
                vec![demo_action(
                    "a-relative",
                    "relative_move",
                    &[("x", json!(0.0)), ("y", json!(0.0)), ("orientation", json!(0.0))],
                )],
            )
            .with_mission("m-scream-start", "scream_start", demo_sound("start"))
            .with_mission("m-scream-beep", "scream_beep", demo_sound("beep"))
            .with_mission("m-scream-end", "scream_end", demo_sound("end"))
            .with_auto_progress()
    }

    pub fn with_position(self, guid: &str, name: &str, type_id: u32) -> Self {
        self.state.borrow_mut().positions.push(Position {
            id: PositionId::new(guid),
            name: name.to_string(),
            type_id,
        });
        self
    }

    pub fn with_mission(self, guid: &str, name: &str, actions: Vec<Action>) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let id = MissionId::new(guid);
            state.missions.push(MissionSummary {
                id: id.clone(),
                name: name.to_string(),
            });
            state.actions.insert(id, actions);
        }
        self
    }

    /// Append a finished (or running) entry to the execution history.
    pub fn with_history(self, mission_state: MissionState) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let id = state.history.len() as u64 + 1;
            state.history.push(MissionHistoryEntry {
                id,
                state: mission_state,
                mission_id: None,
            });
        }
        self
    }

    pub fn with_robot_state(self, state_id: u32) -> Self {
        self.state.borrow_mut().status.state_id = state_id;
        self
    }

    pub fn with_battery(self, percentage: f64) -> Self {
        self.state.borrow_mut().status.battery_percentage = percentage;
        self
    }

    /// Move the history tail one step (`Pending` → `Executing` → `Done`) on
    /// every history read while the robot is `Ready` or `Executing`.
    pub fn with_auto_progress(self) -> Self {
        self.state.borrow_mut().auto_progress = true;
        self
    }

    /// Overwrite the state of the most recent history entry.
    pub fn set_tail_state(&self, mission_state: MissionState) {
        if let Some(tail) = self.state.borrow_mut().history.last_mut() {
            tail.state = mission_state;
        }
    }

    /// Make every request to `path` fail with HTTP 500.
    pub fn fail_path(&self, path: &str) {
        self.state.borrow_mut().failing.insert(path.to_string());
    }

    pub fn heal_path(&self, path: &str) {
        self.state.borrow_mut().failing.remove(path);
    }

    /// Number of GETs issued against `path`, failed ones included.
    pub fn fetch_count(&self, path: &str) -> usize {
        self.state.borrow().fetches.get(path).copied().unwrap_or(0)
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.state.borrow().writes.clone()
    }

    /// Every queue entry accepted by `POST mission_queue`, in order.
    pub fn submissions(&self) -> Vec<QueueEntry> {
        self.state
            .borrow()
            .writes
            .iter()
            .filter(|w| w.method == WriteMethod::Post && w.path == paths::MISSION_QUEUE)
            .filter_map(|w| serde_json::from_value(w.body.clone()).ok())
            .collect()
    }

    /// Current action list of `mission`, including applied patches.
    pub fn actions_of(&self, mission: &MissionId) -> Vec<Action> {
        self.state
            .borrow()
            .actions
            .get(mission)
            .cloned()
            .unwrap_or_default()
    }

    pub fn robot_state(&self) -> u32 {
        self.state.borrow().status.state_id
    }

    fn check_failing(&self, path: &str) -> Result<(), MirError> {
        if self.state.borrow().failing.contains(path) {
            return Err(MirError::Transport {
                path: path.to_string(),
                status: Some(500),
                message: "simulated failure".to_string(),
            });
        }
        Ok(())
    }

    fn not_found(path: &str) -> MirError {
        MirError::Transport {
            path: path.to_string(),
            status: Some(404),
            message: "no such resource".to_string(),
        }
    }

    fn record(&self, method: WriteMethod, path: &str, body: &Value) {
        self.state.borrow_mut().writes.push(RecordedWrite {
            method,
            path: path.to_string(),
            body: body.clone(),
        });
    }
}

impl SimState {
    fn progress_tail(&mut self) {
        let running = matches!(
            OperationalState::from_id(self.status.state_id),
            Some(OperationalState::Ready | OperationalState::Executing)
        );
        if !self.auto_progress || !running {
            return;
        }
        if let Some(tail) = self.history.last_mut() {
            tail.state = match tail.state {
                MissionState::Pending => MissionState::Executing,
                MissionState::Executing => MissionState::Done,
                other => other,
            };
        }
    }
}

fn demo_action(id: &str, kind: &str, params: &[(&str, Value)]) -> Action {
    Action {
        id: ActionId::new(id),
        action_type: kind.to_string(),
        parameters: params
            .iter()
            .map(|(pid, value)| ActionParameter {
                id: pid.to_string(),
                value: value.clone(),
            })
            .collect(),
        priority: 1,
    }
}

fn demo_sound(clip: &str) -> Vec<Action> {
    vec![demo_action(
        &format!("a-sound-{clip}"),
        "play_sound",
        &[("sound", json!(clip)), ("volume", json!(80))],
    )]
}

#[derive(Deserialize)]
struct RegisterWrite {
    value: f64,
}

impl RemoteInterface for SimRemote {
    fn fetch(&self, path: &str) -> Result<Value, MirError> {
        *self
            .state
            .borrow_mut()
            .fetches
            .entry(path.to_string())
            .or_insert(0) += 1;
        self.check_failing(path)?;

        let mut state = self.state.borrow_mut();
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        match segments.as_slice() {
            ["positions"] => encode(path, &state.positions),
            ["missions"] => encode(path, &state.missions),
            ["missions", mission, "actions"] => state
                .actions
                .get(&MissionId::new(*mission))
                .ok_or_else(|| Self::not_found(path))
                .and_then(|actions| encode(path, actions)),
            ["mission_queue"] => {
                state.progress_tail();
                encode(path, &state.history)
            }
            ["status"] => encode(path, &state.status),
            ["registers", index] => {
                let id: u32 = index.parse().map_err(|_| Self::not_found(path))?;
                let value = state.registers.get(&id).copied().unwrap_or(0.0);
                encode(
                    path,
                    &Register {
                        id,
                        value,
                        label: String::new(),
                    },
                )
            }
            _ => Err(Self::not_found(path)),
        }
    }

    fn submit(&self, path: &str, body: &Value) -> Result<Value, MirError> {
        self.check_failing(path)?;
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let response = match segments.as_slice() {
            ["mission_queue"] => {
                let entry: QueueEntry = decode(path, body.clone())?;
                let mut state = self.state.borrow_mut();
                let created = MissionHistoryEntry {
                    id: state.history.len() as u64 + 1,
                    state: MissionState::Pending,
                    mission_id: Some(entry.mission_id),
                };
                state.history.push(created.clone());
                encode(path, &created)?
            }
            ["registers", index] => {
                let id: u32 = index.parse().map_err(|_| Self::not_found(path))?;
                let write: RegisterWrite = decode(path, body.clone())?;
                self.state.borrow_mut().registers.insert(id, write.value);
                json!({ "id": id, "value": write.value })
            }
            _ => return Err(Self::not_found(path)),
        };
        self.record(WriteMethod::Post, path, body);
        Ok(response)
    }

    fn update(&self, path: &str, body: &Value) -> Result<Value, MirError> {
        self.check_failing(path)?;
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let response = match segments.as_slice() {
            ["missions", mission, "actions", action] => {
                let patch: ActionPatch = decode(path, body.clone())?;
                let mut state = self.state.borrow_mut();
                let target = state
                    .actions
                    .get_mut(&MissionId::new(*mission))
                    .and_then(|actions| actions.iter_mut().find(|a| a.id.as_str() == *action))
                    .ok_or_else(|| Self::not_found(path))?;
                target.priority = patch.priority;
                for param in patch.parameters {
                    match target.parameters.iter_mut().find(|p| p.id == param.id) {
                        Some(existing) => existing.value = param.value,
                        None => target.parameters.push(param),
                    }
                }
                encode(path, &*target)?
            }
            ["status"] => {
                let change: StateChange = decode(path, body.clone())?;
                let mut state = self.state.borrow_mut();
                state.status.state_id = change.state_id;
                encode(path, &state.status)?
            }
            _ => return Err(Self::not_found(path)),
        };
        self.record(WriteMethod::Put, path, body);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_paths_are_404() {
        let sim = SimRemote::new();
        let err = sim.fetch("maps").unwrap_err();
        assert!(matches!(err, MirError::Transport { status: Some(404), .. }));
        assert!(sim.submit("maps", &json!({"x": 1})).is_err());
        assert!(sim.writes().is_empty());
    }

    #[test]
    fn failing_path_is_counted_but_not_served() {
        let sim = SimRemote::new();
        sim.fail_path("status");
        assert!(sim.fetch("status").is_err());
        assert_eq!(sim.fetch_count("status"), 1);
        sim.heal_path("status");
        assert!(sim.fetch("status").is_ok());
    }

    #[test]
    fn action_patch_replaces_named_parameter() {
        let sim = SimRemote::demo();
        let mission = MissionId::new("m-move-to");
        sim.update(
            "missions/m-move-to/actions/a-move",
            &json!({"priority": 100, "parameters": [{"id": "position", "value": "p-home"}]}),
        )
        .unwrap();
        let actions = sim.actions_of(&mission);
        assert_eq!(actions[0].priority, 100);
        assert_eq!(actions[0].parameter("position").unwrap().value, json!("p-home"));
        assert_eq!(actions[0].parameter("retries").unwrap().value, json!(10));
    }

    #[test]
    fn auto_progress_walks_tail_to_done() {
        let sim = SimRemote::new().with_auto_progress();
        sim.submit(
            "mission_queue",
            &json!({"mission_id": "m-1", "priority": 0}),
        )
        .unwrap();
        let states: Vec<MissionState> = (0..3)
            .map(|_| {
                let history: Vec<MissionHistoryEntry> =
                    decode("mission_queue", sim.fetch("mission_queue").unwrap()).unwrap();
                history.last().unwrap().state
            })
            .collect();
        assert_eq!(
            states,
            vec![MissionState::Executing, MissionState::Done, MissionState::Done]
        );
    }

    #[test]
    fn paused_robot_does_not_progress() {
        let sim = SimRemote::new()
            .with_auto_progress()
            .with_robot_state(OperationalState::Pause.id())
            .with_history(MissionState::Pending);
        let history: Vec<MissionHistoryEntry> =
            decode("mission_queue", sim.fetch("mission_queue").unwrap()).unwrap();
        assert_eq!(history[0].state, MissionState::Pending);
    }
}
