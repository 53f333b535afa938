//! [`RobotApi`] – typed helpers for robot status, mission history,
//! operational-state transitions, and PLC registers.
//!
//! Blanket-implemented for every [`RemoteInterface`], so any remote (HTTP or
//! simulated) gets these methods for free.

use mir_types::{
    MirError, MissionHistoryEntry, OperationalState, QueueEntry, Register, RobotStatus,
    StateChange,
};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::remote::{RemoteInterface, decode, encode, paths};

/// Register read by the legacy PLC program as the target station index.
pub const TARGET_STATION_REGISTER: u32 = 20;
/// Register read by the legacy PLC program as the sub-point within a station.
pub const TARGET_POINT_REGISTER: u32 = 21;
/// Register read by the legacy PLC program as the audio clip to play.
pub const AUDIO_REGISTER: u32 = 19;

pub trait RobotApi: RemoteInterface {
    fn status(&self) -> Result<RobotStatus, MirError> {
        decode(paths::STATUS, self.fetch(paths::STATUS)?)
    }

    fn battery_percentage(&self) -> Result<f64, MirError> {
        Ok(self.status()?.battery_percentage)
    }

    /// See [`RobotStatus::is_available`].
    fn is_available(&self, acceptance_radius: f64) -> Result<bool, MirError> {
        Ok(self.status()?.is_available(acceptance_radius))
    }

    /// The whole execution history, oldest first.
    fn mission_history(&self) -> Result<Vec<MissionHistoryEntry>, MirError> {
        decode(paths::MISSION_QUEUE, self.fetch(paths::MISSION_QUEUE)?)
    }

    /// The most recently appended history entry, if any.
    fn latest_history_entry(&self) -> Result<Option<MissionHistoryEntry>, MirError> {
        Ok(self.mission_history()?.pop())
    }

    /// Append `entry` to the remote execution queue and return the created
    /// queue record.
    fn enqueue_mission(&self, entry: &QueueEntry) -> Result<Value, MirError> {
        let body = encode(paths::MISSION_QUEUE, entry)?;
        self.submit(paths::MISSION_QUEUE, &body)
    }

    /// Ask the robot to switch to `state`.
    ///
    /// The robot's current state is read first; if it reports an id outside
    /// the recognised set the request is refused and nothing is written.
    fn request_state(&self, state: OperationalState) -> Result<(), MirError> {
        let current = self.status()?;
        if OperationalState::from_id(current.state_id).is_none() {
            warn!(state_id = current.state_id, "robot reports unrecognised state");
            return Err(MirError::UnknownRobotState(current.state_id));
        }
        let body = encode(
            paths::STATUS,
            &StateChange {
                state_id: state.id(),
            },
        )?;
        self.update(paths::STATUS, &body)?;
        info!(from = current.state_id, to = %state, "requested operational state change");
        Ok(())
    }

    /// [`RobotApi::request_state`] for a raw state id.
    ///
    /// Ids outside the recognised set fail before any remote call.
    fn request_state_id(&self, state_id: u32) -> Result<OperationalState, MirError> {
        let state = OperationalState::try_from(state_id)?;
        self.request_state(state)?;
        Ok(state)
    }

    fn read_register(&self, index: u32) -> Result<Register, MirError> {
        let path = paths::register(index);
        decode(&path, self.fetch(&path)?)
    }

    /// Write `value` to register `index`.  Integers are sent as JSON
    /// integers, fractions as floats.
    fn write_register(&self, index: u32, value: impl Into<Value>) -> Result<Value, MirError> {
        self.submit(&paths::register(index), &json!({ "value": value.into() }))
    }

    /// Legacy target signalling: the sub-point is written before the station
    /// so the PLC never sees a new station with a stale point.
    fn set_target(&self, station: u32, point: u32) -> Result<Value, MirError> {
        self.write_register(TARGET_POINT_REGISTER, point)?;
        self.write_register(TARGET_STATION_REGISTER, station)
    }

    /// Legacy audio signalling through [`AUDIO_REGISTER`].
    fn play_audio(&self, clip: u32) -> Result<Value, MirError> {
        self.write_register(AUDIO_REGISTER, clip)
    }
}

impl<T: RemoteInterface + ?Sized> RobotApi for T {}
