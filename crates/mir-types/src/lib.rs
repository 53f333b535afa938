//! `mir-types` – shared data model for the MiR mission orchestrator.
//!
//! Every remote object decoded from the fleet-control REST API, the closed
//! set of local [`Intent`]s, and the single [`MirError`] type live here so the
//! client, runtime, and CLI crates agree on one vocabulary.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────────────────

macro_rules! remote_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

remote_id!(
    /// Remote guid of a mission template.
    MissionId
);
remote_id!(
    /// Remote guid of an action inside a mission template.
    ActionId
);
remote_id!(
    /// Remote guid of a named position or marker.
    PositionId
);

// ─────────────────────────────────────────────────────────────────────────────
// Catalog records
// ─────────────────────────────────────────────────────────────────────────────

/// Remote `type_id` of an L-marker position.
pub const L_MARKER_TYPE_ID: u32 = 11;
/// Remote `type_id` of the approach helper that belongs to an L-marker.
pub const L_MARKER_ENTRY_TYPE_ID: u32 = 12;

/// Classifier that distinguishes a docking marker from its approach helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionKind {
    Generic,
    LMarker,
    LMarkerEntry,
}

/// A named waypoint or marker from `GET positions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(rename = "guid")]
    pub id: PositionId,
    pub name: String,
    #[serde(default)]
    pub type_id: u32,
}

impl Position {
    pub fn kind(&self) -> PositionKind {
        match self.type_id {
            L_MARKER_TYPE_ID => PositionKind::LMarker,
            L_MARKER_ENTRY_TYPE_ID => PositionKind::LMarkerEntry,
            _ => PositionKind::Generic,
        }
    }
}

/// A mission template entry from `GET missions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionSummary {
    #[serde(rename = "guid")]
    pub id: MissionId,
    pub name: String,
}

/// One `{id, value}` pair in an action's parameter list.
///
/// `value` stays loosely typed: a position guid is a string, a relative
/// offset is a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionParameter {
    pub id: String,
    pub value: serde_json::Value,
}

/// A single step of a mission template from `GET missions/{id}/actions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "guid")]
    pub id: ActionId,
    pub action_type: String,
    #[serde(default)]
    pub parameters: Vec<ActionParameter>,
    #[serde(default)]
    pub priority: i64,
}

impl Action {
    pub fn parameter(&self, id: &str) -> Option<&ActionParameter> {
        self.parameters.iter().find(|p| p.id == id)
    }
}

/// The remote action kinds an [`Intent`] can patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Move,
    Docking,
    RelativeMove,
}

impl ActionKind {
    /// The `action_type` string used by the remote catalog.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Move => "move",
            ActionKind::Docking => "docking",
            ActionKind::RelativeMove => "relative_move",
        }
    }

    pub fn matches(&self, action: &Action) -> bool {
        action.action_type == self.as_str()
    }
}

/// Body of `PUT missions/{id}/actions/{action_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPatch {
    pub priority: i64,
    pub parameters: Vec<ActionParameter>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Execution queue
// ─────────────────────────────────────────────────────────────────────────────

/// Body of `POST mission_queue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub mission_id: MissionId,
    pub priority: i64,
}

/// Lifecycle state of a queued mission instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissionState {
    Pending,
    Executing,
    Done,
    Aborted,
    Failed,
    /// Any state string this client does not recognise.
    #[serde(other)]
    Unknown,
}

impl MissionState {
    /// `true` once no further progress happens on the mission.
    ///
    /// Only `Done` and `Aborted` release the single execution slot.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MissionState::Done | MissionState::Aborted)
    }
}

impl fmt::Display for MissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// An element of `GET mission_queue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionHistoryEntry {
    pub id: u64,
    pub state: MissionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission_id: Option<MissionId>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Robot status
// ─────────────────────────────────────────────────────────────────────────────

/// Coarse operating mode of the robot, addressed by its remote `state_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationalState {
    EmergencyStop,
    Pause,
    Ready,
    Executing,
    Error,
}

impl OperationalState {
    pub const ALL: [OperationalState; 5] = [
        OperationalState::EmergencyStop,
        OperationalState::Pause,
        OperationalState::Ready,
        OperationalState::Executing,
        OperationalState::Error,
    ];

    pub fn id(&self) -> u32 {
        match self {
            OperationalState::EmergencyStop => 10,
            OperationalState::Pause => 4,
            OperationalState::Ready => 3,
            OperationalState::Executing => 5,
            OperationalState::Error => 12,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }
}

impl TryFrom<u32> for OperationalState {
    type Error = MirError;

    fn try_from(id: u32) -> Result<Self, MirError> {
        Self::from_id(id).ok_or(MirError::InvalidStateRequest(id))
    }
}

impl fmt::Display for OperationalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.id())
    }
}

/// Body of `PUT status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub state_id: u32,
}

/// Linear and angular velocity reported by the robot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    #[serde(default)]
    pub linear: f64,
    #[serde(default)]
    pub angular: f64,
}

/// Snapshot decoded from `GET status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotStatus {
    pub state_id: u32,
    #[serde(default)]
    pub state_text: String,
    #[serde(default)]
    pub battery_percentage: f64,
    #[serde(default)]
    pub distance_to_next_target: f64,
    #[serde(default)]
    pub velocity: Velocity,
    #[serde(default)]
    pub mission_text: String,
}

impl RobotStatus {
    /// The robot is available when it sits within `acceptance_radius` of its
    /// target and is fully at rest.
    pub fn is_available(&self, acceptance_radius: f64) -> bool {
        self.distance_to_next_target <= acceptance_radius
            && self.velocity.linear == 0.0
            && self.velocity.angular == 0.0
    }
}

/// An indexed PLC register from `GET registers/{i}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Register {
    pub id: u32,
    pub value: f64,
    #[serde(default)]
    pub label: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Local intents
// ─────────────────────────────────────────────────────────────────────────────

/// The closed set of robot intents the orchestrator knows how to submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "intent", content = "args", rename_all = "snake_case")]
pub enum Intent {
    /// Drive to a named position.
    MoveTo { name: String },
    /// Drive `distance` metres along the robot's current heading.
    MoveFor { distance: f64 },
    /// Precision-dock at a named L-marker.
    DockTo { name: String },
    /// Play a pre-authored sound mission (`start`, `beep`, `end`, ...).
    Scream { sound: String },
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::MoveTo { name } => write!(f, "move_to({name})"),
            Intent::MoveFor { distance } => write!(f, "move_for({distance})"),
            Intent::DockTo { name } => write!(f, "dock_to({name})"),
            Intent::Scream { sound } => write!(f, "scream({sound})"),
        }
    }
}

/// An [`Intent`] waiting in the local FIFO.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingIntent {
    pub id: Uuid,
    pub intent: Intent,
    pub enqueued_at: DateTime<Utc>,
}

impl PendingIntent {
    pub fn new(intent: Intent) -> Self {
        Self {
            id: Uuid::new_v4(),
            intent,
            enqueued_at: Utc::now(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Error type shared by every layer, from transport up to the orchestrator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MirError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid state request: state id {0} is not recognised")]
    InvalidStateRequest(u32),

    #[error("Robot reports unrecognised state id {0}")]
    UnknownRobotState(u32),

    #[error("Invalid intent: {0}")]
    InvalidIntent(String),

    #[error("No {kind} named '{name}'")]
    NotFound { kind: &'static str, name: String },

    #[error("Request to '{path}' failed{}: {message}", .status.map(|s| format!(" with HTTP {s}")).unwrap_or_default())]
    Transport {
        path: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Unexpected response from '{path}': {message}")]
    Decode { path: String, message: String },
}

impl MirError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        MirError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Returns true for failures that may clear up on the next poll.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MirError::Transport { .. } | MirError::Decode { .. })
    }
}
