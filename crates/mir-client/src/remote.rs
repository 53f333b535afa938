//! The [`RemoteInterface`] seam and the response rules shared by every
//! implementation.
//!
//! A response body is decoded only when the status is `200`, or `201` for a
//! request that carried a non-empty body.  Everything else is a
//! [`MirError::Transport`], so "the call failed" can never be mistaken for
//! "the call returned nothing".

use std::sync::Arc;

use mir_types::MirError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Relative paths of the REST resources this client consumes.
pub mod paths {
    use mir_types::{ActionId, MissionId};

    pub const POSITIONS: &str = "positions";
    pub const MISSIONS: &str = "missions";
    pub const MISSION_QUEUE: &str = "mission_queue";
    pub const STATUS: &str = "status";

    pub fn mission_actions(mission: &MissionId) -> String {
        format!("missions/{mission}/actions")
    }

    pub fn mission_action(mission: &MissionId, action: &ActionId) -> String {
        format!("missions/{mission}/actions/{action}")
    }

    pub fn register(index: u32) -> String {
        format!("registers/{index}")
    }
}

/// Read / write / update access to the remote control plane.
///
/// Paths are relative to the API root (e.g. `"missions"`).  Implementations
/// block the calling thread for the full round-trip.
pub trait RemoteInterface {
    /// Issue a GET and return the decoded body.
    fn fetch(&self, path: &str) -> Result<Value, MirError>;

    /// Issue a POST with a JSON `body` and return the decoded response.
    fn submit(&self, path: &str, body: &Value) -> Result<Value, MirError>;

    /// Issue a PUT with a JSON `body` and return the decoded response.
    fn update(&self, path: &str, body: &Value) -> Result<Value, MirError>;
}

impl<T: RemoteInterface + ?Sized> RemoteInterface for &T {
    fn fetch(&self, path: &str) -> Result<Value, MirError> {
        (**self).fetch(path)
    }

    fn submit(&self, path: &str, body: &Value) -> Result<Value, MirError> {
        (**self).submit(path, body)
    }

    fn update(&self, path: &str, body: &Value) -> Result<Value, MirError> {
        (**self).update(path, body)
    }
}

impl<T: RemoteInterface + ?Sized> RemoteInterface for Box<T> {
    fn fetch(&self, path: &str) -> Result<Value, MirError> {
        (**self).fetch(path)
    }

    fn submit(&self, path: &str, body: &Value) -> Result<Value, MirError> {
        (**self).submit(path, body)
    }

    fn update(&self, path: &str, body: &Value) -> Result<Value, MirError> {
        (**self).update(path, body)
    }
}

impl<T: RemoteInterface + ?Sized> RemoteInterface for Arc<T> {
    fn fetch(&self, path: &str) -> Result<Value, MirError> {
        (**self).fetch(path)
    }

    fn submit(&self, path: &str, body: &Value) -> Result<Value, MirError> {
        (**self).submit(path, body)
    }

    fn update(&self, path: &str, body: &Value) -> Result<Value, MirError> {
        (**self).update(path, body)
    }
}

/// `true` for `null`, `""`, `[]` and `{}`.
pub fn body_is_empty(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Turn a raw HTTP status and body into a decoded JSON value.
///
/// An empty body on an accepted status decodes to [`Value::Null`].
pub fn interpret_response(
    path: &str,
    status: u16,
    request_had_body: bool,
    text: &str,
) -> Result<Value, MirError> {
    let accepted = status == 200 || (status == 201 && request_had_body);
    if !accepted {
        return Err(MirError::Transport {
            path: path.to_string(),
            status: Some(status),
            message: snippet(text),
        });
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| MirError::Decode {
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// Decode a JSON value into `T`, attributing failures to `path`.
pub fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, MirError> {
    serde_json::from_value(value).map_err(|e| MirError::Decode {
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// Encode `body` as a JSON value, attributing failures to `path`.
pub fn encode<T: Serialize>(path: &str, body: &T) -> Result<Value, MirError> {
    serde_json::to_value(body).map_err(|e| MirError::Decode {
        path: path.to_string(),
        message: e.to_string(),
    })
}

fn snippet(text: &str) -> String {
    const MAX: usize = 200;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    match trimmed.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
