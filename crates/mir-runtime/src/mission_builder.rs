//! [`MissionBuilder`] – turns an [`Intent`] into a ready-to-queue mission.
//!
//! Each intent maps onto a pre-authored mission template on the robot.  The
//! builder resolves the template by name, finds the first action of the
//! intent's kind inside it, and patches that action's single parameter and
//! priority.  The mission id is returned; queueing it is left to the caller.
//!
//! | Intent | Template | Action kind | Parameter |
//! |---|---|---|---|
//! | `MoveTo { name }` | `move_to` | `move` | `position` = position guid |
//! | `DockTo { name }` | `dock_to` | `docking` | `marker` = L-marker guid |
//! | `MoveFor { distance }` | `move_for` | `relative_move` | `x` = distance |
//! | `Scream { sound }` | `sounds[sound]` | – | – |

use std::collections::BTreeMap;

use mir_client::CatalogResolver;
use mir_client::RemoteInterface;
use mir_client::remote::{encode, paths};
use mir_types::{
    ActionId, ActionKind, ActionParameter, ActionPatch, Intent, MirError, MissionId,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

/// Priority written into every patched action so the templated step runs
/// ahead of any stale default.
pub const PATCH_PRIORITY: i64 = 100;

/// Names of the mission templates each intent is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionTemplates {
    pub move_to: String,
    pub dock_to: String,
    pub move_for: String,
    /// Sound id (`start`, `beep`, `end`, ...) → mission template name.
    pub sounds: BTreeMap<String, String>,
}

impl Default for MissionTemplates {
    fn default() -> Self {
        let sounds = ["start", "beep", "end"]
            .into_iter()
            .map(|s| (s.to_string(), format!("scream_{s}")))
            .collect();
        Self {
            move_to: "move_to".to_string(),
            dock_to: "dock_to".to_string(),
            move_for: "move_for".to_string(),
            sounds,
        }
    }
}

struct ActionTarget {
    kind: ActionKind,
    parameter: &'static str,
    value: Value,
}

/// Builds missions for intents against one robot's catalog.
pub struct MissionBuilder<R> {
    catalog: CatalogResolver<R>,
    templates: MissionTemplates,
}

impl<R: RemoteInterface> MissionBuilder<R> {
    pub fn new(catalog: CatalogResolver<R>, templates: MissionTemplates) -> Self {
        Self { catalog, templates }
    }

    pub fn remote(&self) -> &R {
        self.catalog.remote()
    }

    pub fn catalog_mut(&mut self) -> &mut CatalogResolver<R> {
        &mut self.catalog
    }

    pub fn templates(&self) -> &MissionTemplates {
        &self.templates
    }

    /// Prepare the mission for `intent` and return its id.
    ///
    /// # Errors
    ///
    /// - [`MirError::NotFound`] – the template, position, marker, sound, or
    ///   matching action does not exist.  Nothing is written in that case.
    /// - [`MirError::InvalidIntent`] – the intent argument cannot be sent.
    /// - Transport and decode failures from the remote.
    #[instrument(skip_all, fields(intent = %intent))]
    pub fn build(&mut self, intent: &Intent) -> Result<MissionId, MirError> {
        let template = self.template_for(intent)?;
        let mission_id = self.catalog.find_mission(&template)?;
        if let Some(target) = self.action_target(intent)? {
            let action_id = self.patch(&mission_id, target)?;
            debug!(%mission_id, %action_id, "patched template action");
        }
        info!(%intent, %mission_id, template = %template, "mission built");
        Ok(mission_id)
    }

    fn template_for(&self, intent: &Intent) -> Result<String, MirError> {
        match intent {
            Intent::MoveTo { .. } => Ok(self.templates.move_to.clone()),
            Intent::DockTo { .. } => Ok(self.templates.dock_to.clone()),
            Intent::MoveFor { .. } => Ok(self.templates.move_for.clone()),
            Intent::Scream { sound } => self
                .templates
                .sounds
                .get(sound)
                .cloned()
                .ok_or_else(|| MirError::not_found("sound", sound.as_str())),
        }
    }

    fn action_target(&mut self, intent: &Intent) -> Result<Option<ActionTarget>, MirError> {
        let target = match intent {
            Intent::MoveTo { name } => ActionTarget {
                kind: ActionKind::Move,
                parameter: "position",
                value: json!(self.catalog.find_position(name)?.id),
            },
            Intent::DockTo { name } => ActionTarget {
                kind: ActionKind::Docking,
                parameter: "marker",
                value: json!(self.catalog.find_lmarker_point(name, false)?.id),
            },
            Intent::MoveFor { distance } => {
                if !distance.is_finite() {
                    return Err(MirError::InvalidIntent(format!(
                        "relative move distance must be finite, got {distance}"
                    )));
                }
                ActionTarget {
                    kind: ActionKind::RelativeMove,
                    parameter: "x",
                    value: json!(distance),
                }
            }
            Intent::Scream { .. } => return Ok(None),
        };
        Ok(Some(target))
    }

    /// Patch the first action of `target.kind` in `mission`.
    fn patch(&self, mission: &MissionId, target: ActionTarget) -> Result<ActionId, MirError> {
        let actions = self.catalog.fetch_mission_actions(mission)?;
        let action = actions
            .into_iter()
            .find(|a| target.kind.matches(a))
            .ok_or_else(|| {
                MirError::not_found(
                    "action",
                    format!("{} in mission {mission}", target.kind.as_str()),
                )
            })?;

        let path = paths::mission_action(mission, &action.id);
        let patch = ActionPatch {
            priority: PATCH_PRIORITY,
            parameters: vec![ActionParameter {
                id: target.parameter.to_string(),
                value: target.value,
            }],
        };
        self.catalog.remote().update(&path, &encode(&path, &patch)?)?;
        Ok(action.id)
    }
}
