//! [`CatalogResolver`] – human-readable names to remote identifiers.
//!
//! Every lookup is a linear, exact-match scan over the catalog list with
//! first-match semantics.  Misses are reported as
//! [`MirError::NotFound`]; the resolver never hands back a placeholder id.
//!
//! # Example
//!
//! ```rust
//! use mir_client::{CatalogResolver, SimRemote};
//!
//! let sim = SimRemote::new().with_position("p-home", "Home", 0);
//! let mut catalog = CatalogResolver::new(&sim);
//!
//! let home = catalog.find_position("Home").unwrap();
//! assert_eq!(home.id.as_str(), "p-home");
//! assert!(catalog.find_position("Kitchen").is_err());
//! ```

use std::time::Duration;

use mir_types::{Action, MirError, MissionId, MissionSummary, Position, PositionKind};
use tracing::debug;

use crate::cache::TimedCache;
use crate::remote::{RemoteInterface, decode, paths};

/// Resolves position, marker, and mission names against the remote catalog.
pub struct CatalogResolver<R> {
    remote: R,
    positions: TimedCache<Position>,
    missions: TimedCache<MissionSummary>,
}

impl<R: RemoteInterface> CatalogResolver<R> {
    /// A resolver that fetches the catalog fresh on every lookup.
    pub fn new(remote: R) -> Self {
        Self {
            remote,
            positions: TimedCache::disabled(),
            missions: TimedCache::disabled(),
        }
    }

    /// A resolver that reuses fetched catalogs for `interval`.
    pub fn with_refresh_interval(remote: R, interval: Duration) -> Self {
        Self {
            remote,
            positions: TimedCache::with_ttl(interval),
            missions: TimedCache::with_ttl(interval),
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Drop any cached catalog lists.
    pub fn invalidate(&mut self) {
        self.positions.invalidate();
        self.missions.invalidate();
    }

    /// The full positions catalog.
    pub fn positions(&mut self) -> Result<&[Position], MirError> {
        let remote = &self.remote;
        self.positions
            .get_or_refresh(|| decode(paths::POSITIONS, remote.fetch(paths::POSITIONS)?))
    }

    /// The full mission-template catalog.
    pub fn missions(&mut self) -> Result<&[MissionSummary], MirError> {
        let remote = &self.remote;
        self.missions
            .get_or_refresh(|| decode(paths::MISSIONS, remote.fetch(paths::MISSIONS)?))
    }

    /// First position whose name equals `name`.
    pub fn find_position(&mut self, name: &str) -> Result<Position, MirError> {
        self.positions()?
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| MirError::not_found("position", name))
    }

    /// First L-marker (or, with `want_helper`, L-marker entry) named `name`.
    pub fn find_lmarker_point(
        &mut self,
        name: &str,
        want_helper: bool,
    ) -> Result<Position, MirError> {
        let (kind, label) = if want_helper {
            (PositionKind::LMarkerEntry, "l-marker entry")
        } else {
            (PositionKind::LMarker, "l-marker")
        };
        self.positions()?
            .iter()
            .find(|p| p.name == name && p.kind() == kind)
            .cloned()
            .ok_or_else(|| MirError::not_found(label, name))
    }

    /// Id of the first mission template named `name`.
    pub fn find_mission(&mut self, name: &str) -> Result<MissionId, MirError> {
        let id = self
            .missions()?
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.id.clone())
            .ok_or_else(|| MirError::not_found("mission", name))?;
        debug!(mission = name, mission_id = %id, "resolved mission template");
        Ok(id)
    }

    /// The ordered action list of `mission`.
    pub fn fetch_mission_actions(&self, mission: &MissionId) -> Result<Vec<Action>, MirError> {
        let path = paths::mission_actions(mission);
        decode(&path, self.remote.fetch(&path)?)
    }
}
