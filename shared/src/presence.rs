//! Polling-based presence sync.
//!
//! - Push: the possessed actor's planar transform goes out at most once per
//!   push interval.
//! - Pull: every pull interval (one in flight at most) the full presence
//!   table is fetched; the ghost set is reconciled against it.
//!
//! Ghost transforms are snapped, not interpolated. Failures are skipped
//! silently and the ghost set is kept as is until the next successful pull.

use std::{collections::BTreeMap, collections::BTreeSet, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{config::SyncSettings, error::TransportError, ids::UserId, timer::IntervalTimer};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleTag {
    Car,
    Foot,
}

/// Local transform pushed to the presence table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresenceUpsert {
    pub position_x: f32,
    pub position_z: f32,
    pub rotation_y: f32,
    pub vehicle: VehicleTag,
}

/// One row of the presence table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresenceRow {
    pub user_id: UserId,
    pub position_x: f32,
    pub position_z: f32,
    pub rotation_y: f32,
    #[serde(default)]
    pub vehicle: Option<VehicleTag>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Read-only stand-in for a remote player.
#[derive(Clone, Debug, PartialEq)]
pub struct Ghost {
    pub user_id: UserId,
    pub position_x: f32,
    pub position_z: f32,
    pub heading: f32,
    pub vehicle: Option<VehicleTag>,
    pub updated_at: Option<String>,
}

impl Ghost {
    fn from_row(row: PresenceRow) -> Self {
        Self {
            user_id: row.user_id,
            position_x: row.position_x,
            position_z: row.position_z,
            heading: row.rotation_y,
            vehicle: row.vehicle,
            updated_at: row.updated_at,
        }
    }

    fn same_transform(&self, row: &PresenceRow) -> bool {
        self.position_x == row.position_x
            && self.position_z == row.position_z
            && self.heading == row.rotation_y
            && self.vehicle == row.vehicle
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GhostChange {
    Spawned(UserId),
    Moved(UserId),
    Disposed(UserId),
}

#[derive(Clone, Debug)]
pub struct PresenceSync {
    local_user: UserId,
    push: IntervalTimer,
    pull: IntervalTimer,
    /// When the outstanding pull was sent.
    pull_sent_at: Option<Duration>,
    ghosts: BTreeMap<UserId, Ghost>,
}

impl PresenceSync {
    /// Both timers fire on the first poll at or after `now`.
    pub fn new(local_user: UserId, settings: &SyncSettings, now: Duration) -> Self {
        Self {
            local_user,
            push: IntervalTimer::new(settings.push_interval(), now),
            pull: IntervalTimer::new(settings.pull_interval(), now),
            pull_sent_at: None,
            ghosts: BTreeMap::new(),
        }
    }

    pub fn local_user(&self) -> &UserId {
        &self.local_user
    }

    /// `true` when a push should be sent this tick.
    pub fn poll_push(&mut self, now: Duration) -> bool {
        self.push.poll(now)
    }

    /// `true` when a pull should be sent this tick.
    ///
    /// A cycle is skipped while the previous pull is in flight. A pull left
    /// unanswered for two intervals is abandoned and a new one is sent.
    pub fn poll_pull(&mut self, now: Duration) -> bool {
        if !self.pull.poll(now) {
            return false;
        }
        if let Some(sent_at) = self.pull_sent_at {
            if now.saturating_sub(sent_at) < self.pull.period() * 2 {
                log::debug!("presence pull still in flight; skipping cycle");
                return false;
            }
            log::debug!("presence pull unanswered since {sent_at:?}; retrying");
        }
        self.pull_sent_at = Some(now);
        true
    }

    pub fn push_completed(&mut self, result: Result<(), TransportError>) {
        if let Err(err) = result {
            log::debug!("presence push failed: {err}");
        }
    }

    /// Reconciles ghosts against a pull result.
    pub fn apply_pull(
        &mut self,
        result: Result<Vec<PresenceRow>, TransportError>,
    ) -> Vec<GhostChange> {
        self.pull_sent_at = None;
        let rows = match result {
            Ok(rows) => rows,
            Err(err) => {
                log::debug!("presence pull failed: {err}");
                return Vec::new();
            }
        };

        let mut changes = Vec::new();
        let mut seen = BTreeSet::new();

        for row in rows {
            if row.user_id == self.local_user {
                continue;
            }
            seen.insert(row.user_id.clone());

            let finite = row.position_x.is_finite()
                && row.position_z.is_finite()
                && row.rotation_y.is_finite();
            if !finite {
                log::warn!("dropping presence row for {} with non-finite transform", row.user_id);
                continue;
            }

            match self.ghosts.get_mut(&row.user_id) {
                Some(ghost) => {
                    if !ghost.same_transform(&row) {
                        changes.push(GhostChange::Moved(row.user_id.clone()));
                    }
                    *ghost = Ghost::from_row(row);
                }
                None => {
                    changes.push(GhostChange::Spawned(row.user_id.clone()));
                    self.ghosts.insert(row.user_id.clone(), Ghost::from_row(row));
                }
            }
        }

        let gone: Vec<UserId> = self
            .ghosts
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        for id in gone {
            self.ghosts.remove(&id);
            changes.push(GhostChange::Disposed(id));
        }

        log::debug!("presence pull: {} ghosts, {} changes", self.ghosts.len(), changes.len());
        changes
    }

    pub fn ghosts(&self) -> impl Iterator<Item = &Ghost> {
        self.ghosts.values()
    }

    pub fn ghost(&self, user: &UserId) -> Option<&Ghost> {
        self.ghosts.get(user)
    }

    pub fn ghost_count(&self) -> usize {
        self.ghosts.len()
    }

    /// Cancels both timers and disposes every ghost. Idempotent.
    pub fn stop(&mut self) -> Vec<GhostChange> {
        self.push.cancel();
        self.pull.cancel();
        self.pull_sent_at = None;
        std::mem::take(&mut self.ghosts)
            .into_keys()
            .map(GhostChange::Disposed)
            .collect()
    }
}
