//! Owned structures (houses) as seen by the local client.
//!
//! The server is the source of truth; the directory is replaced wholesale on
//! every fetch (world load and after each raid resolution). Rows with invalid
//! geometry are logged and skipped so one bad row never blocks the world.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    actor::planar_distance,
    error::GeometryError,
    ids::{StructureId, UserId},
    raid::RaidOutcome,
    world::LoadReport,
};

/// Wire row returned by the structure listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructureRow {
    pub id: StructureId,
    pub owner_id: UserId,
    pub position_x: f32,
    pub position_z: f32,
    #[serde(default)]
    pub defense_rating: Option<f64>,
    /// Free-form JSON; may carry `defense_rating` and `name` for older rows.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub last_raid_at: Option<String>,
    #[serde(default)]
    pub last_raid_outcome: Option<RaidOutcome>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Structure {
    pub id: StructureId,
    pub owner_id: UserId,
    pub name: Option<String>,
    pub position_x: f32,
    pub position_z: f32,
    pub defense_rating: f64,
    pub is_owned_by_local_actor: bool,
    pub last_raid_at: Option<String>,
    pub last_raid_outcome: Option<RaidOutcome>,
}

impl Structure {
    pub fn from_row(
        row: StructureRow,
        local_user: &UserId,
        default_defense: f64,
    ) -> Result<Self, GeometryError> {
        if !row.position_x.is_finite() || !row.position_z.is_finite() {
            return Err(GeometryError::NonFinite {
                what: "structure position",
            });
        }

        let metadata = row.metadata.as_ref();
        let defense_rating = row
            .defense_rating
            .or_else(|| metadata.and_then(|m| m.get("defense_rating")).and_then(|v| v.as_f64()))
            .filter(|d| d.is_finite())
            .unwrap_or(default_defense)
            .max(0.0);
        let name = metadata
            .and_then(|m| m.get("name"))
            .and_then(|v| v.as_str())
            .map(str::to_owned);

        Ok(Self {
            is_owned_by_local_actor: row.owner_id == *local_user,
            id: row.id,
            owner_id: row.owner_id,
            name,
            position_x: row.position_x,
            position_z: row.position_z,
            defense_rating,
            last_raid_at: row.last_raid_at,
            last_raid_outcome: row.last_raid_outcome,
        })
    }

    pub fn distance_to(&self, x: f32, z: f32) -> f32 {
        planar_distance(self.position_x, self.position_z, x, z)
    }
}

#[derive(Clone, Debug, Default)]
pub struct StructureDirectory {
    structures: Vec<Structure>,
}

impl StructureDirectory {
    /// Replaces the directory with a fresh listing, keeping row order.
    pub fn replace_from_rows(
        &mut self,
        rows: Vec<StructureRow>,
        local_user: &UserId,
        default_defense: f64,
    ) -> LoadReport {
        let mut report = LoadReport::default();
        let mut seen = HashSet::new();
        let mut structures = Vec::with_capacity(rows.len());

        for row in rows {
            let id = row.id;
            if !seen.insert(id) {
                log::warn!("skipping duplicate {id}");
                report.skipped += 1;
                continue;
            }
            match Structure::from_row(row, local_user, default_defense) {
                Ok(structure) => {
                    structures.push(structure);
                    report.loaded += 1;
                }
                Err(err) => {
                    log::warn!("skipping {id}: {err}");
                    report.skipped += 1;
                }
            }
        }

        self.structures = structures;
        report
    }

    pub fn get(&self, id: StructureId) -> Option<&Structure> {
        self.structures.iter().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Structure> {
        self.structures.iter()
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    /// Nearest structure within `radius` (inclusive). Ties keep row order.
    pub fn nearest_within(&self, x: f32, z: f32, radius: f32) -> Option<&Structure> {
        self.structures
            .iter()
            .map(|s| (s, s.distance_to(x, z)))
            .filter(|(_, d)| *d <= radius)
            .fold(None, |best: Option<(&Structure, f32)>, (s, d)| match best {
                Some((_, best_d)) if best_d <= d => best,
                _ => Some((s, d)),
            })
            .map(|(s, _)| s)
    }
}
