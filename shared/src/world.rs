//! World objects and the world definition loaded at session start.
//!
//! Objects live in a flat arena indexed by [`ObjectId`]; arena order is also
//! the order obstacles are tested in, which keeps collision deterministic.
//! Each object gets an [`ActivationTag`] when it is created, so the chunker
//! never has to guess an object's role from its name.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::{
    collision::{ObstacleRef, ObstacleShapeDef, StaticCollider},
    error::GeometryError,
    ids::ObjectId,
    poi::PointOfInterest,
};

/// What an object is. Only used to pick its activation tag and for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Ground,
    Road,
    Building,
    Tree,
    Prop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActivationTag {
    /// Never culled (ground plane, road network).
    AlwaysActive,
    /// Enabled only when its chunk is near the possessed actor.
    Chunked,
}

impl ObjectKind {
    pub fn activation_tag(self) -> ActivationTag {
        match self {
            ObjectKind::Ground | ObjectKind::Road => ActivationTag::AlwaysActive,
            ObjectKind::Building | ObjectKind::Tree | ObjectKind::Prop => ActivationTag::Chunked,
        }
    }
}

/// Authored description of one world object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectDef {
    pub kind: ObjectKind,
    pub position: [f32; 3],
    #[serde(default)]
    pub yaw: f32,
    /// Collision volume; objects without one are purely visual.
    #[serde(default)]
    pub obstacle: Option<ObstacleShapeDef>,
}

#[derive(Clone, Debug)]
pub struct WorldObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub tag: ActivationTag,
    pub position: Point3<f32>,
    enabled: bool,
    collider: Option<StaticCollider>,
}

impl WorldObject {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn collider(&self) -> Option<&StaticCollider> {
        self.collider.as_ref()
    }
}

/// Result of a bulk load: how many items were kept and how many were dropped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
}

/// Arena of static world objects.
#[derive(Clone, Debug, Default)]
pub struct WorldObjects {
    objects: Vec<WorldObject>,
    /// Bumped whenever the object set changes so visibility is recomputed.
    generation: u64,
}

impl WorldObjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one object. New objects start enabled until the next chunk pass.
    pub fn insert(&mut self, def: &ObjectDef) -> Result<ObjectId, GeometryError> {
        if !def.position.iter().all(|v| v.is_finite()) {
            return Err(GeometryError::NonFinite {
                what: "object position",
            });
        }
        let collider = def
            .obstacle
            .as_ref()
            .map(|shape| StaticCollider::from_def(shape, def.position, def.yaw))
            .transpose()?;

        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(WorldObject {
            id,
            kind: def.kind,
            tag: def.kind.activation_tag(),
            position: Point3::from(def.position),
            enabled: true,
            collider,
        });
        self.generation += 1;
        Ok(id)
    }

    /// Adds every valid definition; invalid ones are logged and skipped.
    pub fn load(&mut self, defs: &[ObjectDef]) -> LoadReport {
        let mut report = LoadReport::default();
        for (index, def) in defs.iter().enumerate() {
            match self.insert(def) {
                Ok(_) => report.loaded += 1,
                Err(err) => {
                    log::warn!("skipping world object #{index} ({:?}): {err}", def.kind);
                    report.skipped += 1;
                }
            }
        }
        report
    }

    pub fn get(&self, id: ObjectId) -> Option<&WorldObject> {
        self.objects.get(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorldObject> {
        self.objects.iter()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Enabled obstacles in arena order.
    pub fn active_colliders(&self) -> impl Iterator<Item = ObstacleRef<'_>> {
        self.objects
            .iter()
            .filter(|o| o.enabled)
            .filter_map(|o| o.collider.as_ref().map(|c| (o.id, c)))
    }

    /// Only the chunker writes enable flags. Returns `true` if the flag flipped.
    pub(crate) fn set_enabled(&mut self, id: ObjectId, enabled: bool) -> bool {
        match self.objects.get_mut(id.0 as usize) {
            Some(object) if object.enabled != enabled => {
                object.enabled = enabled;
                true
            }
            _ => false,
        }
    }
}

/// A parked vehicle placed at session start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleSpawn {
    pub x: f32,
    pub z: f32,
    #[serde(default)]
    pub heading: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub x: f32,
    pub z: f32,
    #[serde(default)]
    pub heading: f32,
}

impl Default for SpawnPoint {
    fn default() -> Self {
        Self {
            x: 0.0,
            z: 0.0,
            heading: 0.0,
        }
    }
}

/// Everything static about a session's world, usually loaded from JSON.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldDefinition {
    pub spawn: SpawnPoint,
    pub objects: Vec<ObjectDef>,
    pub vehicles: Vec<VehicleSpawn>,
    pub points_of_interest: Vec<PointOfInterest>,
    /// Start the session seated in the first vehicle.
    pub start_in_vehicle: bool,
}

impl WorldDefinition {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
