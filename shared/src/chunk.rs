//! Chunked visibility culling.
//!
//! # Model
//! - The XZ plane is split into square chunks of `chunk_size` units centered
//!   on multiples of `chunk_size`: `chunk = (round(x / size), round(z / size))`.
//! - A `Chunked` object is enabled iff the Chebyshev distance between its
//!   chunk and the possessed actor's chunk is at most `activation_radius`.
//! - `AlwaysActive` objects are always enabled.
//!
//! Recomputing is O(objects), so it only happens when the actor crosses into a
//! new chunk or the object set changes. The chunker is the sole writer of
//! enable flags.

use nalgebra::Point3;

use crate::{
    config::ChunkSettings,
    ids::ObjectId,
    world::{ActivationTag, WorldObjects},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing a world position.
    #[inline]
    pub fn of(position: &Point3<f32>, chunk_size: f32) -> Self {
        Self {
            x: (position.x / chunk_size).round() as i32,
            z: (position.z / chunk_size).round() as i32,
        }
    }

    /// Chebyshev (max per-axis) distance in chunks.
    #[inline]
    pub fn distance(self, other: ChunkCoord) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }
}

/// Objects whose enable flag flipped in one recompute.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkUpdate {
    pub chunk: Option<ChunkCoord>,
    pub enabled: Vec<ObjectId>,
    pub disabled: Vec<ObjectId>,
}

#[derive(Clone, Debug)]
pub struct VisibilityChunker {
    settings: ChunkSettings,
    current: Option<ChunkCoord>,
    seen_generation: Option<u64>,
}

impl VisibilityChunker {
    pub fn new(settings: ChunkSettings) -> Self {
        Self {
            settings,
            current: None,
            seen_generation: None,
        }
    }

    /// Chunk the last recompute was centered on.
    pub fn current(&self) -> Option<ChunkCoord> {
        self.current
    }

    pub fn is_chunk_active(&self, chunk: ChunkCoord) -> bool {
        self.current
            .is_some_and(|center| center.distance(chunk) <= self.settings.activation_radius)
    }

    /// Recomputes enable flags if the actor changed chunk or objects were added.
    ///
    /// Returns `None` when nothing needed recomputing.
    pub fn update(
        &mut self,
        actor_position: &Point3<f32>,
        objects: &mut WorldObjects,
    ) -> Option<ChunkUpdate> {
        let chunk = ChunkCoord::of(actor_position, self.settings.chunk_size);
        let generation = objects.generation();
        if self.current == Some(chunk) && self.seen_generation == Some(generation) {
            return None;
        }
        self.current = Some(chunk);
        self.seen_generation = Some(generation);

        let mut update = ChunkUpdate {
            chunk: Some(chunk),
            ..Default::default()
        };

        let decisions: Vec<(ObjectId, bool)> = objects
            .iter()
            .map(|object| {
                let enabled = match object.tag {
                    ActivationTag::AlwaysActive => true,
                    ActivationTag::Chunked => {
                        let object_chunk =
                            ChunkCoord::of(&object.position, self.settings.chunk_size);
                        object_chunk.distance(chunk) <= self.settings.activation_radius
                    }
                };
                (object.id, enabled)
            })
            .collect();

        for (id, enabled) in decisions {
            if objects.set_enabled(id, enabled) {
                if enabled {
                    update.enabled.push(id);
                } else {
                    update.disabled.push(id);
                }
            }
        }

        log::debug!(
            "chunk ({}, {}): {} enabled, {} disabled",
            chunk.x,
            chunk.z,
            update.enabled.len(),
            update.disabled.len()
        );
        Some(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{ObjectDef, ObjectKind};

    fn object_at(kind: ObjectKind, x: f32, z: f32) -> ObjectDef {
        ObjectDef {
            kind,
            position: [x, 0.0, z],
            yaw: 0.0,
            obstacle: None,
        }
    }

    #[test]
    fn chunk_of_rounds_to_nearest_center() {
        assert_eq!(ChunkCoord::of(&Point3::new(59.0, 0.0, -59.0), 120.0), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::of(&Point3::new(61.0, 0.0, -61.0), 120.0), ChunkCoord::new(1, -1));
        assert_eq!(ChunkCoord::of(&Point3::new(240.0, 0.0, 0.0), 120.0), ChunkCoord::new(2, 0));
    }

    #[test]
    fn neighborhood_of_chunk_two_zero() {
        let mut objects = WorldObjects::new();
        let mut grid = Vec::new();
        for cx in -1..=5 {
            for cz in -3..=3 {
                let def = object_at(ObjectKind::Building, cx as f32 * 120.0, cz as f32 * 120.0);
                grid.push(((cx, cz), def));
            }
        }
        let defs: Vec<_> = grid.iter().map(|(_, d)| d.clone()).collect();
        objects.load(&defs);

        let mut chunker = VisibilityChunker::new(ChunkSettings::default());
        chunker.update(&Point3::new(240.0, 0.0, 0.0), &mut objects).unwrap();

        for (index, ((cx, cz), _)) in grid.iter().enumerate() {
            let expected = (1..=3).contains(cx) && (-1..=1).contains(cz);
            let object = objects.get(ObjectId(index as u32)).unwrap();
            assert_eq!(object.is_enabled(), expected, "chunk ({cx}, {cz})");
        }
        assert!(chunker.is_chunk_active(ChunkCoord::new(3, -1)));
        assert!(!chunker.is_chunk_active(ChunkCoord::new(4, 0)));
    }

    #[test]
    fn co_located_enabled_and_far_disabled() {
        let mut objects = WorldObjects::new();
        objects.load(&[
            object_at(ObjectKind::Building, 1000.0, 1000.0),
            object_at(ObjectKind::Building, 1000.0 + 2.0 * 120.0 + 1.0, 1000.0),
            object_at(ObjectKind::Road, 5000.0, 5000.0),
        ]);
        let mut chunker = VisibilityChunker::new(ChunkSettings::default());
        chunker.update(&Point3::new(1000.0, 0.0, 1000.0), &mut objects);

        assert!(objects.get(ObjectId(0)).unwrap().is_enabled());
        assert!(!objects.get(ObjectId(1)).unwrap().is_enabled());
        assert!(objects.get(ObjectId(2)).unwrap().is_enabled());
    }

    #[test]
    fn visibility_holds_across_chunk_boundaries() {
        let size = ChunkSettings::default().chunk_size;
        let reach = 2.0 * size + 1.0;

        let mut samples: Vec<f32> = (-24..=24).map(|i| i as f32 * 7.5).collect();
        samples.extend([-60.0, -59.9, -60.1, 59.9, 60.0, 60.1, -180.0, 180.0, 119.9, -119.9]);

        for &x in &samples {
            for &z in &[-60.0, -0.1, 0.0, 59.9, 60.0] {
                let mut objects = WorldObjects::new();
                objects.load(&[
                    object_at(ObjectKind::Building, x, z),
                    object_at(ObjectKind::Building, x + reach, z),
                    object_at(ObjectKind::Building, x - reach, z),
                    object_at(ObjectKind::Building, x, z + reach),
                    object_at(ObjectKind::Building, x, z - reach),
                    object_at(ObjectKind::Building, x - reach, z + reach),
                ]);
                let mut chunker = VisibilityChunker::new(ChunkSettings::default());
                chunker.update(&Point3::new(x, 0.0, z), &mut objects);

                assert!(objects.get(ObjectId(0)).unwrap().is_enabled(), "co-located at ({x}, {z})");
                for id in 1..6 {
                    assert!(
                        !objects.get(ObjectId(id)).unwrap().is_enabled(),
                        "object {id} too far from ({x}, {z}) is still enabled"
                    );
                }
            }
        }
    }

    #[test]
    fn recomputes_only_on_chunk_change() {
        let mut objects = WorldObjects::new();
        objects.load(&[object_at(ObjectKind::Building, 0.0, 0.0)]);
        let mut chunker = VisibilityChunker::new(ChunkSettings::default());

        assert!(chunker.update(&Point3::new(0.0, 0.0, 0.0), &mut objects).is_some());
        assert!(chunker.update(&Point3::new(50.0, 0.0, 0.0), &mut objects).is_none());

        let update = chunker.update(&Point3::new(400.0, 0.0, 0.0), &mut objects).unwrap();
        assert_eq!(update.disabled, vec![ObjectId(0)]);

        let update = chunker.update(&Point3::new(0.0, 0.0, 0.0), &mut objects).unwrap();
        assert_eq!(update.enabled, vec![ObjectId(0)]);
    }

    #[test]
    fn new_objects_force_a_recompute() {
        let mut objects = WorldObjects::new();
        let mut chunker = VisibilityChunker::new(ChunkSettings::default());
        chunker.update(&Point3::origin(), &mut objects);

        objects.load(&[object_at(ObjectKind::Building, 900.0, 0.0)]);
        let update = chunker.update(&Point3::origin(), &mut objects).unwrap();
        assert_eq!(update.disabled, vec![ObjectId(0)]);
    }
}
