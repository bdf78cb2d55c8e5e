use std::fmt;

use rapier3d::{
    na::{Isometry3, Vector3},
    parry::{
        bounding_volume::{Aabb, BoundingVolume},
        query,
        shape::{Shape, SharedShape},
    },
};
use serde::{Deserialize, Serialize};

use crate::{
    actor::{Actor, ActorKind},
    config::CollisionSettings,
    error::GeometryError,
};

/// Serializable obstacle shape, as authored in world definition files.
///
/// Rotation is a yaw about +Y only; every shape here is upright.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ObstacleShapeDef {
    /// Oriented box with half extents (meters).
    Cuboid { half_extents: [f32; 3] },
    /// Sphere (meters).
    Ball { radius: f32 },
    /// Y-aligned capsule (meters).
    CapsuleY { radius: f32, half_height: f32 },
}

impl ObstacleShapeDef {
    fn validate(&self) -> Result<(), GeometryError> {
        match *self {
            ObstacleShapeDef::Cuboid { half_extents } => {
                for v in half_extents {
                    positive_extent("cuboid half extent", v)?;
                }
                Ok(())
            }
            ObstacleShapeDef::Ball { radius } => positive_extent("ball radius", radius),
            ObstacleShapeDef::CapsuleY {
                radius,
                half_height,
            } => {
                positive_extent("capsule radius", radius)?;
                // A zero half height degenerates to a ball, which is fine.
                if half_height.is_finite() && half_height >= 0.0 {
                    Ok(())
                } else {
                    Err(GeometryError::NonPositiveExtent {
                        what: "capsule half height",
                        value: half_height,
                    })
                }
            }
        }
    }

    fn to_shared_shape(&self) -> SharedShape {
        match *self {
            ObstacleShapeDef::Cuboid { half_extents: [x, y, z] } => SharedShape::cuboid(x, y, z),
            ObstacleShapeDef::Ball { radius } => SharedShape::ball(radius),
            ObstacleShapeDef::CapsuleY {
                radius,
                half_height,
            } => SharedShape::capsule_y(half_height, radius),
        }
    }
}

fn positive_extent(what: &'static str, value: f32) -> Result<(), GeometryError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(GeometryError::NonPositiveExtent { what, value })
    }
}

/// An immutable obstacle placed in the world.
#[derive(Clone)]
pub struct StaticCollider {
    shape: SharedShape,
    pose: Isometry3<f32>,
    aabb: Aabb,
}

impl fmt::Debug for StaticCollider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCollider")
            .field("translation", &self.pose.translation.vector)
            .field("aabb", &self.aabb)
            .finish()
    }
}

impl StaticCollider {
    /// Builds a collider at `translation` rotated by `yaw` radians about +Y.
    pub fn from_def(
        def: &ObstacleShapeDef,
        translation: [f32; 3],
        yaw: f32,
    ) -> Result<Self, GeometryError> {
        if !translation.iter().all(|v| v.is_finite()) || !yaw.is_finite() {
            return Err(GeometryError::NonFinite { what: "obstacle pose" });
        }
        def.validate()?;

        let shape = def.to_shared_shape();
        let pose = Isometry3::new(Vector3::from(translation), Vector3::y() * yaw);
        let aabb = shape.compute_aabb(&pose);
        Ok(Self { shape, pose, aabb })
    }

    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    /// AABB prefilter, then an exact parry intersection test.
    pub fn intersects(
        &self,
        probe: &SharedShape,
        probe_pose: &Isometry3<f32>,
        probe_aabb: &Aabb,
    ) -> bool {
        if !self.aabb.intersects(probe_aabb) {
            return false;
        }
        match query::intersection_test(probe_pose, &*probe.0, &self.pose, &*self.shape.0) {
            Ok(hit) => hit,
            Err(_) => {
                // Every shape pair built here is supported; keep the conservative answer anyway.
                log::warn!("unsupported shape pair in intersection test; using AABB overlap");
                true
            }
        }
    }
}

/// Shapes used to probe actors against obstacles, built once from settings.
#[derive(Clone)]
pub struct ActorProbes {
    pedestrian: SharedShape,
    vehicle: SharedShape,
}

impl ActorProbes {
    pub fn new(settings: &CollisionSettings) -> Self {
        let [hx, hy, hz] = settings.vehicle_half_extents;
        Self {
            pedestrian: SharedShape::capsule_y(
                settings.pedestrian_half_height,
                settings.pedestrian_radius,
            ),
            vehicle: SharedShape::cuboid(hx, hy, hz),
        }
    }

    pub fn shape_for(&self, kind: ActorKind) -> &SharedShape {
        match kind {
            ActorKind::Pedestrian => &self.pedestrian,
            ActorKind::Vehicle => &self.vehicle,
        }
    }

    /// World pose of an actor's probe: its position, yawed by its heading.
    pub fn pose_of(actor: &Actor) -> Isometry3<f32> {
        let p = actor.position;
        Isometry3::new(Vector3::new(p.x, p.y, p.z), Vector3::y() * actor.heading)
    }

    /// Probe shape, pose and AABB for an actor.
    pub fn probe(&self, actor: &Actor) -> (&SharedShape, Isometry3<f32>, Aabb) {
        let shape = self.shape_for(actor.kind);
        let pose = Self::pose_of(actor);
        let aabb = shape.compute_aabb(&pose);
        (shape, pose, aabb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ActorId;
    use nalgebra::Point3;

    #[test]
    fn rejects_degenerate_shapes() {
        let bad = ObstacleShapeDef::Cuboid {
            half_extents: [1.0, 0.0, 1.0],
        };
        assert!(matches!(
            StaticCollider::from_def(&bad, [0.0; 3], 0.0),
            Err(GeometryError::NonPositiveExtent { .. })
        ));

        let ball = ObstacleShapeDef::Ball { radius: 1.0 };
        assert!(matches!(
            StaticCollider::from_def(&ball, [f32::NAN, 0.0, 0.0], 0.0),
            Err(GeometryError::NonFinite { .. })
        ));
    }

    #[test]
    fn aabb_follows_translation() {
        let def = ObstacleShapeDef::Cuboid {
            half_extents: [2.0, 3.0, 4.0],
        };
        let collider = StaticCollider::from_def(&def, [10.0, 3.0, -5.0], 0.0).unwrap();
        let aabb = collider.aabb();
        assert!((aabb.mins.x - 8.0).abs() < 1e-5);
        assert!((aabb.maxs.z + 1.0).abs() < 1e-5);
    }

    #[test]
    fn yawed_cuboid_swaps_extents() {
        let def = ObstacleShapeDef::Cuboid {
            half_extents: [1.0, 1.0, 5.0],
        };
        let collider =
            StaticCollider::from_def(&def, [0.0; 3], std::f32::consts::FRAC_PI_2).unwrap();
        let aabb = collider.aabb();
        assert!((aabb.maxs.x - 5.0).abs() < 1e-4);
        assert!((aabb.maxs.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn pedestrian_probe_hits_box() {
        let probes = ActorProbes::new(&CollisionSettings::default());
        let wall = StaticCollider::from_def(
            &ObstacleShapeDef::Cuboid {
                half_extents: [1.0, 2.0, 1.0],
            },
            [0.0, 2.0, 0.0],
            0.0,
        )
        .unwrap();

        let inside = Actor::new(ActorId(0), ActorKind::Pedestrian, Point3::new(1.2, 0.9, 0.0), 0.0);
        let (shape, pose, aabb) = probes.probe(&inside);
        assert!(wall.intersects(shape, &pose, &aabb));

        let outside =
            Actor::new(ActorId(0), ActorKind::Pedestrian, Point3::new(1.5, 0.9, 0.0), 0.0);
        let (shape, pose, aabb) = probes.probe(&outside);
        assert!(!wall.intersects(shape, &pose, &aabb));
    }

    #[test]
    fn obstacle_def_json_shape() {
        let json = r#"{ "shape": "capsule_y", "radius": 0.5, "half_height": 1.0 }"#;
        let def: ObstacleShapeDef = serde_json::from_str(json).unwrap();
        assert_eq!(
            def,
            ObstacleShapeDef::CapsuleY {
                radius: 0.5,
                half_height: 1.0
            }
        );
    }
}
