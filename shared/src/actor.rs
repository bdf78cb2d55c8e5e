//! Locally simulated actors.
//!
//! Heading convention: `heading` is a yaw in radians about +Y, and the actor
//! faces `(sin h, 0, cos h)`. Zero faces +Z; positive steering increases it.

use nalgebra::{Point3, Vector3};

use crate::ids::ActorId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActorKind {
    Pedestrian,
    Vehicle,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Actor {
    pub id: ActorId,
    pub kind: ActorKind,
    pub position: Point3<f32>,
    /// Yaw in radians (unbounded).
    pub heading: f32,
    /// Signed scalar speed along the facing direction.
    pub velocity: f32,
}

impl Actor {
    pub fn new(id: ActorId, kind: ActorKind, position: Point3<f32>, heading: f32) -> Self {
        Self {
            id,
            kind,
            position,
            heading,
            velocity: 0.0,
        }
    }

    pub fn is_vehicle(&self) -> bool {
        self.kind == ActorKind::Vehicle
    }

    /// Unit facing direction on the XZ plane.
    pub fn forward(&self) -> Vector3<f32> {
        forward_from_heading(self.heading)
    }

    /// Unit direction to the actor's left on the XZ plane.
    pub fn left(&self) -> Vector3<f32> {
        let (s, c) = self.heading.sin_cos();
        Vector3::new(-c, 0.0, s)
    }

    pub fn planar_distance_to(&self, x: f32, z: f32) -> f32 {
        planar_distance(self.position.x, self.position.z, x, z)
    }

    /// Heading in `[0, 360)` degrees.
    pub fn heading_degrees(&self) -> f32 {
        self.heading.to_degrees().rem_euclid(360.0)
    }
}

#[inline]
pub fn forward_from_heading(heading: f32) -> Vector3<f32> {
    let (s, c) = heading.sin_cos();
    Vector3::new(s, 0.0, c)
}

#[inline]
pub fn planar_distance(ax: f32, az: f32, bx: f32, bz: f32) -> f32 {
    let dx = ax - bx;
    let dz = az - bz;
    (dx * dx + dz * dz).sqrt()
}

/// All locally simulated actors. Index 0 is the pedestrian; vehicles follow.
#[derive(Clone, Debug)]
pub struct Roster {
    actors: Vec<Actor>,
}

impl Roster {
    pub const PEDESTRIAN: ActorId = ActorId(0);

    pub fn new(pedestrian_position: Point3<f32>, pedestrian_heading: f32) -> Self {
        Self {
            actors: vec![Actor::new(
                Self::PEDESTRIAN,
                ActorKind::Pedestrian,
                pedestrian_position,
                pedestrian_heading,
            )],
        }
    }

    pub fn spawn_vehicle(&mut self, position: Point3<f32>, heading: f32) -> ActorId {
        let id = ActorId(self.actors.len() as u32);
        self.actors
            .push(Actor::new(id, ActorKind::Vehicle, position, heading));
        id
    }

    pub fn get(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(id.0 as usize)
    }

    pub fn pedestrian(&self) -> &Actor {
        &self.actors[0]
    }

    pub fn pedestrian_mut(&mut self) -> &mut Actor {
        &mut self.actors[0]
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter().skip(1)
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}
