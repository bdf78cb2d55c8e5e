/*!
Collision root module.

Static obstacles are immutable parry shapes with a cached world-space AABB.
Actors are probed with a per-kind shape (vehicle cuboid, pedestrian capsule)
at their tentative pose; the first obstacle in arena order that intersects
decides the response.

- shape:   obstacle definitions, colliders and actor probe shapes
- resolve: bounce (vehicles) and axis-separated slide (pedestrians)
*/

pub mod resolve;
pub mod shape;

pub use resolve::{CollisionResponse, ObstacleRef, Resolution, resolve};
pub use shape::{ActorProbes, ObstacleShapeDef, StaticCollider};
