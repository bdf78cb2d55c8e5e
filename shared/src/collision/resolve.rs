use crate::{
    actor::{Actor, ActorKind},
    collision::shape::{ActorProbes, StaticCollider},
    config::CollisionSettings,
    ids::ObjectId,
};

/// An enabled obstacle, in arena order.
pub type ObstacleRef<'a> = (ObjectId, &'a StaticCollider);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollisionResponse {
    /// Tentative move accepted as is.
    Clear,
    /// Vehicle reverted to its previous position with reversed, damped speed.
    Bounced,
    /// Pedestrian kept part of the move along one or both axes.
    Slid,
    /// Pedestrian could not move at all.
    Blocked,
    /// The previous position was already intersecting; the move was let through
    /// so the actor can leave the obstacle.
    Escaped,
}

#[derive(Clone, Debug)]
pub struct Resolution {
    pub actor: Actor,
    /// First obstacle the tentative move intersected.
    pub hit: Option<ObjectId>,
    pub response: CollisionResponse,
}

/// Resolves a tentative move against the enabled obstacles.
///
/// `prev` is the actor before integration and `moved` the tentatively
/// integrated actor. The result never intersects an obstacle, provided `prev`
/// did not. Resolving a clear position with a zero move is a no-op.
pub fn resolve(
    prev: &Actor,
    moved: Actor,
    obstacles: &[ObstacleRef<'_>],
    probes: &ActorProbes,
    settings: &CollisionSettings,
) -> Resolution {
    let floor = grounded_height(moved.kind, settings);
    let mut moved = moved;
    moved.position.y = moved.position.y.max(floor);

    let Some(hit) = first_hit(&moved, obstacles, probes) else {
        return Resolution {
            actor: moved,
            hit: None,
            response: CollisionResponse::Clear,
        };
    };

    let mut origin = prev.clone();
    origin.position.y = origin.position.y.max(floor);
    if first_hit(&origin, obstacles, probes).is_some() {
        log::debug!("{:?} starts inside an obstacle; letting it move out", prev.id);
        return Resolution {
            actor: moved,
            hit: Some(hit),
            response: CollisionResponse::Escaped,
        };
    }

    let (actor, response) = match moved.kind {
        ActorKind::Vehicle => bounce(origin, &moved, obstacles, probes, settings),
        ActorKind::Pedestrian => slide(origin, &moved, obstacles, probes, settings),
    };

    Resolution {
        actor,
        hit: Some(hit),
        response,
    }
}

fn grounded_height(kind: ActorKind, settings: &CollisionSettings) -> f32 {
    match kind {
        ActorKind::Pedestrian => settings.pedestrian_floor_y,
        ActorKind::Vehicle => settings.vehicle_ride_height,
    }
}

fn first_hit(
    actor: &Actor,
    obstacles: &[ObstacleRef<'_>],
    probes: &ActorProbes,
) -> Option<ObjectId> {
    let (shape, pose, aabb) = probes.probe(actor);
    obstacles
        .iter()
        .find(|(_, collider)| collider.intersects(shape, &pose, &aabb))
        .map(|(id, _)| *id)
}

fn bounce(
    origin: Actor,
    moved: &Actor,
    obstacles: &[ObstacleRef<'_>],
    probes: &ActorProbes,
    settings: &CollisionSettings,
) -> (Actor, CollisionResponse) {
    let velocity = -moved.velocity * settings.restitution;

    // Keep the new heading unless turning in place is what caused the overlap.
    let turned = Actor {
        heading: moved.heading,
        velocity,
        ..origin.clone()
    };
    if first_hit(&turned, obstacles, probes).is_none() {
        return (turned, CollisionResponse::Bounced);
    }
    (Actor { velocity, ..origin }, CollisionResponse::Bounced)
}

/// Tries the X part of the move, then the Z part, each scaled by the slide factor.
fn slide(
    origin: Actor,
    moved: &Actor,
    obstacles: &[ObstacleRef<'_>],
    probes: &ActorProbes,
    settings: &CollisionSettings,
) -> (Actor, CollisionResponse) {
    let dx = (moved.position.x - origin.position.x) * settings.slide_factor;
    let dz = (moved.position.z - origin.position.z) * settings.slide_factor;

    let mut current = Actor {
        heading: moved.heading,
        velocity: moved.velocity,
        ..origin
    };
    let mut moved_any = false;

    if dx != 0.0 {
        let mut candidate = current.clone();
        candidate.position.x += dx;
        if first_hit(&candidate, obstacles, probes).is_none() {
            current = candidate;
            moved_any = true;
        }
    }

    if dz != 0.0 {
        let mut candidate = current.clone();
        candidate.position.z += dz;
        if first_hit(&candidate, obstacles, probes).is_none() {
            current = candidate;
            moved_any = true;
        }
    }

    let response = if moved_any {
        CollisionResponse::Slid
    } else {
        CollisionResponse::Blocked
    };
    (current, response)
}
