//! Possession state machine: which actor the player currently controls.
//!
//! ```text
//! OnFoot --interact, vehicle in range--> Transitioning(Enter) --delay--> InVehicle
//! InVehicle --interact--> Transitioning(Exit) --delay--> OnFoot
//! ```
//!
//! The controller only tracks state; the caller applies the side effects of
//! [`PossessionEvent::Entered`] and [`PossessionEvent::Exited`] to the roster.
//! While transitioning, the source actor stays possessed so exactly one actor
//! is possessed at any time.

use nalgebra::Point3;

use crate::{
    actor::Actor,
    config::PossessionSettings,
    ids::ActorId,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionKind {
    Enter,
    Exit,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PossessionState {
    OnFoot,
    Transitioning {
        kind: TransitionKind,
        vehicle: ActorId,
        /// Seconds until the transition completes.
        remaining: f32,
    },
    InVehicle(ActorId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PossessionEvent {
    TransitionStarted { kind: TransitionKind, vehicle: ActorId },
    Entered(ActorId),
    Exited(ActorId),
    /// Transition aborted (teardown); the source actor stays possessed.
    TransitionCancelled { kind: TransitionKind, vehicle: ActorId },
}

#[derive(Clone, Debug)]
pub struct ModeController {
    state: PossessionState,
    settings: PossessionSettings,
    pedestrian: ActorId,
}

impl ModeController {
    pub fn on_foot(pedestrian: ActorId, settings: PossessionSettings) -> Self {
        Self {
            state: PossessionState::OnFoot,
            settings,
            pedestrian,
        }
    }

    pub fn in_vehicle(pedestrian: ActorId, vehicle: ActorId, settings: PossessionSettings) -> Self {
        Self {
            state: PossessionState::InVehicle(vehicle),
            settings,
            pedestrian,
        }
    }

    pub fn state(&self) -> PossessionState {
        self.state
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self.state, PossessionState::Transitioning { .. })
    }

    /// The single actor receiving input this tick.
    pub fn possessed(&self) -> ActorId {
        match self.state {
            PossessionState::OnFoot => self.pedestrian,
            PossessionState::InVehicle(vehicle) => vehicle,
            PossessionState::Transitioning {
                kind: TransitionKind::Enter,
                ..
            } => self.pedestrian,
            PossessionState::Transitioning {
                kind: TransitionKind::Exit,
                vehicle,
                ..
            } => vehicle,
        }
    }

    /// Whether the pedestrian should be hidden and excluded from the world.
    pub fn pedestrian_hidden(&self) -> bool {
        match self.state {
            PossessionState::OnFoot => false,
            PossessionState::InVehicle(_) => true,
            PossessionState::Transitioning { kind, .. } => kind == TransitionKind::Exit,
        }
    }

    /// Handles an interact press. Ignored while a transition is running.
    pub fn interact<'a>(
        &mut self,
        pedestrian: &Actor,
        vehicles: impl IntoIterator<Item = &'a Actor>,
    ) -> Option<PossessionEvent> {
        let delay = self.settings.transition_delay_s;
        match self.state {
            PossessionState::Transitioning { .. } => None,
            PossessionState::OnFoot => {
                let radius = self.settings.entry_radius;
                let vehicle = nearest_vehicle_in_range(pedestrian, vehicles, radius)?;
                self.state = PossessionState::Transitioning {
                    kind: TransitionKind::Enter,
                    vehicle,
                    remaining: delay,
                };
                Some(PossessionEvent::TransitionStarted {
                    kind: TransitionKind::Enter,
                    vehicle,
                })
            }
            PossessionState::InVehicle(vehicle) => {
                self.state = PossessionState::Transitioning {
                    kind: TransitionKind::Exit,
                    vehicle,
                    remaining: delay,
                };
                Some(PossessionEvent::TransitionStarted {
                    kind: TransitionKind::Exit,
                    vehicle,
                })
            }
        }
    }

    /// Advances a running transition by `dt` seconds.
    pub fn advance(&mut self, dt: f32) -> Option<PossessionEvent> {
        let PossessionState::Transitioning {
            kind,
            vehicle,
            remaining,
        } = self.state
        else {
            return None;
        };

        let remaining = remaining - dt;
        if remaining > 0.0 {
            self.state = PossessionState::Transitioning {
                kind,
                vehicle,
                remaining,
            };
            return None;
        }

        match kind {
            TransitionKind::Enter => {
                self.state = PossessionState::InVehicle(vehicle);
                Some(PossessionEvent::Entered(vehicle))
            }
            TransitionKind::Exit => {
                self.state = PossessionState::OnFoot;
                Some(PossessionEvent::Exited(vehicle))
            }
        }
    }

    /// Aborts a running transition, returning to its source state.
    pub fn cancel_transition(&mut self) -> Option<PossessionEvent> {
        let PossessionState::Transitioning { kind, vehicle, .. } = self.state else {
            return None;
        };
        self.state = match kind {
            TransitionKind::Enter => PossessionState::OnFoot,
            TransitionKind::Exit => PossessionState::InVehicle(vehicle),
        };
        Some(PossessionEvent::TransitionCancelled { kind, vehicle })
    }
}

/// Nearest vehicle strictly closer than `radius` on the XZ plane.
///
/// Ties keep the earliest vehicle.
pub fn nearest_vehicle_in_range<'a>(
    pedestrian: &Actor,
    vehicles: impl IntoIterator<Item = &'a Actor>,
    radius: f32,
) -> Option<ActorId> {
    vehicles
        .into_iter()
        .map(|v| (v.id, pedestrian.planar_distance_to(v.position.x, v.position.z)))
        .filter(|(_, d)| *d < radius)
        .fold(None, |best: Option<(ActorId, f32)>, (id, d)| match best {
            Some((_, best_d)) if best_d <= d => best,
            _ => Some((id, d)),
        })
        .map(|(id, _)| id)
}

/// Where the pedestrian appears when leaving `vehicle`: `offset` units to its left.
pub fn exit_position(vehicle: &Actor, offset: f32, floor_y: f32) -> Point3<f32> {
    let mut p = vehicle.position + vehicle.left() * offset;
    p.y = floor_y;
    p
}
