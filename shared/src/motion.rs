//! Arcade motion model for vehicles and pedestrians.
//!
//! Everything here is pure: given an actor, an input and a context it returns
//! the tentatively moved actor. Collision is applied afterwards by
//! [`crate::collision::resolve`].
//!
//! Vehicle speed update, in order:
//! 1. Throttle. Throttle against the direction of travel (beyond the
//!    deadband) counter-brakes; otherwise it accelerates, boosted if held.
//! 2. Passive friction when there is no throttle.
//! 3. Brake (attenuated while steering, for drifting).
//! 4. Drag when the tank is empty. A dry engine gives no throttle, but
//!    counter-braking still works.
//! 5. Clamp to `[-max * reverse_ratio, max * boost]`.
//!
//! Steering authority scales with speed so a stationary car cannot spin in place.

use crate::{
    actor::{Actor, ActorKind, forward_from_heading},
    config::{PedestrianTuning, VehicleTuning},
    input::InputIntent,
};

/// Per-tick inputs that are not part of the actor itself.
#[derive(Clone, Copy, Debug)]
pub struct MotionContext<'a> {
    pub vehicle: &'a VehicleTuning,
    pub pedestrian: &'a PedestrianTuning,
    /// Already clamped step in seconds.
    pub dt: f32,
    /// Food has run out; walking is slower.
    pub hungry: bool,
    /// Fuel has run out; the vehicle coasts to a stop.
    pub out_of_fuel: bool,
}

/// Clamps a raw frame delta into `[0, max]`. Non-finite deltas become zero.
#[inline]
pub fn clamp_dt(dt: f32, max: f32) -> f32 {
    if dt.is_finite() { dt.clamp(0.0, max) } else { 0.0 }
}

/// Integrates one step for any actor kind.
pub fn integrate(actor: &Actor, input: &InputIntent, ctx: &MotionContext<'_>) -> Actor {
    match actor.kind {
        ActorKind::Vehicle => integrate_vehicle(actor, input, ctx),
        ActorKind::Pedestrian => integrate_pedestrian(actor, input, ctx),
    }
}

pub fn integrate_vehicle(actor: &Actor, input: &InputIntent, ctx: &MotionContext<'_>) -> Actor {
    let tuning = ctx.vehicle;
    let dt = ctx.dt;

    let velocity = step_vehicle_speed(actor.velocity, input, tuning, dt, ctx.out_of_fuel);

    let authority = steer_authority(velocity.abs(), tuning);
    let turn = input.steer * velocity.signum() * tuning.turn_rate * authority;
    let heading = actor.heading + turn * dt;

    let position = actor.position + forward_from_heading(heading) * velocity * dt;

    Actor {
        position,
        heading,
        velocity,
        ..actor.clone()
    }
}

pub fn integrate_pedestrian(actor: &Actor, input: &InputIntent, ctx: &MotionContext<'_>) -> Actor {
    let tuning = ctx.pedestrian;
    let dt = ctx.dt;

    let speed = if ctx.hungry {
        tuning.walk_speed * tuning.hungry_speed_factor
    } else {
        tuning.walk_speed
    };

    let heading = actor.heading + input.steer * tuning.turn_rate * dt;
    let velocity = input.forward * speed;

    let mut position = actor.position + forward_from_heading(heading) * velocity * dt;
    // Grounding bias; the collision pass clamps to the floor.
    position.y -= tuning.grounding_bias * dt;

    Actor {
        position,
        heading,
        velocity,
        ..actor.clone()
    }
}

/// Applies throttle, friction, brake, fuel drag and the speed clamp.
pub fn step_vehicle_speed(
    v: f32,
    input: &InputIntent,
    tuning: &VehicleTuning,
    dt: f32,
    out_of_fuel: bool,
) -> f32 {
    let boost = if input.boost { tuning.boost_factor } else { 1.0 };
    let mut v = v;

    // 1) Throttle / counter-brake.
    if input.forward != 0.0 {
        let opposing = v * input.forward < 0.0 && v.abs() > tuning.reverse_deadband;
        if opposing {
            v += input.forward.signum() * tuning.brake_force * dt;
        } else if !out_of_fuel {
            v += input.forward * tuning.acceleration * boost * dt;
        }
    } else {
        // 2) Rolling friction.
        v = approach_zero(v, tuning.friction * dt);
    }

    // 3) Brake.
    if input.brake {
        let attenuation = if input.steer != 0.0 {
            tuning.drift_brake_attenuation
        } else {
            1.0
        };
        v = approach_zero(v, tuning.brake_force * attenuation * dt);
    }

    // 4) Empty tank.
    if out_of_fuel {
        v *= (1.0 - tuning.out_of_fuel_drag * dt).max(0.0);
        if v.abs() < crate::constants::STOP_SPEED_EPS {
            v = 0.0;
        }
    }

    // 5) Clamp.
    let max_forward = tuning.max_speed * boost;
    let max_reverse = tuning.max_speed * tuning.reverse_ratio;
    v.clamp(-max_reverse, max_forward)
}

/// Steering authority in `[0, 1]` as a function of absolute speed.
#[inline]
pub fn steer_authority(speed: f32, tuning: &VehicleTuning) -> f32 {
    if speed < tuning.min_steer_speed {
        0.0
    } else {
        (speed / tuning.full_steer_speed).min(1.0)
    }
}

/// Moves `v` toward zero by `step`, never crossing it.
#[inline]
fn approach_zero(v: f32, step: f32) -> f32 {
    if v > 0.0 {
        (v - step).max(0.0)
    } else {
        (v + step).min(0.0)
    }
}
