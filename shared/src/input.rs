//! Device-independent driving/walking intent.
//!
//! Hosts sample their keyboard and (optionally) gamepad once per frame, fill
//! in [`KeyboardState`] / [`GamepadState`] and hand both to [`InputAdapter`].
//! The simulation only ever sees the normalized [`InputIntent`].
//!
//! Mapping
//! - Keyboard: W/S throttle, A/D steer (D is positive), Space brake,
//!   Shift boost, E interact, Escape cancel.
//! - Gamepad: right trigger minus left trigger throttles, left stick X
//!   steers, A interact, B brake, X or right bumper boost, Y cancel.
//! - A gamepad axis that is outside its threshold overrides the keyboard axis;
//!   buttons are OR-ed with their keyboard counterparts.

use serde::{Deserialize, Serialize};

/// Trigger travel below which the trigger is treated as released.
pub const TRIGGER_THRESHOLD: f32 = 0.05;

/// Default radial deadzone for the steering stick.
pub const DEFAULT_STICK_DEADZONE: f32 = 0.15;

/// Normalized per-tick input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InputIntent {
    /// Throttle in `[-1, 1]`; positive is forward.
    pub forward: f32,
    /// Steering in `[-1, 1]`; positive turns right.
    pub steer: f32,
    pub brake: bool,
    pub boost: bool,
    pub interact: bool,
    pub cancel: bool,
}

impl InputIntent {
    pub const NEUTRAL: Self = Self {
        forward: 0.0,
        steer: 0.0,
        brake: false,
        boost: false,
        interact: false,
        cancel: false,
    };

    /// Clamps axes into range and replaces non-finite values with zero.
    pub fn sanitized(self) -> Self {
        Self {
            forward: clamp_axis(self.forward),
            steer: clamp_axis(self.steer),
            ..self
        }
    }
}

fn clamp_axis(v: f32) -> f32 {
    if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 }
}

/// Raw keyboard key state for the keys the simulation cares about.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyboardState {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub brake: bool,
    pub boost: bool,
    pub interact: bool,
    pub cancel: bool,
}

impl KeyboardState {
    fn axis(negative: bool, positive: bool) -> f32 {
        match (negative, positive) {
            (false, true) => 1.0,
            (true, false) => -1.0,
            _ => 0.0,
        }
    }
}

/// Raw gamepad state using the standard (Xbox-style) layout.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GamepadState {
    /// `[0, 1]`
    pub right_trigger: f32,
    /// `[0, 1]`
    pub left_trigger: f32,
    /// `[-1, 1]`, positive is right.
    pub left_stick_x: f32,
    pub south: bool,
    pub east: bool,
    pub west: bool,
    pub north: bool,
    pub right_bumper: bool,
}

/// Merges keyboard and gamepad state into an [`InputIntent`].
#[derive(Clone, Debug)]
pub struct InputAdapter {
    stick_deadzone: f32,
    trigger_threshold: f32,
}

impl Default for InputAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_STICK_DEADZONE)
    }
}

impl InputAdapter {
    pub fn new(stick_deadzone: f32) -> Self {
        Self {
            stick_deadzone: stick_deadzone.clamp(0.0, 0.95),
            trigger_threshold: TRIGGER_THRESHOLD,
        }
    }

    pub fn stick_deadzone(&self) -> f32 {
        self.stick_deadzone
    }

    pub fn sample(&self, keyboard: &KeyboardState, gamepad: Option<&GamepadState>) -> InputIntent {
        let mut intent = InputIntent {
            forward: KeyboardState::axis(keyboard.back, keyboard.forward),
            steer: KeyboardState::axis(keyboard.left, keyboard.right),
            brake: keyboard.brake,
            boost: keyboard.boost,
            interact: keyboard.interact,
            cancel: keyboard.cancel,
        };

        if let Some(pad) = gamepad {
            let throttle = self.trigger(pad.right_trigger) - self.trigger(pad.left_trigger);
            if throttle != 0.0 {
                intent.forward = throttle;
            }

            let steer = self.stick(pad.left_stick_x);
            if steer != 0.0 {
                intent.steer = steer;
            }

            intent.interact |= pad.south;
            intent.brake |= pad.east;
            intent.boost |= pad.west || pad.right_bumper;
            intent.cancel |= pad.north;
        }

        intent.sanitized()
    }

    fn trigger(&self, value: f32) -> f32 {
        if value.is_finite() && value > self.trigger_threshold {
            value.min(1.0)
        } else {
            0.0
        }
    }

    /// Deadzone with rescaling so the output still spans the full range.
    fn stick(&self, value: f32) -> f32 {
        if !value.is_finite() {
            return 0.0;
        }
        let magnitude = value.abs();
        if magnitude <= self.stick_deadzone {
            return 0.0;
        }
        let scaled = ((magnitude - self.stick_deadzone) / (1.0 - self.stick_deadzone)).min(1.0);
        scaled.copysign(value)
    }
}

/// Turns a level-triggered button into a rising-edge event.
#[derive(Clone, Copy, Debug, Default)]
pub struct EdgeDetector {
    held: bool,
}

impl EdgeDetector {
    /// `true` only on the first sample where `level` becomes `true`.
    pub fn rising(&mut self, level: bool) -> bool {
        let pressed = level && !self.held;
        self.held = level;
        pressed
    }
}
