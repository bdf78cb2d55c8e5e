//! Fuel and food levels of the local player.

use crate::config::NeedsSettings;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Needs {
    pub fuel: f32,
    pub food: f32,
}

impl Needs {
    pub fn full(settings: &NeedsSettings) -> Self {
        Self {
            fuel: settings.max_level,
            food: settings.max_level,
        }
    }

    pub fn is_hungry(&self) -> bool {
        self.food <= 0.0
    }

    pub fn is_out_of_fuel(&self) -> bool {
        self.fuel <= 0.0
    }

    pub fn decay_food(&mut self, dt: f32, settings: &NeedsSettings) {
        self.food = (self.food - settings.food_decay_per_s * dt).max(0.0);
    }

    /// Burns fuel in proportion to how hard the vehicle is being driven.
    pub fn burn_fuel(&mut self, speed: f32, max_speed: f32, dt: f32, settings: &NeedsSettings) {
        if max_speed <= 0.0 {
            return;
        }
        let load = speed.abs() / max_speed;
        self.fuel = (self.fuel - settings.fuel_consumption * dt * load).max(0.0);
    }

    pub fn refill_food(&mut self, settings: &NeedsSettings) {
        self.food = settings.max_level;
    }

    pub fn refuel(&mut self, settings: &NeedsSettings) {
        self.fuel = settings.max_level;
    }

    pub fn tank_full(&self, settings: &NeedsSettings) -> bool {
        self.fuel >= settings.max_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn food_decays_to_zero() {
        let settings = NeedsSettings::default();
        let mut needs = Needs::full(&settings);
        needs.decay_food(10.0, &settings);
        assert!((needs.food - 99.5).abs() < 1e-4);

        needs.decay_food(1.0e6, &settings);
        assert_eq!(needs.food, 0.0);
        assert!(needs.is_hungry());
    }

    #[test]
    fn fuel_burn_scales_with_speed() {
        let settings = NeedsSettings::default();
        let mut idle = Needs::full(&settings);
        idle.burn_fuel(0.0, 40.0, 1.0, &settings);
        assert_eq!(idle.fuel, 100.0);

        let mut flat_out = Needs::full(&settings);
        flat_out.burn_fuel(-40.0, 40.0, 1.0, &settings);
        assert!((flat_out.fuel - 99.95).abs() < 1e-4);

        flat_out.burn_fuel(40.0, 40.0, 1.0e7, &settings);
        assert!(flat_out.is_out_of_fuel());
        flat_out.refuel(&settings);
        assert!(flat_out.tank_full(&settings));
    }
}
