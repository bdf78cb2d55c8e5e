//! Runtime tuning for the simulation.
//!
//! Every section defaults to the values in [`crate::constants`], and every
//! struct is `#[serde(default)]`, so a host can ship a partial JSON file that
//! overrides only the knobs it cares about:
//!
//! ```json
//! { "vehicle": { "max_speed": 55.0 }, "chunks": { "activation_radius": 2 } }
//! ```
//!
//! Durations are expressed in seconds (`*_s` fields) to keep the file format
//! human-editable.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{constants::*, error::ConfigError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Largest step a single tick will integrate.
    pub max_tick_dt_s: f32,
    pub vehicle: VehicleTuning,
    pub pedestrian: PedestrianTuning,
    pub collision: CollisionSettings,
    pub possession: PossessionSettings,
    pub chunks: ChunkSettings,
    pub sync: SyncSettings,
    pub raid: RaidSettings,
    pub needs: NeedsSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleTuning {
    pub max_speed: f32,
    pub acceleration: f32,
    pub brake_force: f32,
    pub friction: f32,
    pub boost_factor: f32,
    pub turn_rate: f32,
    pub reverse_deadband: f32,
    pub reverse_ratio: f32,
    pub min_steer_speed: f32,
    pub full_steer_speed: f32,
    pub drift_brake_attenuation: f32,
    pub out_of_fuel_drag: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PedestrianTuning {
    pub walk_speed: f32,
    pub turn_rate: f32,
    pub grounding_bias: f32,
    pub hungry_speed_factor: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionSettings {
    pub pedestrian_floor_y: f32,
    pub vehicle_ride_height: f32,
    pub restitution: f32,
    pub slide_factor: f32,
    pub pedestrian_radius: f32,
    pub pedestrian_half_height: f32,
    pub vehicle_half_extents: [f32; 3],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PossessionSettings {
    pub entry_radius: f32,
    pub transition_delay_s: f32,
    pub exit_offset: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkSettings {
    pub chunk_size: f32,
    pub activation_radius: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub push_interval_s: f32,
    pub pull_interval_s: f32,
    pub snapshot_interval_s: f32,
    /// Seconds before an unanswered request is treated as failed.
    pub request_timeout_s: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaidSettings {
    pub attack_power: f64,
    pub default_defense: f64,
    pub range: f32,
    pub default_duration_s: u32,
    pub resolve_grace_s: f32,
    pub loot_min: u32,
    pub loot_max: u32,
    pub min_success_chance: f64,
    pub max_success_chance: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeedsSettings {
    pub max_level: f32,
    pub food_decay_per_s: f32,
    pub fuel_consumption: f32,
    pub refuel_duration_s: f32,
    pub poi_radius: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_tick_dt_s: MAX_TICK_DT_S,
            vehicle: VehicleTuning::default(),
            pedestrian: PedestrianTuning::default(),
            collision: CollisionSettings::default(),
            possession: PossessionSettings::default(),
            chunks: ChunkSettings::default(),
            sync: SyncSettings::default(),
            raid: RaidSettings::default(),
            needs: NeedsSettings::default(),
        }
    }
}

impl Default for VehicleTuning {
    fn default() -> Self {
        Self {
            max_speed: VEHICLE_MAX_SPEED,
            acceleration: VEHICLE_ACCELERATION,
            brake_force: VEHICLE_BRAKE_FORCE,
            friction: VEHICLE_FRICTION,
            boost_factor: VEHICLE_BOOST_FACTOR,
            turn_rate: VEHICLE_TURN_RATE,
            reverse_deadband: VEHICLE_REVERSE_DEADBAND,
            reverse_ratio: VEHICLE_REVERSE_RATIO,
            min_steer_speed: VEHICLE_MIN_STEER_SPEED,
            full_steer_speed: VEHICLE_FULL_STEER_SPEED,
            drift_brake_attenuation: DRIFT_BRAKE_ATTENUATION,
            out_of_fuel_drag: OUT_OF_FUEL_DRAG_PER_S,
        }
    }
}

impl Default for PedestrianTuning {
    fn default() -> Self {
        Self {
            walk_speed: WALK_SPEED,
            turn_rate: WALK_TURN_RATE,
            grounding_bias: GROUNDING_BIAS_MPS,
            hungry_speed_factor: HUNGRY_SPEED_FACTOR,
        }
    }
}

impl Default for CollisionSettings {
    fn default() -> Self {
        Self {
            pedestrian_floor_y: PEDESTRIAN_FLOOR_Y,
            vehicle_ride_height: VEHICLE_RIDE_HEIGHT,
            restitution: BOUNCE_RESTITUTION,
            slide_factor: SLIDE_FACTOR,
            pedestrian_radius: PEDESTRIAN_RADIUS,
            pedestrian_half_height: PEDESTRIAN_HALF_HEIGHT,
            vehicle_half_extents: VEHICLE_HALF_EXTENTS,
        }
    }
}

impl Default for PossessionSettings {
    fn default() -> Self {
        Self {
            entry_radius: ENTRY_RADIUS,
            transition_delay_s: TRANSITION_DELAY.as_secs_f32(),
            exit_offset: EXIT_OFFSET,
        }
    }
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            activation_radius: CHUNK_ACTIVATION_RADIUS,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            push_interval_s: PRESENCE_PUSH_INTERVAL.as_secs_f32(),
            pull_interval_s: PRESENCE_PULL_INTERVAL.as_secs_f32(),
            snapshot_interval_s: SNAPSHOT_INTERVAL.as_secs_f32(),
            request_timeout_s: REQUEST_TIMEOUT.as_secs_f32(),
        }
    }
}

impl Default for RaidSettings {
    fn default() -> Self {
        Self {
            attack_power: RAID_ATTACK_POWER,
            default_defense: DEFAULT_DEFENSE_RATING,
            range: RAID_RANGE,
            default_duration_s: DEFAULT_RAID_DURATION_S,
            resolve_grace_s: RAID_RESOLVE_GRACE.as_secs_f32(),
            loot_min: RAID_LOOT_MIN,
            loot_max: RAID_LOOT_MAX,
            min_success_chance: MIN_SUCCESS_CHANCE,
            max_success_chance: MAX_SUCCESS_CHANCE,
        }
    }
}

impl Default for NeedsSettings {
    fn default() -> Self {
        Self {
            max_level: NEEDS_MAX,
            food_decay_per_s: FOOD_DECAY_PER_S,
            fuel_consumption: FUEL_CONSUMPTION,
            refuel_duration_s: REFUEL_DURATION.as_secs_f32(),
            poi_radius: POI_RADIUS,
        }
    }
}

impl SimConfig {
    /// Parses a (possibly partial) JSON config and validates it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make the simulation degenerate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("max_tick_dt_s", self.max_tick_dt_s)?;

        let v = &self.vehicle;
        positive("vehicle.max_speed", v.max_speed)?;
        positive("vehicle.acceleration", v.acceleration)?;
        positive("vehicle.boost_factor", v.boost_factor)?;
        positive("vehicle.full_steer_speed", v.full_steer_speed)?;
        non_negative("vehicle.brake_force", v.brake_force)?;
        non_negative("vehicle.friction", v.friction)?;
        non_negative("vehicle.turn_rate", v.turn_rate)?;
        non_negative("vehicle.reverse_deadband", v.reverse_deadband)?;
        non_negative("vehicle.min_steer_speed", v.min_steer_speed)?;
        non_negative("vehicle.out_of_fuel_drag", v.out_of_fuel_drag)?;
        unit_interval("vehicle.reverse_ratio", v.reverse_ratio)?;
        unit_interval("vehicle.drift_brake_attenuation", v.drift_brake_attenuation)?;

        let p = &self.pedestrian;
        positive("pedestrian.walk_speed", p.walk_speed)?;
        non_negative("pedestrian.turn_rate", p.turn_rate)?;
        non_negative("pedestrian.grounding_bias", p.grounding_bias)?;
        unit_interval("pedestrian.hungry_speed_factor", p.hungry_speed_factor)?;

        let c = &self.collision;
        positive("collision.pedestrian_radius", c.pedestrian_radius)?;
        positive("collision.pedestrian_half_height", c.pedestrian_half_height)?;
        for extent in c.vehicle_half_extents {
            positive("collision.vehicle_half_extents", extent)?;
        }
        unit_interval("collision.restitution", c.restitution)?;
        unit_interval("collision.slide_factor", c.slide_factor)?;

        positive("possession.entry_radius", self.possession.entry_radius)?;
        non_negative("possession.transition_delay_s", self.possession.transition_delay_s)?;

        positive("chunks.chunk_size", self.chunks.chunk_size)?;
        if self.chunks.activation_radius < 0 {
            return Err(ConfigError::Invalid {
                field: "chunks.activation_radius",
                reason: "must not be negative",
            });
        }

        positive("sync.push_interval_s", self.sync.push_interval_s)?;
        positive("sync.pull_interval_s", self.sync.pull_interval_s)?;
        positive("sync.snapshot_interval_s", self.sync.snapshot_interval_s)?;
        positive("sync.request_timeout_s", self.sync.request_timeout_s)?;

        let r = &self.raid;
        positive("raid.attack_power", r.attack_power as f32)?;
        positive("raid.range", r.range)?;
        non_negative("raid.resolve_grace_s", r.resolve_grace_s)?;
        if !(r.default_defense.is_finite() && r.default_defense >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "raid.default_defense",
                reason: "must be zero or a positive number",
            });
        }
        if r.loot_min > r.loot_max {
            return Err(ConfigError::Invalid {
                field: "raid.loot_min",
                reason: "must not exceed raid.loot_max",
            });
        }
        if !(0.0 < r.min_success_chance
            && r.min_success_chance <= r.max_success_chance
            && r.max_success_chance < 1.0)
        {
            return Err(ConfigError::Invalid {
                field: "raid.min_success_chance",
                reason: "chance bounds must satisfy 0 < min <= max < 1",
            });
        }

        positive("needs.max_level", self.needs.max_level)?;
        non_negative("needs.food_decay_per_s", self.needs.food_decay_per_s)?;
        non_negative("needs.fuel_consumption", self.needs.fuel_consumption)?;
        positive("needs.refuel_duration_s", self.needs.refuel_duration_s)?;
        positive("needs.poi_radius", self.needs.poi_radius)?;

        Ok(())
    }
}

impl PossessionSettings {
    pub fn transition_delay(&self) -> Duration {
        seconds(self.transition_delay_s)
    }
}

impl SyncSettings {
    pub fn push_interval(&self) -> Duration {
        seconds(self.push_interval_s)
    }

    pub fn pull_interval(&self) -> Duration {
        seconds(self.pull_interval_s)
    }

    pub fn snapshot_interval(&self) -> Duration {
        seconds(self.snapshot_interval_s)
    }

    pub fn request_timeout(&self) -> Duration {
        seconds(self.request_timeout_s)
    }
}

impl RaidSettings {
    pub fn resolve_grace(&self) -> Duration {
        seconds(self.resolve_grace_s)
    }
}

impl NeedsSettings {
    pub fn refuel_duration(&self) -> Duration {
        seconds(self.refuel_duration_s)
    }
}

/// Negative or non-finite seconds (only possible without `validate()`) become zero.
fn seconds(value: f32) -> Duration {
    Duration::try_from_secs_f32(value).unwrap_or(Duration::ZERO)
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: "must be a positive number",
        })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: "must be zero or a positive number",
        })
    }
}

fn unit_interval(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: "must be within [0, 1]",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let json = r#"{ "vehicle": { "max_speed": 55.0 }, "chunks": { "activation_radius": 2 } }"#;
        let config = SimConfig::from_json_str(json).unwrap();

        assert_eq!(config.vehicle.max_speed, 55.0);
        assert_eq!(config.vehicle.acceleration, VEHICLE_ACCELERATION);
        assert_eq!(config.chunks.activation_radius, 2);
        assert_eq!(config.chunks.chunk_size, CHUNK_SIZE);
        assert_eq!(config.raid, RaidSettings::default());
    }

    #[test]
    fn empty_object_is_default() {
        assert_eq!(SimConfig::from_json_str("{}").unwrap(), SimConfig::default());
    }

    #[test]
    fn rejects_non_positive_chunk_size() {
        let err = SimConfig::from_json_str(r#"{ "chunks": { "chunk_size": 0.0 } }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "chunks.chunk_size",
                ..
            }
        ));
    }

    #[test]
    fn rejects_inverted_loot_range() {
        let err = SimConfig::from_json_str(r#"{ "raid": { "loot_min": 60, "loot_max": 50 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "raid.loot_min", .. }));
    }

    fn rejected_field(json: &str) -> Option<&'static str> {
        match SimConfig::from_json_str(json) {
            Err(ConfigError::Invalid { field, .. }) => Some(field),
            _ => None,
        }
    }

    #[test]
    fn rejects_negative_grace() {
        assert_eq!(
            rejected_field(r#"{ "raid": { "resolve_grace_s": -1.0 } }"#),
            Some("raid.resolve_grace_s")
        );
        assert!(SimConfig::from_json_str(r#"{ "raid": { "resolve_grace_s": 0.0 } }"#).is_ok());
    }

    #[test]
    fn rejects_bad_durations() {
        assert_eq!(
            rejected_field(r#"{ "needs": { "refuel_duration_s": 0.0 } }"#),
            Some("needs.refuel_duration_s")
        );
        assert_eq!(
            rejected_field(r#"{ "needs": { "refuel_duration_s": -3.0 } }"#),
            Some("needs.refuel_duration_s")
        );
        assert_eq!(
            rejected_field(r#"{ "possession": { "transition_delay_s": -0.1 } }"#),
            Some("possession.transition_delay_s")
        );
        assert_eq!(
            rejected_field(r#"{ "max_tick_dt_s": -0.05 }"#),
            Some("max_tick_dt_s")
        );
    }

    #[test]
    fn reverse_ratio_is_bounded() {
        assert_eq!(
            rejected_field(r#"{ "vehicle": { "reverse_ratio": 1.5 } }"#),
            Some("vehicle.reverse_ratio")
        );
        assert!(SimConfig::from_json_str(r#"{ "vehicle": { "reverse_ratio": 1.0 } }"#).is_ok());
    }

    #[test]
    fn unvalidated_negative_seconds_do_not_panic() {
        let raid = RaidSettings {
            resolve_grace_s: -1.0,
            ..RaidSettings::default()
        };
        assert_eq!(raid.resolve_grace(), Duration::ZERO);
        let needs = NeedsSettings {
            refuel_duration_s: f32::NAN,
            ..NeedsSettings::default()
        };
        assert_eq!(needs.refuel_duration(), Duration::ZERO);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = SimConfig::from_json_str("{ vehicle: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn durations_round_trip_through_seconds() {
        let config = SimConfig::default();
        assert_eq!(config.sync.push_interval(), PRESENCE_PUSH_INTERVAL);
        assert_eq!(config.sync.pull_interval(), PRESENCE_PULL_INTERVAL);
        let delay = config.possession.transition_delay().as_secs_f32();
        assert!((delay - TRANSITION_DELAY.as_secs_f32()).abs() < 1e-6);
    }
}
