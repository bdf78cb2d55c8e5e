mod reducers {
    mod connection;
    pub mod presence;
    pub mod raid;
    pub mod structure;
}
pub mod schema;
pub mod types;
mod utils;

use crate::schema::*;
use spacetimedb::*;
use town_shared::constants::{
    DEFAULT_DEFENSE_RATING, DEFAULT_RAID_DURATION_S, MAX_SUCCESS_CHANCE, MIN_SUCCESS_CHANCE,
    RAID_ATTACK_POWER, RAID_COOLDOWN_S, RAID_LOOT_MAX, RAID_LOOT_MIN, RAID_RANGE,
};

#[reducer(init)]
pub fn init(ctx: &ReducerContext) {
    ctx.db.raid_settings().id().delete(1);
    ctx.db.raid_settings().insert(RaidSettingsRow {
        id: 1,
        duration_seconds: DEFAULT_RAID_DURATION_S,
        cooldown_seconds: RAID_COOLDOWN_S,
        attack_power: RAID_ATTACK_POWER,
        default_defense: DEFAULT_DEFENSE_RATING,
        loot_min: RAID_LOOT_MIN,
        loot_max: RAID_LOOT_MAX,
        min_success_chance: MIN_SUCCESS_CHANCE,
        max_success_chance: MAX_SUCCESS_CHANCE,
        range: RAID_RANGE,
        range_slack: 5.0,
    });
}
