use crate::schema::RaidSettingsRow;
use spacetimedb::Timestamp;
use town_shared::{actor::planar_distance, config::RaidSettings};

/// Seconds from `since` to `now`, or `None` if `now` is earlier.
pub fn elapsed_seconds(now: Timestamp, since: Timestamp) -> Option<f64> {
    now.time_duration_since(since)
        .map(|dur| dur.to_micros() as f64 / 1_000_000.0)
}

/// Whole seconds an attacker still has to wait, or `None` once the cooldown is over.
pub fn cooldown_remaining(elapsed_since_last_start: f64, cooldown_seconds: u32) -> Option<u32> {
    let remaining = f64::from(cooldown_seconds) - elapsed_since_last_start;
    (remaining > 0.0).then(|| remaining.ceil() as u32)
}

/// An unfinished raid blocks new ones until it is settled or abandoned.
///
/// A raid counts as abandoned once it has been open for its duration plus a
/// full cooldown without a `finish_raid` call.
pub fn raid_still_open(
    elapsed_since_start: f64,
    duration_seconds: u32,
    cooldown_seconds: u32,
) -> bool {
    elapsed_since_start < f64::from(duration_seconds) + f64::from(cooldown_seconds)
}

pub fn within_raid_range(
    attacker: (f32, f32),
    structure: (f32, f32),
    range: f32,
    slack: f32,
) -> bool {
    planar_distance(attacker.0, attacker.1, structure.0, structure.1) <= range + slack.max(0.0)
}

/// The module's tuning in the shape the shared raid math expects.
pub fn raid_settings(row: &RaidSettingsRow) -> RaidSettings {
    RaidSettings {
        attack_power: row.attack_power,
        default_defense: row.default_defense,
        range: row.range,
        default_duration_s: row.duration_seconds,
        loot_min: row.loot_min,
        loot_max: row.loot_max,
        min_success_chance: row.min_success_chance,
        max_success_chance: row.max_success_chance,
        ..RaidSettings::default()
    }
}
