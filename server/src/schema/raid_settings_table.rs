use spacetimedb::*;

/// Raid tuning shared by the module and its clients.
///
/// Single-row table (`id = 1`) seeded by `init`. Clients may subscribe to it to
/// mirror the server's odds in their optimistic resolution.
#[table(name = raid_settings, public)]
pub struct RaidSettingsRow {
    #[primary_key]
    pub id: u32,

    /// Seconds a raid must run before it can be finished.
    pub duration_seconds: u32,

    /// Seconds an attacker must wait between raid starts.
    pub cooldown_seconds: u32,

    pub attack_power: f64,
    pub default_defense: f64,

    pub loot_min: u32,
    pub loot_max: u32,

    pub min_success_chance: f64,
    pub max_success_chance: f64,

    /// Maximum attacker-to-structure distance (meters).
    pub range: f32,

    /// Extra distance tolerated on top of `range`, since presence lags the client.
    pub range_slack: f32,
}
