//! Raid reducers.
//!
//! The module is authoritative: `start_raid` re-checks every eligibility rule
//! the client already checked, and `finish_raid` draws its own outcome and loot
//! with the module RNG. The client's claim is only logged when it disagrees.

use crate::{
    schema::*,
    types::DbRaidOutcome,
    utils::{cooldown_remaining, elapsed_seconds, raid_settings, raid_still_open, within_raid_range},
};
use spacetimedb::{ReducerContext, Table};
use town_shared::raid::resolve;

/// Slack for clock skew between the client's timer and the reducer timestamp (seconds).
const FINISH_TOLERANCE_S: f64 = 0.5;

fn load_settings(ctx: &ReducerContext, reducer: &str) -> Result<RaidSettingsRow, String> {
    ctx.db
        .raid_settings()
        .id()
        .find(1)
        .ok_or_else(|| format!("`{reducer}` couldn't find raid settings."))
}

/// Starts a raid by the caller on `target_structure_id`.
///
/// Rejections (as `Err` messages shown to the player):
/// - unknown structure or the caller's own structure;
/// - an unfinished raid that is not yet abandoned;
/// - the cooldown since the caller's last raid start;
/// - no presence row, or a presence farther than range + slack.
#[spacetimedb::reducer]
pub fn start_raid(ctx: &ReducerContext, target_structure_id: u64) -> Result<(), String> {
    let settings = load_settings(ctx, "start_raid")?;

    let Some(target) = ctx.db.structure().id().find(target_structure_id) else {
        return Err("Structure not found".into());
    };
    if target.owner == ctx.sender {
        return Err("You cannot raid your own house".into());
    }

    let mut last_start: Option<Raid> = None;
    for raid in ctx.db.raid().attacker().filter(ctx.sender) {
        let elapsed = elapsed_seconds(ctx.timestamp, raid.started_at).unwrap_or(0.0);
        let open = raid_still_open(elapsed, raid.duration_seconds, settings.cooldown_seconds);
        if raid.outcome.is_none() && open {
            return Err("You already have an active raid".into());
        }
        let started = raid.started_at.to_micros_since_unix_epoch();
        let newer = last_start
            .as_ref()
            .is_none_or(|last| started > last.started_at.to_micros_since_unix_epoch());
        if newer {
            last_start = Some(raid);
        }
    }
    if let Some(last) = last_start {
        let elapsed = elapsed_seconds(ctx.timestamp, last.started_at).unwrap_or(0.0);
        if let Some(remaining) = cooldown_remaining(elapsed, settings.cooldown_seconds) {
            return Err(format!("Raid cooldown: {remaining}s remaining"));
        }
    }

    let Some(presence) = ctx.db.presence().identity().find(ctx.sender) else {
        return Err("Your position is unknown; move closer and try again".into());
    };
    let in_range = within_raid_range(
        (presence.position_x, presence.position_z),
        (target.position_x, target.position_z),
        settings.range,
        settings.range_slack,
    );
    if !in_range {
        return Err("Too far away from the house".into());
    }

    let raid = ctx.db.raid().insert(Raid {
        id: 0,
        attacker: ctx.sender,
        structure_id: target.id,
        started_at: ctx.timestamp,
        duration_seconds: settings.duration_seconds,
        outcome: None,
        loot: 0,
        finished_at: None,
    });
    log::info!(
        "raid {} started by {:?} on structure {} for {}s",
        raid.id,
        ctx.sender,
        target.id,
        raid.duration_seconds
    );
    Ok(())
}

/// Settles the caller's raid once its duration has elapsed.
///
/// `outcome` and `loot` are the client's optimistic claim; the stored result
/// is the module's own draw.
#[spacetimedb::reducer]
pub fn finish_raid(
    ctx: &ReducerContext,
    raid_id: u64,
    outcome: DbRaidOutcome,
    loot: u32,
) -> Result<(), String> {
    let settings = load_settings(ctx, "finish_raid")?;

    let Some(mut raid) = ctx.db.raid().id().find(raid_id) else {
        return Err("Raid not found".into());
    };
    if raid.attacker != ctx.sender {
        return Err("Not your raid".into());
    }
    if raid.outcome.is_some() {
        return Err("Raid already finished".into());
    }
    let elapsed = elapsed_seconds(ctx.timestamp, raid.started_at).unwrap_or(0.0);
    if elapsed + FINISH_TOLERANCE_S < f64::from(raid.duration_seconds) {
        return Err("Raid is still in progress".into());
    }

    let structure = ctx.db.structure().id().find(raid.structure_id);
    let defense = structure
        .as_ref()
        .map_or(settings.default_defense, |s| s.defense_rating);

    let outcome_draw = ctx.random::<f64>();
    let loot_draw = ctx.random::<f64>();
    let resolution = resolve(defense, outcome_draw, loot_draw, &raid_settings(&settings));
    let resolved: DbRaidOutcome = resolution.outcome.into();

    if resolved != outcome {
        log::warn!("raid {raid_id}: client claimed {outcome:?}, module resolved {resolved:?}");
    } else if resolution.loot != loot {
        log::debug!("raid {raid_id}: client claimed {loot} loot, module drew {}", resolution.loot);
    }

    raid.outcome = Some(resolved);
    raid.loot = resolution.loot;
    raid.finished_at = Some(ctx.timestamp);
    ctx.db.raid().id().update(raid);

    if let Some(mut structure) = structure {
        structure.last_raid_at = Some(ctx.timestamp);
        structure.last_raid_outcome = Some(resolved);
        ctx.db.structure().id().update(structure);
    }

    log::info!(
        "raid {raid_id} finished: {resolved:?} (chance {:.3}, loot {})",
        resolution.success_chance,
        resolution.loot
    );
    Ok(())
}
