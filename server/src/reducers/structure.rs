use crate::schema::*;
use spacetimedb::{ReducerContext, Table};

/// Places the caller's house. Each identity owns at most one.
#[spacetimedb::reducer]
pub fn place_structure(
    ctx: &ReducerContext,
    name: String,
    position_x: f32,
    position_z: f32,
) -> Result<(), String> {
    if !(position_x.is_finite() && position_z.is_finite()) {
        return Err("Position must be finite".into());
    }
    let name = name.trim();
    if name.is_empty() {
        return Err("Name must not be empty".into());
    }
    if ctx.db.structure().owner().filter(ctx.sender).next().is_some() {
        return Err("You already own a house".into());
    }
    let Some(settings) = ctx.db.raid_settings().id().find(1) else {
        return Err("`place_structure` couldn't find raid settings.".into());
    };

    let structure = ctx.db.structure().insert(Structure {
        id: 0,
        owner: ctx.sender,
        name: name.to_owned(),
        position_x,
        position_z,
        defense_rating: settings.default_defense,
        last_raid_at: None,
        last_raid_outcome: None,
    });
    log::info!(
        "{:?} placed structure {} at ({position_x}, {position_z})",
        ctx.sender,
        structure.id
    );
    Ok(())
}
