use crate::{schema::*, types::DbVehicle};
use spacetimedb::{ReducerContext, Table};

/// Upserts the caller's position.
///
/// Behavior:
/// - Rejects non-finite coordinates.
/// - Creates the `presence` row on first call, overwrites it afterwards.
/// - Stamps `updated_at` with the reducer timestamp.
#[spacetimedb::reducer]
pub fn update_player_state(
    ctx: &ReducerContext,
    position_x: f32,
    position_z: f32,
    rotation_y: f32,
    vehicle: DbVehicle,
) -> Result<(), String> {
    if !(position_x.is_finite() && position_z.is_finite() && rotation_y.is_finite()) {
        return Err("Position must be finite".into());
    }

    let row = Presence {
        identity: ctx.sender,
        position_x,
        position_z,
        rotation_y,
        vehicle,
        updated_at: ctx.timestamp,
    };

    if ctx.db.presence().identity().find(ctx.sender).is_some() {
        ctx.db.presence().identity().update(row);
    } else {
        ctx.db.presence().insert(row);
    }
    Ok(())
}

/// Leave the town without disconnecting. No-op if the caller has no presence row.
#[spacetimedb::reducer]
pub fn leave_town(ctx: &ReducerContext) {
    if ctx.db.presence().identity().delete(ctx.sender) {
        log::info!("{:?} left town", ctx.sender);
    }
}
