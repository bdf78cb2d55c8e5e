use crate::types::DbVehicle;
use spacetimedb::*;

/// Last reported position of each connected player.
///
/// One row per identity, upserted by `update_player_state` and removed on
/// disconnect. Clients poll this table to drive remote ghosts.
#[table(name = presence, public)]
pub struct Presence {
    #[primary_key]
    pub identity: Identity,

    /// World X (meters).
    pub position_x: f32,
    /// World Z (meters).
    pub position_z: f32,
    /// Yaw in radians.
    pub rotation_y: f32,

    pub vehicle: DbVehicle,

    pub updated_at: Timestamp,
}
