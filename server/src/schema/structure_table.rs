use crate::types::DbRaidOutcome;
use spacetimedb::*;

/// A player-owned house that other players can raid.
#[table(name = structure, public)]
pub struct Structure {
    #[primary_key]
    #[auto_inc]
    pub id: u64,

    #[index(btree)]
    pub owner: Identity,

    pub name: String,

    pub position_x: f32,
    pub position_z: f32,

    /// Relative defense; 1.0 is an average house.
    pub defense_rating: f64,

    pub last_raid_at: Option<Timestamp>,
    pub last_raid_outcome: Option<DbRaidOutcome>,
}
