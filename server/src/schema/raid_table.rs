use crate::types::DbRaidOutcome;
use spacetimedb::*;

/// One raid attempt. `outcome` stays `None` until `finish_raid` settles it.
#[table(name = raid, public)]
pub struct Raid {
    #[primary_key]
    #[auto_inc]
    pub id: u64,

    #[index(btree)]
    pub attacker: Identity,

    #[index(btree)]
    pub structure_id: u64,

    pub started_at: Timestamp,
    pub duration_seconds: u32,

    pub outcome: Option<DbRaidOutcome>,
    pub loot: u32,
    pub finished_at: Option<Timestamp>,
}
