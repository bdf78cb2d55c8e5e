mod db_raid_outcome;
mod db_vehicle;

pub use db_raid_outcome::DbRaidOutcome;
pub use db_vehicle::DbVehicle;
