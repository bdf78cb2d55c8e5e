use town_shared::raid::RaidOutcome;

#[derive(spacetimedb::SpacetimeType, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbRaidOutcome {
    Success,
    Failure,
}

impl From<RaidOutcome> for DbRaidOutcome {
    fn from(outcome: RaidOutcome) -> Self {
        match outcome {
            RaidOutcome::Success => DbRaidOutcome::Success,
            RaidOutcome::Failure => DbRaidOutcome::Failure,
        }
    }
}

impl From<DbRaidOutcome> for RaidOutcome {
    fn from(outcome: DbRaidOutcome) -> Self {
        match outcome {
            DbRaidOutcome::Success => RaidOutcome::Success,
            DbRaidOutcome::Failure => RaidOutcome::Failure,
        }
    }
}
