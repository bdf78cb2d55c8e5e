//! Raid resolution: shared odds math, wire types and the client-side
//! coordinator state machine.
//!
//! ```text
//! Idle --start--> Requesting --accepted--> Active --timer + grace--> Resolving --reply--> Idle
//!                     |--rejected--> Idle
//! ```
//!
//! The odds math ([`success_chance`], [`resolve`]) is used both by the client,
//! for the optimistic result shown as soon as the timer runs out, and by the
//! server module, whose result is authoritative.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    config::RaidSettings,
    error::{RaidError, TransportError},
    ids::{RaidId, RequestId, StructureId},
    structure::Structure,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaidOutcome {
    Success,
    Failure,
}

/// Probability that an attack succeeds, clamped to the configured bounds.
///
/// Negative or non-finite defense counts as zero.
pub fn success_chance(attack: f64, defense: f64, settings: &RaidSettings) -> f64 {
    let defense = if defense.is_finite() { defense.max(0.0) } else { 0.0 };
    let total = attack + defense;
    let raw = if total > 0.0 { attack / total } else { 0.0 };
    raw.clamp(settings.min_success_chance, settings.max_success_chance)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaidResolution {
    pub outcome: RaidOutcome,
    pub loot: u32,
    pub success_chance: f64,
}

/// Resolves a raid from two uniform draws in `[0, 1)`.
///
/// Success iff `outcome_draw <= chance`; loot is
/// `round(loot_min + loot_draw * (loot_max - loot_min))` on success, else 0.
pub fn resolve(
    defense: f64,
    outcome_draw: f64,
    loot_draw: f64,
    settings: &RaidSettings,
) -> RaidResolution {
    let chance = success_chance(settings.attack_power, defense, settings);
    let outcome = if outcome_draw <= chance {
        RaidOutcome::Success
    } else {
        RaidOutcome::Failure
    };
    let loot = match outcome {
        RaidOutcome::Success => {
            let span = f64::from(settings.loot_max.saturating_sub(settings.loot_min));
            let draw = loot_draw.clamp(0.0, 1.0);
            (f64::from(settings.loot_min) + draw * span).round() as u32
        }
        RaidOutcome::Failure => 0,
    };
    RaidResolution {
        outcome,
        loot,
        success_chance: chance,
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StartRaidRequest {
    pub target_structure_id: StructureId,
}

/// `{success, raid_id, duration_seconds}` or `{success: false, message}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StartRaidReply {
    pub success: bool,
    #[serde(default)]
    pub raid_id: Option<RaidId>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinishRaidRequest {
    pub raid_id: RaidId,
    pub outcome: RaidOutcome,
    pub loot: u32,
}

/// `{success, outcome?, loot?}`. When present, `outcome` and `loot` are the
/// server's own resolution and override the client's.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FinishRaidReply {
    pub success: bool,
    #[serde(default)]
    pub outcome: Option<RaidOutcome>,
    #[serde(default)]
    pub loot: Option<u32>,
    #[serde(default)]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum RaidPhase {
    Idle,
    Requesting {
        target: StructureId,
        request: RequestId,
    },
    Active {
        raid_id: RaidId,
        target: StructureId,
        duration_seconds: u32,
        ends_at: Duration,
    },
    Resolving {
        raid_id: RaidId,
        target: StructureId,
        optimistic: RaidResolution,
        request: RequestId,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum RaidEvent {
    Started {
        raid_id: RaidId,
        target: StructureId,
        duration_seconds: u32,
    },
    Rejected {
        target: StructureId,
        message: String,
    },
    /// Timer ran out; the optimistic local result is known.
    Resolving {
        raid_id: RaidId,
        target: StructureId,
        optimistic: RaidResolution,
    },
    Settled {
        raid_id: RaidId,
        target: StructureId,
        outcome: RaidOutcome,
        loot: u32,
        /// `true` when the outcome came from the server.
        authoritative: bool,
    },
    SubmissionFailed {
        raid_id: RaidId,
        target: StructureId,
        message: String,
    },
}

#[derive(Clone, Debug)]
pub struct RaidCoordinator {
    phase: RaidPhase,
    settings: RaidSettings,
}

impl RaidCoordinator {
    pub fn new(settings: RaidSettings) -> Self {
        Self {
            phase: RaidPhase::Idle,
            settings,
        }
    }

    pub fn phase(&self) -> &RaidPhase {
        &self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == RaidPhase::Idle
    }

    pub fn settings(&self) -> &RaidSettings {
        &self.settings
    }

    /// Client-side eligibility checks, done before any request is sent.
    pub fn check_start(
        &self,
        target_id: StructureId,
        target: Option<&Structure>,
        attacker_x: f32,
        attacker_z: f32,
    ) -> Result<(), RaidError> {
        if !self.is_idle() {
            return Err(RaidError::AlreadyActive);
        }
        let Some(target) = target else {
            return Err(RaidError::UnknownStructure(target_id));
        };
        if target.is_owned_by_local_actor {
            return Err(RaidError::OwnStructure);
        }
        let distance = target.distance_to(attacker_x, attacker_z);
        if distance > self.settings.range {
            return Err(RaidError::OutOfRange {
                distance,
                range: self.settings.range,
            });
        }
        Ok(())
    }

    /// Moves to `Requesting`. Call only after [`Self::check_start`] passed.
    pub fn begin(&mut self, target: StructureId, request: RequestId) -> StartRaidRequest {
        self.phase = RaidPhase::Requesting { target, request };
        StartRaidRequest {
            target_structure_id: target,
        }
    }

    pub fn on_start_reply(
        &mut self,
        request: RequestId,
        result: Result<StartRaidReply, TransportError>,
        now: Duration,
    ) -> Option<RaidEvent> {
        let RaidPhase::Requesting {
            target,
            request: expected,
        } = self.phase
        else {
            log::debug!("ignoring start_raid reply {request:?}: no start in flight");
            return None;
        };
        if request != expected {
            log::debug!("ignoring stale start_raid reply {request:?}");
            return None;
        }

        let rejected = |message: String| {
            log::info!("raid on {target} rejected: {message}");
            RaidEvent::Rejected { target, message }
        };

        let event = match result {
            Err(err) => rejected(err.to_string()),
            Ok(reply) if !reply.success => {
                rejected(reply.message.unwrap_or_else(|| "Raid could not be started".to_owned()))
            }
            Ok(StartRaidReply { raid_id: None, .. }) => {
                rejected("Raid could not be started: missing raid id".to_owned())
            }
            Ok(StartRaidReply {
                raid_id: Some(raid_id),
                duration_seconds,
                ..
            }) => {
                let duration_seconds = duration_seconds.unwrap_or(self.settings.default_duration_s);
                self.phase = RaidPhase::Active {
                    raid_id,
                    target,
                    duration_seconds,
                    ends_at: now + Duration::from_secs(u64::from(duration_seconds)),
                };
                log::info!("{raid_id} started on {target} for {duration_seconds}s");
                return Some(RaidEvent::Started {
                    raid_id,
                    target,
                    duration_seconds,
                });
            }
        };

        self.phase = RaidPhase::Idle;
        Some(event)
    }

    /// Whole seconds left on an active raid, for display.
    pub fn remaining_seconds(&self, now: Duration) -> Option<u32> {
        match self.phase {
            RaidPhase::Active { ends_at, .. } => {
                Some(ends_at.saturating_sub(now).as_secs_f32().round() as u32)
            }
            _ => None,
        }
    }

    /// Target of an active raid whose timer (plus grace) has run out.
    pub fn due_for_resolution(&self, now: Duration) -> Option<StructureId> {
        match self.phase {
            RaidPhase::Active {
                target, ends_at, ..
            } if now >= ends_at + self.settings.resolve_grace() => Some(target),
            _ => None,
        }
    }

    /// Resolves a due raid locally and moves to `Resolving`.
    pub fn resolve_due(
        &mut self,
        now: Duration,
        defense: f64,
        outcome_draw: f64,
        loot_draw: f64,
        request: RequestId,
    ) -> Option<(FinishRaidRequest, RaidEvent)> {
        let target = self.due_for_resolution(now)?;
        let RaidPhase::Active { raid_id, .. } = self.phase else {
            return None;
        };

        let optimistic = resolve(defense, outcome_draw, loot_draw, &self.settings);
        self.phase = RaidPhase::Resolving {
            raid_id,
            target,
            optimistic,
            request,
        };
        log::debug!(
            "{raid_id} resolved locally: {:?} (chance {:.3}, loot {})",
            optimistic.outcome,
            optimistic.success_chance,
            optimistic.loot
        );

        Some((
            FinishRaidRequest {
                raid_id,
                outcome: optimistic.outcome,
                loot: optimistic.loot,
            },
            RaidEvent::Resolving {
                raid_id,
                target,
                optimistic,
            },
        ))
    }

    /// Any reply returns the coordinator to `Idle`.
    pub fn on_finish_reply(
        &mut self,
        request: RequestId,
        result: Result<FinishRaidReply, TransportError>,
    ) -> Option<RaidEvent> {
        let RaidPhase::Resolving {
            raid_id,
            target,
            optimistic,
            request: expected,
        } = self.phase
        else {
            log::debug!("ignoring finish_raid reply {request:?}: nothing resolving");
            return None;
        };
        if request != expected {
            log::debug!("ignoring stale finish_raid reply {request:?}");
            return None;
        }
        self.phase = RaidPhase::Idle;

        let event = match result {
            Ok(reply) if reply.success => {
                let authoritative = reply.outcome.is_some();
                let outcome = reply.outcome.unwrap_or(optimistic.outcome);
                let loot = reply.loot.unwrap_or(match outcome {
                    RaidOutcome::Success => optimistic.loot,
                    RaidOutcome::Failure => 0,
                });
                if authoritative && outcome != optimistic.outcome {
                    log::info!(
                        "{raid_id}: server outcome {outcome:?} overrides local {:?}",
                        optimistic.outcome
                    );
                }
                RaidEvent::Settled {
                    raid_id,
                    target,
                    outcome,
                    loot,
                    authoritative,
                }
            }
            Ok(reply) => RaidEvent::SubmissionFailed {
                raid_id,
                target,
                message: reply
                    .message
                    .unwrap_or_else(|| "Failed to submit raid result".to_owned()),
            },
            Err(err) => RaidEvent::SubmissionFailed {
                raid_id,
                target,
                message: err.to_string(),
            },
        };
        Some(event)
    }

    /// Drops any raid in progress. Returns `true` if something was cancelled.
    pub fn cancel(&mut self) -> bool {
        let was_busy = !self.is_idle();
        self.phase = RaidPhase::Idle;
        was_busy
    }
}
