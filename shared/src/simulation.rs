//! Per-session simulation scheduler.
//!
//! # Responsibilities
//! - Own every piece of tick-scoped state ([`SimulationState`]).
//! - Run one fixed order per tick: input, motion, collision, interaction and
//!   possession, visibility chunks, needs, raid timer, sync timers, HUD snapshot.
//! - Stay sans-IO: network work is queued as [`OutboundRequest`]s, the host
//!   performs them and feeds results back through [`Simulation::handle_response`].
//!
//! # Design notes
//! - Nothing blocks. A tick always proceeds on last-known state; responses
//!   are applied whenever the host delivers them.
//! - [`Simulation::leave`] is synchronous and idempotent. After it returns,
//!   ticks and responses are ignored.
//!
//! # Determinism
//! Given the same config, world, seed, inputs, dt sequence and responses, a
//! session produces the same events and requests.

use std::{collections::HashMap, time::Duration};

use nalgebra::Point3;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::sync::watch;

use crate::{
    actor::{Actor, Roster},
    chunk::{ChunkUpdate, VisibilityChunker},
    collision::{self, ActorProbes, CollisionResponse, ObstacleRef},
    config::SimConfig,
    constants::MPS_TO_KMH,
    error::{ConfigError, RaidError, TransportError},
    ids::{ActorId, ObjectId, RequestId, StructureId, UserId},
    input::{EdgeDetector, InputIntent},
    motion::{self, MotionContext},
    needs::Needs,
    poi::{self, LocalTime, PoiKind, PointOfInterest},
    possession::{ModeController, PossessionEvent, PossessionState, TransitionKind, exit_position},
    presence::{GhostChange, PresenceRow, PresenceSync, PresenceUpsert, VehicleTag},
    raid::{
        FinishRaidReply, FinishRaidRequest, RaidCoordinator, RaidEvent, RaidOutcome, RaidPhase,
        StartRaidReply, StartRaidRequest,
    },
    snapshot::{Compass, HudSnapshot, ModeView, RaidView, SnapshotPublisher},
    structure::{StructureDirectory, StructureRow},
    timer::Countdown,
    world::{LoadReport, WorldDefinition, WorldObjects},
};

/// Work the host must carry out on the simulation's behalf.
#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    /// List all structures (`StructureRow`s).
    FetchStructures,
    PushPresence(PresenceUpsert),
    /// List all presence rows.
    PullPresence,
    StartRaid(StartRaidRequest),
    FinishRaid(FinishRaidRequest),
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutboundRequest {
    pub id: RequestId,
    pub request: Request,
}

/// Result of a [`Request`], fed back with the request's id.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    Structures(Result<Vec<StructureRow>, TransportError>),
    PresencePushed(Result<(), TransportError>),
    PresencePulled(Result<Vec<PresenceRow>, TransportError>),
    RaidStarted(Result<StartRaidReply, TransportError>),
    RaidFinished(Result<FinishRaidReply, TransportError>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RequestKind {
    FetchStructures,
    PushPresence,
    PullPresence,
    StartRaid,
    FinishRaid,
}

impl Request {
    fn kind(&self) -> RequestKind {
        match self {
            Request::FetchStructures => RequestKind::FetchStructures,
            Request::PushPresence(_) => RequestKind::PushPresence,
            Request::PullPresence => RequestKind::PullPresence,
            Request::StartRaid(_) => RequestKind::StartRaid,
            Request::FinishRaid(_) => RequestKind::FinishRaid,
        }
    }
}

impl Response {
    /// The reply used when the host never answers a request of `kind`.
    fn timed_out(kind: RequestKind) -> Self {
        let err = TransportError::Timeout;
        match kind {
            RequestKind::FetchStructures => Response::Structures(Err(err)),
            RequestKind::PushPresence => Response::PresencePushed(Err(err)),
            RequestKind::PullPresence => Response::PresencePulled(Err(err)),
            RequestKind::StartRaid => Response::RaidStarted(Err(err)),
            RequestKind::FinishRaid => Response::RaidFinished(Err(err)),
        }
    }

    fn kind(&self) -> RequestKind {
        match self {
            Response::Structures(_) => RequestKind::FetchStructures,
            Response::PresencePushed(_) => RequestKind::PushPresence,
            Response::PresencePulled(_) => RequestKind::PullPresence,
            Response::RaidStarted(_) => RequestKind::StartRaid,
            Response::RaidFinished(_) => RequestKind::FinishRaid,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct PendingRequest {
    kind: RequestKind,
    issued_at: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// User-facing message (toast).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Everything observable that happened during a tick or a response.
#[derive(Clone, Debug, PartialEq)]
pub enum SimEvent {
    Possession(PossessionEvent),
    Collision {
        actor: ActorId,
        object: ObjectId,
        response: CollisionResponse,
    },
    Visibility(ChunkUpdate),
    Ghost(GhostChange),
    Raid(RaidEvent),
    StructuresLoaded(LoadReport),
    StructureFocused(StructureId),
    FocusCleared,
    PointOfInterestEntered {
        id: String,
        route: String,
    },
    FoodRestored,
    RefuelStarted,
    Refueled,
    Notice(Notice),
    SessionEnded,
}

/// Tick-scoped state, owned by [`Simulation`].
#[derive(Debug)]
pub struct SimulationState {
    pub roster: Roster,
    pub mode: ModeController,
    pub needs: Needs,
    pub objects: WorldObjects,
    pub structures: StructureDirectory,
    pub points_of_interest: Vec<PointOfInterest>,
    pub presence: PresenceSync,
    pub raid: RaidCoordinator,
    /// Nearest structure within raid range.
    pub nearby_structure: Option<StructureId>,
    /// Structure whose panel is open.
    pub focused_structure: Option<StructureId>,
    /// Index into `points_of_interest`.
    pub nearby_poi: Option<usize>,
    pub refuel: Countdown,
    /// Wall-clock time reported by the host, for opening hours.
    pub local_time: Option<LocalTime>,
    /// Accumulated simulated time.
    pub clock: Duration,
    pub tick: u64,
}

impl SimulationState {
    pub fn possessed_actor(&self) -> Option<&Actor> {
        self.roster.get(self.mode.possessed())
    }
}

pub struct Simulation {
    config: SimConfig,
    state: SimulationState,
    chunker: VisibilityChunker,
    probes: ActorProbes,
    rng: StdRng,
    interact: EdgeDetector,
    cancel: EdgeDetector,
    next_request: u64,
    pending: HashMap<RequestId, PendingRequest>,
    outbox: Vec<OutboundRequest>,
    events: Vec<SimEvent>,
    snapshots: SnapshotPublisher,
    running: bool,
}

impl Simulation {
    /// Builds a session and queues the initial structure fetch.
    ///
    /// Invalid world items are logged and skipped; only an invalid config fails.
    pub fn new(
        config: SimConfig,
        local_user: UserId,
        world: &WorldDefinition,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let spawn = &world.spawn;
        let finite = spawn.x.is_finite() && spawn.z.is_finite() && spawn.heading.is_finite();
        let (sx, sz, heading) = if finite {
            (spawn.x, spawn.z, spawn.heading)
        } else {
            log::warn!("spawn point is not finite; spawning at the origin");
            (0.0, 0.0, 0.0)
        };
        let floor_y = config.collision.pedestrian_floor_y;
        let mut roster = Roster::new(Point3::new(sx, floor_y, sz), heading);

        for (index, v) in world.vehicles.iter().enumerate() {
            if !(v.x.is_finite() && v.z.is_finite() && v.heading.is_finite()) {
                log::warn!("skipping vehicle #{index}: non-finite spawn");
                continue;
            }
            let position = Point3::new(v.x, config.collision.vehicle_ride_height, v.z);
            roster.spawn_vehicle(position, v.heading);
        }

        let mut objects = WorldObjects::new();
        let report = objects.load(&world.objects);

        let points_of_interest: Vec<PointOfInterest> = world
            .points_of_interest
            .iter()
            .filter(|p| {
                let ok = p.position_x.is_finite() && p.position_z.is_finite();
                if !ok {
                    log::warn!("skipping point of interest {}: non-finite position", p.id);
                }
                ok
            })
            .cloned()
            .collect();

        let mode = match (world.start_in_vehicle, roster.vehicles().next().map(|v| v.id)) {
            (true, Some(vehicle)) => {
                ModeController::in_vehicle(Roster::PEDESTRIAN, vehicle, config.possession.clone())
            }
            _ => ModeController::on_foot(Roster::PEDESTRIAN, config.possession.clone()),
        };

        log::info!(
            "session for {local_user}: {} objects ({} skipped), {} vehicles, {} points of interest",
            report.loaded,
            report.skipped,
            roster.len() - 1,
            points_of_interest.len()
        );

        let now = Duration::ZERO;
        let state = SimulationState {
            roster,
            mode,
            needs: Needs::full(&config.needs),
            objects,
            structures: StructureDirectory::default(),
            points_of_interest,
            presence: PresenceSync::new(local_user, &config.sync, now),
            raid: RaidCoordinator::new(config.raid.clone()),
            nearby_structure: None,
            focused_structure: None,
            nearby_poi: None,
            refuel: Countdown::default(),
            local_time: None,
            clock: now,
            tick: 0,
        };

        let mut sim = Self {
            chunker: VisibilityChunker::new(config.chunks.clone()),
            probes: ActorProbes::new(&config.collision),
            rng: StdRng::seed_from_u64(seed),
            interact: EdgeDetector::default(),
            cancel: EdgeDetector::default(),
            next_request: 1,
            pending: HashMap::new(),
            outbox: Vec::new(),
            events: Vec::new(),
            snapshots: SnapshotPublisher::new(
                HudSnapshot::default(),
                config.sync.snapshot_interval(),
                now,
            ),
            running: true,
            config,
            state,
        };

        sim.update_chunks();
        sim.refresh_structures();
        sim.publish_snapshot();
        Ok(sim)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn now(&self) -> Duration {
        self.state.clock
    }

    /// Updates the local wall-clock time used for opening hours.
    pub fn set_local_time(&mut self, at: LocalTime) {
        self.state.local_time = Some(at);
    }

    /// Latest HUD snapshot, updated at the snapshot interval.
    pub fn subscribe(&self) -> watch::Receiver<HudSnapshot> {
        self.snapshots.subscribe()
    }

    /// Requests the host must perform, in the order they were issued.
    pub fn drain_requests(&mut self) -> Vec<OutboundRequest> {
        std::mem::take(&mut self.outbox)
    }

    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Advances the session by `dt` seconds (clamped).
    pub fn tick(&mut self, dt: f32, input: &InputIntent) {
        if !self.running {
            return;
        }
        let dt = motion::clamp_dt(dt, self.config.max_tick_dt_s);
        self.state.clock += Duration::from_secs_f32(dt);
        self.state.tick += 1;
        let now = self.state.clock;

        // 1) Input.
        let input = input.sanitized();
        let interact_pressed = self.interact.rising(input.interact);
        let cancel_pressed = self.cancel.rising(input.cancel);

        // 2) Motion and 3) collision.
        self.step_possessed(&input, dt);

        // 4) Interaction, possession, chunks.
        self.update_proximity();
        if let Some(event) = self.state.mode.advance(dt) {
            self.apply_possession(event);
        }
        if interact_pressed {
            self.interact();
        }
        if cancel_pressed {
            self.clear_focus();
        }
        self.update_chunks();

        // 5) Needs.
        self.update_needs(dt, now);

        // 6) Unanswered requests, then the raid timer.
        self.expire_requests(now);
        self.update_raid(now);

        // 7) Sync timers.
        self.update_presence(now);

        // 8) HUD.
        if self.snapshots.is_due(now) {
            self.publish_snapshot();
        }
    }

    /// Starts a raid on `target`, or on the focused / nearest structure.
    ///
    /// All eligibility checks happen here; nothing is sent when they fail.
    pub fn request_raid(&mut self, target: Option<StructureId>) -> Result<RequestId, RaidError> {
        if !self.running {
            return Err(RaidError::SessionEnded);
        }
        if !self.state.raid.is_idle() {
            return Err(RaidError::AlreadyActive);
        }
        let target = target
            .or(self.state.focused_structure)
            .or(self.state.nearby_structure)
            .ok_or(RaidError::NoTarget)?;

        let (x, z) = self
            .state
            .possessed_actor()
            .map(|a| (a.position.x, a.position.z))
            .unwrap_or_default();
        self.state
            .raid
            .check_start(target, self.state.structures.get(target), x, z)?;

        let id = self.allocate_request_id();
        let payload = self.state.raid.begin(target, id);
        self.enqueue(id, Request::StartRaid(payload));
        log::info!("requesting raid on {target}");
        Ok(id)
    }

    /// Queues a fresh structure listing.
    pub fn refresh_structures(&mut self) {
        if !self.running {
            return;
        }
        let id = self.allocate_request_id();
        self.enqueue(id, Request::FetchStructures);
    }

    /// Applies the result of a request previously drained from the outbox.
    pub fn handle_response(&mut self, id: RequestId, response: Response) {
        if !self.running {
            log::debug!("session ended; dropping response {id:?}");
            return;
        }
        let Some(PendingRequest { kind, .. }) = self.pending.remove(&id) else {
            log::debug!("dropping response for unknown request {id:?}");
            return;
        };
        if kind != response.kind() {
            log::warn!(
                "response kind mismatch for {id:?}: expected {kind:?}, got {:?}",
                response.kind()
            );
            return;
        }

        match response {
            Response::Structures(Ok(rows)) => {
                let report = self.state.structures.replace_from_rows(
                    rows,
                    self.state.presence.local_user(),
                    self.config.raid.default_defense,
                );
                log::info!("structures loaded: {} ({} skipped)", report.loaded, report.skipped);
                if let Some(focused) = self.state.focused_structure {
                    if self.state.structures.get(focused).is_none() {
                        self.clear_focus();
                    }
                }
                self.events.push(SimEvent::StructuresLoaded(report));
            }
            Response::Structures(Err(err)) => {
                log::warn!("structure fetch failed: {err}");
            }
            Response::PresencePushed(result) => self.state.presence.push_completed(result),
            Response::PresencePulled(result) => {
                let changes = self.state.presence.apply_pull(result);
                self.events.extend(changes.into_iter().map(SimEvent::Ghost));
            }
            Response::RaidStarted(result) => {
                let clock = self.state.clock;
                let Some(event) = self.state.raid.on_start_reply(id, result, clock) else {
                    return;
                };
                match &event {
                    RaidEvent::Started { duration_seconds, .. } => {
                        self.state.focused_structure = None;
                        self.notify(
                            NoticeLevel::Info,
                            format!("Raid started! Hold out for {duration_seconds} seconds."),
                        );
                    }
                    RaidEvent::Rejected { message, .. } => {
                        self.notify(NoticeLevel::Error, message.clone())
                    }
                    _ => {}
                }
                self.events.push(SimEvent::Raid(event));
            }
            Response::RaidFinished(result) => {
                let Some(event) = self.state.raid.on_finish_reply(id, result) else {
                    return;
                };
                match &event {
                    RaidEvent::Settled {
                        outcome: RaidOutcome::Success,
                        loot,
                        ..
                    } => self.notify(
                        NoticeLevel::Success,
                        format!("Raid successful! Looted {loot} coins."),
                    ),
                    RaidEvent::Settled {
                        outcome: RaidOutcome::Failure,
                        ..
                    } => {
                        let message = "Raid failed. The defenses held.".to_owned();
                        self.notify(NoticeLevel::Error, message)
                    }
                    RaidEvent::SubmissionFailed { message, .. } => {
                        let message = format!("Failed to submit raid result: {message}");
                        self.notify(NoticeLevel::Error, message)
                    }
                    _ => {}
                }
                self.events.push(SimEvent::Raid(event));
                self.refresh_structures();
            }
        }
    }

    /// Ends the session: cancels every timer, drops in-flight work and disposes
    /// ghosts. Safe to call more than once.
    pub fn leave(&mut self) {
        if !self.running {
            return;
        }

        for change in self.state.presence.stop() {
            self.events.push(SimEvent::Ghost(change));
        }
        if self.state.raid.cancel() {
            log::info!("abandoning raid in progress");
        }
        if let Some(event) = self.state.mode.cancel_transition() {
            self.events.push(SimEvent::Possession(event));
        }
        self.state.refuel.cancel();
        self.snapshots.stop();
        self.pending.clear();
        self.outbox.clear();

        self.running = false;
        self.publish_snapshot();
        self.events.push(SimEvent::SessionEnded);
        log::info!("session ended after {} ticks", self.state.tick);
    }

    // -----------------------------------------------------------------------
    // Tick stages
    // -----------------------------------------------------------------------

    fn step_possessed(&mut self, input: &InputIntent, dt: f32) {
        let possessed = self.state.mode.possessed();
        let Some(prev) = self.state.roster.get(possessed).cloned() else {
            log::warn!("possessed actor {possessed:?} is missing");
            return;
        };

        // The source actor is frozen out of control while a door animation plays.
        let drive = if self.state.mode.is_transitioning() {
            InputIntent::NEUTRAL
        } else {
            *input
        };
        let ctx = MotionContext {
            vehicle: &self.config.vehicle,
            pedestrian: &self.config.pedestrian,
            dt,
            hungry: self.state.needs.is_hungry(),
            out_of_fuel: self.state.needs.is_out_of_fuel(),
        };
        let moved = motion::integrate(&prev, &drive, &ctx);

        let resolution = {
            let obstacles: Vec<ObstacleRef<'_>> = self.state.objects.active_colliders().collect();
            collision::resolve(&prev, moved, &obstacles, &self.probes, &self.config.collision)
        };

        if let Some(object) = resolution.hit {
            self.events.push(SimEvent::Collision {
                actor: possessed,
                object,
                response: resolution.response,
            });
        }
        if let Some(actor) = self.state.roster.get_mut(possessed) {
            *actor = resolution.actor;
        }
    }

    fn update_proximity(&mut self) {
        let Some((x, z)) = self.state.possessed_actor().map(|a| (a.position.x, a.position.z)) else {
            return;
        };
        self.state.nearby_structure = self
            .state
            .structures
            .nearest_within(x, z, self.config.raid.range)
            .map(|s| s.id);
        let poi_radius = self.config.needs.poi_radius;
        self.state.nearby_poi =
            poi::nearest_within(&self.state.points_of_interest, x, z, poi_radius).map(|(i, _)| i);

        if let Some(focused) = self.state.focused_structure {
            if self.state.nearby_structure != Some(focused) {
                self.clear_focus();
            }
        }
    }

    fn interact(&mut self) {
        if self.state.refuel.is_armed() {
            return;
        }
        match self.state.mode.state() {
            PossessionState::Transitioning { .. } => {}
            PossessionState::InVehicle(_) => {
                if let Some(index) = self.nearby_fuel_station() {
                    if self.poi_open(index) {
                        self.start_refuel();
                    }
                } else {
                    let event = self
                        .state
                        .mode
                        .interact(self.state.roster.pedestrian(), self.state.roster.vehicles());
                    if let Some(event) = event {
                        self.apply_possession(event);
                    }
                }
            }
            PossessionState::OnFoot => {
                let event = self
                    .state
                    .mode
                    .interact(self.state.roster.pedestrian(), self.state.roster.vehicles());
                if let Some(event) = event {
                    self.apply_possession(event);
                    return;
                }
                if let Some(structure) = self.state.nearby_structure {
                    if self.state.raid.is_idle() {
                        self.state.focused_structure = Some(structure);
                        self.events.push(SimEvent::StructureFocused(structure));
                        return;
                    }
                }
                if let Some(index) = self.state.nearby_poi {
                    self.visit_poi(index);
                }
            }
        }
    }

    fn nearby_fuel_station(&self) -> Option<usize> {
        self.state.nearby_poi.filter(|&i| {
            self.state
                .points_of_interest
                .get(i)
                .is_some_and(|p| p.kind == PoiKind::FuelStation)
        })
    }

    /// Emits a closed notice and returns false outside opening hours.
    fn poi_open(&mut self, index: usize) -> bool {
        let Some(poi) = self.state.points_of_interest.get(index) else {
            return false;
        };
        if poi.is_open(self.state.local_time) {
            return true;
        }
        let hours = poi.hours.map(|h| format!(" {}", h.describe())).unwrap_or_default();
        let message = format!("{} is closed.{hours}", poi.name);
        self.notify(NoticeLevel::Info, message);
        false
    }

    fn visit_poi(&mut self, index: usize) {
        if !self.poi_open(index) {
            return;
        }
        let Some(poi) = self.state.points_of_interest.get(index) else {
            return;
        };
        match &poi.kind {
            PoiKind::FuelStation => {
                self.notify(NoticeLevel::Info, "Bring your vehicle here to refuel.".to_owned());
            }
            PoiKind::Grocery => {
                self.state.needs.refill_food(&self.config.needs);
                self.events.push(SimEvent::FoodRestored);
                self.notify(NoticeLevel::Success, "Groceries purchased! +Food".to_owned());
            }
            PoiKind::Destination { route } => {
                let event = SimEvent::PointOfInterestEntered {
                    id: poi.id.clone(),
                    route: route.clone(),
                };
                let message = format!("Entering {}...", poi.name);
                self.events.push(event);
                self.notify(NoticeLevel::Success, message);
            }
        }
    }

    fn start_refuel(&mut self) {
        if self.state.needs.tank_full(&self.config.needs) {
            self.notify(NoticeLevel::Info, "Tank is full!".to_owned());
            return;
        }
        self.state
            .refuel
            .start(self.state.clock, self.config.needs.refuel_duration());
        self.events.push(SimEvent::RefuelStarted);
    }

    fn clear_focus(&mut self) {
        if self.state.focused_structure.take().is_some() {
            self.events.push(SimEvent::FocusCleared);
        }
    }

    fn apply_possession(&mut self, event: PossessionEvent) {
        match event {
            PossessionEvent::Entered(vehicle) => {
                self.state.roster.pedestrian_mut().velocity = 0.0;
                log::info!("entered vehicle {vehicle:?}");
            }
            PossessionEvent::Exited(vehicle) => {
                let Some(car) = self.state.roster.get_mut(vehicle) else {
                    log::warn!("exited unknown vehicle {vehicle:?}");
                    return;
                };
                // Parked.
                car.velocity = 0.0;
                let position = exit_position(
                    car,
                    self.config.possession.exit_offset,
                    self.config.collision.pedestrian_floor_y,
                );
                let heading = car.heading;

                let pedestrian = self.state.roster.pedestrian_mut();
                pedestrian.position = position;
                pedestrian.heading = heading;
                pedestrian.velocity = 0.0;
                log::info!("exited vehicle {vehicle:?}");
            }
            PossessionEvent::TransitionStarted { .. }
            | PossessionEvent::TransitionCancelled { .. } => {}
        }
        self.events.push(SimEvent::Possession(event));
    }

    fn update_chunks(&mut self) {
        let Some(position) = self.state.possessed_actor().map(|a| a.position) else {
            return;
        };
        if let Some(update) = self.chunker.update(&position, &mut self.state.objects) {
            if !update.enabled.is_empty() || !update.disabled.is_empty() {
                self.events.push(SimEvent::Visibility(update));
            }
        }
    }

    fn update_needs(&mut self, dt: f32, now: Duration) {
        let driving_speed = self
            .state
            .possessed_actor()
            .filter(|a| a.is_vehicle())
            .map(|a| a.velocity);
        if let Some(speed) = driving_speed {
            self.state
                .needs
                .burn_fuel(speed, self.config.vehicle.max_speed, dt, &self.config.needs);
        }
        self.state.needs.decay_food(dt, &self.config.needs);

        if self.state.refuel.poll_expired(now) {
            self.state.needs.refuel(&self.config.needs);
            self.events.push(SimEvent::Refueled);
            self.notify(NoticeLevel::Success, "Refueled!".to_owned());
        }
    }

    /// Answers requests older than the request timeout with [`TransportError::Timeout`].
    fn expire_requests(&mut self, now: Duration) {
        let timeout = self.config.sync.request_timeout();
        let mut expired: Vec<(RequestId, RequestKind)> = self
            .pending
            .iter()
            .filter(|(_, p)| now.saturating_sub(p.issued_at) >= timeout)
            .map(|(id, p)| (*id, p.kind))
            .collect();
        expired.sort_unstable_by_key(|(id, _)| *id);

        for (id, kind) in expired {
            log::debug!("request {id:?} ({kind:?}) timed out");
            self.handle_response(id, Response::timed_out(kind));
        }
    }

    fn update_raid(&mut self, now: Duration) {
        let Some(target) = self.state.raid.due_for_resolution(now) else {
            return;
        };
        let defense = self
            .state
            .structures
            .get(target)
            .map_or(self.config.raid.default_defense, |s| s.defense_rating);
        let outcome_draw: f64 = self.rng.gen_range(0.0..1.0);
        let loot_draw: f64 = self.rng.gen_range(0.0..1.0);

        let id = self.allocate_request_id();
        if let Some((payload, event)) = self
            .state
            .raid
            .resolve_due(now, defense, outcome_draw, loot_draw, id)
        {
            self.enqueue(id, Request::FinishRaid(payload));
            self.events.push(SimEvent::Raid(event));
        }
    }

    fn update_presence(&mut self, now: Duration) {
        if self.state.presence.poll_push(now) {
            if let Some(upsert) = self.presence_upsert() {
                let id = self.allocate_request_id();
                self.enqueue(id, Request::PushPresence(upsert));
            }
        }
        if self.state.presence.poll_pull(now) {
            let id = self.allocate_request_id();
            self.enqueue(id, Request::PullPresence);
        }
    }

    fn presence_upsert(&self) -> Option<PresenceUpsert> {
        let actor = self.state.possessed_actor()?;
        Some(PresenceUpsert {
            position_x: actor.position.x,
            position_z: actor.position.z,
            rotation_y: actor.heading,
            vehicle: if actor.is_vehicle() {
                VehicleTag::Car
            } else {
                VehicleTag::Foot
            },
        })
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    fn allocate_request_id(&mut self) -> RequestId {
        let id = RequestId(self.next_request);
        self.next_request += 1;
        id
    }

    fn enqueue(&mut self, id: RequestId, request: Request) {
        let pending = PendingRequest {
            kind: request.kind(),
            issued_at: self.state.clock,
        };
        self.pending.insert(id, pending);
        self.outbox.push(OutboundRequest { id, request });
    }

    fn notify(&mut self, level: NoticeLevel, message: String) {
        self.events.push(SimEvent::Notice(Notice { level, message }));
    }

    fn publish_snapshot(&self) {
        self.snapshots.publish(self.build_snapshot());
    }

    fn build_snapshot(&self) -> HudSnapshot {
        let state = &self.state;
        let actor = state.possessed_actor().unwrap_or_else(|| state.roster.pedestrian());

        let mode = match state.mode.state() {
            PossessionState::OnFoot => ModeView::OnFoot,
            PossessionState::InVehicle(_) => ModeView::InVehicle,
            PossessionState::Transitioning {
                kind: TransitionKind::Enter,
                ..
            } => ModeView::Entering,
            PossessionState::Transitioning {
                kind: TransitionKind::Exit,
                ..
            } => ModeView::Exiting,
        };

        let raid = match state.raid.phase() {
            RaidPhase::Idle => RaidView::Idle,
            RaidPhase::Requesting { .. } => RaidView::Requesting,
            RaidPhase::Active { .. } => RaidView::Active {
                remaining_seconds: state.raid.remaining_seconds(state.clock).unwrap_or(0),
            },
            RaidPhase::Resolving { .. } => RaidView::Resolving,
        };

        let heading_degrees = actor.heading_degrees();
        HudSnapshot {
            tick: state.tick,
            running: self.running,
            mode,
            position: [actor.position.x, actor.position.y, actor.position.z],
            speed_kmh: actor.velocity.abs() * MPS_TO_KMH,
            heading_degrees,
            compass: Compass::from_degrees(heading_degrees),
            fuel: state.needs.fuel,
            food: state.needs.food,
            refueling: state.refuel.is_armed(),
            raid,
            nearby_structure: state.nearby_structure,
            focused_structure: state.focused_structure,
            nearby_poi: state
                .nearby_poi
                .and_then(|i| state.points_of_interest.get(i))
                .map(|p| p.name.clone()),
            ghost_count: state.presence.ghost_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collision::ObstacleShapeDef,
        ids::RaidId,
        poi::OpeningHours,
        world::{ObjectDef, ObjectKind, SpawnPoint, VehicleSpawn},
    };

    const DT: f32 = 0.05;

    fn press() -> InputIntent {
        InputIntent {
            interact: true,
            ..InputIntent::NEUTRAL
        }
    }

    fn world_with_car() -> WorldDefinition {
        WorldDefinition {
            spawn: SpawnPoint {
                x: 0.0,
                z: 0.0,
                heading: 0.0,
            },
            vehicles: vec![VehicleSpawn {
                x: 2.0,
                z: 0.0,
                heading: 0.0,
            }],
            ..Default::default()
        }
    }

    fn start(world: &WorldDefinition) -> Simulation {
        Simulation::new(SimConfig::default(), UserId::new("me"), world, 7).unwrap()
    }

    fn run(sim: &mut Simulation, input: InputIntent, ticks: usize) {
        for _ in 0..ticks {
            sim.tick(DT, &input);
        }
    }

    fn find(
        requests: &[OutboundRequest],
        pred: impl Fn(&Request) -> bool,
    ) -> Option<OutboundRequest> {
        requests.iter().find(|r| pred(&r.request)).cloned()
    }

    fn structure_row(id: u64, owner: &str, x: f32, z: f32) -> StructureRow {
        StructureRow {
            id: StructureId(id),
            owner_id: UserId::new(owner),
            position_x: x,
            position_z: z,
            defense_rating: Some(1.0),
            metadata: None,
            last_raid_at: None,
            last_raid_outcome: None,
        }
    }

    /// On foot at the origin, a foreign house 3 m away and an own house far off.
    fn start_with_structures() -> Simulation {
        let mut sim = start(&WorldDefinition::default());
        let fetch = find(&sim.drain_requests(), |r| matches!(r, Request::FetchStructures)).unwrap();
        sim.handle_response(
            fetch.id,
            Response::Structures(Ok(vec![
                structure_row(5, "troll", 3.0, 0.0),
                structure_row(6, "me", 50.0, 50.0),
            ])),
        );
        assert!(sim.drain_events().contains(&SimEvent::StructuresLoaded(LoadReport {
            loaded: 2,
            skipped: 0
        })));
        sim.tick(DT, &InputIntent::NEUTRAL);
        sim.drain_requests();
        sim.drain_events();
        sim
    }

    #[test]
    fn new_session_fetches_structures() {
        let mut sim = start(&world_with_car());
        let requests = sim.drain_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].request, Request::FetchStructures);
        assert!(sim.is_running());
        assert_eq!(sim.subscribe().borrow().tick, 0);
        assert_eq!(sim.state().possessed_actor().map(|a| a.id), Some(Roster::PEDESTRIAN));
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = SimConfig::default();
        config.vehicle.max_speed = -1.0;
        let result = Simulation::new(config, UserId::new("me"), &WorldDefinition::default(), 0);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_negative_raid_grace() {
        let mut config = SimConfig::default();
        config.raid.resolve_grace_s = -1.0;
        let result = Simulation::new(config, UserId::new("me"), &WorldDefinition::default(), 0);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "raid.resolve_grace_s",
                ..
            })
        ));
    }

    #[test]
    fn unanswered_requests_expire() {
        let mut sync_only = start(&WorldDefinition::default());
        let mut pulls = 0;
        for _ in 0..200 {
            sync_only.tick(DT, &InputIntent::NEUTRAL);
            pulls += sync_only
                .drain_requests()
                .iter()
                .filter(|r| r.request == Request::PullPresence)
                .count();
        }
        // Lost pulls are retried instead of blocking the cycle for good.
        assert!(pulls >= 2);
        // Only requests younger than the timeout stay outstanding.
        assert!(sync_only.pending.len() < 10);
    }

    #[test]
    fn unanswered_raid_start_returns_to_idle() {
        let mut sim = start_with_structures();
        sim.request_raid(None).unwrap();
        run(&mut sim, InputIntent::NEUTRAL, 120);

        assert!(sim.state().raid.is_idle());
        let rejected = sim.drain_events().into_iter().any(|e| {
            matches!(
                e,
                SimEvent::Raid(RaidEvent::Rejected { target, .. }) if target == StructureId(5)
            )
        });
        assert!(rejected);
    }

    #[test]
    fn enters_and_exits_vehicle() {
        let mut sim = start(&world_with_car());

        // Holding interact through the whole transition must not bounce back out.
        run(&mut sim, press(), 16);
        assert_eq!(sim.state().mode.state(), PossessionState::InVehicle(ActorId(1)));
        let events = sim.drain_events();
        assert!(events.contains(&SimEvent::Possession(PossessionEvent::Entered(ActorId(1)))));

        run(&mut sim, InputIntent::NEUTRAL, 1);
        run(&mut sim, press(), 1);
        assert!(sim.state().mode.is_transitioning());
        run(&mut sim, InputIntent::NEUTRAL, 16);
        assert_eq!(sim.state().mode.state(), PossessionState::OnFoot);

        let pedestrian = sim.state().roster.pedestrian();
        assert!((pedestrian.position.x - (2.0 - 2.5)).abs() < 1e-3);
        assert!(pedestrian.position.z.abs() < 1e-3);
        assert!((pedestrian.position.y - 0.9).abs() < 1e-4);
        assert_eq!(sim.state().roster.get(ActorId(1)).map(|v| v.velocity), Some(0.0));
    }

    #[test]
    fn transition_freezes_controls() {
        let mut sim = start(&world_with_car());
        run(&mut sim, press(), 1);
        assert!(sim.state().mode.is_transitioning());

        let walk = InputIntent {
            forward: 1.0,
            interact: true,
            ..InputIntent::NEUTRAL
        };
        run(&mut sim, walk, 4);
        let pedestrian = sim.state().roster.pedestrian();
        assert_eq!((pedestrian.position.x, pedestrian.position.z), (0.0, 0.0));
    }

    #[test]
    fn vehicle_bounces_off_building() {
        let world = WorldDefinition {
            vehicles: vec![VehicleSpawn {
                x: 0.0,
                z: 0.0,
                heading: 0.0,
            }],
            objects: vec![ObjectDef {
                kind: ObjectKind::Building,
                position: [0.0, 2.0, 6.0],
                yaw: 0.0,
                obstacle: Some(ObstacleShapeDef::Cuboid {
                    half_extents: [2.0, 2.0, 2.0],
                }),
            }],
            start_in_vehicle: true,
            ..Default::default()
        };
        let mut sim = start(&world);
        let throttle = InputIntent {
            forward: 1.0,
            ..InputIntent::NEUTRAL
        };

        let mut bounced = false;
        for _ in 0..40 {
            sim.tick(DT, &throttle);
            let hit = sim.drain_events().into_iter().any(|e| {
                matches!(
                    e,
                    SimEvent::Collision {
                        response: CollisionResponse::Bounced,
                        ..
                    }
                )
            });
            if hit {
                bounced = true;
                break;
            }
        }
        assert!(bounced);
        let car = sim.state().possessed_actor().unwrap();
        assert!(car.velocity < 0.0);
        assert!(car.position.z < 6.0 - 2.0 - 2.2);
    }

    #[test]
    fn far_objects_start_disabled() {
        let world = WorldDefinition {
            objects: vec![
                ObjectDef {
                    kind: ObjectKind::Tree,
                    position: [500.0, 0.0, 0.0],
                    yaw: 0.0,
                    obstacle: None,
                },
                ObjectDef {
                    kind: ObjectKind::Ground,
                    position: [500.0, 0.0, 0.0],
                    yaw: 0.0,
                    obstacle: None,
                },
            ],
            ..Default::default()
        };
        let sim = start(&world);
        let objects = &sim.state().objects;
        assert_eq!(objects.get(ObjectId(0)).map(|o| o.is_enabled()), Some(false));
        assert_eq!(objects.get(ObjectId(1)).map(|o| o.is_enabled()), Some(true));
    }

    #[test]
    fn presence_cadence() {
        let mut sim = start(&WorldDefinition::default());
        sim.drain_requests();
        run(&mut sim, InputIntent::NEUTRAL, 40);

        let requests = sim.drain_requests();
        let pushes: Vec<_> = requests
            .iter()
            .filter_map(|r| match &r.request {
                Request::PushPresence(upsert) => Some(upsert.clone()),
                _ => None,
            })
            .collect();
        let pulls = requests
            .iter()
            .filter(|r| r.request == Request::PullPresence)
            .count();

        assert_eq!(pushes.len(), 2);
        assert_eq!(pushes[0].vehicle, VehicleTag::Foot);
        // The first pull is never answered, so no second one is issued.
        assert_eq!(pulls, 1);
    }

    #[test]
    fn pulled_ghosts_surface_as_events() {
        let mut sim = start(&WorldDefinition::default());
        run(&mut sim, InputIntent::NEUTRAL, 1);
        let pull = find(&sim.drain_requests(), |r| *r == Request::PullPresence).unwrap();
        sim.drain_events();

        let bob = PresenceRow {
            user_id: UserId::new("bob"),
            position_x: 4.0,
            position_z: 1.0,
            rotation_y: 0.0,
            vehicle: Some(VehicleTag::Car),
            updated_at: None,
        };
        sim.handle_response(pull.id, Response::PresencePulled(Ok(vec![bob])));
        assert_eq!(
            sim.drain_events(),
            vec![SimEvent::Ghost(GhostChange::Spawned(UserId::new("bob")))]
        );
        assert_eq!(sim.state().presence.ghost_count(), 1);
    }

    #[test]
    fn raid_round_trip() {
        let mut sim = start_with_structures();
        assert_eq!(sim.state().nearby_structure, Some(StructureId(5)));

        let request = sim.request_raid(None).unwrap();
        assert_eq!(sim.request_raid(None), Err(RaidError::AlreadyActive));
        let start_raid =
            find(&sim.drain_requests(), |r| matches!(r, Request::StartRaid(_))).unwrap();
        assert_eq!(start_raid.id, request);
        assert_eq!(
            start_raid.request,
            Request::StartRaid(StartRaidRequest {
                target_structure_id: StructureId(5)
            })
        );

        sim.handle_response(
            request,
            Response::RaidStarted(Ok(StartRaidReply {
                success: true,
                raid_id: Some(RaidId(9)),
                duration_seconds: Some(1),
                message: None,
            })),
        );
        assert!(matches!(sim.state().raid.phase(), RaidPhase::Active { .. }));

        run(&mut sim, InputIntent::NEUTRAL, 30);
        let finish = find(&sim.drain_requests(), |r| matches!(r, Request::FinishRaid(_))).unwrap();
        assert!(matches!(sim.state().raid.phase(), RaidPhase::Resolving { .. }));
        sim.drain_events();

        sim.handle_response(
            finish.id,
            Response::RaidFinished(Ok(FinishRaidReply {
                success: true,
                outcome: Some(RaidOutcome::Failure),
                loot: Some(0),
                message: None,
            })),
        );
        let events = sim.drain_events();
        assert!(events.contains(&SimEvent::Raid(RaidEvent::Settled {
            raid_id: RaidId(9),
            target: StructureId(5),
            outcome: RaidOutcome::Failure,
            loot: 0,
            authoritative: true,
        })));
        assert!(sim.state().raid.is_idle());
        assert!(find(&sim.drain_requests(), |r| *r == Request::FetchStructures).is_some());
    }

    #[test]
    fn raid_rejected_before_sending() {
        let mut sim = start(&WorldDefinition::default());
        assert_eq!(sim.request_raid(None), Err(RaidError::NoTarget));

        let mut sim = start_with_structures();
        assert_eq!(sim.request_raid(Some(StructureId(6))), Err(RaidError::OwnStructure));
        assert_eq!(
            sim.request_raid(Some(StructureId(99))),
            Err(RaidError::UnknownStructure(StructureId(99)))
        );
        assert!(sim.drain_requests().is_empty());
        assert!(sim.state().raid.is_idle());
    }

    #[test]
    fn interact_focuses_structure_and_cancel_clears() {
        let mut sim = start_with_structures();
        run(&mut sim, press(), 1);
        assert_eq!(sim.state().focused_structure, Some(StructureId(5)));
        assert!(sim.drain_events().contains(&SimEvent::StructureFocused(StructureId(5))));

        let cancel = InputIntent {
            cancel: true,
            ..InputIntent::NEUTRAL
        };
        run(&mut sim, cancel, 1);
        assert_eq!(sim.state().focused_structure, None);
        assert!(sim.drain_events().contains(&SimEvent::FocusCleared));
    }

    #[test]
    fn grocery_restores_food() {
        let world = WorldDefinition {
            points_of_interest: vec![PointOfInterest {
                id: "grocery".into(),
                name: "Grocery".into(),
                kind: PoiKind::Grocery,
                position_x: 4.0,
                position_z: 0.0,
                hours: None,
            }],
            ..Default::default()
        };
        let mut sim = start(&world);
        sim.state.needs.food = 10.0;
        run(&mut sim, press(), 1);
        assert!(sim.state().needs.food > 99.9);
        assert!(sim.drain_events().contains(&SimEvent::FoodRestored));
    }

    fn at_fuel_station() -> Simulation {
        let world = WorldDefinition {
            vehicles: vec![VehicleSpawn {
                x: 0.0,
                z: 0.0,
                heading: 0.0,
            }],
            points_of_interest: vec![PointOfInterest {
                id: "gas".into(),
                name: "Gas Station".into(),
                kind: PoiKind::FuelStation,
                position_x: 3.0,
                position_z: 0.0,
                hours: None,
            }],
            start_in_vehicle: true,
            ..Default::default()
        };
        start(&world)
    }

    #[test]
    fn refuels_at_station() {
        let mut sim = at_fuel_station();
        sim.state.needs.fuel = 20.0;

        run(&mut sim, press(), 1);
        assert!(sim.drain_events().contains(&SimEvent::RefuelStarted));

        // Interact is ignored while the pump runs.
        run(&mut sim, InputIntent::NEUTRAL, 1);
        run(&mut sim, press(), 1);
        assert!(!sim.state().mode.is_transitioning());

        run(&mut sim, InputIntent::NEUTRAL, 64);
        assert!(sim.drain_events().contains(&SimEvent::Refueled));
        assert_eq!(sim.state().needs.fuel, 100.0);
        assert!(matches!(sim.state().mode.state(), PossessionState::InVehicle(_)));
    }

    #[test]
    fn full_tank_is_reported() {
        let mut sim = at_fuel_station();
        run(&mut sim, press(), 1);
        let events = sim.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            SimEvent::Notice(Notice {
                level: NoticeLevel::Info,
                ..
            })
        )));
        assert!(!events.contains(&SimEvent::RefuelStarted));
        assert!(!sim.state().mode.is_transitioning());
    }

    fn church_world() -> WorldDefinition {
        WorldDefinition {
            points_of_interest: vec![PointOfInterest {
                id: "church".into(),
                name: "Church".into(),
                kind: PoiKind::Destination {
                    route: "/church".into(),
                },
                position_x: 4.0,
                position_z: 0.0,
                hours: Some(OpeningHours {
                    weekday: 0,
                    open_hour: 8,
                    close_hour: 14,
                }),
            }],
            ..Default::default()
        }
    }

    fn entered(events: &[SimEvent]) -> bool {
        events
            .iter()
            .any(|e| matches!(e, SimEvent::PointOfInterestEntered { .. }))
    }

    #[test]
    fn closed_destination_is_refused() {
        let mut sim = start(&church_world());

        // No local time yet.
        run(&mut sim, press(), 1);
        let events = sim.drain_events();
        assert!(!entered(&events));
        assert!(events.contains(&SimEvent::Notice(Notice {
            level: NoticeLevel::Info,
            message: "Church is closed. Open Sundays 08:00 - 14:00.".to_owned(),
        })));

        run(&mut sim, InputIntent::NEUTRAL, 1);
        sim.set_local_time(LocalTime { weekday: 2, hour: 10 });
        run(&mut sim, press(), 1);
        assert!(!entered(&sim.drain_events()));
    }

    #[test]
    fn open_destination_is_entered() {
        let mut sim = start(&church_world());
        sim.set_local_time(LocalTime { weekday: 0, hour: 9 });
        run(&mut sim, press(), 1);
        let events = sim.drain_events();
        assert!(events.contains(&SimEvent::PointOfInterestEntered {
            id: "church".to_owned(),
            route: "/church".to_owned(),
        }));
        assert!(events.contains(&SimEvent::Notice(Notice {
            level: NoticeLevel::Success,
            message: "Entering Church...".to_owned(),
        })));
    }

    #[test]
    fn closed_station_does_not_pump() {
        let mut sim = at_fuel_station();
        sim.state.points_of_interest[0].hours = Some(OpeningHours {
            weekday: 1,
            open_hour: 6,
            close_hour: 22,
        });
        sim.state.needs.fuel = 20.0;
        sim.set_local_time(LocalTime { weekday: 1, hour: 23 });

        run(&mut sim, press(), 1);
        assert!(!sim.drain_events().contains(&SimEvent::RefuelStarted));
        assert!(!sim.state().refuel.is_armed());
        assert!(matches!(sim.state().mode.state(), PossessionState::InVehicle(_)));
    }

    #[test]
    fn snapshots_are_throttled() {
        let mut sim = start(&world_with_car());
        let rx = sim.subscribe();
        run(&mut sim, InputIntent::NEUTRAL, 2);
        assert_eq!(rx.borrow().tick, 1);
        run(&mut sim, InputIntent::NEUTRAL, 1);
        assert_eq!(rx.borrow().tick, 3);
        assert_eq!(rx.borrow().mode, ModeView::OnFoot);
    }

    #[test]
    fn stray_responses_are_ignored() {
        let mut sim = start(&WorldDefinition::default());
        let fetch = sim.drain_requests().remove(0);

        sim.handle_response(RequestId(999), Response::Structures(Ok(vec![])));
        sim.handle_response(fetch.id, Response::PresencePushed(Ok(())));
        // Already consumed by the mismatched reply.
        let rows = vec![structure_row(1, "x", 0.0, 0.0)];
        sim.handle_response(fetch.id, Response::Structures(Ok(rows)));

        assert!(sim.drain_events().is_empty());
        assert!(sim.state().structures.is_empty());
    }

    #[test]
    fn leave_is_idempotent() {
        let mut sim = start(&world_with_car());
        run(&mut sim, InputIntent::NEUTRAL, 1);
        let pull = find(&sim.drain_requests(), |r| *r == Request::PullPresence).unwrap();
        sim.handle_response(
            pull.id,
            Response::PresencePulled(Ok(vec![PresenceRow {
                user_id: UserId::new("bob"),
                position_x: 1.0,
                position_z: 1.0,
                rotation_y: 0.0,
                vehicle: None,
                updated_at: None,
            }])),
        );
        sim.drain_events();
        let rx = sim.subscribe();

        sim.leave();
        let events = sim.drain_events();
        assert!(events.contains(&SimEvent::Ghost(GhostChange::Disposed(UserId::new("bob")))));
        assert_eq!(events.last(), Some(&SimEvent::SessionEnded));
        assert!(!rx.borrow().running);

        sim.leave();
        assert!(sim.drain_events().is_empty());

        let tick = sim.state().tick;
        run(&mut sim, press(), 5);
        assert_eq!(sim.state().tick, tick);
        assert!(sim.drain_requests().is_empty());
        assert_eq!(sim.request_raid(None), Err(RaidError::SessionEnded));
    }
}
