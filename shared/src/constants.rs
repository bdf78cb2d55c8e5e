use std::time::Duration;

/// Upper bound on a single simulation step, in seconds.
///
/// Frame hitches (tab switches, GC pauses on the host) must not teleport actors
/// through obstacles, so every tick integrates at most this much time.
pub const MAX_TICK_DT_S: f32 = 0.05;

// ---------------------------------------------------------------------------
// Vehicle handling
// ---------------------------------------------------------------------------

/// Forward speed limit in world units per second (unboosted).
pub const VEHICLE_MAX_SPEED: f32 = 40.0;

/// Throttle acceleration in units/s².
pub const VEHICLE_ACCELERATION: f32 = 18.0;

/// Deceleration applied by the brake and by counter-throttle, in units/s².
pub const VEHICLE_BRAKE_FORCE: f32 = 40.0;

/// Passive rolling friction when no throttle is applied, in units/s².
pub const VEHICLE_FRICTION: f32 = 6.0;

/// Multiplier on acceleration and on the speed limit while boosting.
pub const VEHICLE_BOOST_FACTOR: f32 = 1.6;

/// Yaw rate at full steering authority, in radians per second.
pub const VEHICLE_TURN_RATE: f32 = 1.6;

/// Speed below which throttle in the opposite direction accelerates instead of braking.
pub const VEHICLE_REVERSE_DEADBAND: f32 = 0.5;

/// Reverse speed limit as a fraction of [`VEHICLE_MAX_SPEED`].
pub const VEHICLE_REVERSE_RATIO: f32 = 1.0;

/// Below this speed the vehicle cannot turn.
pub const VEHICLE_MIN_STEER_SPEED: f32 = 0.1;

/// Speed at which steering reaches full authority.
pub const VEHICLE_FULL_STEER_SPEED: f32 = 10.0;

/// Brake effectiveness while steering (handbrake drift).
pub const DRIFT_BRAKE_ATTENUATION: f32 = 0.5;

/// Proportional drag per second applied when the tank is empty.
pub const OUT_OF_FUEL_DRAG_PER_S: f32 = 3.0;

/// Speeds below this are snapped to zero when coasting on an empty tank.
pub const STOP_SPEED_EPS: f32 = 0.1;

// ---------------------------------------------------------------------------
// Pedestrian
// ---------------------------------------------------------------------------

pub const WALK_SPEED: f32 = 10.0;
pub const WALK_TURN_RATE: f32 = 2.4;

/// Downward bias applied every tick to keep the pedestrian glued to the floor.
pub const GROUNDING_BIAS_MPS: f32 = 9.81;

/// Walk speed multiplier once food has run out.
pub const HUNGRY_SPEED_FACTOR: f32 = 0.5;

// ---------------------------------------------------------------------------
// Collision
// ---------------------------------------------------------------------------

/// Minimum grounded height of the pedestrian's center.
pub const PEDESTRIAN_FLOOR_Y: f32 = 0.9;

/// Minimum grounded height of a vehicle's center.
pub const VEHICLE_RIDE_HEIGHT: f32 = 0.5;

/// Fraction of speed kept (and reversed) when a vehicle hits an obstacle.
pub const BOUNCE_RESTITUTION: f32 = 0.5;

/// Fraction of the blocked move kept on each axis when a pedestrian slides along a wall.
pub const SLIDE_FACTOR: f32 = 0.7;

/// Pedestrian capsule: total height 1.8 = 2 * (half_height + radius).
pub const PEDESTRIAN_RADIUS: f32 = 0.4;
pub const PEDESTRIAN_HALF_HEIGHT: f32 = 0.5;

/// Vehicle body half extents (x = width, y = height, z = length).
pub const VEHICLE_HALF_EXTENTS: [f32; 3] = [1.0, 0.5, 2.2];

// ---------------------------------------------------------------------------
// Possession
// ---------------------------------------------------------------------------

/// A vehicle must be strictly closer than this (planar) to be entered.
pub const ENTRY_RADIUS: f32 = 3.5;

/// Door animation time for entering and exiting a vehicle.
pub const TRANSITION_DELAY: Duration = Duration::from_millis(600);

/// Lateral distance from the vehicle center at which the pedestrian is placed on exit.
pub const EXIT_OFFSET: f32 = 2.5;

// ---------------------------------------------------------------------------
// Visibility chunks
// ---------------------------------------------------------------------------

/// Side length of one square visibility chunk in world units.
pub const CHUNK_SIZE: f32 = 120.0;

/// Chunks within this Chebyshev distance of the actor's chunk stay enabled.
pub const CHUNK_ACTIVATION_RADIUS: i32 = 1;

// ---------------------------------------------------------------------------
// Presence sync
// ---------------------------------------------------------------------------

/// How often the local transform is pushed to the presence table.
pub const PRESENCE_PUSH_INTERVAL: Duration = Duration::from_millis(1000);

/// How often remote presence rows are pulled.
pub const PRESENCE_PULL_INTERVAL: Duration = Duration::from_millis(2000);

/// Outstanding host requests older than this are answered locally with a timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// How often a HUD snapshot is published (10 Hz).
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Raids
// ---------------------------------------------------------------------------

pub const RAID_ATTACK_POWER: f64 = 1.2;

/// Defense assumed for structures that do not report one.
pub const DEFAULT_DEFENSE_RATING: f64 = 1.0;

/// A structure must be within this planar distance to be raided or focused.
pub const RAID_RANGE: f32 = 5.0;

/// Used when the start response omits `duration_seconds`.
pub const DEFAULT_RAID_DURATION_S: u32 = 30;

/// Slack after the raid timer expires before the client resolves it.
pub const RAID_RESOLVE_GRACE: Duration = Duration::from_millis(200);

pub const RAID_LOOT_MIN: u32 = 10;
pub const RAID_LOOT_MAX: u32 = 50;

pub const MIN_SUCCESS_CHANCE: f64 = 0.01;
pub const MAX_SUCCESS_CHANCE: f64 = 0.99;

/// Server-side wait between two raids by the same attacker.
pub const RAID_COOLDOWN_S: u32 = 300;

// ---------------------------------------------------------------------------
// Needs and points of interest
// ---------------------------------------------------------------------------

/// Upper bound of both fuel and food.
pub const NEEDS_MAX: f32 = 100.0;

/// Food lost per second.
pub const FOOD_DECAY_PER_S: f32 = 0.05;

/// Fuel burned per second at full speed.
pub const FUEL_CONSUMPTION: f32 = 0.05;

pub const REFUEL_DURATION: Duration = Duration::from_secs(3);

/// Points of interest within this planar distance are "nearby".
pub const POI_RADIUS: f32 = 10.0;

/// Meters per second to kilometers per hour.
pub const MPS_TO_KMH: f32 = 3.6;
