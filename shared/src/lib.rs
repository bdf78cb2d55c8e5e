pub mod actor;
pub mod chunk;
pub mod collision;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod input;
pub mod motion;
pub mod needs;
pub mod poi;
pub mod possession;
pub mod presence;
pub mod raid;
pub mod simulation;
pub mod snapshot;
pub mod structure;
pub mod timer;
pub mod world;

pub use actor::{Actor, ActorKind, Roster};
pub use config::SimConfig;
pub use error::{ConfigError, GeometryError, RaidError, TransportError};
pub use ids::{ActorId, ObjectId, RaidId, RequestId, StructureId, UserId};
pub use input::{GamepadState, InputAdapter, InputIntent, KeyboardState};
pub use poi::{LocalTime, OpeningHours, PoiKind, PointOfInterest};
pub use possession::{PossessionEvent, PossessionState};
pub use presence::{PresenceRow, PresenceUpsert, VehicleTag};
pub use raid::{FinishRaidReply, FinishRaidRequest, RaidOutcome, StartRaidReply, StartRaidRequest};
pub use simulation::{Notice, NoticeLevel, OutboundRequest, Request, Response, SimEvent, Simulation};
pub use snapshot::HudSnapshot;
pub use structure::StructureRow;
pub use world::WorldDefinition;
