use town_shared::presence::VehicleTag;

/// How a player is currently moving, as stored in `presence`.
#[derive(spacetimedb::SpacetimeType, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbVehicle {
    Car,
    Foot,
}

impl From<VehicleTag> for DbVehicle {
    fn from(tag: VehicleTag) -> Self {
        match tag {
            VehicleTag::Car => DbVehicle::Car,
            VehicleTag::Foot => DbVehicle::Foot,
        }
    }
}

impl From<DbVehicle> for VehicleTag {
    fn from(v: DbVehicle) -> Self {
        match v {
            DbVehicle::Car => VehicleTag::Car,
            DbVehicle::Foot => VehicleTag::Foot,
        }
    }
}
