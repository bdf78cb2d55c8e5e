//! Fixed points of interest (fuel stations, shops, route destinations).

use serde::{Deserialize, Serialize};

use crate::actor::planar_distance;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PoiKind {
    /// Vehicles are refueled here.
    FuelStation,
    /// Restores food.
    Grocery,
    /// A named place; `route` is an opaque host-side link.
    Destination { route: String },
}

/// Host-supplied local wall-clock time, coarse to the hour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalTime {
    /// 0 = Sunday.
    pub weekday: u8,
    /// 0..24.
    pub hour: u8,
}

/// Weekly opening window: `weekday`, from `open_hour` up to (not including) `close_hour`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningHours {
    pub weekday: u8,
    pub open_hour: u8,
    pub close_hour: u8,
}

impl OpeningHours {
    pub fn is_open(&self, at: LocalTime) -> bool {
        at.weekday == self.weekday && (self.open_hour..self.close_hour).contains(&at.hour)
    }

    pub fn describe(&self) -> String {
        const DAYS: [&str; 7] = [
            "Sundays",
            "Mondays",
            "Tuesdays",
            "Wednesdays",
            "Thursdays",
            "Fridays",
            "Saturdays",
        ];
        let day = DAYS.get(usize::from(self.weekday)).copied().unwrap_or("weekly");
        format!("Open {day} {:02}:00 - {:02}:00.", self.open_hour, self.close_hour)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub id: String,
    pub name: String,
    pub kind: PoiKind,
    pub position_x: f32,
    pub position_z: f32,
    /// `None` means always open.
    #[serde(default)]
    pub hours: Option<OpeningHours>,
}

impl PointOfInterest {
    pub fn distance_to(&self, x: f32, z: f32) -> f32 {
        planar_distance(self.position_x, self.position_z, x, z)
    }

    /// Scheduled places count as closed until the host reports a local time.
    pub fn is_open(&self, at: Option<LocalTime>) -> bool {
        match (self.hours, at) {
            (None, _) => true,
            (Some(hours), Some(at)) => hours.is_open(at),
            (Some(_), None) => false,
        }
    }
}

/// Nearest point within `radius` (inclusive). Ties keep the earliest entry.
pub fn nearest_within(
    pois: &[PointOfInterest],
    x: f32,
    z: f32,
    radius: f32,
) -> Option<(usize, f32)> {
    pois.iter()
        .enumerate()
        .map(|(index, poi)| (index, poi.distance_to(x, z)))
        .filter(|(_, d)| *d <= radius)
        .fold(None, |best: Option<(usize, f32)>, (index, d)| match best {
            Some((_, best_d)) if best_d <= d => best,
            _ => Some((index, d)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poi(id: &str, kind: PoiKind, x: f32, z: f32) -> PointOfInterest {
        PointOfInterest {
            id: id.to_owned(),
            name: id.to_uppercase(),
            kind,
            position_x: x,
            position_z: z,
            hours: None,
        }
    }

    #[test]
    fn picks_nearest_in_radius() {
        let pois = [
            poi("gas", PoiKind::FuelStation, 8.0, 0.0),
            poi("shop", PoiKind::Grocery, 0.0, 4.0),
            poi("far", PoiKind::Grocery, 50.0, 0.0),
        ];
        assert_eq!(nearest_within(&pois, 0.0, 0.0, 10.0).map(|(i, _)| i), Some(1));
        assert_eq!(nearest_within(&pois, 30.0, 0.0, 10.0), None);
    }

    #[test]
    fn kind_json_is_tagged() {
        let json = r#"{ "id": "park", "name": "Troll Park",
                        "kind": { "type": "destination", "route": "/park" },
                        "position_x": 1.0, "position_z": 2.0 }"#;
        let parsed: PointOfInterest = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.kind,
            PoiKind::Destination {
                route: "/park".to_owned()
            }
        );

        let gas: PoiKind = serde_json::from_str(r#"{ "type": "fuel_station" }"#).unwrap();
        assert_eq!(gas, PoiKind::FuelStation);
        assert_eq!(parsed.hours, None);
    }

    #[test]
    fn church_hours() {
        let mut church = poi(
            "church",
            PoiKind::Destination {
                route: "/church".to_owned(),
            },
            0.0,
            0.0,
        );
        church.hours = Some(OpeningHours {
            weekday: 0,
            open_hour: 8,
            close_hour: 14,
        });

        let at = |weekday, hour| Some(LocalTime { weekday, hour });
        assert!(church.is_open(at(0, 8)));
        assert!(church.is_open(at(0, 13)));
        assert!(!church.is_open(at(0, 14)));
        assert!(!church.is_open(at(0, 7)));
        assert!(!church.is_open(at(3, 10)));
        assert!(!church.is_open(None));
        assert_eq!(
            church.hours.map(|h| h.describe()),
            Some("Open Sundays 08:00 - 14:00.".to_owned())
        );

        church.hours = None;
        assert!(church.is_open(None));
    }
}
