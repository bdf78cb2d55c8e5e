//! Read-only HUD view of the simulation, published over a `tokio::sync::watch`
//! channel. Receivers always see the latest snapshot; intermediate ones are
//! dropped.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use crate::{ids::StructureId, timer::IntervalTimer};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeView {
    OnFoot,
    Entering,
    Exiting,
    InVehicle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum RaidView {
    Idle,
    Requesting,
    Active { remaining_seconds: u32 },
    Resolving,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Compass {
    N,
    E,
    S,
    W,
}

impl Compass {
    /// Nearest cardinal direction; 0° faces +Z (north), 90° faces +X (east).
    pub fn from_degrees(degrees: f32) -> Self {
        let sector = ((degrees.rem_euclid(360.0) + 45.0) / 90.0).floor() as i32 % 4;
        match sector {
            0 => Compass::N,
            1 => Compass::E,
            2 => Compass::S,
            _ => Compass::W,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Compass::N => 'N',
            Compass::E => 'E',
            Compass::S => 'S',
            Compass::W => 'W',
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HudSnapshot {
    pub tick: u64,
    pub running: bool,
    pub mode: ModeView,
    pub position: [f32; 3],
    pub speed_kmh: f32,
    pub heading_degrees: f32,
    pub compass: Compass,
    pub fuel: f32,
    pub food: f32,
    pub refueling: bool,
    pub raid: RaidView,
    /// Nearest structure in range, if any.
    pub nearby_structure: Option<StructureId>,
    /// Structure whose panel was opened with interact.
    pub focused_structure: Option<StructureId>,
    pub nearby_poi: Option<String>,
    pub ghost_count: usize,
}

impl Default for HudSnapshot {
    fn default() -> Self {
        Self {
            tick: 0,
            running: true,
            mode: ModeView::OnFoot,
            position: [0.0; 3],
            speed_kmh: 0.0,
            heading_degrees: 0.0,
            compass: Compass::N,
            fuel: 0.0,
            food: 0.0,
            refueling: false,
            raid: RaidView::Idle,
            nearby_structure: None,
            focused_structure: None,
            nearby_poi: None,
            ghost_count: 0,
        }
    }
}

/// Throttled sender side of the HUD channel.
#[derive(Debug)]
pub struct SnapshotPublisher {
    tx: watch::Sender<HudSnapshot>,
    timer: IntervalTimer,
}

impl SnapshotPublisher {
    pub fn new(initial: HudSnapshot, interval: Duration, now: Duration) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            tx,
            timer: IntervalTimer::new(interval, now),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<HudSnapshot> {
        self.tx.subscribe()
    }

    /// `true` if a snapshot is due this tick.
    pub fn is_due(&mut self, now: Duration) -> bool {
        self.timer.poll(now)
    }

    /// Publishes unconditionally. Works with or without live receivers.
    pub fn publish(&self, snapshot: HudSnapshot) {
        self.tx.send_replace(snapshot);
    }

    pub fn stop(&mut self) {
        self.timer.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compass_sectors() {
        assert_eq!(Compass::from_degrees(0.0), Compass::N);
        assert_eq!(Compass::from_degrees(44.0), Compass::N);
        assert_eq!(Compass::from_degrees(46.0), Compass::E);
        assert_eq!(Compass::from_degrees(180.0), Compass::S);
        assert_eq!(Compass::from_degrees(270.0), Compass::W);
        assert_eq!(Compass::from_degrees(350.0), Compass::N);
        assert_eq!(Compass::from_degrees(-90.0).letter(), 'W');
    }

    #[test]
    fn receivers_see_latest() {
        let publisher = SnapshotPublisher::new(
            HudSnapshot::default(),
            Duration::from_millis(100),
            Duration::ZERO,
        );
        let mut rx = publisher.subscribe();

        publisher.publish(HudSnapshot {
            tick: 1,
            ..Default::default()
        });
        publisher.publish(HudSnapshot {
            tick: 2,
            ..Default::default()
        });

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().tick, 2);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn publishing_without_receivers_is_fine() {
        let publisher = SnapshotPublisher::new(
            HudSnapshot::default(),
            Duration::from_millis(100),
            Duration::ZERO,
        );
        publisher.publish(HudSnapshot {
            tick: 9,
            ..Default::default()
        });
        assert_eq!(publisher.subscribe().borrow().tick, 9);
    }
}
