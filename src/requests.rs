/// ----- REQUEST COLLECTION -----
/// Pending calls for a single car: a set of cab destinations and a sparse
/// map of hall buttons per floor. The SCAN discipline lives here; the car
/// control loop only asks for the next target and whether to stop.
use std::collections::{BTreeMap, BTreeSet};
use std::error;
use std::fmt;
use std::ops::Bound::{Excluded, Unbounded};

use crate::call::{Call, Direction};

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HallButtons {
    pub up: bool,
    pub down: bool,
}

impl HallButtons {
    pub fn any(self) -> bool {
        self.up || self.down
    }

    fn pressed(self, direction: Direction) -> bool {
        match direction {
            Direction::Up => self.up,
            Direction::Down => self.down,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy)]
pub struct Request {
    pub floor: u8,
    pub call: Call,
    pub submitted_at: u64,
    pub emergency: bool,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default)]
pub struct RequestCollection {
    internal_calls: BTreeSet<u8>,
    hall_calls: BTreeMap<u8, HallButtons>,
}

impl RequestCollection {
    pub fn new() -> Self {
        RequestCollection::default()
    }

    /// Inserts a cab destination. Returns false when the button was
    /// already pressed.
    pub fn add_internal(&mut self, floor: u8) -> bool {
        self.internal_calls.insert(floor)
    }

    /// Presses one hall button. Returns false when the bit was already set.
    pub fn add_hall(&mut self, floor: u8, direction: Direction) -> bool {
        let buttons = self.hall_calls.entry(floor).or_default();
        match direction {
            Direction::Up => !std::mem::replace(&mut buttons.up, true),
            Direction::Down => !std::mem::replace(&mut buttons.down, true),
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.internal_calls.is_empty() || !self.hall_calls.is_empty()
    }

    pub fn internal_calls(&self) -> &BTreeSet<u8> {
        &self.internal_calls
    }

    pub fn hall_calls(&self) -> &BTreeMap<u8, HallButtons> {
        &self.hall_calls
    }

    /// Next floor the car should head for. Cab destinations in the sweep
    /// direction win; with none ahead the lowest cab destination is taken.
    /// Hall calls are only consulted when no cab destination is pending:
    /// first the nearest one reachable without reversing against the
    /// waiter, then the nearest one outright. Ties go to the lowest floor.
    pub fn next_target(&self, floor: u8, sweep: Direction) -> Option<u8> {
        if !self.internal_calls.is_empty() {
            let ahead = match sweep {
                Direction::Up => self
                    .internal_calls
                    .range((Excluded(floor), Unbounded))
                    .next()
                    .copied(),
                Direction::Down => self.internal_calls.range(..floor).next_back().copied(),
            };
            return ahead.or_else(|| self.internal_calls.iter().next().copied());
        }

        let mut closest: Option<u8> = None;
        let mut min_distance = u8::MAX;
        for (&f, buttons) in &self.hall_calls {
            if (buttons.up && f >= floor) || (buttons.down && f <= floor) {
                let distance = floor.abs_diff(f);
                if distance < min_distance {
                    min_distance = distance;
                    closest = Some(f);
                }
            }
        }
        if closest.is_some() {
            return closest;
        }

        for (&f, buttons) in &self.hall_calls {
            if buttons.any() {
                let distance = floor.abs_diff(f);
                if distance < min_distance {
                    min_distance = distance;
                    closest = Some(f);
                }
            }
        }
        closest
    }

    /// Whether a car passing `floor` should stop there. `direction` is the
    /// travel direction, or None when the car is standing still; hall
    /// buttons pointing against the travel direction are left for the
    /// return sweep.
    pub fn should_stop(&self, floor: u8, direction: Option<Direction>) -> bool {
        if self.internal_calls.contains(&floor) {
            return true;
        }
        match (self.hall_calls.get(&floor), direction) {
            (Some(buttons), Some(direction)) => buttons.pressed(direction),
            (Some(buttons), None) => buttons.any(),
            (None, _) => false,
        }
    }

    /// Clears the requests a stop at `floor` has served: the cab
    /// destination, and the hall bit matching the travel direction (both
    /// bits when the car was standing still). Floors with no pressed bit
    /// left are dropped from the map.
    pub fn clear_at(&mut self, floor: u8, direction: Option<Direction>) {
        self.internal_calls.remove(&floor);
        if let Some(buttons) = self.hall_calls.get_mut(&floor) {
            match direction {
                Some(Direction::Up) => buttons.up = false,
                Some(Direction::Down) => buttons.down = false,
                None => *buttons = HallButtons::default(),
            }
            if !buttons.any() {
                self.hall_calls.remove(&floor);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    InvalidFloor(u8),
    InMaintenance,
    UnknownCar(u8),
    NoCarAvailable,
    Shutdown,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RequestError::InvalidFloor(floor) => write!(f, "invalid floor {}", floor),
            RequestError::InMaintenance => write!(f, "car is in maintenance mode"),
            RequestError::UnknownCar(id) => write!(f, "unknown car {}", id),
            RequestError::NoCarAvailable => write!(f, "no serviceable car available"),
            RequestError::Shutdown => write!(f, "system is shut down"),
        }
    }
}

impl error::Error for RequestError {}
