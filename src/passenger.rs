use std::collections::VecDeque;

use rand::Rng;

use crate::car::CarState;

/// Decides how many passengers board and alight when the doors open.
/// Injected per car so tests can script the exchange; real hardware would
/// replace this with load-cell readings.
pub trait PassengerOracle: Send {
    /// Returns `(boarding, alighting)` for a door opening at `floor`.
    /// The car clamps both values against its capacity afterwards.
    fn exchange(&mut self, floor: u8, state: CarState, passengers: u8, capacity: u8) -> (u8, u8);
}

/// Uniform random passenger flow, up to 5 people each way per stop.
pub struct RandomPassengers;

impl PassengerOracle for RandomPassengers {
    fn exchange(&mut self, _floor: u8, _state: CarState, passengers: u8, _capacity: u8) -> (u8, u8) {
        let mut rng = rand::rng();
        let boarding = rng.random_range(0..=5);
        let alighting = rng.random_range(0..=passengers.min(5));
        (boarding, alighting)
    }
}

/// Scripted exchange sequence, `(0, 0)` once the script runs out.
pub struct FixedPassengers {
    exchanges: VecDeque<(u8, u8)>,
}

impl FixedPassengers {
    pub fn new(exchanges: &[(u8, u8)]) -> Self {
        FixedPassengers {
            exchanges: exchanges.iter().copied().collect(),
        }
    }
}

impl PassengerOracle for FixedPassengers {
    fn exchange(&mut self, _floor: u8, _state: CarState, _passengers: u8, _capacity: u8) -> (u8, u8) {
        self.exchanges.pop_front().unwrap_or((0, 0))
    }
}
