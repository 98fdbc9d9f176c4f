/// ----- DISPATCHER -----
/// Owns the car fleet and routes every incoming request. Emergencies are
/// broadcast to all cars; everything else goes to the car with the lowest
/// score. Scoring works on per-car snapshots, so a single car is always
/// seen consistently even though the fleet as a whole may be observed
/// mid-motion.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use crate::call::{Call, Direction};
use crate::car::{Car, CarState, CarStats, CarView};
use crate::clock::Clock;
use crate::config::{SystemConfig, Timing};
use crate::logging::Event;
use crate::passenger::{PassengerOracle, RandomPassengers};
use crate::requests::{Request, RequestError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Assigned(u8),
    Broadcast,
}

pub struct Dispatcher {
    cars: Vec<Arc<Car>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
    max_floors: u8,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    pub fn new(
        config: &SystemConfig,
        timing: Timing,
        clock: Arc<dyn Clock>,
        event_tx: Sender<Event>,
    ) -> Self {
        let cars = (1..=config.num_cars)
            .map(|id| {
                Arc::new(Car::new(
                    id,
                    config.max_floors,
                    config.capacity,
                    timing.clone(),
                    Arc::clone(&clock),
                    event_tx.clone(),
                ))
            })
            .collect();
        Dispatcher {
            cars,
            handles: Mutex::new(Vec::new()),
            running: AtomicBool::new(true),
            max_floors: config.max_floors,
            clock,
        }
    }

    pub fn start(&self) {
        self.start_with(|_| Box::new(RandomPassengers));
    }

    /// Starts every car's control loop with its own passenger oracle.
    pub fn start_with<F>(&self, mut oracle_for: F)
    where
        F: FnMut(u8) -> Box<dyn PassengerOracle>,
    {
        let mut handles = self.handles.lock();
        for car in &self.cars {
            handles.push(Arc::clone(car).start(oracle_for(car.id())));
        }
    }

    pub fn submit(
        &self,
        floor: u8,
        call: Call,
        emergency: bool,
        preferred_car: Option<u8>,
    ) -> Result<Assignment, RequestError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(RequestError::Shutdown);
        }
        if floor < 1 || floor > self.max_floors {
            return Err(RequestError::InvalidFloor(floor));
        }

        if emergency {
            for car in &self.cars {
                car.trigger_emergency();
            }
            return Ok(Assignment::Broadcast);
        }

        let request = Request {
            floor,
            call,
            submitted_at: self.clock.now(),
            emergency: false,
        };

        if let Some(id) = preferred_car {
            let car = self.car(id)?;
            car.enqueue(request)?;
            return Ok(Assignment::Assigned(id));
        }

        // A worker that died from an internal fault leaves its handle
        // finished while the system is still running; such a car is no
        // longer serviceable and must not win the scoring.
        let dead: Vec<bool> = {
            let handles = self.handles.lock();
            (0..self.cars.len())
                .map(|i| handles.get(i).map_or(false, |handle| handle.is_finished()))
                .collect()
        };

        let mut best: Option<(i64, &Arc<Car>)> = None;
        for (car, is_dead) in self.cars.iter().zip(&dead) {
            if *is_dead {
                continue;
            }
            let cost = score(&car.snapshot(), floor, call);
            if best.map_or(true, |(best_cost, _)| cost < best_cost) {
                best = Some((cost, car));
            }
        }
        let (_, car) = best.ok_or(RequestError::NoCarAvailable)?;
        car.enqueue(request)?;
        Ok(Assignment::Assigned(car.id()))
    }

    pub fn clear_emergency(&self, car_id: u8) -> Result<(), RequestError> {
        self.car(car_id)?.clear_emergency();
        Ok(())
    }

    pub fn set_maintenance(&self, car_id: u8, on: bool) -> Result<(), RequestError> {
        self.car(car_id)?.set_maintenance(on);
        Ok(())
    }

    pub fn snapshot_all(&self) -> Vec<CarView> {
        self.cars.iter().map(|car| car.snapshot()).collect()
    }

    pub fn stats_all(&self) -> Vec<CarStats> {
        self.cars.iter().map(|car| car.stats()).collect()
    }

    pub fn stats(&self, car_id: u8) -> Result<CarStats, RequestError> {
        Ok(self.car(car_id)?.stats())
    }

    /// Stops every car and joins the workers. Idempotent.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            for car in &self.cars {
                car.stop();
            }
            for handle in self.handles.lock().drain(..) {
                handle.join().ok();
            }
        }
    }

    fn car(&self, id: u8) -> Result<&Arc<Car>, RequestError> {
        self.cars
            .iter()
            .find(|car| car.id() == id)
            .ok_or(RequestError::UnknownCar(id))
    }
}

/// Cost of sending this car to `target_floor`. Lower is better; latched
/// cars are never chosen. Distance plus three biases: travel direction
/// relative to the target (approaching −10, receding +10, idle −5, doors
/// open scored by the direction that led into the stop), load as tenths
/// of capacity, and +5 when a hall call points against the car's travel.
pub fn score(view: &CarView, target_floor: u8, call: Call) -> i64 {
    if view.emergency || view.maintenance {
        return i64::MAX;
    }

    let distance = i64::from(view.current_floor.abs_diff(target_floor));

    let heading = match view.state {
        CarState::MovingUp => Some(Direction::Up),
        CarState::MovingDown => Some(Direction::Down),
        CarState::DoorsOpen => Some(view.direction),
        _ => None,
    };
    let direction_bias = match heading {
        Some(Direction::Up) => {
            if view.current_floor <= target_floor {
                -10
            } else {
                10
            }
        }
        Some(Direction::Down) => {
            if view.current_floor >= target_floor {
                -10
            } else {
                10
            }
        }
        None => {
            if view.state == CarState::Idle {
                -5
            } else {
                0
            }
        }
    };

    let load_bias = i64::from(view.passengers) * 10 / i64::from(view.capacity);

    let kind_mismatch_bias = match (call, view.state) {
        (Call::HallUp, CarState::MovingDown) | (Call::HallDown, CarState::MovingUp) => 5,
        _ => 0,
    };

    distance + direction_bias + load_bias + kind_mismatch_bias
}
