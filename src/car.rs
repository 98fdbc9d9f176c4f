/// ----- CAR MODULE -----
/// One elevator car. A dedicated worker thread runs the control loop and
/// is the only writer of the car's state; producers reach the car through
/// the handle methods, which take the car's lock, update the request
/// collections and wake the loop. Emergency, maintenance and shutdown are
/// control-plane latches the loop polls between ticks.
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use parking_lot::{Condvar, Mutex};

use crate::call::{Call, Direction};
use crate::clock::Clock;
use crate::config::Timing;
use crate::logging::Event;
use crate::passenger::PassengerOracle;
use crate::requests::{HallButtons, Request, RequestCollection, RequestError};

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarState {
    Idle,
    MovingUp,
    MovingDown,
    DoorsOpen,
    EmergencyStopped,
    Maintenance,
}

impl CarState {
    pub fn as_str(self) -> &'static str {
        match self {
            CarState::Idle => "idle",
            CarState::MovingUp => "moving up",
            CarState::MovingDown => "moving down",
            CarState::DoorsOpen => "doors open",
            CarState::EmergencyStopped => "emergency stop",
            CarState::Maintenance => "maintenance",
        }
    }

    fn direction(self) -> Option<Direction> {
        match self {
            CarState::MovingUp => Some(Direction::Up),
            CarState::MovingDown => Some(Direction::Down),
            _ => None,
        }
    }
}

/// Consistent read-only copy of one car, taken under the car's lock.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CarView {
    pub id: u8,
    pub current_floor: u8,
    pub state: CarState,
    pub direction: Direction,
    pub passengers: u8,
    pub capacity: u8,
    pub doors_open: bool,
    pub overloaded: bool,
    pub internal_calls: BTreeSet<u8>,
    pub hall_calls: BTreeMap<u8, HallButtons>,
    pub emergency: bool,
    pub maintenance: bool,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct CarStats {
    pub id: u8,
    pub total_stops: u32,
    pub total_floors_traveled: u32,
    pub started_at: u64,
    pub last_maintenance_at: u64,
}

struct CarInner {
    current_floor: u8,
    state: CarState,
    direction: Direction,
    passengers: u8,
    doors_open: bool,
    overloaded: bool,
    requests: RequestCollection,
    stats: CarStats,
}

pub struct Car {
    id: u8,
    max_floors: u8,
    capacity: u8,
    timing: Timing,
    inner: Mutex<CarInner>,
    wakeup: Condvar,
    running: AtomicBool,
    emergency: AtomicBool,
    maintenance: AtomicBool,
    clock: Arc<dyn Clock>,
    event_tx: Sender<Event>,
}

impl Car {
    pub fn new(
        id: u8,
        max_floors: u8,
        capacity: u8,
        timing: Timing,
        clock: Arc<dyn Clock>,
        event_tx: Sender<Event>,
    ) -> Self {
        let now = clock.now();
        Car {
            id,
            max_floors,
            capacity,
            timing,
            inner: Mutex::new(CarInner {
                current_floor: 1,
                state: CarState::Idle,
                direction: Direction::Up,
                passengers: 0,
                doors_open: false,
                overloaded: false,
                requests: RequestCollection::new(),
                stats: CarStats {
                    id,
                    total_stops: 0,
                    total_floors_traveled: 0,
                    started_at: now,
                    last_maintenance_at: now,
                },
            }),
            wakeup: Condvar::new(),
            running: AtomicBool::new(true),
            emergency: AtomicBool::new(false),
            maintenance: AtomicBool::new(false),
            clock,
            event_tx,
        }
    }

    pub fn start(self: Arc<Self>, oracle: Box<dyn PassengerOracle>) -> JoinHandle<()> {
        thread::spawn(move || self.control(oracle))
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn enqueue(&self, request: Request) -> Result<(), RequestError> {
        if request.floor < 1 || request.floor > self.max_floors {
            return Err(RequestError::InvalidFloor(request.floor));
        }
        if !self.running.load(Ordering::SeqCst) {
            return Err(RequestError::Shutdown);
        }
        if self.maintenance.load(Ordering::SeqCst) && !request.emergency {
            return Err(RequestError::InMaintenance);
        }
        if request.emergency {
            self.trigger_emergency();
            return Ok(());
        }

        let accepted = {
            let mut inner = self.inner.lock();
            match request.call {
                Call::Cab => inner.requests.add_internal(request.floor),
                Call::HallUp => inner.requests.add_hall(request.floor, Direction::Up),
                Call::HallDown => inner.requests.add_hall(request.floor, Direction::Down),
            }
        };
        if accepted {
            self.emit(format!(
                "received {} request for floor {}",
                request.call.as_str(),
                request.floor
            ));
        }
        self.wakeup.notify_one();
        Ok(())
    }

    // The latch setters below take the car's lock around the store even
    // though the flags are atomics: the control loop reads them between
    // locking `inner` and parking on the condvar, so an unserialized
    // store + notify could land in that window and be lost.

    pub fn trigger_emergency(&self) {
        let newly_set = {
            let _inner = self.inner.lock();
            !self.emergency.swap(true, Ordering::SeqCst)
        };
        if newly_set {
            self.emit(String::from("emergency stop requested"));
        }
        self.wakeup.notify_one();
    }

    pub fn clear_emergency(&self) {
        {
            let _inner = self.inner.lock();
            self.emergency.store(false, Ordering::SeqCst);
        }
        self.wakeup.notify_one();
    }

    pub fn set_maintenance(&self, on: bool) {
        {
            let _inner = self.inner.lock();
            self.maintenance.store(on, Ordering::SeqCst);
        }
        self.wakeup.notify_one();
    }

    pub fn stop(&self) {
        {
            let _inner = self.inner.lock();
            self.running.store(false, Ordering::SeqCst);
        }
        self.wakeup.notify_one();
    }

    pub fn snapshot(&self) -> CarView {
        let inner = self.inner.lock();
        CarView {
            id: self.id,
            current_floor: inner.current_floor,
            state: inner.state,
            direction: inner.direction,
            passengers: inner.passengers,
            capacity: self.capacity,
            doors_open: inner.doors_open,
            overloaded: inner.overloaded,
            internal_calls: inner.requests.internal_calls().clone(),
            hall_calls: inner.requests.hall_calls().clone(),
            emergency: self.emergency.load(Ordering::SeqCst),
            maintenance: self.maintenance.load(Ordering::SeqCst),
        }
    }

    pub fn stats(&self) -> CarStats {
        self.inner.lock().stats
    }

    fn emit(&self, message: String) {
        self.event_tx
            .send(Event {
                timestamp: self.clock.now(),
                car_id: self.id,
                message,
            })
            .ok();
    }

    fn control(&self, mut oracle: Box<dyn PassengerOracle>) {
        while self.running.load(Ordering::SeqCst) {
            if self.emergency.load(Ordering::SeqCst) {
                self.handle_emergency();
                continue;
            }
            if self.maintenance.load(Ordering::SeqCst) {
                self.handle_maintenance();
                continue;
            }

            {
                let mut inner = self.inner.lock();
                while !inner.requests.has_pending()
                    && self.running.load(Ordering::SeqCst)
                    && !self.emergency.load(Ordering::SeqCst)
                    && !self.maintenance.load(Ordering::SeqCst)
                {
                    self.wakeup.wait(&mut inner);
                }
            }
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            if self.emergency.load(Ordering::SeqCst) || self.maintenance.load(Ordering::SeqCst) {
                continue;
            }

            self.choose_direction();
            self.advance();
            if self.should_stop_here() {
                self.serve_stop(oracle.as_mut());
            }
            self.update_state();
        }
    }

    /// An idle car turns toward its next target. A target at the current
    /// floor keeps the car standing; the stop check below services it
    /// without any motion.
    fn choose_direction(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CarState::Idle {
            return;
        }
        let target = inner.requests.next_target(inner.current_floor, Direction::Up);
        if let Some(target) = target {
            if target > inner.current_floor {
                inner.state = CarState::MovingUp;
                inner.direction = Direction::Up;
            } else if target < inner.current_floor {
                inner.state = CarState::MovingDown;
                inner.direction = Direction::Down;
            }
        }
    }

    /// One floor of travel in the current direction, if any.
    fn advance(&self) {
        let direction = {
            let inner = self.inner.lock();
            inner.state.direction()
        };
        let Some(direction) = direction else {
            return;
        };

        self.clock.sleep(self.timing.floor_travel);

        let floor = {
            let mut inner = self.inner.lock();
            match direction {
                Direction::Up => inner.current_floor += 1,
                Direction::Down => inner.current_floor -= 1,
            }
            inner.stats.total_floors_traveled += 1;
            inner.current_floor
        };
        self.emit(format!("arrived at floor {}", floor));
    }

    fn should_stop_here(&self) -> bool {
        let inner = self.inner.lock();
        inner
            .requests
            .should_stop(inner.current_floor, inner.state.direction())
    }

    /// Full stop cycle: doors open, passenger exchange with overload
    /// handling, doors close, then the served requests are cleared under
    /// the direction-consumed rule.
    fn serve_stop(&self, oracle: &mut dyn PassengerOracle) {
        let (floor, state_before, passengers_before) = {
            let mut inner = self.inner.lock();
            let state_before = inner.state;
            inner.state = CarState::DoorsOpen;
            inner.doors_open = true;
            (inner.current_floor, state_before, inner.passengers)
        };
        self.emit(format!("doors open at floor {}", floor));
        self.clock.sleep(self.timing.door_open);

        let (boarding_requested, alighting_requested) =
            oracle.exchange(floor, state_before, passengers_before, self.capacity);
        let (boarding, alighting, passengers, overloaded) = {
            let mut inner = self.inner.lock();
            let space = self.capacity - inner.passengers;
            let overloaded = boarding_requested > space;
            let boarding = boarding_requested.min(space);
            let alighting = alighting_requested.min(inner.passengers);
            inner.passengers = inner.passengers + boarding - alighting;
            inner.overloaded = overloaded;
            (boarding, alighting, inner.passengers, overloaded)
        };
        self.emit(format!(
            "{} boarding, {} alighting, passengers {}/{}",
            boarding, alighting, passengers, self.capacity
        ));

        if overloaded {
            self.emit(String::from("overload warning, doors held open"));
            self.clock.sleep(self.timing.overload);
        }

        self.emit(String::from("doors closed"));
        {
            let mut inner = self.inner.lock();
            inner.doors_open = false;
            inner.overloaded = false;
        }
        self.clock.sleep(self.timing.door_close);

        {
            let mut inner = self.inner.lock();
            let floor = inner.current_floor;
            inner.requests.clear_at(floor, state_before.direction());
            inner.stats.total_stops += 1;
        }
    }

    /// After each arrival or stop: idle out when nothing is pending,
    /// otherwise turn toward the recomputed target. A target at the
    /// current floor (a request that arrived during the stop) leaves the
    /// car standing so the next iteration re-runs the stop cycle instead
    /// of moving.
    fn update_state(&self) {
        let mut inner = self.inner.lock();
        if !inner.requests.has_pending() {
            inner.state = CarState::Idle;
            return;
        }
        let target = inner.requests.next_target(inner.current_floor, inner.direction);
        match target {
            Some(target) if target > inner.current_floor => {
                inner.state = CarState::MovingUp;
                inner.direction = Direction::Up;
            }
            Some(target) if target < inner.current_floor => {
                inner.state = CarState::MovingDown;
                inner.direction = Direction::Down;
            }
            _ => inner.state = CarState::Idle,
        }
    }

    fn handle_emergency(&self) {
        let floor = {
            let mut inner = self.inner.lock();
            inner.state = CarState::EmergencyStopped;
            inner.doors_open = true;
            inner.current_floor
        };
        self.emit(format!("emergency stop activated at floor {}", floor));
        self.emit(format!("doors forced open at floor {}", floor));

        while self.emergency.load(Ordering::SeqCst) && self.running.load(Ordering::SeqCst) {
            self.clock.sleep(self.timing.latch_poll);
        }

        if self.running.load(Ordering::SeqCst) {
            {
                let mut inner = self.inner.lock();
                inner.state = CarState::Idle;
                inner.doors_open = false;
            }
            self.emit(String::from("emergency cleared, resuming normal service"));
        }
    }

    fn handle_maintenance(&self) {
        {
            let mut inner = self.inner.lock();
            inner.state = CarState::Maintenance;
        }
        self.emit(String::from("maintenance mode entered"));

        while self.maintenance.load(Ordering::SeqCst) && self.running.load(Ordering::SeqCst) {
            self.clock.sleep(self.timing.latch_poll);
        }

        if self.running.load(Ordering::SeqCst) {
            {
                let mut inner = self.inner.lock();
                inner.state = CarState::Idle;
                inner.stats.last_maintenance_at = self.clock.now();
            }
            self.emit(String::from("maintenance complete, resuming normal service"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crossbeam_channel::unbounded;

    fn test_car() -> (Car, crossbeam_channel::Receiver<Event>) {
        let (event_tx, event_rx) = unbounded();
        let car = Car::new(
            1,
            10,
            5,
            Timing::default().scaled(100),
            Arc::new(SystemClock),
            event_tx,
        );
        (car, event_rx)
    }

    fn request(floor: u8, call: Call) -> Request {
        Request {
            floor,
            call,
            submitted_at: 0,
            emergency: false,
        }
    }

    #[test]
    fn rejects_floors_outside_the_shaft() {
        let (car, _event_rx) = test_car();
        assert_eq!(
            car.enqueue(request(0, Call::Cab)),
            Err(RequestError::InvalidFloor(0))
        );
        assert_eq!(
            car.enqueue(request(11, Call::HallUp)),
            Err(RequestError::InvalidFloor(11))
        );
    }

    #[test]
    fn rejects_normal_requests_during_maintenance() {
        let (car, _event_rx) = test_car();
        car.set_maintenance(true);
        assert_eq!(
            car.enqueue(request(4, Call::Cab)),
            Err(RequestError::InMaintenance)
        );

        let mut emergency = request(4, Call::Cab);
        emergency.emergency = true;
        assert_eq!(car.enqueue(emergency), Ok(()));
        assert!(car.snapshot().emergency);

        car.set_maintenance(false);
        assert_eq!(car.enqueue(request(4, Call::Cab)), Ok(()));
    }

    #[test]
    fn rejects_requests_after_shutdown() {
        let (car, _event_rx) = test_car();
        car.stop();
        assert_eq!(
            car.enqueue(request(4, Call::Cab)),
            Err(RequestError::Shutdown)
        );
    }

    #[test]
    fn repeated_presses_emit_a_single_event() {
        let (car, event_rx) = test_car();
        car.enqueue(request(4, Call::HallUp)).unwrap();
        car.enqueue(request(4, Call::HallUp)).unwrap();
        let accepted = event_rx
            .try_iter()
            .filter(|event| event.message.contains("hall up request"))
            .count();
        assert_eq!(accepted, 1);
        assert_eq!(car.snapshot().hall_calls.len(), 1);
    }

    #[test]
    fn snapshot_reflects_the_initial_state() {
        let (car, _event_rx) = test_car();
        let view = car.snapshot();
        assert_eq!(view.current_floor, 1);
        assert_eq!(view.state, CarState::Idle);
        assert_eq!(view.passengers, 0);
        assert!(view.internal_calls.is_empty());
        assert!(view.hall_calls.is_empty());
        assert!(!view.emergency);
        assert!(!view.maintenance);
    }
}
