use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};

use elevator_control::call::Call;
use elevator_control::car::CarState;
use elevator_control::clock::SystemClock;
use elevator_control::config::{SystemConfig, Timing};
use elevator_control::dispatcher::{Assignment, Dispatcher};
use elevator_control::logging::Event;
use elevator_control::passenger::{FixedPassengers, PassengerOracle};
use elevator_control::requests::RequestError;

// Mechanical delays divided down so a full sweep takes tens of
// milliseconds instead of tens of seconds.
const SCALE: u32 = 50;
const TIMEOUT: Duration = Duration::from_secs(10);

fn fleet(num_cars: u8, capacity: u8) -> (Arc<Dispatcher>, Receiver<Event>) {
    let config = SystemConfig {
        num_cars,
        max_floors: 10,
        capacity,
        log_directory: String::new(),
    };
    let (event_tx, event_rx) = unbounded();
    let dispatcher = Arc::new(Dispatcher::new(
        &config,
        Timing::default().scaled(SCALE),
        Arc::new(SystemClock),
        event_tx,
    ));
    (dispatcher, event_rx)
}

fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn door_open_floors(event_rx: &Receiver<Event>) -> Vec<u8> {
    event_rx
        .try_iter()
        .filter_map(|event| {
            event
                .message
                .strip_prefix("doors open at floor ")
                .and_then(|floor| floor.parse().ok())
        })
        .collect()
}

fn has_event(event_rx: &Receiver<Event>, needle: &str) -> bool {
    event_rx
        .try_iter()
        .any(|event| event.message.contains(needle))
}

#[test]
fn single_car_services_cab_calls_in_sweep_order() {
    let (dispatcher, event_rx) = fleet(1, 5);
    dispatcher.start_with(|_| Box::new(FixedPassengers::new(&[])));

    for floor in [3, 7, 5] {
        dispatcher.submit(floor, Call::Cab, false, None).unwrap();
    }

    assert!(wait_until(|| {
        let view = &dispatcher.snapshot_all()[0];
        view.state == CarState::Idle && view.current_floor == 7 && view.internal_calls.is_empty()
    }));
    dispatcher.stop();

    assert_eq!(door_open_floors(&event_rx), vec![3, 5, 7]);
    let stats = dispatcher.stats(1).unwrap();
    assert_eq!(stats.total_stops, 3);
    assert_eq!(stats.total_floors_traveled, 6);
}

#[test]
fn opposite_hall_call_waits_for_the_return_sweep() {
    let (dispatcher, event_rx) = fleet(1, 5);
    dispatcher.start_with(|_| Box::new(FixedPassengers::new(&[])));

    dispatcher.submit(8, Call::Cab, false, None).unwrap();
    assert!(wait_until(|| {
        dispatcher.snapshot_all()[0].state == CarState::MovingUp
    }));
    dispatcher.submit(5, Call::HallDown, false, None).unwrap();

    assert!(wait_until(|| {
        let view = &dispatcher.snapshot_all()[0];
        view.state == CarState::Idle && view.current_floor == 5 && view.hall_calls.is_empty()
    }));
    dispatcher.stop();

    // The car passes floor 5 on the way up and only serves it after
    // reversing at 8.
    assert_eq!(door_open_floors(&event_rx), vec![8, 5]);
}

#[test]
fn dispatcher_routes_to_the_cheapest_car() {
    let (dispatcher, _event_rx) = fleet(2, 5);
    dispatcher.start_with(|_| Box::new(FixedPassengers::new(&[])));

    // Park car 1 at the top of the shaft.
    dispatcher.submit(10, Call::Cab, false, Some(1)).unwrap();
    assert!(wait_until(|| {
        let view = &dispatcher.snapshot_all()[0];
        view.state == CarState::Idle && view.current_floor == 10
    }));

    // Car 2 is idle at floor 1 and much closer to the waiter.
    assert_eq!(
        dispatcher.submit(2, Call::HallUp, false, None),
        Ok(Assignment::Assigned(2))
    );
    assert!(wait_until(|| {
        let view = &dispatcher.snapshot_all()[1];
        view.state == CarState::Idle && view.current_floor == 2
    }));
    dispatcher.stop();
}

#[test]
fn emergency_preempts_and_resumes_pending_service() {
    let (dispatcher, event_rx) = fleet(2, 5);
    dispatcher.start_with(|_| Box::new(FixedPassengers::new(&[])));

    dispatcher.submit(4, Call::Cab, false, Some(1)).unwrap();
    assert!(wait_until(|| {
        let view = &dispatcher.snapshot_all()[0];
        view.state == CarState::Idle && view.current_floor == 4
    }));

    dispatcher.submit(9, Call::Cab, false, Some(1)).unwrap();
    assert!(wait_until(|| {
        dispatcher.snapshot_all()[0].state == CarState::MovingUp
    }));

    // The broadcast reaches every car, including the idle one.
    assert_eq!(
        dispatcher.submit(1, Call::Cab, true, None),
        Ok(Assignment::Broadcast)
    );
    assert!(wait_until(|| {
        dispatcher
            .snapshot_all()
            .iter()
            .all(|view| view.state == CarState::EmergencyStopped)
    }));

    let view = &dispatcher.snapshot_all()[0];
    assert!((4..9).contains(&view.current_floor));
    assert!(view.internal_calls.contains(&9));
    assert!(view.doors_open);
    assert!(view.emergency);

    dispatcher.clear_emergency(1).unwrap();
    dispatcher.clear_emergency(2).unwrap();
    assert!(wait_until(|| {
        let view = &dispatcher.snapshot_all()[0];
        view.state == CarState::Idle && view.current_floor == 9
    }));
    dispatcher.stop();

    assert!(has_event(&event_rx, "emergency stop activated"));
}

#[test]
fn boarding_is_clamped_to_capacity_and_flags_overload() {
    let (dispatcher, event_rx) = fleet(1, 2);
    dispatcher.start_with(|_| Box::new(FixedPassengers::new(&[(5, 0)])));

    dispatcher.submit(3, Call::Cab, false, None).unwrap();
    assert!(wait_until(|| {
        let view = &dispatcher.snapshot_all()[0];
        view.state == CarState::Idle && view.current_floor == 3
    }));
    dispatcher.stop();

    assert_eq!(dispatcher.snapshot_all()[0].passengers, 2);
    assert!(has_event(&event_rx, "overload warning"));
}

/// Oracle that dies at the first door opening, taking the car's worker
/// down with it.
struct CrashingOracle;

impl PassengerOracle for CrashingOracle {
    fn exchange(&mut self, _floor: u8, _state: CarState, _passengers: u8, _capacity: u8) -> (u8, u8) {
        panic!("load sensor failure");
    }
}

#[test]
fn a_crashed_car_is_excluded_from_routing() {
    let (dispatcher, _event_rx) = fleet(2, 5);
    dispatcher.start_with(|id| -> Box<dyn PassengerOracle> {
        if id == 1 {
            Box::new(CrashingOracle)
        } else {
            Box::new(FixedPassengers::new(&[]))
        }
    });

    // Car 1's worker dies inside the stop cycle at floor 2.
    dispatcher.submit(2, Call::Cab, false, Some(1)).unwrap();
    assert!(wait_until(|| {
        dispatcher.snapshot_all()[0].state == CarState::DoorsOpen
    }));
    thread::sleep(Duration::from_millis(100));

    // Car 1 sits right at the requested floor but is dead; the request
    // must go to car 2.
    assert_eq!(
        dispatcher.submit(2, Call::Cab, false, None),
        Ok(Assignment::Assigned(2))
    );
    assert!(wait_until(|| {
        let view = &dispatcher.snapshot_all()[1];
        view.state == CarState::Idle && view.current_floor == 2
    }));
    dispatcher.stop();
}

#[test]
fn a_fully_dead_fleet_reports_no_car_available() {
    let (dispatcher, _event_rx) = fleet(1, 5);
    dispatcher.start_with(|_| -> Box<dyn PassengerOracle> { Box::new(CrashingOracle) });

    dispatcher.submit(2, Call::Cab, false, None).unwrap();
    assert!(wait_until(|| {
        dispatcher.snapshot_all()[0].state == CarState::DoorsOpen
    }));
    thread::sleep(Duration::from_millis(100));

    assert_eq!(
        dispatcher.submit(3, Call::Cab, false, None),
        Err(RequestError::NoCarAvailable)
    );
    dispatcher.stop();
}

#[test]
fn maintenance_rejects_new_requests_until_released() {
    let (dispatcher, event_rx) = fleet(1, 5);
    dispatcher.start_with(|_| Box::new(FixedPassengers::new(&[])));

    dispatcher.set_maintenance(1, true).unwrap();
    assert!(wait_until(|| {
        dispatcher.snapshot_all()[0].state == CarState::Maintenance
    }));

    assert_eq!(
        dispatcher.submit(4, Call::Cab, false, None),
        Err(RequestError::InMaintenance)
    );
    assert_eq!(
        dispatcher.submit(4, Call::Cab, true, None),
        Ok(Assignment::Broadcast)
    );
    dispatcher.clear_emergency(1).unwrap();

    dispatcher.set_maintenance(1, false).unwrap();
    assert!(wait_until(|| {
        dispatcher.snapshot_all()[0].state == CarState::Idle
    }));

    assert_eq!(
        dispatcher.submit(4, Call::Cab, false, None),
        Ok(Assignment::Assigned(1))
    );
    assert!(wait_until(|| {
        let view = &dispatcher.snapshot_all()[0];
        view.state == CarState::Idle && view.current_floor == 4
    }));
    dispatcher.stop();

    let stats = dispatcher.stats(1).unwrap();
    assert!(stats.last_maintenance_at >= stats.started_at);
    let messages: Vec<String> = event_rx.try_iter().map(|event| event.message).collect();
    assert!(messages.iter().any(|m| m.contains("maintenance mode entered")));
    assert!(messages.iter().any(|m| m.contains("maintenance complete")));
}
