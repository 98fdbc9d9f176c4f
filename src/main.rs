use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;

use elevator_control::call::Call;
use elevator_control::car::CarStats;
use elevator_control::clock::{Clock, SystemClock};
use elevator_control::config::{SystemConfig, Timing};
use elevator_control::dispatcher::{Assignment, Dispatcher};
use elevator_control::{logging, monitor};

fn print_help() {
    println!("available commands:");
    println!("  <floor>    - cab call to the given floor");
    println!("  u<floor>   - hall call going up from the given floor");
    println!("  d<floor>   - hall call going down from the given floor");
    println!("  e <floor>  - emergency stop (broadcast to all cars)");
    println!("  r <car>    - reset the emergency latch on a car");
    println!("  m <car>    - toggle maintenance mode on a car");
    println!("  s [car]    - print statistics (all cars when omitted)");
    println!("  status     - print the current state of every car");
    println!("  help       - show this message");
    println!("  0          - quit");
}

fn print_statistics(stats: &CarStats, now: u64) {
    let hours = now.saturating_sub(stats.started_at) as f64 / 3600.0;
    let floors_per_hour = if hours > 0.0 {
        stats.total_floors_traveled as f64 / hours
    } else {
        0.0
    };
    let last_maintenance = chrono::DateTime::from_timestamp(stats.last_maintenance_at as i64, 0)
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_default();

    println!("car {} statistics:", stats.id);
    println!("  uptime: {:.1} hours", hours);
    println!("  total stops: {}", stats.total_stops);
    println!("  floors traveled: {}", stats.total_floors_traveled);
    println!("  floors traveled per hour: {:.0}", floors_per_hour);
    println!("  last maintenance: {}", last_maintenance);
}

fn report(result: Result<Assignment, elevator_control::requests::RequestError>, floor: u8) {
    match result {
        Ok(Assignment::Assigned(id)) => println!("request for floor {} assigned to car {}", floor, id),
        Ok(Assignment::Broadcast) => println!("emergency broadcast to all cars"),
        Err(e) => println!("{}", e),
    }
}

fn main() {
    env_logger::init();

    // READ CONFIGURATION
    let config = SystemConfig::get();
    let timing = Timing::default();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // INITIALIZE EVENT LOG
    let event_tx =
        logging::init(Path::new(&config.log_directory)).expect("failed to create log directory");

    // INITIALIZE CARS AND MONITOR
    let dispatcher = Arc::new(Dispatcher::new(
        &config,
        timing.clone(),
        Arc::clone(&clock),
        event_tx,
    ));
    dispatcher.start();
    let monitor_stop_tx = monitor::init(
        Arc::clone(&dispatcher),
        timing.monitor_period,
        PathBuf::from(&config.log_directory),
    );

    println!(
        "elevator control system started ({} cars, {} floors)",
        config.num_cars, config.max_floors
    );
    print_help();

    // SEED SOME TRAFFIC
    {
        let mut rng = rand::rng();
        for _ in 0..15 {
            let floor = rng.random_range(1..=config.max_floors);
            let call = match rng.random_range(0..3) {
                0 => Call::Cab,
                1 => Call::HallUp,
                _ => Call::HallDown,
            };
            dispatcher.submit(floor, call, false, None).ok();
            thread::sleep(Duration::from_millis(300));
        }
    }

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => (),
        }
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };

        match command {
            "0" => break,
            "help" => print_help(),
            "status" => {
                for view in dispatcher.snapshot_all() {
                    println!(
                        "car {}: floor {}, {}, passengers {}/{}",
                        view.id,
                        view.current_floor,
                        view.state.as_str(),
                        view.passengers,
                        view.capacity
                    );
                }
            }
            "e" => match parts.next().and_then(|arg| arg.parse::<u8>().ok()) {
                Some(floor) => report(dispatcher.submit(floor, Call::Cab, true, None), floor),
                None => println!("usage: e <floor>"),
            },
            "r" => match parts.next().and_then(|arg| arg.parse::<u8>().ok()) {
                Some(car) => match dispatcher.clear_emergency(car) {
                    Ok(()) => println!("emergency latch on car {} cleared", car),
                    Err(e) => println!("{}", e),
                },
                None => println!("usage: r <car>"),
            },
            "m" => match parts.next().and_then(|arg| arg.parse::<u8>().ok()) {
                Some(car) => {
                    let on = dispatcher
                        .snapshot_all()
                        .iter()
                        .find(|view| view.id == car)
                        .map(|view| !view.maintenance);
                    match on {
                        Some(on) => {
                            dispatcher.set_maintenance(car, on).ok();
                            println!(
                                "maintenance mode on car {} {}",
                                car,
                                if on { "enabled" } else { "disabled" }
                            );
                        }
                        None => println!("unknown car {}", car),
                    }
                }
                None => println!("usage: m <car>"),
            },
            "s" => match parts.next() {
                Some(arg) => match arg.parse::<u8>() {
                    Ok(car) => match dispatcher.stats(car) {
                        Ok(stats) => print_statistics(&stats, clock.now()),
                        Err(e) => println!("{}", e),
                    },
                    Err(_) => println!("usage: s [car]"),
                },
                None => {
                    for stats in dispatcher.stats_all() {
                        print_statistics(&stats, clock.now());
                        println!();
                    }
                }
            },
            _ => {
                if let Some(floor) = command.strip_prefix('u').and_then(|rest| rest.parse().ok()) {
                    report(dispatcher.submit(floor, Call::HallUp, false, None), floor);
                } else if let Some(floor) =
                    command.strip_prefix('d').and_then(|rest| rest.parse().ok())
                {
                    report(dispatcher.submit(floor, Call::HallDown, false, None), floor);
                } else if let Ok(floor) = command.parse::<u8>() {
                    report(dispatcher.submit(floor, Call::Cab, false, None), floor);
                } else {
                    println!("invalid command! type 'help' for the command list");
                }
            }
        }
    }

    monitor_stop_tx.send(true).ok();
    dispatcher.stop();
    println!("program terminated");
}
