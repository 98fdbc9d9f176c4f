use std::collections::{BTreeMap, BTreeSet};

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use elevator_control::call::{Call, Direction};
use elevator_control::car::{CarState, CarView};
use elevator_control::dispatcher::score;

fn fleet(num_cars: u8) -> Vec<CarView> {
    (1..=num_cars)
        .map(|id| {
            let mut internal_calls = BTreeSet::new();
            internal_calls.insert(id % 20 + 1);
            let mut hall_calls = BTreeMap::new();
            hall_calls.insert(
                (id * 3) % 20 + 1,
                elevator_control::requests::HallButtons {
                    up: id % 2 == 0,
                    down: id % 2 == 1,
                },
            );
            CarView {
                id,
                current_floor: (id * 7) % 20 + 1,
                state: match id % 4 {
                    0 => CarState::Idle,
                    1 => CarState::MovingUp,
                    2 => CarState::MovingDown,
                    _ => CarState::DoorsOpen,
                },
                direction: if id % 2 == 0 {
                    Direction::Up
                } else {
                    Direction::Down
                },
                passengers: id % 12,
                capacity: 15,
                doors_open: id % 4 == 3,
                overloaded: false,
                internal_calls,
                hall_calls,
                emergency: false,
                maintenance: false,
            }
        })
        .collect()
}

fn bench_score_fleet(c: &mut Criterion) {
    let views = fleet(16);
    c.bench_function("score_16_cars", |b| {
        b.iter(|| {
            views
                .iter()
                .map(|view| score(black_box(view), black_box(12), Call::HallUp))
                .min()
        })
    });
}

criterion_group!(benches, bench_score_fleet);
criterion_main!(benches);
