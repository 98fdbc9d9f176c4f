/// ----- MONITOR -----
/// Read-only status worker: snapshots the whole fleet on a fixed period,
/// redraws the status table in place and periodically rewrites the
/// statistics file. Never influences routing.
use std::fs;
use std::io::{self, stdout, Stdout, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::spawn;
use std::time::Duration;

use crossbeam_channel::{select, unbounded, Receiver, Sender};
use crossterm::{cursor, terminal, ExecutableCommand};
use log::warn;

use crate::car::{CarStats, CarView};
use crate::dispatcher::Dispatcher;

const STATS_EVERY: u32 = 30;

pub fn init(dispatcher: Arc<Dispatcher>, period: Duration, log_dir: PathBuf) -> Sender<bool> {
    let (monitor_stop_tx, monitor_stop_rx) = unbounded();
    spawn(move || main(dispatcher, period, log_dir, monitor_stop_rx));
    monitor_stop_tx
}

fn main(dispatcher: Arc<Dispatcher>, period: Duration, log_dir: PathBuf, stop_rx: Receiver<bool>) {
    let mut status = StatusPrinter::new();
    let mut ticks: u32 = 0;
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            default(period) => {
                let views = dispatcher.snapshot_all();
                status.print(&views).ok();
                ticks += 1;
                if ticks % STATS_EVERY == 0 {
                    save_statistics(&log_dir, &dispatcher.stats_all());
                }
            },
        }
    }
}

pub struct StatusPrinter {
    stdout: Stdout,
    lines: u16,
}

impl StatusPrinter {
    pub fn new() -> Self {
        StatusPrinter {
            stdout: stdout(),
            lines: 0,
        }
    }

    pub fn print(&mut self, views: &[CarView]) -> io::Result<()> {
        if self.lines > 0 {
            self.stdout.execute(cursor::MoveUp(self.lines))?;
            self.stdout
                .execute(terminal::Clear(terminal::ClearType::FromCursorDown))?;
        }

        writeln!(self.stdout, "+----+-------+----------------+-------+----------------+----------------+")?;
        writeln!(
            self.stdout,
            "| {0:<2} | {1:<5} | {2:<14} | {3:<5} | {4:<14} | {5:<14} |",
            "ID", "FLOOR", "STATE", "PASS", "CAB CALLS", "HALL CALLS"
        )?;
        for view in views {
            let cab_calls = view
                .internal_calls
                .iter()
                .map(|floor| floor.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            let mut hall_calls = String::new();
            for (floor, buttons) in &view.hall_calls {
                if buttons.up {
                    hall_calls.push_str(&format!("{}↑ ", floor));
                }
                if buttons.down {
                    hall_calls.push_str(&format!("{}↓ ", floor));
                }
            }
            writeln!(
                self.stdout,
                "| {0:<2} | {1:<5} | {2:<14} | {3:<5} | {4:<14} | {5:<14} |",
                view.id,
                view.current_floor,
                view.state.as_str(),
                format!("{}/{}", view.passengers, view.capacity),
                cab_calls,
                hall_calls.trim_end()
            )?;
        }
        writeln!(self.stdout, "+----+-------+----------------+-------+----------------+----------------+")?;

        self.lines = views.len() as u16 + 3;
        Ok(())
    }
}

fn save_statistics(log_dir: &Path, stats: &[CarStats]) {
    let path = log_dir.join("statistics.json");
    match serde_json::to_string_pretty(stats) {
        Ok(json) => {
            if let Err(e) = fs::write(&path, json) {
                warn!("unable to write {}: {}", path.display(), e);
            }
        }
        Err(e) => warn!("unable to serialize statistics: {}", e),
    }
}
