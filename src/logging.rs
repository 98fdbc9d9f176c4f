/// ----- EVENT LOG -----
/// Cars emit timestamped event records into a channel; a writer worker
/// drains the channel and appends one log file per car under the
/// configured directory. Tests keep the receiving end instead and assert
/// on the record stream directly.
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread::spawn;

use chrono::Local;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::warn;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct Event {
    pub timestamp: u64,
    pub car_id: u8,
    pub message: String,
}

pub fn init(log_dir: &Path) -> io::Result<Sender<Event>> {
    fs::create_dir_all(log_dir)?;
    let (event_tx, event_rx) = unbounded();
    let log_dir = log_dir.to_path_buf();
    spawn(move || main(log_dir, event_rx));
    Ok(event_tx)
}

fn main(log_dir: PathBuf, event_rx: Receiver<Event>) {
    let mut files: HashMap<u8, File> = HashMap::new();

    for event in event_rx {
        let file = match files.entry(event.car_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let path = log_dir.join(format!("car_{}.log", event.car_id));
                match OpenOptions::new().create(true).append(true).open(&path) {
                    Ok(file) => entry.insert(file),
                    Err(e) => {
                        warn!("unable to open {}: {}", path.display(), e);
                        continue;
                    }
                }
            }
        };
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        if let Err(e) = writeln!(file, "[{}] car {}: {}", stamp, event.car_id, event.message) {
            warn!("unable to write event log: {}", e);
        }
    }
}
