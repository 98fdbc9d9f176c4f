use std::collections::HashMap;
use std::env;
use std::fs;
use std::time::Duration;

use log::warn;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct ConfigFile {
    pub system: HashMap<String, u8>,
    pub log_directory: String,
}

#[derive(Debug, Clone)]
pub struct SystemConfig {
    pub num_cars: u8,
    pub max_floors: u8,
    pub capacity: u8,
    pub log_directory: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        SystemConfig {
            num_cars: 4,
            max_floors: 25,
            capacity: 15,
            log_directory: String::from("logs"),
        }
    }
}

impl SystemConfig {
    pub fn get() -> Self {
        let mut config = match read_config_file() {
            Some(file) => SystemConfig {
                num_cars: file.system["num_cars"],
                max_floors: file.system["num_floors"],
                capacity: file.system["capacity"],
                log_directory: file.log_directory,
            },
            None => {
                println!("No configuration file provided, using default settings...");
                SystemConfig::default()
            }
        };
        parse_env_args(&mut config);
        config
    }
}

fn read_config_file() -> Option<ConfigFile> {
    let contents = fs::read_to_string("config.json").ok()?;
    match serde_json::from_str(&contents) {
        Ok(file) => Some(file),
        Err(e) => {
            warn!("config.json is malformed: {}", e);
            None
        }
    }
}

fn parse_env_args(config: &mut SystemConfig) {
    let args: Vec<String> = env::args().skip(1).collect();
    for arg_pair in args.rchunks_exact(2) {
        match arg_pair[0].as_str() {
            "--cars" => {
                config.num_cars = match arg_pair[1].parse::<u8>() {
                    Ok(num) => num,
                    Err(_) => {
                        println!("car count {} is not a number, skipping...", arg_pair[1]);
                        config.num_cars
                    }
                };
            }
            "--floors" => {
                config.max_floors = match arg_pair[1].parse::<u8>() {
                    Ok(num) => num,
                    Err(_) => {
                        println!("floor count {} is not a number, skipping...", arg_pair[1]);
                        config.max_floors
                    }
                };
            }
            _ => {
                println!("illegal argument {}, skipping...", arg_pair[0]);
            }
        }
    }
}

/// Fixed delays of the mechanical simulation. Scenario tests divide them
/// down instead of mocking the clock out entirely.
#[derive(Debug, Clone)]
pub struct Timing {
    pub floor_travel: Duration,
    pub door_open: Duration,
    pub door_close: Duration,
    pub overload: Duration,
    pub latch_poll: Duration,
    pub monitor_period: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            floor_travel: Duration::from_secs(1),
            door_open: Duration::from_secs(2),
            door_close: Duration::from_secs(1),
            overload: Duration::from_secs(3),
            latch_poll: Duration::from_secs(1),
            monitor_period: Duration::from_secs(10),
        }
    }
}

impl Timing {
    pub fn scaled(self, factor: u32) -> Self {
        Timing {
            floor_travel: self.floor_travel / factor,
            door_open: self.door_open / factor,
            door_close: self.door_close / factor,
            overload: self.overload / factor,
            latch_poll: self.latch_poll / factor,
            monitor_period: self.monitor_period / factor,
        }
    }
}
