pub mod call;
pub mod car;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod logging;
pub mod monitor;
pub mod passenger;
pub mod requests;
