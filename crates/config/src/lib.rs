//! Configuration for the fleet maintenance engine.

mod config;

pub use config::{Config, CONFIG};
