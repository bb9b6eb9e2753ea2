pub mod config;
pub mod controller;
pub mod error;
pub mod listener;
pub mod logging;
pub mod provider;
pub mod relay;
pub mod smtp;

pub use tracing;
