//! CJMCU-8128 measurement daemon and client.
//!
//! The daemon owns the I2C sensors and serves filtered snapshots over a Unix
//! socket; the client queries it and prints single values or summaries.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod hardware;
pub mod protocol;
pub mod server;

pub use config::Config;
pub use error::AppError;
