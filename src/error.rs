//! Application-wide error type for the daemon and the client

use std::io;

use cjmcu_core::sensors::InitError;
use thiserror_no_std::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(envconfig::Error),
    #[error("Unable to open I2C bus {path}: {details}")]
    BusOpen { path: String, details: String },
    #[error("Sensor initialisation failed: {0}")]
    Init(InitError),
    #[error("Socket error: {0}")]
    Socket(io::Error),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Invalid arguments: {0}")]
    Usage(String),
    #[error("Measurement daemon is not running")]
    DaemonUnavailable,
}

impl From<envconfig::Error> for AppError {
    fn from(error: envconfig::Error) -> Self {
        Self::Config(error)
    }
}

impl From<InitError> for AppError {
    fn from(error: InitError) -> Self {
        Self::Init(error)
    }
}

impl From<io::Error> for AppError {
    fn from(error: io::Error) -> Self {
        Self::Socket(error)
    }
}
