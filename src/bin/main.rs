//! `cjmcu-8128` command line entry point.
//!
//! Without `--serve` the binary acts as a client: it connects to the daemon
//! socket, starting a daemon in the background when nobody answers.

use std::env;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use envconfig::Envconfig;
use log::{debug, error, info};

use cjmcu_core::TimeSource;
use cjmcu_rs::cli::{self, Action};
use cjmcu_rs::client::{self, RETRY_DELAY};
use cjmcu_rs::hardware::{self, SystemClock};
use cjmcu_rs::server::Server;
use cjmcu_rs::{AppError, Config};

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

fn serve(config: &Config) -> Result<(), AppError> {
    info!("Starting CJMCU-8128 daemon");
    let server = Server::bind(&config.socket, config.measure_interval())?;
    let station = hardware::open_station(config)?;
    server.run(station)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

fn connect(config: &Config) -> Result<std::os::unix::net::UnixStream, AppError> {
    client::connect_or_spawn(&config.socket, RETRY_DELAY, client::spawn_daemon)
}

fn restart(config: &Config) -> Result<(), AppError> {
    match client::connect(&config.socket) {
        Ok(stream) => {
            client::stop(stream)?;
            info!("Stopped running daemon");
            // Give the old daemon time to release the socket.
            thread::sleep(RETRY_DELAY);
        }
        Err(AppError::DaemonUnavailable) => debug!("No daemon running"),
        Err(e) => return Err(e),
    }
    connect(config).map(drop)
}

fn print_loop(config: &Config, interval: Duration) -> Result<(), AppError> {
    loop {
        let snapshot = client::fetch(connect(config)?)?;
        println!("{}", client::format_line(&snapshot));
        thread::sleep(interval);
    }
}

fn run(action: Action, config: &Config) -> Result<(), AppError> {
    match action {
        Action::Help => {
            print!("{}", cli::USAGE);
            Ok(())
        }
        Action::Serve => serve(config),
        Action::Stop => match client::connect(&config.socket) {
            Ok(stream) => client::stop(stream),
            Err(AppError::DaemonUnavailable) => {
                info!("Daemon is not running");
                Ok(())
            }
            Err(e) => Err(e),
        },
        Action::Restart => restart(config),
        Action::Value(query) => {
            let snapshot = client::fetch(connect(config)?)?;
            println!("{}", client::format_value(query, &snapshot));
            Ok(())
        }
        Action::Summary => {
            let snapshot = client::fetch(connect(config)?)?;
            println!("{}", client::format_summary(&snapshot, SystemClock.now()));
            Ok(())
        }
        Action::Loop(interval) => print_loop(config, interval),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let action = match cli::parse_args(env::args().skip(1)) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("{e}\n");
            eprint!("{}", cli::USAGE);
            return ExitCode::FAILURE;
        }
    };

    let config = match Config::init_from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", AppError::from(e));
            return ExitCode::FAILURE;
        }
    };

    match run(action, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
