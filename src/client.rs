//! Client side: talk to the daemon and format its answers.

use std::env;
use std::io;
use std::os::unix::net::UnixStream;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{self, Stdio};
use std::thread;
use std::time::Duration;

use cjmcu_core::{Snapshot, Timestamp};
use log::{debug, info};

use crate::error::AppError;
use crate::protocol::{Command, read_snapshot, write_command};

/// Connection attempts after starting a daemon.
pub const CONNECT_RETRIES: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// A single value the client can print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Pressure,
    TemperatureBmp280,
    TemperatureHdc1080,
    Humidity,
    Co2,
    Tvoc,
    MeanTemperature,
}

/// Connect to a running daemon.
pub fn connect(path: &Path) -> Result<UnixStream, AppError> {
    UnixStream::connect(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => AppError::DaemonUnavailable,
        _ => AppError::Socket(e),
    })
}

/// Connect to the daemon, starting one with `spawn` if none answers.
pub fn connect_or_spawn(
    path: &Path,
    retry_delay: Duration,
    spawn: impl FnOnce() -> Result<(), AppError>,
) -> Result<UnixStream, AppError> {
    match connect(path) {
        Err(AppError::DaemonUnavailable) => {}
        other => return other,
    }

    info!("No daemon on {}, starting one", path.display());
    spawn()?;

    for attempt in 1..=CONNECT_RETRIES {
        thread::sleep(retry_delay);
        match connect(path) {
            Err(AppError::DaemonUnavailable) => debug!("Attempt {} of {}: not up yet", attempt, CONNECT_RETRIES),
            other => return other,
        }
    }
    Err(AppError::DaemonUnavailable)
}

/// This executable with `--serve`, detached from the terminal's process group.
pub fn daemon_command() -> Result<process::Command, AppError> {
    let mut command = process::Command::new(env::current_exe()?);
    command
        .arg("--serve")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0);
    Ok(command)
}

/// Start this executable as a daemon in the background.
pub fn spawn_daemon() -> Result<(), AppError> {
    let child = daemon_command()?.spawn()?;
    debug!("Started daemon with pid {}", child.id());
    Ok(())
}

/// Ask for the current values on an open connection.
pub fn fetch(mut stream: UnixStream) -> Result<Snapshot, AppError> {
    write_command(&mut stream, Command::Get)?;
    read_snapshot(&mut stream)
}

/// Tell the daemon to stop.
pub fn stop(mut stream: UnixStream) -> Result<(), AppError> {
    write_command(&mut stream, Command::Exit)
}

pub fn format_value(query: Query, snapshot: &Snapshot) -> String {
    match query {
        Query::Pressure => format!("{:.2}", snapshot.pressure),
        Query::TemperatureBmp280 => format!("{:.2}", snapshot.temperature_bmp280),
        Query::TemperatureHdc1080 => format!("{:.2}", snapshot.temperature_hdc1080),
        Query::Humidity => format!("{:.2}", snapshot.humidity),
        Query::Co2 => snapshot.co2.to_string(),
        Query::Tvoc => snapshot.tvoc.to_string(),
        Query::MeanTemperature => format!("{:.2}", snapshot.mean_temperature()),
    }
}

/// Multi-line summary of every value.
pub fn format_summary(snapshot: &Snapshot, now: Timestamp) -> String {
    let uptime_min = now.saturating_sub(snapshot.server_start) / 60;
    format!(
        "Air Pressure:           {:.2} hPa\n\
         Temperature (BMP280):   {:.2} °C\n\
         Temperature (HDC1080):  {:.2} °C\n\
         Air Humidity:           {:.2} %\n\
         CO2:                    {} ppm\n\
         TVOC:                   {} ppb\n\
         Age of the Values:      {} sec\n\
         Uptime of server proc:  {} min",
        snapshot.pressure,
        snapshot.temperature_bmp280,
        snapshot.temperature_hdc1080,
        snapshot.humidity,
        snapshot.co2,
        snapshot.tvoc,
        snapshot.age(now),
        uptime_min,
    )
}

/// One-line form used by the loop output.
pub fn format_line(snapshot: &Snapshot) -> String {
    format!(
        "T(HDC1080): {:.2}°C\tT(BMP280): {:.2}°C\tRH: {:.2}%\tCO2: {}ppm\tTVOC: {}ppb\tPres: {:.2}hPa",
        snapshot.temperature_hdc1080,
        snapshot.temperature_bmp280,
        snapshot.humidity,
        snapshot.co2,
        snapshot.tvoc,
        snapshot.pressure,
    )
}
