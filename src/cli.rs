//! Command line parsing
//!
//! The client takes exactly one option, getopt style. `-L` takes the loop
//! interval in seconds, either attached (`-L10`) or as the next argument.

use std::time::Duration;

use crate::client::Query;
use crate::error::AppError;

/// Default pause between two lines of `-l` output.
pub const DEFAULT_LOOP_INTERVAL: Duration = Duration::from_secs(30);

pub const USAGE: &str = "\
Usage: cjmcu-8128 [OPTION]

  Options:
   -?          Print this help
   -s          Stop/Terminate measurement daemon
   -r          Reset/Restart measurement daemon
   -p          Output air pressure value in hPa (taken from BMP280)
   -t          Output temperature value in °C (taken from BMP280)
   -T          Output temperature value in °C (taken from HDC1080)
   -h          Output air humidity value in % (taken from HDC1080)
   -c          Output CO2 value in ppm (taken from CCS811)
   -o          Output TVOC value in ppb (taken from CCS811)
   -a          Output mean of temperature from BMP280 and HDC1080
   -v          Output summary of all available values
   -l          Output summary of all available values in a loop
   -L <secs>   Same as -l with the given interval
   --serve     Run the measurement daemon in the foreground
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Help,
    Serve,
    Stop,
    Restart,
    Value(Query),
    Summary,
    Loop(Duration),
}

fn usage(message: impl Into<String>) -> AppError {
    AppError::Usage(message.into())
}

/// Loop interval from `-L`; anything below one second falls back to the default.
fn loop_interval(value: &str) -> Result<Duration, AppError> {
    let secs: i64 = value
        .trim()
        .parse()
        .map_err(|_| usage(format!("invalid loop interval {value:?}")))?;
    Ok(match u64::try_from(secs) {
        Ok(secs) if secs >= 1 => Duration::from_secs(secs),
        _ => DEFAULT_LOOP_INTERVAL,
    })
}

/// Parse the arguments after the program name.
pub fn parse_args<I>(args: I) -> Result<Action, AppError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(option) = args.next() else {
        return Err(usage("no option given"));
    };

    let action = match option.as_str() {
        "--serve" => Action::Serve,
        "-?" => Action::Help,
        "-s" => Action::Stop,
        "-r" => Action::Restart,
        "-p" => Action::Value(Query::Pressure),
        "-t" => Action::Value(Query::TemperatureBmp280),
        "-T" => Action::Value(Query::TemperatureHdc1080),
        "-h" => Action::Value(Query::Humidity),
        "-c" => Action::Value(Query::Co2),
        "-o" => Action::Value(Query::Tvoc),
        "-a" => Action::Value(Query::MeanTemperature),
        "-v" => Action::Summary,
        "-l" => Action::Loop(DEFAULT_LOOP_INTERVAL),
        "-L" => {
            let value = args
                .next()
                .ok_or_else(|| usage("-L needs an interval in seconds"))?;
            Action::Loop(loop_interval(&value)?)
        }
        attached if attached.starts_with("-L") => Action::Loop(loop_interval(&attached[2..])?),
        other => return Err(usage(format!("unknown option {other:?}"))),
    };

    if let Some(extra) = args.next() {
        return Err(usage(format!("unexpected argument {extra:?}")));
    }
    Ok(action)
}
