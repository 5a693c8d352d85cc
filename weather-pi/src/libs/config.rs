//! Program configurations.

use std::{
    env,
    io::{Error as IoError, ErrorKind},
};

use clap::{Arg, ArgMatches, Command};
use serde::Deserialize;
use url::Url;

/// Configuration file object.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Receiver command line such as `rtl_433 -F json -M utc`. Arguments are separated by spaces
    /// and quoting is not supported.
    #[serde(rename = "rtlCmd")]
    pub rtl_cmd: Option<String>,
    /// Ingestion endpoint such as `https://example.com/api/v1/data`.
    #[serde(rename = "uploadUrl")]
    pub upload_url: Option<String>,
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
    /// Seconds between the end of one upload and the start of the next.
    #[serde(rename = "uploadInterval")]
    pub upload_interval: Option<u64>,
    /// Seconds between checks for a complete reading before the first upload.
    #[serde(rename = "pollInterval")]
    pub poll_interval: Option<u64>,
}

pub const DEF_UPLOAD_INTERVAL: u64 = 60;
pub const DEF_POLL_INTERVAL: u64 = 1;

/// To register Clap arguments.
pub fn reg_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("weather-pi.rtl-cmd")
            .long("weather-pi.rtl-cmd")
            .help("Receiver command that prints one JSON object per line")
            .num_args(1),
    )
    .arg(
        Arg::new("weather-pi.upload-url")
            .long("weather-pi.upload-url")
            .help("Ingestion API URL")
            .num_args(1),
    )
    .arg(
        Arg::new("weather-pi.api-key")
            .long("weather-pi.api-key")
            .help("Station API key sent in the `X-Api-Key` header")
            .num_args(1),
    )
    .arg(
        Arg::new("weather-pi.upload-interval")
            .long("weather-pi.upload-interval")
            .help("Upload interval in seconds (default 60)")
            .num_args(1)
            .value_parser(1..=86400),
    )
    .arg(
        Arg::new("weather-pi.poll-interval")
            .long("weather-pi.poll-interval")
            .help("Seconds between complete reading checks before the first upload (default 1)")
            .num_args(1)
            .value_parser(1..=3600),
    )
}

/// To read input arguments from command-line arguments and environment variables.
///
/// The receiver command, the upload URL and the API key also fall back to the plain `RTL_CMD`,
/// `UPLOAD_URL` and `API_KEY` variables that existing `.env` files use.
///
/// This function will call [`apply_default()`] to fill missing values so you do not need call it
/// again.
pub fn read_args(args: &ArgMatches) -> Config {
    apply_default(&Config {
        rtl_cmd: match args.get_one::<String>("weather-pi.rtl-cmd") {
            None => env_var(&["WEATHER_PI_RTL_CMD", "RTL_CMD"]),
            Some(v) => Some(v.clone()),
        },
        upload_url: match args.get_one::<String>("weather-pi.upload-url") {
            None => env_var(&["WEATHER_PI_UPLOAD_URL", "UPLOAD_URL"]),
            Some(v) => Some(v.clone()),
        },
        api_key: match args.get_one::<String>("weather-pi.api-key") {
            None => env_var(&["WEATHER_PI_API_KEY", "API_KEY"]),
            Some(v) => Some(v.clone()),
        },
        upload_interval: match args.get_one::<i64>("weather-pi.upload-interval") {
            None => match env::var("WEATHER_PI_UPLOAD_INTERVAL") {
                Err(_) => None,
                Ok(v) => v.parse::<u64>().ok(),
            },
            Some(v) => Some(*v as u64),
        },
        poll_interval: match args.get_one::<i64>("weather-pi.poll-interval") {
            None => match env::var("WEATHER_PI_POLL_INTERVAL") {
                Err(_) => None,
                Ok(v) => v.parse::<u64>().ok(),
            },
            Some(v) => Some(*v as u64),
        },
    })
}

/// The value of the first variable in `names` that is set.
fn env_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| env::var(name).ok())
}

/// Fill missing configuration with default values.
///
/// The receiver command, the upload URL and the API key have no defaults.
pub fn apply_default(config: &Config) -> Config {
    Config {
        rtl_cmd: config.rtl_cmd.clone(),
        upload_url: config.upload_url.clone(),
        api_key: config.api_key.clone(),
        upload_interval: match config.upload_interval {
            None | Some(0) => Some(DEF_UPLOAD_INTERVAL),
            Some(interval) => Some(interval),
        },
        poll_interval: match config.poll_interval {
            None | Some(0) => Some(DEF_POLL_INTERVAL),
            Some(interval) => Some(interval),
        },
    }
}

/// Check that all required values are present and not empty.
pub fn check(config: &Config) -> Result<(), IoError> {
    for (name, value) in [
        ("rtlCmd", config.rtl_cmd.as_ref()),
        ("uploadUrl", config.upload_url.as_ref()),
        ("apiKey", config.api_key.as_ref()),
    ] {
        match value {
            Some(v) if !v.trim().is_empty() => (),
            _ => {
                return Err(IoError::new(
                    ErrorKind::InvalidInput,
                    format!("missing required configuration `{}`", name),
                ));
            }
        }
    }
    if let Some(url) = config.upload_url.as_ref() {
        if let Err(e) = Url::parse(url) {
            return Err(IoError::new(
                ErrorKind::InvalidInput,
                format!("invalid `uploadUrl` {}: {}", url, e),
            ));
        }
    }
    Ok(())
}

/// Split a receiver command line into the program and its arguments.
///
/// Only spaces separate arguments. Repeated spaces do not produce empty arguments.
pub fn split_cmd(cmd: &str) -> Vec<String> {
    cmd.split(' ')
        .filter(|arg| !arg.is_empty())
        .map(|arg| arg.to_string())
        .collect()
}
