//! Program configurations.

use std::env;

use clap::{Arg, ArgMatches, Command};
use serde::Deserialize;

/// Configuration file object.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// SQLite database file. `:memory:` keeps everything in memory.
    #[serde(rename = "dbPath")]
    pub db_path: Option<String>,
    #[serde(rename = "bindAddr")]
    pub bind_addr: Option<String>,
    pub port: Option<u16>,
    /// PEM certificate chain. HTTPS is served when both this and `keyFile` are set.
    #[serde(rename = "certFile")]
    pub cert_file: Option<String>,
    #[serde(rename = "keyFile")]
    pub key_file: Option<String>,
}

pub const DEF_DB_PATH: &'static str = "db/database.db";
pub const DEF_BIND_ADDR: &'static str = "0.0.0.0";
pub const DEF_PORT: u16 = 5000;

/// To register Clap arguments.
pub fn reg_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("weather-server.db-path")
            .long("weather-server.db-path")
            .help("SQLite database file path")
            .num_args(1),
    )
    .arg(
        Arg::new("weather-server.bind-addr")
            .long("weather-server.bind-addr")
            .help("Listening address")
            .num_args(1),
    )
    .arg(
        Arg::new("weather-server.port")
            .long("weather-server.port")
            .help("Listening port (default 5000)")
            .num_args(1)
            .value_parser(1..=65535),
    )
    .arg(
        Arg::new("weather-server.cert-file")
            .long("weather-server.cert-file")
            .help("TLS certificate file in PEM format")
            .num_args(1),
    )
    .arg(
        Arg::new("weather-server.key-file")
            .long("weather-server.key-file")
            .help("TLS private key file in PEM format")
            .num_args(1),
    )
}

/// To read input arguments from command-line arguments and environment variables.
///
/// This function will call [`apply_default()`] to fill missing values so you do not need call it
/// again.
pub fn read_args(args: &ArgMatches) -> Config {
    apply_default(&Config {
        db_path: match args.get_one::<String>("weather-server.db-path") {
            None => match env::var("WEATHER_SERVER_DB_PATH") {
                Err(_) => None,
                Ok(v) => Some(v),
            },
            Some(v) => Some(v.clone()),
        },
        bind_addr: match args.get_one::<String>("weather-server.bind-addr") {
            None => match env::var("WEATHER_SERVER_BIND_ADDR") {
                Err(_) => None,
                Ok(v) => Some(v),
            },
            Some(v) => Some(v.clone()),
        },
        port: match args.get_one::<i64>("weather-server.port") {
            None => match env::var("WEATHER_SERVER_PORT") {
                Err(_) => None,
                Ok(v) => v.parse::<u16>().ok(),
            },
            Some(v) => Some(*v as u16),
        },
        cert_file: match args.get_one::<String>("weather-server.cert-file") {
            None => match env::var("WEATHER_SERVER_CERT_FILE") {
                Err(_) => None,
                Ok(v) => Some(v),
            },
            Some(v) => Some(v.clone()),
        },
        key_file: match args.get_one::<String>("weather-server.key-file") {
            None => match env::var("WEATHER_SERVER_KEY_FILE") {
                Err(_) => None,
                Ok(v) => Some(v),
            },
            Some(v) => Some(v.clone()),
        },
    })
}

/// Fill missing configuration with default values.
pub fn apply_default(config: &Config) -> Config {
    Config {
        db_path: match config.db_path.as_ref() {
            None => Some(DEF_DB_PATH.to_string()),
            Some(path) => Some(path.clone()),
        },
        bind_addr: match config.bind_addr.as_ref() {
            None => Some(DEF_BIND_ADDR.to_string()),
            Some(addr) => Some(addr.clone()),
        },
        port: match config.port {
            None | Some(0) => Some(DEF_PORT),
            Some(port) => Some(port),
        },
        cert_file: config.cert_file.clone(),
        key_file: config.key_file.clone(),
    }
}
