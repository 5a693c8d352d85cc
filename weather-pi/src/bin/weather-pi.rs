use std::{
    error::Error as StdError,
    fs,
    io::{Error as IoError, ErrorKind},
    time::Duration,
};

use clap::{Arg as ClapArg, Command};
use log::{self, error, info};
use serde::Deserialize;
use sylvia_iot_sdk::util::logger;
use tokio;

use weather_pi::libs::{
    self,
    collector_task::Options as CollectorOptions,
    reading::SharedReading,
    supervisor::{self, ExitReason, Supervisor},
    upload_task::Options as UploadOptions,
};

#[derive(Deserialize)]
struct AppConfig {
    log: logger::Config,
    #[serde(rename = "weatherPi")]
    weather_pi: libs::config::Config,
}

const PROJ_NAME: &'static str = env!("CARGO_PKG_NAME");
const PROJ_VER: &'static str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> std::io::Result<()> {
    const FN_NAME: &'static str = "main";

    let _ = dotenvy::dotenv();

    let conf = match init_config() {
        Err(e) => {
            let conf = &logger::Config {
                ..Default::default()
            };
            logger::init(PROJ_NAME, &conf);
            error!("[{}] read config error: {}", FN_NAME, e);
            return Err(IoError::new(ErrorKind::InvalidInput, e.to_string()));
        }
        Ok(conf) => conf,
    };

    logger::init(PROJ_NAME, &conf.log);

    let pi_conf = libs::config::apply_default(&conf.weather_pi);
    if let Err(e) = libs::config::check(&pi_conf) {
        error!("[{}] invalid config: {}", FN_NAME, e);
        return Err(e);
    }
    info!("[{}] service started", FN_NAME);

    // Values are checked above.
    let reading = SharedReading::new();
    let collector = CollectorOptions {
        cmd: pi_conf.rtl_cmd.unwrap_or_default(),
        reading: reading.clone(),
    };
    let uploader = UploadOptions {
        url: pi_conf.upload_url.unwrap_or_default(),
        api_key: pi_conf.api_key.unwrap_or_default(),
        upload_interval: Duration::from_secs(
            pi_conf
                .upload_interval
                .unwrap_or(libs::config::DEF_UPLOAD_INTERVAL),
        ),
        poll_interval: Duration::from_secs(
            pi_conf
                .poll_interval
                .unwrap_or(libs::config::DEF_POLL_INTERVAL),
        ),
        reading,
    };
    let supervisor = match Supervisor::start(collector, uploader).await {
        Err(e) => {
            error!("[{}] start tasks error: {}", FN_NAME, e);
            return Err(IoError::other(e.to_string()));
        }
        Ok(supervisor) => supervisor,
    };

    // Startup errors above exit non-zero. Crash triggered shutdowns exit with 0 like clean ones,
    // so only the log tells them apart.
    match supervisor.run(supervisor::shutdown_signal()).await {
        ExitReason::Shutdown => info!("[{}] quitting...", FN_NAME),
        ExitReason::TaskQuit(name) => {
            error!("[{}] quitting because the {} task quit", FN_NAME, name)
        }
    }
    Ok(())
}

fn init_config() -> Result<AppConfig, Box<dyn StdError>> {
    let mut args = Command::new(PROJ_NAME).version(PROJ_VER).arg(
        ClapArg::new("file")
            .short('f')
            .long("file")
            .help("config file")
            .num_args(1),
    );
    args = logger::reg_args(args);
    args = libs::config::reg_args(args);
    let args = args.get_matches();

    if let Some(v) = args.get_one::<String>("file") {
        let conf_str = fs::read_to_string(v)?;
        return Ok(json5::from_str(conf_str.as_str())?);
    }

    Ok(AppConfig {
        log: logger::read_args(&args),
        weather_pi: libs::config::read_args(&args),
    })
}
