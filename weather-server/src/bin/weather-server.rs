use std::{
    error::Error as StdError,
    fs,
    io::{Error as IoError, ErrorKind},
    net::SocketAddr,
    time::Duration,
};

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use clap::{Arg as ClapArg, ArgAction, ArgMatches, Command};
use log::{self, error, info};
use serde::Deserialize;
use sylvia_iot_sdk::util::logger;
use tokio;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};

use weather_server::{
    libs::{self, db::Db},
    routes,
};

#[derive(Deserialize)]
struct AppConfig {
    log: logger::Config,
    #[serde(rename = "weatherServer")]
    weather_server: libs::config::Config,
}

const PROJ_NAME: &'static str = env!("CARGO_PKG_NAME");
const PROJ_VER: &'static str = env!("CARGO_PKG_VERSION");
const REQ_TIMEOUT: Duration = Duration::from_secs(30);
const DEF_STATION_NAME: &'static str = "weather-pi@home";
const DEF_STATION_DESC: &'static str = "Bresser 6 in 1 weather station @ Home";

#[tokio::main]
async fn main() -> std::io::Result<()> {
    const FN_NAME: &'static str = "main";

    let args = reg_args().get_matches();
    let conf = match init_config(&args) {
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

    let server_conf = libs::config::apply_default(&conf.weather_server);
    if args.get_flag("init-db") {
        if let Err(e) = init_db(&server_conf, &args).await {
            error!("[{}] init database error: {}", FN_NAME, e);
            return Err(IoError::other(e.to_string()));
        }
        return Ok(());
    }

    let state = match routes::new_state(&server_conf).await {
        Err(e) => {
            error!("[{}] new state error: {}", FN_NAME, e);
            return Err(IoError::other(e.to_string()));
        }
        Ok(state) => state,
    };
    let app = Router::new()
        .merge(routes::new_service(&state))
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(REQ_TIMEOUT));

    let addr = format!(
        "{}:{}",
        server_conf
            .bind_addr
            .as_deref()
            .unwrap_or(libs::config::DEF_BIND_ADDR),
        server_conf.port.unwrap_or(libs::config::DEF_PORT)
    );
    let addr: SocketAddr = match addr.parse::<SocketAddr>() {
        Err(e) => {
            error!("[{}] invalid bind address {}: {}", FN_NAME, addr, e);
            return Err(IoError::new(ErrorKind::InvalidInput, e.to_string()));
        }
        Ok(addr) => addr,
    };

    let serve = async {
        match (server_conf.cert_file.as_ref(), server_conf.key_file.as_ref()) {
            (Some(cert), Some(key)) => {
                let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
                let tls_conf = RustlsConfig::from_pem_file(cert, key).await?;
                info!("[{}] listening on https://{}", FN_NAME, addr);
                axum_server::bind_rustls(addr, tls_conf)
                    .serve(app.into_make_service())
                    .await
            }
            _ => {
                info!("[{}] listening on http://{}", FN_NAME, addr);
                axum_server::bind(addr)
                    .serve(app.into_make_service())
                    .await
            }
        }
    };
    tokio::select! {
        result = serve => {
            if let Err(e) = result {
                error!("[{}] server error: {}", FN_NAME, e);
                return Err(e);
            }
        }
        _ = libs::shutdown_signal() => info!("[{}] quitting...", FN_NAME),
    }
    Ok(())
}

fn reg_args() -> Command {
    let mut args = Command::new(PROJ_NAME)
        .version(PROJ_VER)
        .arg(
            ClapArg::new("file")
                .short('f')
                .long("file")
                .help("config file")
                .num_args(1),
        )
        .arg(
            ClapArg::new("init-db")
                .long("init-db")
                .help("Create tables and register a station, then exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            ClapArg::new("station-name")
                .long("station-name")
                .help("Name of the station registered by --init-db")
                .num_args(1)
                .default_value(DEF_STATION_NAME),
        )
        .arg(
            ClapArg::new("station-desc")
                .long("station-desc")
                .help("Description of the station registered by --init-db")
                .num_args(1)
                .default_value(DEF_STATION_DESC),
        );
    args = logger::reg_args(args);
    libs::config::reg_args(args)
}

fn init_config(args: &ArgMatches) -> Result<AppConfig, Box<dyn StdError>> {
    if let Some(v) = args.get_one::<String>("file") {
        let conf_str = fs::read_to_string(v)?;
        return Ok(json5::from_str(conf_str.as_str())?);
    }

    Ok(AppConfig {
        log: logger::read_args(args),
        weather_server: libs::config::read_args(args),
    })
}

/// Create the tables and register a station with a random 32 hex digit API token.
async fn init_db(conf: &libs::config::Config, args: &ArgMatches) -> Result<(), Box<dyn StdError>> {
    const FN_NAME: &'static str = "init_db";

    let db_path = conf
        .db_path
        .as_deref()
        .unwrap_or(libs::config::DEF_DB_PATH);
    let db = Db::connect(db_path).await?;

    let name = match args.get_one::<String>("station-name") {
        None => DEF_STATION_NAME,
        Some(name) => name.as_str(),
    };
    let desc = match args.get_one::<String>("station-desc") {
        None => DEF_STATION_DESC,
        Some(desc) => desc.as_str(),
    };
    let token = hex::encode(rand::random::<[u8; 16]>());
    let id = db.add_station(name, desc, token.as_str()).await?;
    info!(
        "[{}] created station {} ({}) for {} with API token: {}",
        FN_NAME, id, name, desc, token
    );
    Ok(())
}
