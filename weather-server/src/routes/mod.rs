use std::error::Error as StdError;

use axum::Router;

mod v1;

use crate::libs::{
    config::{self, Config},
    db::Db,
};

/// The resources used by this service.
#[derive(Clone)]
pub struct State {
    pub db: Db,
}

/// To create resources for the service.
pub async fn new_state(conf: &Config) -> Result<State, Box<dyn StdError>> {
    let conf = config::apply_default(conf);
    let db_path = match conf.db_path.as_ref() {
        None => config::DEF_DB_PATH,
        Some(path) => path.as_str(),
    };
    let db = Db::connect(db_path).await?;
    Ok(State { db })
}

/// To register service URIs.
///
/// The APIs are
/// - `POST http://host:port/api/v1/data`
/// - `GET http://host:port/api/v1/data/{station_id}`
pub fn new_service(state: &State) -> Router {
    Router::new().merge(v1::data::new_service("/api/v1/data", state))
}
