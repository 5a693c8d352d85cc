use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing,
};
use log::{error, info};
use serde::Deserialize;
use serde_json::Value;
use sylvia_iot_sdk::util::{
    err::ErrResp,
    http::{Json, Path},
};

use super::super::State as AppState;
use crate::libs::record;

/// Header carrying the station API key.
pub const API_KEY_HEADER: &'static str = "X-Api-Key";

#[derive(Deserialize)]
struct GetLastParam {
    station_id: String,
}

pub fn new_service(scope_path: &str, state: &AppState) -> Router {
    Router::new()
        .route(scope_path, routing::post(post_data))
        .route(
            format!("{}/{{station_id}}", scope_path).as_str(),
            routing::get(get_last),
        )
        .with_state(state.clone())
}

/// `POST /api/v1/data`
async fn post_data(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ErrResp> {
    const FN_NAME: &'static str = "post_data";

    let token = match headers.get(API_KEY_HEADER).map(|v| v.to_str()) {
        None | Some(Ok("")) => {
            return Err(ErrResp::ErrAuth(Some("missing API token".to_string())));
        }
        Some(Err(_)) => return Err(ErrResp::ErrAuth(Some("invalid API token".to_string()))),
        Some(Ok(token)) => token,
    };
    let station = match state.db.get_station_by_token(token).await {
        Err(e) => {
            error!("[{}] get station error: {}", FN_NAME, e);
            return Err(ErrResp::ErrDb(Some(e.to_string())));
        }
        Ok(None) => return Err(ErrResp::ErrAuth(Some("invalid API token".to_string()))),
        Ok(Some(station)) => station,
    };

    let body = match serde_json::from_slice::<Value>(&body) {
        Err(e) => return Err(ErrResp::ErrParam(Some(format!("invalid JSON: {}", e)))),
        Ok(Value::Object(body)) => body,
        Ok(_) => {
            return Err(ErrResp::ErrParam(Some(
                "body should be a JSON object".to_string(),
            )));
        }
    };
    let record = match record::validate(&body) {
        Err(e) => return Err(ErrResp::ErrParam(Some(e))),
        Ok(record) => record,
    };

    if let Err(e) = state.db.add_record(&record, station.id).await {
        error!("[{}] add record error: {}", FN_NAME, e);
        return Err(ErrResp::ErrDb(Some(e.to_string())));
    }
    info!(
        "[{}] station {} added record at {}",
        FN_NAME, station.id, record.timestamp
    );
    Ok(StatusCode::CREATED)
}

/// `GET /api/v1/data/{station_id}`
///
/// Only unsigned decimal ids match this route. Anything else is 404 like an unknown station.
async fn get_last(State(state): State<AppState>, Path(param): Path<GetLastParam>) -> Response {
    const FN_NAME: &'static str = "get_last";

    let station_id = match parse_station_id(param.station_id.as_str()) {
        None => return StatusCode::NOT_FOUND.into_response(),
        Some(id) => id,
    };
    match state.db.get_last_record(station_id).await {
        Err(e) => {
            error!("[{}] get last record error: {}", FN_NAME, e);
            ErrResp::ErrDb(Some(e.to_string())).into_response()
        }
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Ok(Some(record)) => Json(record).into_response(),
    }
}

fn parse_station_id(s: &str) -> Option<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
