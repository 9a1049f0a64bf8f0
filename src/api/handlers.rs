use std::net::Ipv4Addr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::engine::{ActionStatus, Controller, Host, HostStatus};

pub struct AppState {
    pub controller: Arc<Controller>,
    pub shutdown: Notify,
}

#[derive(Serialize)]
pub struct TargetEntry {
    #[serde(rename = "IP Address")]
    pub ip: String,
    #[serde(rename = "MAC Address")]
    pub mac: String,
    #[serde(rename = "Status")]
    pub status: String,
}

impl From<Host> for TargetEntry {
    fn from(host: Host) -> Self {
        Self {
            ip: host.ip.to_string(),
            mac: host.mac.to_string(),
            status: status_label(host.status).to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct TargetStatusResponse {
    #[serde(rename = "Target")]
    pub target: String,
    #[serde(rename = "Status")]
    pub status: String,
}

#[derive(Serialize, Deserialize)]
pub struct InfoPayload {
    pub atk: String,
    pub def: String,
}

fn status_label(status: HostStatus) -> &'static str {
    match status {
        HostStatus::Cut => "Cut",
        HostStatus::Normal => "Normal",
    }
}

fn target_response(
    code: StatusCode,
    target: &str,
    status: &str,
) -> (StatusCode, Json<TargetStatusResponse>) {
    (
        code,
        Json(TargetStatusResponse {
            target: target.to_string(),
            status: status.to_string(),
        }),
    )
}

// GET /ping
pub async fn ping() -> &'static str {
    "OK"
}

// GET /get_targets
pub async fn get_targets(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let controller = state.controller.clone();
    let result = tokio::task::spawn_blocking(move || {
        controller.scan_targets();
        controller.get_targets()
    })
    .await;

    match result {
        Ok(hosts) => {
            let entries: Vec<TargetEntry> = hosts.into_iter().map(TargetEntry::from).collect();
            (StatusCode::OK, Json(entries)).into_response()
        }
        Err(e) => {
            tracing::error!("scan task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// GET /get_status/:ip
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(ip): Path<String>,
) -> impl IntoResponse {
    let Ok(addr) = ip.parse::<Ipv4Addr>() else {
        return target_response(StatusCode::NOT_FOUND, &ip, "Target Not Found");
    };

    let controller = state.controller.clone();
    let result = tokio::task::spawn_blocking(move || {
        controller.scan_targets();
        controller.get_host(addr)
    })
    .await;

    match result {
        Ok(Some(host)) => target_response(StatusCode::OK, &ip, status_label(host.status)),
        Ok(None) => target_response(StatusCode::NOT_FOUND, &ip, "Target Not Found"),
        Err(e) => {
            tracing::error!("status task failed: {}", e);
            target_response(StatusCode::INTERNAL_SERVER_ERROR, &ip, "Error")
        }
    }
}

// POST /action/:ip
pub async fn action(
    State(state): State<Arc<AppState>>,
    Path(ip): Path<String>,
) -> impl IntoResponse {
    let Ok(addr) = ip.parse::<Ipv4Addr>() else {
        return target_response(StatusCode::NOT_FOUND, &ip, "Target Not Found");
    };

    let controller = state.controller.clone();
    let result = tokio::task::spawn_blocking(move || controller.action(addr)).await;

    match result {
        Ok(Ok(ActionStatus::CutSuccess)) => target_response(StatusCode::OK, &ip, "Cut"),
        Ok(Ok(ActionStatus::RecoverSuccess)) => target_response(StatusCode::OK, &ip, "Recovered"),
        Ok(Ok(ActionStatus::TargetNotFound)) => {
            target_response(StatusCode::NOT_FOUND, &ip, "Target Not Found")
        }
        Ok(Err(e)) => {
            tracing::error!("action on {} failed: {}", ip, e);
            target_response(StatusCode::INTERNAL_SERVER_ERROR, &ip, "Error")
        }
        Err(e) => {
            tracing::error!("action task failed: {}", e);
            target_response(StatusCode::INTERNAL_SERVER_ERROR, &ip, "Error")
        }
    }
}

// POST /quit - the response goes out first; main runs recover_all once the
// listener has drained, then exits.
pub async fn quit(State(state): State<Arc<AppState>>) -> &'static str {
    tracing::info!("quit requested over HTTP");
    state.shutdown.notify_one();
    "OK"
}

// GET /get_info
pub async fn get_info(State(state): State<Arc<AppState>>) -> Json<InfoPayload> {
    Json(InfoPayload {
        atk: state.controller.get_atk().to_string(),
        def: state.controller.get_def().to_string(),
    })
}

// POST /set_info
pub async fn set_info(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<InfoPayload>,
) -> impl IntoResponse {
    let (Ok(atk), Ok(def)) = (payload.atk.parse::<i64>(), payload.def.parse::<i64>()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    state.controller.set_atk(atk);
    state.controller.set_def(def);
    Json(payload).into_response()
}
