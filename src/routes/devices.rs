// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Device registry routes.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::Result;
use crate::models::Device;
use crate::services::{AddDeviceRequest, StatusUpdate};
use crate::AppState;

pub const STATUS_UPDATED: &str = "Status updated successfully";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/device/add", post(add_device))
        .route("/api/device/status", post(update_status))
        .route("/api/devices/{user_id}", get(list_devices))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "bindings/")
)]
pub struct MessageResponse {
    pub message: String,
}

/// Register a device and return the owner's full device list.
async fn add_device(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<AddDeviceRequest>, JsonRejection>,
) -> Result<Json<Vec<Device>>> {
    let Json(request) = payload?;
    let devices = state.devices.add_device(&request).await?;
    Ok(Json(devices))
}

/// Switch a device on or off by its business key.
async fn update_status(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let Json(request) = payload?;
    state.devices.update_status(&request).await?;
    Ok(Json(MessageResponse {
        message: STATUS_UPDATED.to_string(),
    }))
}

/// List a user's devices.
async fn list_devices(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Device>>> {
    let devices = state.devices.list_by_owner(&user_id).await?;
    Ok(Json(devices))
}
