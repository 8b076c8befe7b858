// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Fleet registry: backend for an IoT fleet-management app.
//!
//! Users log in with a mobile number and an opaque token; each user owns a
//! set of on/off "static" devices stored in a document database.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use db::Database;
use services::{DeviceRegistry, IdentityService};

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub identity: IdentityService,
    pub devices: DeviceRegistry,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self {
            identity: IdentityService::new(db.clone()),
            devices: DeviceRegistry::new(db.clone()),
            db,
        }
    }
}
