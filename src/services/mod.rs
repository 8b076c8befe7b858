// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod devices;
pub mod identity;

pub use devices::{AddDeviceRequest, DeviceRegistry, StatusUpdate};
pub use identity::{Credentials, IdentityService};
