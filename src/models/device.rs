// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Device model for storage and API.

use crate::db::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Device type. Only on/off "static" devices exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "bindings/")
)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Static,
}

/// Power state of a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "bindings/")
)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    On,
    #[default]
    Off,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("status must be \"on\" or \"off\", got {0:?}")]
pub struct InvalidStatus(pub String);

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::On => "on",
            DeviceStatus::Off => "off",
        }
    }
}

impl FromStr for DeviceStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(DeviceStatus::On),
            "off" => Ok(DeviceStatus::Off),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device record stored in the `devices` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "bindings/")
)]
pub struct Device {
    /// Store-assigned identifier
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub id: ObjectId,
    /// Owning user (not checked against the users collection)
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub user_id: ObjectId,
    /// Caller-supplied business key
    pub device_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    pub status: DeviceStatus,
}

/// Insert shape for a device; the store assigns `id`.
#[derive(Debug, Serialize)]
pub struct NewDevice<'a> {
    pub user_id: ObjectId,
    pub device_id: &'a str,
    pub name: &'a str,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    pub status: DeviceStatus,
}

impl<'a> NewDevice<'a> {
    /// A new static device, initially off.
    pub fn new(user_id: ObjectId, device_id: &'a str, name: &'a str) -> Self {
        Self {
            user_id,
            device_id,
            name,
            kind: DeviceKind::Static,
            status: DeviceStatus::Off,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!("on".parse::<DeviceStatus>(), Ok(DeviceStatus::On));
        assert_eq!("off".parse::<DeviceStatus>(), Ok(DeviceStatus::Off));
        assert_eq!(
            "ON".parse::<DeviceStatus>(),
            Err(InvalidStatus("ON".to_string()))
        );
        assert!("maybe".parse::<DeviceStatus>().is_err());
    }

    #[test]
    fn test_device_json_shape() {
        let device = Device {
            id: "65a1b2c3d4e5f60718293a4b".parse().unwrap(),
            user_id: "65a1b2c3d4e5f60718293a4c".parse().unwrap(),
            device_id: "dev-1".to_string(),
            name: "Pump".to_string(),
            kind: DeviceKind::Static,
            status: DeviceStatus::Off,
        };

        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "65a1b2c3d4e5f60718293a4b",
                "user_id": "65a1b2c3d4e5f60718293a4c",
                "device_id": "dev-1",
                "name": "Pump",
                "type": "static",
                "status": "off",
            })
        );
    }

    #[test]
    fn test_new_device_defaults() {
        let owner = "65a1b2c3d4e5f60718293a4c".parse().unwrap();
        let device = NewDevice::new(owner, "dev-1", "Pump");
        assert_eq!(device.kind, DeviceKind::Static);
        assert_eq!(device.status, DeviceStatus::Off);
    }
}
