// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Device registry: create devices for a user, switch them on/off, list them.

use crate::db::{collections, Database, Filter, ObjectId, Patch};
use crate::error::{AppError, Result};
use crate::models::{Device, DeviceStatus, NewDevice};
use serde::Deserialize;
use validator::Validate;

/// Request to register a device for a user.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddDeviceRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "user_id is required"))]
    pub user_id: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "device_id is required"))]
    pub device_id: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
}

/// Request to switch a device on or off.
///
/// `status` stays a string here so an out-of-range value is reported as a
/// validation failure rather than a body decode error.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StatusUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "device_id is required"))]
    pub device_id: String,
    #[serde(default)]
    pub status: String,
}

/// Parse an owner reference.
pub fn parse_owner(raw: &str) -> Result<ObjectId> {
    raw.parse()
        .map_err(|e| AppError::BadRequest(format!("Invalid user ID: {}", e)))
}

#[derive(Clone)]
pub struct DeviceRegistry {
    db: Database,
}

impl DeviceRegistry {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register a device (type "static", status "off") and return all of
    /// the owner's devices.
    ///
    /// `device_id` is globally unique; a duplicate is a conflict.
    pub async fn add_device(&self, request: &AddDeviceRequest) -> Result<Vec<Device>> {
        request.validate()?;
        let owner = parse_owner(&request.user_id)?;

        let device = NewDevice::new(owner, &request.device_id, &request.name);
        let id = self.db.insert_one(collections::DEVICES, &device).await?;

        tracing::info!(
            user_id = %owner,
            device_id = %request.device_id,
            id = %id,
            "Device added"
        );

        self.db
            .find_many(collections::DEVICES, &by_owner(&owner))
            .await
            .map_err(AppError::read_back)
    }

    /// Set the status of the device with the given business key.
    pub async fn update_status(&self, request: &StatusUpdate) -> Result<()> {
        request.validate()?;
        let status = request
            .status
            .parse::<DeviceStatus>()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let matched = self
            .db
            .update_one(
                collections::DEVICES,
                &Filter::eq("device_id", request.device_id.as_str()),
                &Patch::set("status", status.as_str()),
            )
            .await?;

        if matched == 0 {
            return Err(AppError::NotFound(format!(
                "Device {} not found",
                request.device_id
            )));
        }

        tracing::info!(device_id = %request.device_id, %status, "Device status updated");
        Ok(())
    }

    /// All devices owned by `owner`; empty if there are none.
    pub async fn list_by_owner(&self, owner: &str) -> Result<Vec<Device>> {
        let owner = parse_owner(owner)?;
        let devices: Vec<Device> = self
            .db
            .find_many(collections::DEVICES, &by_owner(&owner))
            .await?;

        tracing::debug!(user_id = %owner, count = devices.len(), "Listed devices");
        Ok(devices)
    }
}

fn by_owner(owner: &ObjectId) -> Filter {
    Filter::eq("user_id", owner.to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeviceKind;

    const OWNER: &str = "65a1b2c3d4e5f60718293a4b";

    fn add(owner: &str, device_id: &str, name: &str) -> AddDeviceRequest {
        AddDeviceRequest {
            user_id: owner.to_string(),
            device_id: device_id.to_string(),
            name: name.to_string(),
        }
    }

    fn status(device_id: &str, status: &str) -> StatusUpdate {
        StatusUpdate {
            device_id: device_id.to_string(),
            status: status.to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_then_list() {
        let registry = DeviceRegistry::new(Database::in_memory());

        let after_add = registry.add_device(&add(OWNER, "dev-1", "Pump")).await.unwrap();
        let listed = registry.list_by_owner(OWNER).await.unwrap();

        assert_eq!(after_add, listed);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].device_id, "dev-1");
        assert_eq!(listed[0].name, "Pump");
        assert_eq!(listed[0].kind, DeviceKind::Static);
        assert_eq!(listed[0].status, DeviceStatus::Off);
        assert_eq!(listed[0].user_id.to_hex(), OWNER);
    }

    #[tokio::test]
    async fn test_add_returns_full_owner_list() {
        let registry = DeviceRegistry::new(Database::in_memory());
        let other = "65a1b2c3d4e5f60718293a4c";

        registry.add_device(&add(OWNER, "dev-1", "Pump")).await.unwrap();
        registry.add_device(&add(other, "dev-9", "Fan")).await.unwrap();
        let devices = registry.add_device(&add(OWNER, "dev-2", "Valve")).await.unwrap();

        let ids: Vec<&str> = devices.iter().map(|d| d.device_id.as_str()).collect();
        assert_eq!(ids, vec!["dev-1", "dev-2"]);
    }

    #[tokio::test]
    async fn test_duplicate_device_id_conflicts() {
        let registry = DeviceRegistry::new(Database::in_memory());

        registry.add_device(&add(OWNER, "dev-1", "Pump")).await.unwrap();
        let err = registry
            .add_device(&add("65a1b2c3d4e5f60718293a4c", "dev-1", "Other"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(registry.list_by_owner(OWNER).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_status_round_trip() {
        let registry = DeviceRegistry::new(Database::in_memory());
        registry.add_device(&add(OWNER, "dev-1", "Pump")).await.unwrap();

        registry.update_status(&status("dev-1", "on")).await.unwrap();
        assert_eq!(
            registry.list_by_owner(OWNER).await.unwrap()[0].status,
            DeviceStatus::On
        );

        registry.update_status(&status("dev-1", "off")).await.unwrap();
        assert_eq!(
            registry.list_by_owner(OWNER).await.unwrap()[0].status,
            DeviceStatus::Off
        );
    }

    #[tokio::test]
    async fn test_update_unknown_device_is_not_found() {
        let registry = DeviceRegistry::new(Database::in_memory());
        let err = registry.update_status(&status("dev-1", "on")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_status_rejected_even_if_device_exists() {
        let db = Database::in_memory();
        let registry = DeviceRegistry::new(db.clone());
        registry.add_device(&add(OWNER, "dev-1", "Pump")).await.unwrap();

        let err = registry.update_status(&status("dev-1", "maybe")).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(
            registry.list_by_owner(OWNER).await.unwrap()[0].status,
            DeviceStatus::Off
        );

        // And without any store at all
        let offline = DeviceRegistry::new(Database::new_mock());
        let err = offline.update_status(&status("dev-1", "maybe")).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_list_failure_after_insert_is_read_back() {
        let db = Database::in_memory();
        let registry = DeviceRegistry::new(db.clone());

        db.fail_reads_after_next_write();
        let err = registry
            .add_device(&add(OWNER, "dev-1", "Pump"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ReadBack(_)), "got {err:?}");

        // The device was stored; retrying the add is a conflict, not a second copy
        db.heal_reads();
        let listed = registry.list_by_owner(OWNER).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].device_id, "dev-1");

        let err = registry
            .add_device(&add(OWNER, "dev-1", "Pump"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_validation_precedes_store_access() {
        let registry = DeviceRegistry::new(Database::new_mock());

        for request in [
            add("", "dev-1", "Pump"),
            add(OWNER, "", "Pump"),
            add(OWNER, "dev-1", ""),
            add("not-an-id", "dev-1", "Pump"),
        ] {
            let err = registry.add_device(&request).await.unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "got {err:?}");
        }

        let err = registry.update_status(&status("", "on")).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = registry.list_by_owner("xyz").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_list_unknown_owner_is_empty() {
        let registry = DeviceRegistry::new(Database::in_memory());
        assert!(registry.list_by_owner(OWNER).await.unwrap().is_empty());
    }
}
