// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity resolution: map a (mobile, token) credential to a user id.
//!
//! Protocol:
//! 1. Look up the user by mobile.
//! 2. Not found: insert a new user. If the insert loses a race against a
//!    concurrent first login for the same mobile (unique violation), continue
//!    as step 3.
//! 3. Found: overwrite the token (no check against the old one) and re-fetch.

use crate::db::{collections, Database, Filter, Patch, StoreError};
use crate::error::{AppError, Result};
use crate::models::{NewUser, User};
use serde::Deserialize;
use validator::Validate;

/// Login credential pair.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Credentials {
    #[serde(default)]
    #[validate(length(min = 1, message = "mobile is required"))]
    pub mobile: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "token is required"))]
    pub token: String,
}

impl Credentials {
    pub fn new(mobile: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            mobile: mobile.into(),
            token: token.into(),
        }
    }
}

/// Mask a mobile number for logs, keeping the last four digits.
///
/// Numbers of four characters or fewer are masked entirely.
pub fn mask_mobile(mobile: &str) -> String {
    let len = mobile.chars().count();
    if len <= 4 {
        return "***".to_string();
    }
    let visible: String = mobile.chars().skip(len - 4).collect();
    format!("***{}", visible)
}

#[derive(Clone)]
pub struct IdentityService {
    db: Database,
}

impl IdentityService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Resolve credentials to a user, creating the user on first login.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<User> {
        credentials.validate()?;

        let existing: Option<User> = self
            .db
            .find_one(collections::USERS, &by_mobile(&credentials.mobile))
            .await?;

        match existing {
            Some(_) => self.rotate_token(credentials).await,
            None => self.create_or_rotate(credentials).await,
        }
    }

    /// Insert branch. A unique violation means another login created the
    /// user first; fall through to the update branch.
    async fn create_or_rotate(&self, credentials: &Credentials) -> Result<User> {
        let new_user = NewUser {
            mobile: &credentials.mobile,
            token: &credentials.token,
        };

        match self.db.insert_one(collections::USERS, &new_user).await {
            Ok(id) => {
                tracing::info!(
                    user_id = %id,
                    mobile = %mask_mobile(&credentials.mobile),
                    "User created"
                );
                Ok(User {
                    id,
                    mobile: credentials.mobile.clone(),
                    token: credentials.token.clone(),
                })
            }
            Err(StoreError::UniqueViolation { .. }) => {
                tracing::info!(
                    mobile = %mask_mobile(&credentials.mobile),
                    "Concurrent first login detected, updating existing user"
                );
                self.rotate_token(credentials).await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Update branch: overwrite the token, then return the stored record.
    async fn rotate_token(&self, credentials: &Credentials) -> Result<User> {
        let filter = by_mobile(&credentials.mobile);

        let matched = self
            .db
            .update_one(
                collections::USERS,
                &filter,
                &Patch::set("token", credentials.token.as_str()),
            )
            .await?;
        if matched == 0 {
            return Err(AppError::Database(format!(
                "no user matched {} during token update",
                mask_mobile(&credentials.mobile)
            )));
        }

        let user: User = self
            .db
            .find_one(collections::USERS, &filter)
            .await
            .map_err(AppError::read_back)?
            .ok_or_else(|| {
                AppError::ReadBack(format!(
                    "user {} missing after token update",
                    mask_mobile(&credentials.mobile)
                ))
            })?;

        tracing::info!(user_id = %user.id, "User token rotated");
        Ok(user)
    }
}

fn by_mobile(mobile: &str) -> Filter {
    Filter::eq("mobile", mobile)
}
