//! User model for storage and API.

use crate::db::ObjectId;
use serde::{Deserialize, Serialize};

/// User record stored in the `users` collection.
///
/// `mobile` is unique across the collection (enforced by the store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Store-assigned identifier
    pub id: ObjectId,
    /// Mobile number (natural key)
    pub mobile: String,
    /// Opaque credential, replaced on every login
    pub token: String,
}

/// Insert shape for a user; the store assigns `id`.
#[derive(Debug, Serialize)]
pub struct NewUser<'a> {
    pub mobile: &'a str,
    pub token: &'a str,
}
