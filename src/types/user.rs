//! User records

use crate::address::CanonicalAddress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A wallet owner known to the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub wallet_address: CanonicalAddress,
    pub created_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

impl User {
    /// A user created by their first successful login at `now`
    pub fn new(id: Uuid, wallet_address: CanonicalAddress, now: DateTime<Utc>) -> Self {
        Self {
            id,
            wallet_address,
            created_at: now,
            last_login_at: now,
        }
    }
}
