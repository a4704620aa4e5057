use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kluster_core::{ClientId, Entity, OwnedEntity, UserId};

/// A customer of a business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub business_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
    pub address: String,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn has_email(&self, email: &str) -> bool {
        self.email_address.trim().eq_ignore_ascii_case(email.trim())
    }
}

impl Entity for Client {
    type Id = ClientId;

    fn id(&self) -> &ClientId {
        &self.id
    }
}

impl OwnedEntity for Client {
    fn owner_id(&self) -> &UserId {
        &self.business_id
    }
}
