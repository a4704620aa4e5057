use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kluster_core::{Entity, Money, OwnedEntity, ProductId, UserId};

/// An item a business sells.
///
/// Price is in minor currency units and never negative once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub business_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &ProductId {
        &self.id
    }
}

impl OwnedEntity for Product {
    fn owner_id(&self) -> &UserId {
        &self.business_id
    }
}
