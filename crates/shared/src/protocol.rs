use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{ChefRef, ItemStatus, OrderId, OrderItemId, OrderStatus, ProductRef},
    error::ApiError,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemPayload {
    pub item_id: OrderItemId,
    pub product: ProductRef,
    pub quantity: u32,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chef: Option<ChefRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPayload {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemPayload>,
}

/// Command body for the item-status write interface. The acting chef is
/// carried by the caller's authenticated context, never in the body; the
/// server remains authoritative for assigning and validating ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateItemStatusRequest {
    pub item_id: OrderItemId,
    pub target_status: ItemStatus,
}

/// Push topic messages. Receipt alone is the signal — consumers refetch the
/// authoritative order set instead of applying the payload as a patch, so
/// the ids here are informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum KitchenPush {
    OrderPlaced {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order_id: Option<OrderId>,
    },
    OrderUpdated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order_id: Option<OrderId>,
    },
    Error(ApiError),
}
