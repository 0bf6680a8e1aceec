use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(OrderId);
id_newtype!(OrderItemId);
id_newtype!(ProductId);
id_newtype!(ChefId);

/// Lifecycle of an order as owned by the order-management subsystem. The
/// kitchen only ever works on the active subset, see [`OrderStatus::is_kitchen_active`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Delivering,
    Done,
    Cancelled,
}

impl OrderStatus {
    /// Orders in these states form the active order set the kitchen works on.
    pub fn is_kitchen_active(self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Preparing)
    }
}

/// Preparation state of a single order item. Transitions are strictly
/// forward: pending -> cooking -> done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Cooking,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub product_id: ProductId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChefRef {
    pub chef_id: ChefId,
    pub username: String,
}
