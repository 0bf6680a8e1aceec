//! Pure projection from the active order set to per-product outstanding
//! quantities. Recomputed from scratch on every refresh, never patched.

use std::collections::HashMap;

use shared::{
    domain::{ItemStatus, ProductId},
    protocol::OrderPayload,
};

/// One row of the live aggregation view. Derived data, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateRow {
    pub product_id: ProductId,
    pub product_name: String,
    pub total_outstanding: u32,
    pub cooking_qty: u32,
}

/// Accumulates per-product quantities across all non-done items of the given
/// orders. Rows are ordered by first encounter over the stable order
/// iteration, so identical input yields identical output.
pub fn aggregate(orders: &[OrderPayload]) -> Vec<AggregateRow> {
    let mut rows: Vec<AggregateRow> = Vec::new();
    let mut slots: HashMap<ProductId, usize> = HashMap::new();

    for order in orders {
        for item in &order.items {
            if item.status == ItemStatus::Done {
                continue;
            }
            let slot = *slots.entry(item.product.product_id).or_insert_with(|| {
                rows.push(AggregateRow {
                    product_id: item.product.product_id,
                    product_name: item.product.name.clone(),
                    total_outstanding: 0,
                    cooking_qty: 0,
                });
                rows.len() - 1
            });
            rows[slot].total_outstanding += item.quantity;
            if item.status == ItemStatus::Cooking {
                rows[slot].cooking_qty += item.quantity;
            }
        }
    }

    rows
}
