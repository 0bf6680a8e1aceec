//! Ticket projection for the kitchen display: one ticket per active order,
//! oldest first, carrying only items still in progress.

use chrono::{DateTime, Utc};
use shared::{
    domain::{ItemStatus, OrderId, OrderStatus, ProductId},
    protocol::{OrderItemPayload, OrderPayload},
};

/// One order as shown on the display rail.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub placed_at: DateTime<Utc>,
    pub items: Vec<OrderItemPayload>,
}

/// Projects the active order set into display tickets, sorted ascending by
/// placement time. Done items are dropped from each ticket, but an order
/// whose items are all done keeps its (empty) ticket: removing the order is
/// the order subsystem's job, signalled through the order-level status, not
/// this projection's.
///
/// With a focus product set, only orders still owing at least one non-done
/// item of that product are projected; `focus = None` restores the full
/// list.
pub fn project_tickets(orders: &[OrderPayload], focus: Option<ProductId>) -> Vec<Ticket> {
    let mut tickets: Vec<Ticket> = orders
        .iter()
        .filter(|order| match focus {
            Some(product_id) => has_outstanding_product(order, product_id),
            None => true,
        })
        .map(|order| Ticket {
            order_id: order.order_id,
            status: order.status,
            placed_at: order.created_at,
            items: order
                .items
                .iter()
                .filter(|item| item.status != ItemStatus::Done)
                .cloned()
                .collect(),
        })
        .collect();

    tickets.sort_by_key(|ticket| (ticket.placed_at, ticket.order_id.0));
    tickets
}

fn has_outstanding_product(order: &OrderPayload, product_id: ProductId) -> bool {
    order
        .items
        .iter()
        .any(|item| item.product.product_id == product_id && item.status != ItemStatus::Done)
}
