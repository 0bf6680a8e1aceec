//! Per-item claim discipline. Transitions are strictly forward
//! (pending -> cooking -> done) and a cooking item belongs to exactly one
//! chef; these checks gate commands before dispatch, while the server stays
//! authoritative for arbitration.

use shared::{
    domain::{ChefRef, ItemStatus, OrderItemId},
    protocol::OrderItemPayload,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("item {} is not part of the active order set", item_id.0)]
    UnknownItem { item_id: OrderItemId },
    #[error("item {} is already being cooked by {chef}", item_id.0)]
    AlreadyClaimed { item_id: OrderItemId, chef: String },
    #[error("item {} is owned by {chef}; only the owning chef may finish it", item_id.0)]
    NotOwner { item_id: OrderItemId, chef: String },
    #[error("item {} cannot move from {from:?} to {to:?}", item_id.0)]
    InvalidTransition {
        item_id: OrderItemId,
        from: ItemStatus,
        to: ItemStatus,
    },
    #[error("update of item {} was rejected by the server: {reason}", item_id.0)]
    Rejected { item_id: OrderItemId, reason: String },
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// The action a display may offer the viewing chef for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemAffordance {
    /// Pending item: any chef may claim it.
    Claim,
    /// Cooking item owned by the viewer: may be marked done.
    Complete,
    /// Cooking item owned by another chef: show the owner, no button.
    LockedBy(ChefRef),
    /// Nothing to offer (done, or ownership cannot be proven).
    NoAction,
}

pub fn is_forward_transition(from: ItemStatus, to: ItemStatus) -> bool {
    matches!(
        (from, to),
        (ItemStatus::Pending, ItemStatus::Cooking) | (ItemStatus::Cooking, ItemStatus::Done)
    )
}

pub fn item_affordance(item: &OrderItemPayload, viewer: &ChefRef) -> ItemAffordance {
    match item.status {
        ItemStatus::Pending => ItemAffordance::Claim,
        ItemStatus::Cooking => match &item.chef {
            Some(chef) if chef.chef_id == viewer.chef_id => ItemAffordance::Complete,
            Some(chef) => ItemAffordance::LockedBy(chef.clone()),
            None => ItemAffordance::NoAction,
        },
        ItemStatus::Done => ItemAffordance::NoAction,
    }
}

/// Checks that a pending -> cooking claim is worth dispatching at all. This
/// avoids issuing doomed commands; the server still has the final word.
pub fn ensure_claimable(item: &OrderItemPayload) -> Result<(), ClaimError> {
    match item.status {
        ItemStatus::Pending => Ok(()),
        ItemStatus::Cooking => Err(ClaimError::AlreadyClaimed {
            item_id: item.item_id,
            chef: item
                .chef
                .as_ref()
                .map(|chef| chef.username.clone())
                .unwrap_or_else(|| "another chef".to_string()),
        }),
        ItemStatus::Done => Err(ClaimError::InvalidTransition {
            item_id: item.item_id,
            from: ItemStatus::Done,
            to: ItemStatus::Cooking,
        }),
    }
}

/// Checks that the viewer holds the cooking claim before a done command is
/// dispatched.
pub fn ensure_completable(item: &OrderItemPayload, viewer: &ChefRef) -> Result<(), ClaimError> {
    match item.status {
        ItemStatus::Cooking => match &item.chef {
            Some(chef) if chef.chef_id == viewer.chef_id => Ok(()),
            Some(chef) => Err(ClaimError::NotOwner {
                item_id: item.item_id,
                chef: chef.username.clone(),
            }),
            None => Err(ClaimError::NotOwner {
                item_id: item.item_id,
                chef: "unknown".to_string(),
            }),
        },
        from => Err(ClaimError::InvalidTransition {
            item_id: item.item_id,
            from,
            to: ItemStatus::Done,
        }),
    }
}
