//! Terminal rendering for the ticket rail and the outstanding-quantity
//! table.

use std::io::{self, Write};

use kitchen_core::{item_affordance, ItemAffordance, KitchenSnapshot, NotificationSink};
use shared::domain::{ChefRef, ItemStatus};

/// Rings the terminal bell on new-order pushes.
pub struct TerminalBell {
    enabled: bool,
}

impl TerminalBell {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl NotificationSink for TerminalBell {
    fn order_placed_alert(&self) {
        if self.enabled {
            print!("\x07");
            let _ = io::stdout().flush();
        }
    }
}

fn status_label(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::Pending => "pending",
        ItemStatus::Cooking => "cooking",
        ItemStatus::Done => "done",
    }
}

pub fn redraw_screen(snapshot: &KitchenSnapshot, viewer: &ChefRef) {
    // Move cursor to top-left and clear screen
    print!("\x1B[H\x1B[0J");

    println!("Kitchen display — {}", viewer.username);
    if snapshot.stale {
        println!("(data may be stale; retrying in background)");
    }
    if let Some(focus) = snapshot.focus {
        let name = snapshot
            .rows
            .iter()
            .find(|row| row.product_id == focus)
            .map(|row| row.product_name.as_str())
            .unwrap_or("selected product");
        println!("Focus: {name} (focus {} again to clear)", focus.0);
    }

    println!("\nOutstanding");
    println!("{:<20} | total | cooking", "product");
    println!("{:-<20} | ----- | -------", "");
    for row in &snapshot.rows {
        println!(
            "{:<20} | {:>5} | {:>7}",
            row.product_name, row.total_outstanding, row.cooking_qty
        );
    }

    println!("\nTickets (oldest first)");
    for ticket in &snapshot.tickets {
        println!(
            "#{} placed {}",
            ticket.order_id.0,
            ticket.placed_at.format("%H:%M:%S")
        );
        for item in &ticket.items {
            let hint = match item_affordance(item, viewer) {
                ItemAffordance::Claim => format!("[claim {}]", item.item_id.0),
                ItemAffordance::Complete => format!("[done {}]", item.item_id.0),
                ItemAffordance::LockedBy(chef) => format!("locked by {}", chef.username),
                ItemAffordance::NoAction => String::new(),
            };
            println!(
                "  {:>2} x {:<18} {:<8} {}",
                item.quantity,
                item.product.name,
                status_label(item.status),
                hint
            );
        }
    }

    println!("\ncommands: claim <item> | done <item> | focus <product> | quit");
    let _ = io::stdout().flush();
}
