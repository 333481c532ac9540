//! CLI command implementations.

pub mod cart;
pub mod session;

use shopfront_cart::{CartView, RemoteOutcome};

/// Print the cart as a table with its subtotal.
#[allow(clippy::print_stdout)]
pub fn print_cart(view: &CartView) {
    if view.is_empty() {
        println!("Cart is empty");
        return;
    }

    println!("{:>3}  {:<32} {:>5} {:>12} {:>12}", "#", "Item", "Qty", "Price", "Total");
    for item in &view.items {
        let limit = if item.at_stock_limit { " (max)" } else { "" };
        println!(
            "{:>3}  {:<32} {:>5} {:>12} {:>12}{limit}",
            item.index, item.title, item.quantity, item.price, item.line_price
        );
    }
    println!();
    println!("{} item(s), subtotal {}", view.item_count, view.subtotal);
}

/// Report how a backend call ended.
///
/// Failures do not fail the command: the local change already happened.
pub fn report_outcome(outcome: &RemoteOutcome) {
    match outcome {
        RemoteOutcome::LocalOnly => tracing::debug!("Saved locally"),
        RemoteOutcome::Synced => tracing::info!("Synced with server"),
        RemoteOutcome::Failed(e) => {
            tracing::warn!("Server not updated, local cart kept: {e}");
        }
    }
}
