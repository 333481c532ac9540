//! Cart mutation commands.
//!
//! Quantity changes and removals wait for their backend call before
//! returning, so the process does not exit with the call in flight.

use rust_decimal::Decimal;
use shopfront_cart::{CartError, CartService, CheckoutSummary};
use shopfront_core::{Product, ProductId};

use super::{print_cart, report_outcome};

/// Print the cart, re-fetching the server cart first when signed in.
pub async fn show(cart: &CartService) {
    report_outcome(&cart.refresh().await);
    print_cart(&cart.view());
}

/// Add a product.
///
/// # Errors
///
/// Returns `CartError` if the quantity is zero or the server is out of stock.
pub async fn add(
    cart: &CartService,
    product_id: ProductId,
    name: String,
    price: Decimal,
    stock: u32,
    quantity: u32,
) -> Result<(), CartError> {
    let product = Product {
        id: product_id,
        name,
        price,
        stock,
    };
    tracing::info!("Adding {} x {}", quantity, product.name);

    let outcome = cart.add_to_cart(&product, quantity).await?;
    report_outcome(&outcome);
    print_cart(&cart.view());
    Ok(())
}

/// Raise a line's quantity to `to`, or by one.
///
/// # Errors
///
/// Returns `CartError` if the line does not exist or stock would be exceeded.
pub async fn increase(cart: &CartService, index: usize, to: Option<u32>) -> Result<(), CartError> {
    let current = line_quantity(cart, index)?;
    let task = cart.increase_quantity(index, to.unwrap_or_else(|| current.saturating_add(1)))?;
    report_outcome(&task.outcome().await);
    print_cart(&cart.view());
    Ok(())
}

/// Lower a line's quantity to `to`, or by one. Zero removes the line.
///
/// # Errors
///
/// Returns `CartError` if the line does not exist.
pub async fn decrease(cart: &CartService, index: usize, to: Option<u32>) -> Result<(), CartError> {
    let current = line_quantity(cart, index)?;
    let task = cart.decrease_quantity(index, to.unwrap_or_else(|| current.saturating_sub(1)))?;
    report_outcome(&task.outcome().await);
    print_cart(&cart.view());
    Ok(())
}

/// Remove a line.
///
/// # Errors
///
/// Returns `CartError` if the line does not exist.
pub async fn remove(cart: &CartService, index: usize) -> Result<(), CartError> {
    let task = cart.remove_item(index)?;
    report_outcome(&task.outcome().await);
    print_cart(&cart.view());
    Ok(())
}

/// Empty the cart, optionally as the last step of a checkout.
pub async fn empty(cart: &CartService, checkout: bool) {
    let outcome = if checkout {
        if let Some(summary) = cart.store().read(|state| CheckoutSummary::from_state(state)) {
            tracing::info!(
                "Order placed: {} item(s), total {}",
                summary.item_count,
                summary.total.display()
            );
        }
        cart.complete_checkout().await
    } else {
        cart.empty_cart().await
    };
    report_outcome(&outcome);
    print_cart(&cart.view());
}

fn line_quantity(cart: &CartService, index: usize) -> Result<u32, CartError> {
    cart.store()
        .read(|state| state.get(index).map(|line| line.quantity))
        .ok_or(CartError::LineNotFound(index))
}
