//! Session commands.

use std::time::Duration;

use shopfront_cart::{CartService, Credentials, MergeOutcome};

use super::{print_cart, report_outcome};

/// Fallback refresh interval for `watch` when none is configured.
const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(60);

/// Sign in (or register) and merge the guest cart.
pub async fn sign_in(cart: &CartService, credentials: Credentials, register: bool) {
    let outcome = if register {
        cart.register(credentials).await
    } else {
        cart.login(credentials).await
    };

    match &outcome {
        MergeOutcome::Skipped(refresh) | MergeOutcome::Merged(refresh) => report_outcome(refresh),
        MergeOutcome::Retained => {
            tracing::warn!("Server kept the guest cart; it will be merged on next sign-in");
        }
        MergeOutcome::Failed(e) => {
            tracing::warn!("Guest cart not merged, kept locally: {e}");
        }
    }
    print_cart(&cart.view());
}

/// Sign out, keeping guest lines that were never merged.
pub fn sign_out(cart: &CartService) {
    cart.logout();
    print_cart(&cart.view());
}

/// Refresh periodically and print the badge count whenever it changes.
///
/// Runs until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the Ctrl-C handler cannot be installed.
#[allow(clippy::print_stdout)]
pub async fn watch(cart: &CartService, interval: Option<Duration>) -> std::io::Result<()> {
    let interval = interval.unwrap_or(DEFAULT_WATCH_INTERVAL);
    tracing::info!("Refreshing cart every {}s", interval.as_secs());

    let mut badge = cart.watch_badge();
    println!("Cart: {}", badge.current().count);

    let refresher = cart.spawn_periodic_refresh(interval);
    loop {
        tokio::select! {
            changed = badge.changed() => match changed {
                Some(current) => println!("Cart: {}", current.count),
                None => break,
            },
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Stopping");
                break;
            }
        }
    }
    refresher.abort();
    Ok(())
}
