//! Shopper session: guest or signed-in customer.

use std::fmt;
use std::sync::Arc;

use secrecy::SecretString;
use shopfront_core::CustomerId;
use tokio::sync::watch;

/// Bearer credentials of a signed-in customer.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct Credentials {
    pub customer_id: CustomerId,
    pub token: SecretString,
}

impl Credentials {
    #[must_use]
    pub fn new(customer_id: CustomerId, token: impl Into<String>) -> Self {
        Self {
            customer_id,
            token: SecretString::from(token.into()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("customer_id", &self.customer_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Who is shopping.
#[derive(Debug, Clone, Default)]
pub enum Session {
    #[default]
    Guest,
    Authenticated(Credentials),
}

impl Session {
    #[must_use]
    pub const fn credentials(&self) -> Option<&Credentials> {
        match self {
            Self::Guest => None,
            Self::Authenticated(credentials) => Some(credentials),
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Shared, observable handle on the current [`Session`].
///
/// Cheaply cloneable; all clones see the same session.
#[derive(Clone)]
pub struct SessionHandle {
    tx: Arc<watch::Sender<Session>>,
}

impl SessionHandle {
    #[must_use]
    pub fn new(session: Session) -> Self {
        let (tx, _rx) = watch::channel(session);
        Self { tx: Arc::new(tx) }
    }

    #[must_use]
    pub fn current(&self) -> Session {
        self.tx.borrow().clone()
    }

    /// Credentials of the signed-in customer, `None` for guests.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        self.tx.borrow().credentials().cloned()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_authenticated()
    }

    pub fn sign_in(&self, credentials: Credentials) {
        self.tx.send_replace(Session::Authenticated(credentials));
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(Session::Guest);
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new(Session::Guest)
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionHandle").field(&*self.tx.borrow()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_and_out() {
        let handle = SessionHandle::default();
        assert!(!handle.is_authenticated());
        assert!(handle.credentials().is_none());

        let clone = handle.clone();
        clone.sign_in(Credentials::new(CustomerId::from(3), "tok"));
        assert!(handle.is_authenticated());
        assert_eq!(
            handle.credentials().map(|c| c.customer_id),
            Some(CustomerId::from(3))
        );

        handle.sign_out();
        assert!(!clone.is_authenticated());
    }

    #[test]
    fn test_credentials_debug_redacts_token() {
        let credentials = Credentials::new(CustomerId::from(3), "super-secret-token");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("super-secret-token"));
    }
}
