use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tinyweb_http::handler::UserVerifier;
use tracing::{debug, info};

/// An in-memory user table backing the login and register pages.
///
/// - empty user names or passwords never verify
/// - login succeeds when the stored password matches
/// - register succeeds only for an unused name, which is then stored
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, String>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already knows the given `(username, password)` pairs.
    pub fn with_users<I, U, P>(users: I) -> Self
    where
        I: IntoIterator<Item = (U, P)>,
        U: Into<String>,
        P: Into<String>,
    {
        let users = users.into_iter().map(|(username, password)| (username.into(), password.into())).collect();
        Self { users: Mutex::new(users) }
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UserVerifier for MemoryUserStore {
    fn verify(&self, username: &str, password: &str, is_login: bool) -> bool {
        if username.is_empty() || password.is_empty() {
            return false;
        }

        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        if is_login {
            let verified = users.get(username).is_some_and(|stored| stored == password);
            debug!(username, verified, "login");
            return verified;
        }

        match users.entry(username.to_string()) {
            Entry::Occupied(_) => {
                debug!(username, "register rejected, user name is taken");
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(password.to_string());
                info!(username, "user registered");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_needs_matching_password() {
        let store = MemoryUserStore::with_users([("alice", "pw")]);

        assert!(store.verify("alice", "pw", true));
        assert!(!store.verify("alice", "wrong", true));
        assert!(!store.verify("bob", "pw", true));
    }

    #[test]
    fn register_only_unused_names() {
        let store = MemoryUserStore::new();

        assert!(store.verify("bob", "secret", false));
        assert_eq!(store.len(), 1);
        assert!(!store.verify("bob", "other", false));
        assert!(store.verify("bob", "secret", true));
        assert!(!store.verify("bob", "other", true));
    }

    #[test]
    fn empty_credentials_never_verify() {
        let store = MemoryUserStore::with_users([("", "pw")]);

        assert!(!store.verify("", "pw", true));
        assert!(!store.verify("carol", "", false));
        assert!(!store.verify("", "", false));
        assert_eq!(store.len(), 1);
    }
}
