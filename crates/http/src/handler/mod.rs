//! Credential check collaborator used by the login and register form hooks.
//!
//! The connection core does not persist users; it only calls out through
//! [`UserVerifier`] and rewrites the request path with the outcome.

/// Verifies (login) or registers (register) a user.
#[cfg_attr(test, mockall::automock)]
pub trait UserVerifier {
    /// Returns true when the login succeeded or the user was registered.
    fn verify(&self, username: &str, password: &str, is_login: bool) -> bool;
}

#[derive(Debug)]
pub struct VerifierFn<F> {
    f: F,
}

impl<F> UserVerifier for VerifierFn<F>
where
    F: Fn(&str, &str, bool) -> bool,
{
    fn verify(&self, username: &str, password: &str, is_login: bool) -> bool {
        (self.f)(username, password, is_login)
    }
}

/// Wraps a closure into a [`UserVerifier`].
///
/// ```
/// # use tinyweb_http::handler::{make_verifier, UserVerifier};
/// let verifier = make_verifier(|name: &str, pwd: &str, _is_login: bool| name == "root" && pwd == "secret");
/// assert!(verifier.verify("root", "secret", true));
/// ```
pub fn make_verifier<F>(f: F) -> VerifierFn<F>
where
    F: Fn(&str, &str, bool) -> bool,
{
    VerifierFn { f }
}
