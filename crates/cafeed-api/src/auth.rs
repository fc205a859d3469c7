// ── Token provider seam ──
//
// The connection never acquires tokens itself. It asks a provider
// immediately before every connection attempt and aborts the attempt
// when nothing usable comes back.

use secrecy::{ExposeSecret, SecretString};

/// Source of the auth token appended to the connection URL.
pub trait TokenProvider: Send + Sync + 'static {
    /// Current token, or `None` when the user is not signed in.
    fn token(&self) -> Option<SecretString>;
}

/// A fixed token, mostly useful for tests and one-off sessions.
#[derive(Debug, Clone)]
pub struct StaticToken(SecretString);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<SecretString> {
        Some(self.0.clone())
    }
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<SecretString> + Send + Sync + 'static,
{
    fn token(&self) -> Option<SecretString> {
        self()
    }
}

/// Fetch a token, treating empty or whitespace-only values as absent.
pub(crate) fn usable_token(provider: &dyn TokenProvider) -> Option<SecretString> {
    provider
        .token()
        .filter(|t| !t.expose_secret().trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_token_is_usable() {
        let provider = StaticToken::new("abc");
        let token = usable_token(&provider);
        assert_eq!(token.as_ref().map(|t| t.expose_secret()), Some("abc"));
    }

    #[test]
    fn empty_token_is_absent() {
        assert!(usable_token(&StaticToken::new("  ")).is_none());
        let none = || None::<SecretString>;
        assert!(usable_token(&none).is_none());
    }
}
